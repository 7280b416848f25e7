pub(crate) mod backend;
pub(crate) mod caps;
pub(crate) mod cpu;
