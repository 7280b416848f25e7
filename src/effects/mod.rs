pub(crate) mod custom;
pub(crate) mod effect;
