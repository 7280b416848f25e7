pub(crate) mod cache;
pub(crate) mod passes;
pub(crate) mod pipeline;
pub(crate) mod pool;
pub(crate) mod quality;
pub(crate) mod renderer;
pub(crate) mod shaders;
