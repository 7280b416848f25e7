//! Halation renders a scene to the display while running independent post-processing chains
//! (blur, pixelate, bloom, color grading, custom shaders) on selected objects.
//!
//! Per frame, [`Renderer`] draws the unfiltered backdrop, then renders each [`FilterTarget`]'s
//! subtree in isolation into a pooled surface, threads it through its [`EffectChain`] and blends
//! the result onto the display. Results are cached per object and reused while the object is
//! clean, its chain signature is unchanged and the quality scale holds. A closed-loop controller
//! lowers the offscreen resolution when frames run long.
//!
//! Graphics work goes through the [`Engine`] trait. [`CpuEngine`] is a complete software
//! implementation used for tests and headless rendering.
#![forbid(unsafe_code)]

mod effects;
mod engine;
mod foundation;
mod render;
mod scene;

pub use crate::foundation::core::{FrameId, FrameRGBA, Rect, Rgba8Premul, SurfaceSize, Vec2};
pub use crate::foundation::error::{HalationError, HalationResult};

pub use crate::effects::custom::{
    CpuKernel, CustomFilterDef, CustomFilterRegistry, RegisteredFilter, UniformParser,
    lookup_custom_filter, parse_json_uniforms, register_custom_filter,
};
pub use crate::effects::effect::{
    BLOOM_MAX_THRESHOLD, ColorMode, Effect, EffectChain, NOOP_EPSILON, PIXELATE_MIN_SIZE,
    UniformMap, UniformValue,
};

pub use crate::engine::backend::{
    Engine, PassBlend, PassParams, PassUniforms, ProgramDesc, ProgramId, ProgramKind,
    SurfaceHandle,
};
pub use crate::engine::caps::EngineCaps;
pub use crate::engine::cpu::{CpuEngine, CpuEngineOpts, CpuEngineStats, DrawKind, DrawRecord};

pub use crate::scene::model::{
    Camera, FilterTarget, LayerMask, ObjectId, ObjectKind, Scene, SceneObject,
};

pub use crate::render::cache::{CACHE_EVICTION_FRAMES, CacheEntry, FilterCache};
pub use crate::render::passes::labels as pass_labels;
pub use crate::render::pipeline::{
    BLOOM_BLUR_RADIUS, BLUR_PIXELS_PER_STEP, FilterPipeline, MAX_QUALITY_SCALE, MIN_QUALITY_SCALE,
};
pub use crate::render::pool::{PoolOpts, PoolStats, RenderSurface, RenderTargetPool};
pub use crate::render::quality::{MIN_SCALE_STEP, QUALITY_HYSTERESIS, QualityController};
pub use crate::render::renderer::{FILTER_LAYER, FrameStats, Renderer, RendererOpts};
