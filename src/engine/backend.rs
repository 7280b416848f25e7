use crate::effects::custom::CpuKernel;
use crate::effects::effect::{ColorMode, UniformMap};
use crate::engine::caps::EngineCaps;
use crate::foundation::core::SurfaceSize;
use crate::foundation::error::{HalationError, HalationResult};
use crate::scene::model::{Camera, Scene};

/// Engine-side handle of an offscreen color target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u32);

/// Engine-side handle of a compiled full-screen program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Which fixed pass a program implements, so engines without a shader compiler can still
/// execute it.
#[derive(Clone, Debug)]
pub enum ProgramKind {
    Copy,
    Blur,
    Pixelate,
    BloomExtract,
    BloomComposite,
    ColorGrade,
    Custom {
        name: String,
        cpu_kernel: Option<CpuKernel>,
    },
}

/// Everything needed to build one full-screen-quad program.
#[derive(Clone, Debug)]
pub struct ProgramDesc {
    pub label: String,
    pub kind: ProgramKind,
    pub vertex_source: String,
    pub fragment_source: String,
    /// Uniform names the fragment stage declares, besides the shared pass block.
    pub uniforms: Vec<String>,
}

/// Effect-specific uniforms of a single pass.
#[derive(Clone, Debug, PartialEq)]
pub enum PassParams {
    None,
    Blur { direction: [f32; 2], radius: f32 },
    Pixelate { pixel_size: f32 },
    BloomExtract { threshold: f32 },
    BloomComposite { intensity: f32 },
    ColorGrade { mode: ColorMode, amount: f32 },
    Custom(UniformMap),
}

/// Uniform set of a full-screen pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PassUniforms {
    pub input: SurfaceHandle,
    /// Second texture, only used by the bloom composite.
    pub aux: Option<SurfaceHandle>,
    pub resolution: [f32; 2],
    pub texel_size: [f32; 2],
    pub params: PassParams,
}

impl PassUniforms {
    pub fn new(input: SurfaceHandle, size: SurfaceSize, params: PassParams) -> Self {
        Self {
            input,
            aux: None,
            resolution: [size.width as f32, size.height as f32],
            texel_size: size.texel_size(),
            params,
        }
    }

    pub fn with_aux(mut self, aux: SurfaceHandle) -> Self {
        self.aux = Some(aux);
        self
    }
}

/// How a pass writes into the bound target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassBlend {
    /// Overwrite destination texels.
    Replace,
    /// Premultiplied source-over onto the existing destination, without clearing it.
    Over,
}

/// Opaque graphics capability surface consumed by the renderer.
///
/// Offscreen surfaces, shader programs and render-target binding are optional: the defaults report
/// [`HalationError::CapabilityMissing`], and [`Engine::caps`] must agree with what is implemented.
pub trait Engine {
    fn caps(&self) -> EngineCaps;

    /// Size of the display framebuffer.
    fn display_size(&self) -> SurfaceSize;

    fn resize_display(&mut self, size: SurfaceSize) -> HalationResult<()>;

    fn create_render_surface(&mut self, _size: SurfaceSize) -> HalationResult<SurfaceHandle> {
        Err(HalationError::capability("engine cannot create render surfaces"))
    }

    fn resize_render_surface(
        &mut self,
        _surface: SurfaceHandle,
        _size: SurfaceSize,
    ) -> HalationResult<()> {
        Err(HalationError::capability("engine cannot resize render surfaces"))
    }

    fn destroy_render_surface(&mut self, _surface: SurfaceHandle) {}

    fn create_shader_program(&mut self, _desc: &ProgramDesc) -> HalationResult<ProgramId> {
        Err(HalationError::capability("engine cannot create shader programs"))
    }

    fn destroy_shader_program(&mut self, _program: ProgramId) {}

    /// Bind an offscreen surface, or the display framebuffer for `None`.
    fn bind_render_target(&mut self, target: Option<SurfaceHandle>) -> HalationResult<()> {
        match target {
            None => Ok(()),
            Some(_) => Err(HalationError::capability(
                "engine cannot bind offscreen render targets",
            )),
        }
    }

    /// Clear the bound target to its clear color.
    fn clear(&mut self) -> HalationResult<()>;

    /// Draw the scene through `camera` into the bound target, over its current contents.
    fn draw(&mut self, scene: &Scene, camera: &Camera) -> HalationResult<()>;

    /// Run `program` over every texel of the bound target.
    fn draw_fullscreen(
        &mut self,
        _program: ProgramId,
        _uniforms: &PassUniforms,
        _blend: PassBlend,
    ) -> HalationResult<()> {
        Err(HalationError::capability("engine cannot run shader programs"))
    }
}
