/// Capabilities an [`Engine`](crate::Engine) reports up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineCaps {
    pub render_surfaces: bool,
    pub shader_programs: bool,
    pub render_target_binding: bool,
    /// Per-object render-layer masks honored by camera and lights.
    pub layer_masks: bool,
}

impl EngineCaps {
    pub const FULL: Self = Self {
        render_surfaces: true,
        shader_programs: true,
        render_target_binding: true,
        layer_masks: true,
    };

    pub const NONE: Self = Self {
        render_surfaces: false,
        shader_programs: false,
        render_target_binding: false,
        layer_masks: false,
    };

    /// The filtered path needs offscreen surfaces, programs and target binding together.
    pub fn supports_filtering(self) -> bool {
        self.render_surfaces && self.shader_programs && self.render_target_binding
    }

    pub fn missing_for_filtering(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.render_surfaces {
            out.push("render surfaces");
        }
        if !self.shader_programs {
            out.push("shader programs");
        }
        if !self.render_target_binding {
            out.push("render target binding");
        }
        out
    }
}

impl Default for EngineCaps {
    fn default() -> Self {
        Self::FULL
    }
}
