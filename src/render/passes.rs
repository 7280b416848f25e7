use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::effects::custom::{CustomFilterDef, CustomFilterRegistry, lookup_custom_filter};
use crate::effects::effect::{ColorMode, UniformMap};
use crate::engine::backend::{
    Engine, PassBlend, PassParams, PassUniforms, ProgramDesc, ProgramId, ProgramKind,
};
use crate::foundation::error::{HalationError, HalationResult};
use crate::render::pool::RenderSurface;
use crate::render::shaders;

/// Program labels, as they show up in engine draw logs.
pub mod labels {
    pub const COPY: &str = "copy";
    pub const BLUR: &str = "blur";
    pub const PIXELATE: &str = "pixelate";
    pub const BLOOM_EXTRACT: &str = "bloom_extract";
    pub const BLOOM_COMPOSITE: &str = "bloom_composite";
    pub const COLOR_GRADE: &str = "color_grade";

    pub fn custom(name: &str) -> String {
        format!("custom:{name}")
    }
}

pub(crate) const HORIZONTAL: [f32; 2] = [1.0, 0.0];
pub(crate) const VERTICAL: [f32; 2] = [0.0, 1.0];

/// A compiled custom program and the definition it was built from.
#[derive(Clone, Debug)]
pub(crate) struct CustomPass {
    pub(crate) program: ProgramId,
    pub(crate) def: Arc<CustomFilterDef>,
}

enum CustomSlot {
    Ready { pass: CustomPass, revision: u64 },
    /// Compilation failed for this revision; retried only after re-registration.
    Failed { revision: u64 },
}

#[derive(Clone, Copy)]
struct Builtins {
    copy: ProgramId,
    blur: ProgramId,
    pixelate: ProgramId,
    bloom_extract: ProgramId,
    bloom_composite: ProgramId,
    color_grade: ProgramId,
}

/// The fixed set of full-screen programs plus lazily compiled custom ones.
///
/// Every pass binds its output (`None` is the display framebuffer), runs one full-screen draw and
/// leaves the output bound. Offscreen outputs are overwritten; the display is blended over.
pub(crate) struct PassLibrary {
    builtins: Builtins,
    custom: HashMap<String, CustomSlot>,
    warned: HashSet<String>,
    passes_run: u64,
}

impl PassLibrary {
    /// Compile the six built-ins. On failure, programs compiled so far are destroyed.
    pub(crate) fn new<E: Engine + ?Sized>(engine: &mut E) -> HalationResult<Self> {
        let specs: [(&str, ProgramKind, String, &[&str]); 6] = [
            (labels::COPY, ProgramKind::Copy, shaders::copy_fs(), &[]),
            (
                labels::BLUR,
                ProgramKind::Blur,
                shaders::blur_fs(),
                &["direction", "radius"],
            ),
            (
                labels::PIXELATE,
                ProgramKind::Pixelate,
                shaders::pixelate_fs(),
                &["pixel_size"],
            ),
            (
                labels::BLOOM_EXTRACT,
                ProgramKind::BloomExtract,
                shaders::bloom_extract_fs(),
                &["threshold"],
            ),
            (
                labels::BLOOM_COMPOSITE,
                ProgramKind::BloomComposite,
                shaders::bloom_composite_fs(),
                &["intensity", "t_bloom"],
            ),
            (
                labels::COLOR_GRADE,
                ProgramKind::ColorGrade,
                shaders::color_grade_fs(),
                &["mode", "amount"],
            ),
        ];

        let mut compiled = Vec::with_capacity(specs.len());
        for (label, kind, fs, uniforms) in specs {
            let desc = ProgramDesc {
                label: label.to_string(),
                kind,
                vertex_source: shaders::FULLSCREEN_VS.to_string(),
                fragment_source: fs,
                uniforms: uniforms.iter().map(|s| s.to_string()).collect(),
            };
            match engine.create_shader_program(&desc) {
                Ok(id) => compiled.push(id),
                Err(err) => {
                    for id in compiled {
                        engine.destroy_shader_program(id);
                    }
                    return Err(err);
                }
            }
        }
        let Ok([copy, blur, pixelate, bloom_extract, bloom_composite, color_grade]) =
            <[ProgramId; 6]>::try_from(compiled)
        else {
            return Err(HalationError::evaluation("built-in program set incomplete"));
        };

        Ok(Self {
            builtins: Builtins {
                copy,
                blur,
                pixelate,
                bloom_extract,
                bloom_composite,
                color_grade,
            },
            custom: HashMap::new(),
            warned: HashSet::new(),
            passes_run: 0,
        })
    }

    /// Full-screen draws issued since construction.
    pub(crate) fn passes_run(&self) -> u64 {
        self.passes_run
    }

    fn run<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        program: ProgramId,
        input: &RenderSurface,
        aux: Option<&RenderSurface>,
        output: Option<&RenderSurface>,
        params: PassParams,
    ) -> HalationResult<()> {
        let (size, blend) = match output {
            Some(out) => (out.size(), PassBlend::Replace),
            None => (engine.display_size(), PassBlend::Over),
        };
        engine.bind_render_target(output.map(RenderSurface::handle))?;
        let mut uniforms = PassUniforms::new(input.handle(), size, params);
        if let Some(aux) = aux {
            uniforms = uniforms.with_aux(aux.handle());
        }
        engine.draw_fullscreen(program, &uniforms, blend)?;
        self.passes_run += 1;
        Ok(())
    }

    pub(crate) fn copy<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        input: &RenderSurface,
        output: Option<&RenderSurface>,
    ) -> HalationResult<()> {
        let p = self.builtins.copy;
        self.run(engine, p, input, None, output, PassParams::None)
    }

    /// One direction of the separable blur; `radius` scales the tap spacing in texels.
    pub(crate) fn blur_1d<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        input: &RenderSurface,
        output: &RenderSurface,
        direction: [f32; 2],
        radius: f32,
    ) -> HalationResult<()> {
        let p = self.builtins.blur;
        self.run(
            engine,
            p,
            input,
            None,
            Some(output),
            PassParams::Blur { direction, radius },
        )
    }

    pub(crate) fn pixelate<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        input: &RenderSurface,
        output: &RenderSurface,
        pixel_size: f32,
    ) -> HalationResult<()> {
        let p = self.builtins.pixelate;
        self.run(
            engine,
            p,
            input,
            None,
            Some(output),
            PassParams::Pixelate { pixel_size },
        )
    }

    pub(crate) fn bloom_extract<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        input: &RenderSurface,
        output: &RenderSurface,
        threshold: f32,
    ) -> HalationResult<()> {
        let p = self.builtins.bloom_extract;
        self.run(
            engine,
            p,
            input,
            None,
            Some(output),
            PassParams::BloomExtract { threshold },
        )
    }

    pub(crate) fn bloom_composite<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        base: &RenderSurface,
        bloom: &RenderSurface,
        output: &RenderSurface,
        intensity: f32,
    ) -> HalationResult<()> {
        let p = self.builtins.bloom_composite;
        self.run(
            engine,
            p,
            base,
            Some(bloom),
            Some(output),
            PassParams::BloomComposite { intensity },
        )
    }

    pub(crate) fn color_grade<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        input: &RenderSurface,
        output: &RenderSurface,
        mode: ColorMode,
        amount: f32,
    ) -> HalationResult<()> {
        let p = self.builtins.color_grade;
        self.run(
            engine,
            p,
            input,
            None,
            Some(output),
            PassParams::ColorGrade { mode, amount },
        )
    }

    /// Resolve a custom filter by name, compiling it on first use or after re-registration.
    ///
    /// Unknown names and programs that fail to compile resolve to `None` and are reported once per
    /// distinct raw name.
    pub(crate) fn custom_pass<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        raw_name: &str,
    ) -> Option<CustomPass> {
        let Some(entry) = lookup_custom_filter(raw_name) else {
            self.warn_once(raw_name, "unknown custom filter, skipping");
            return None;
        };
        let key = CustomFilterRegistry::normalize_name(raw_name);

        match self.custom.get(&key) {
            Some(CustomSlot::Ready { pass, revision }) if *revision == entry.revision => {
                return Some(pass.clone());
            }
            Some(CustomSlot::Failed { revision }) if *revision == entry.revision => return None,
            Some(CustomSlot::Ready { pass, .. }) => {
                engine.destroy_shader_program(pass.program);
            }
            _ => {}
        }

        let desc = ProgramDesc {
            label: labels::custom(&key),
            kind: ProgramKind::Custom {
                name: key.clone(),
                cpu_kernel: entry.def.cpu_kernel,
            },
            vertex_source: shaders::FULLSCREEN_VS.to_string(),
            fragment_source: shaders::custom_fs(&entry.def.fragment_shader),
            uniforms: entry.def.uniforms.keys().cloned().collect(),
        };
        match engine.create_shader_program(&desc) {
            Ok(program) => {
                let pass = CustomPass {
                    program,
                    def: entry.def,
                };
                self.custom.insert(
                    key,
                    CustomSlot::Ready {
                        pass: pass.clone(),
                        revision: entry.revision,
                    },
                );
                Some(pass)
            }
            Err(err) => {
                tracing::warn!(filter = raw_name, error = %err, "custom filter failed to compile, skipping");
                self.custom.insert(
                    key,
                    CustomSlot::Failed {
                        revision: entry.revision,
                    },
                );
                None
            }
        }
    }

    pub(crate) fn custom<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        pass: &CustomPass,
        overrides: &UniformMap,
        input: &RenderSurface,
        output: &RenderSurface,
    ) -> HalationResult<()> {
        let params = PassParams::Custom(pass.def.merged_uniforms(overrides));
        self.run(engine, pass.program, input, None, Some(output), params)
    }

    fn warn_once(&mut self, raw_name: &str, msg: &str) {
        if self.warned.insert(raw_name.to_string()) {
            tracing::warn!(filter = raw_name, "{msg}");
        }
    }

    /// Distinct raw names warned about so far.
    pub(crate) fn warned_count(&self) -> usize {
        self.warned.len()
    }

    pub(crate) fn dispose<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        let b = self.builtins;
        for p in [
            b.copy,
            b.blur,
            b.pixelate,
            b.bloom_extract,
            b.bloom_composite,
            b.color_grade,
        ] {
            engine.destroy_shader_program(p);
        }
        for (_, slot) in self.custom.drain() {
            if let CustomSlot::Ready { pass, .. } = slot {
                engine.destroy_shader_program(pass.program);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/passes.rs"]
mod tests;
