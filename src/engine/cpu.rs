use crate::effects::effect::ColorMode;
use crate::engine::backend::{
    Engine, PassBlend, PassParams, PassUniforms, ProgramDesc, ProgramId, ProgramKind,
    SurfaceHandle,
};
use crate::engine::caps::EngineCaps;
use crate::foundation::core::{FrameRGBA, SurfaceSize};
use crate::foundation::error::{HalationError, HalationResult};
use crate::foundation::math::{
    BLUR_WEIGHTS, SEPIA, hue_rotation, luma, mat3_mul, mix3, u8_to_unit, unit_to_u8,
};
use crate::scene::model::{Camera, ObjectKind, Scene, SceneObject};

/// Options for the software reference engine.
#[derive(Debug, Clone, Copy)]
pub struct CpuEngineOpts {
    pub(crate) caps: EngineCaps,
    pub(crate) clear_rgba: [u8; 4],
}

impl Default for CpuEngineOpts {
    fn default() -> Self {
        Self {
            caps: EngineCaps::FULL,
            clear_rgba: [0, 0, 0, 255],
        }
    }
}

impl CpuEngineOpts {
    /// Report (and enforce) a reduced capability set.
    pub fn with_caps(mut self, caps: EngineCaps) -> Self {
        self.caps = caps;
        self
    }

    /// Straight-alpha color the display is cleared to.
    pub fn with_clear_rgba(mut self, clear: [u8; 4]) -> Self {
        self.clear_rgba = clear;
        self
    }
}

/// What a single engine call did, in submission order.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawKind {
    Clear,
    Scene { meshes: usize },
    Pass { label: String, blend: PassBlend },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    /// `None` is the display framebuffer.
    pub target: Option<SurfaceHandle>,
    pub kind: DrawKind,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuEngineStats {
    pub surfaces_created: u64,
    pub surfaces_resized: u64,
    pub surfaces_destroyed: u64,
    pub live_surfaces: usize,
    pub programs_created: u64,
    pub programs_destroyed: u64,
    pub scene_draws: u64,
    pub pass_draws: u64,
}

/// Software engine rasterizing scene quads with `vello_cpu` and executing every built-in pass on
/// premultiplied RGBA8 pixmaps.
pub struct CpuEngine {
    opts: CpuEngineOpts,
    display: vello_cpu::Pixmap,
    surfaces: Vec<Option<vello_cpu::Pixmap>>,
    programs: Vec<Option<ProgramDesc>>,
    bound: Option<SurfaceHandle>,
    ctx: Option<vello_cpu::RenderContext>,
    log: Vec<DrawRecord>,
    stats: CpuEngineStats,
}

impl CpuEngine {
    pub fn new(display: SurfaceSize, opts: CpuEngineOpts) -> HalationResult<Self> {
        Ok(Self {
            opts,
            display: new_pixmap(display)?,
            surfaces: Vec::new(),
            programs: Vec::new(),
            bound: None,
            ctx: None,
            log: Vec::new(),
            stats: CpuEngineStats::default(),
        })
    }

    pub fn stats(&self) -> CpuEngineStats {
        self.stats
    }

    pub fn draw_log(&self) -> &[DrawRecord] {
        &self.log
    }

    /// Number of logged full-screen passes whose label is `label`.
    pub fn pass_count(&self, label: &str) -> usize {
        self.log
            .iter()
            .filter(|r| matches!(&r.kind, DrawKind::Pass { label: l, .. } if l == label))
            .count()
    }

    pub fn scene_draw_count(&self) -> usize {
        self.log
            .iter()
            .filter(|r| matches!(r.kind, DrawKind::Scene { .. }))
            .count()
    }

    pub fn screen_frame(&self) -> FrameRGBA {
        pixmap_frame(&self.display)
    }

    pub fn surface_frame(&self, surface: SurfaceHandle) -> HalationResult<FrameRGBA> {
        Ok(pixmap_frame(self.surface(surface)?))
    }

    pub fn surface_size(&self, surface: SurfaceHandle) -> HalationResult<SurfaceSize> {
        let p = self.surface(surface)?;
        Ok(SurfaceSize {
            width: u32::from(p.width()),
            height: u32::from(p.height()),
        })
    }

    /// Overwrite a surface with premultiplied RGBA8 texels.
    pub fn upload_rgba8(&mut self, surface: SurfaceHandle, data: &[u8]) -> HalationResult<()> {
        let p = self.surface_mut(surface)?;
        let dst = p.data_as_u8_slice_mut();
        if dst.len() != data.len() {
            return Err(HalationError::evaluation(
                "upload_rgba8 expects data matching width*height*4",
            ));
        }
        dst.copy_from_slice(data);
        Ok(())
    }

    fn surface(&self, surface: SurfaceHandle) -> HalationResult<&vello_cpu::Pixmap> {
        self.surfaces
            .get(surface.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| HalationError::evaluation(format!("unknown surface {surface:?}")))
    }

    fn surface_mut(&mut self, surface: SurfaceHandle) -> HalationResult<&mut vello_cpu::Pixmap> {
        self.surfaces
            .get_mut(surface.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| HalationError::evaluation(format!("unknown surface {surface:?}")))
    }

    fn target(&self) -> HalationResult<&vello_cpu::Pixmap> {
        match self.bound {
            None => Ok(&self.display),
            Some(s) => self.surface(s),
        }
    }

    fn target_mut(&mut self) -> HalationResult<&mut vello_cpu::Pixmap> {
        match self.bound {
            None => Ok(&mut self.display),
            Some(s) => self.surface_mut(s),
        }
    }

    fn program(&self, program: ProgramId) -> HalationResult<&ProgramDesc> {
        self.programs
            .get(program.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| HalationError::evaluation(format!("unknown program {program:?}")))
    }

    fn is_drawn(&self, obj: &SceneObject, camera: &Camera) -> bool {
        obj.visible && (!self.opts.caps.layer_masks || obj.layers.intersects(camera.layers))
    }

    fn require(&self, ok: bool, what: &str) -> HalationResult<()> {
        if ok {
            Ok(())
        } else {
            Err(HalationError::capability(format!(
                "cpu engine configured without {what}"
            )))
        }
    }
}

impl Engine for CpuEngine {
    fn caps(&self) -> EngineCaps {
        self.opts.caps
    }

    fn display_size(&self) -> SurfaceSize {
        SurfaceSize {
            width: u32::from(self.display.width()),
            height: u32::from(self.display.height()),
        }
    }

    fn resize_display(&mut self, size: SurfaceSize) -> HalationResult<()> {
        if size != self.display_size() {
            self.display = new_pixmap(size)?;
        }
        Ok(())
    }

    fn create_render_surface(&mut self, size: SurfaceSize) -> HalationResult<SurfaceHandle> {
        self.require(self.opts.caps.render_surfaces, "render surfaces")?;
        let id: u32 = self
            .surfaces
            .len()
            .try_into()
            .map_err(|_| HalationError::allocation("surface handle overflow"))?;
        self.surfaces.push(Some(new_pixmap(size)?));
        self.stats.surfaces_created += 1;
        self.stats.live_surfaces += 1;
        Ok(SurfaceHandle(id))
    }

    fn resize_render_surface(
        &mut self,
        surface: SurfaceHandle,
        size: SurfaceSize,
    ) -> HalationResult<()> {
        self.require(self.opts.caps.render_surfaces, "render surfaces")?;
        let p = self.surface_mut(surface)?;
        if u32::from(p.width()) != size.width || u32::from(p.height()) != size.height {
            *p = new_pixmap(size)?;
            self.stats.surfaces_resized += 1;
        }
        Ok(())
    }

    fn destroy_render_surface(&mut self, surface: SurfaceHandle) {
        if let Some(slot) = self.surfaces.get_mut(surface.0 as usize)
            && slot.take().is_some()
        {
            self.stats.surfaces_destroyed += 1;
            self.stats.live_surfaces = self.stats.live_surfaces.saturating_sub(1);
        }
        if self.bound == Some(surface) {
            self.bound = None;
        }
    }

    fn create_shader_program(&mut self, desc: &ProgramDesc) -> HalationResult<ProgramId> {
        self.require(self.opts.caps.shader_programs, "shader programs")?;
        if desc.fragment_source.trim().is_empty() {
            return Err(HalationError::validation(format!(
                "program '{}' has an empty fragment stage",
                desc.label
            )));
        }
        let id: u32 = self
            .programs
            .len()
            .try_into()
            .map_err(|_| HalationError::allocation("program id overflow"))?;
        self.programs.push(Some(desc.clone()));
        self.stats.programs_created += 1;
        Ok(ProgramId(id))
    }

    fn destroy_shader_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0 as usize)
            && slot.take().is_some()
        {
            self.stats.programs_destroyed += 1;
        }
    }

    fn bind_render_target(&mut self, target: Option<SurfaceHandle>) -> HalationResult<()> {
        if let Some(s) = target {
            self.require(self.opts.caps.render_target_binding, "render target binding")?;
            self.surface(s)?;
        }
        self.bound = target;
        Ok(())
    }

    fn clear(&mut self) -> HalationResult<()> {
        let clear = match self.bound {
            None => premul_rgba8(self.opts.clear_rgba),
            Some(_) => [0, 0, 0, 0],
        };
        for px in self.target_mut()?.data_as_u8_slice_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&clear);
        }
        self.log.push(DrawRecord {
            target: self.bound,
            kind: DrawKind::Clear,
        });
        Ok(())
    }

    fn draw(&mut self, scene: &Scene, camera: &Camera) -> HalationResult<()> {
        let (w, h) = {
            let t = self.target()?;
            (t.width(), t.height())
        };
        let light: f32 = scene
            .objects()
            .filter(|o| self.is_drawn(o, camera))
            .filter_map(|o| match o.kind {
                ObjectKind::Light { intensity } => Some(intensity.max(0.0)),
                _ => None,
            })
            .sum();
        let sx = f64::from(w) / f64::from(camera.view.width.max(1));
        let sy = f64::from(h) / f64::from(camera.view.height.max(1));

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };
        ctx.reset();

        let mut meshes = 0usize;
        for obj in scene.objects() {
            if !self.is_drawn(obj, camera) {
                continue;
            }
            let ObjectKind::Mesh { rect, color, lit } = &obj.kind else {
                continue;
            };
            let mut c = color.to_array();
            if *lit {
                let k = light.min(1.0);
                for ch in &mut c[..3] {
                    *ch = unit_to_u8(u8_to_unit(*ch) * k);
                }
            }
            let [r, g, b, a] = unpremul_rgba8(c);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                rect.x0 * sx,
                rect.y0 * sy,
                rect.x1 * sx,
                rect.y1 * sy,
            ));
            meshes += 1;
        }

        if meshes > 0 {
            // `vello_cpu` renders into a fresh buffer; accumulate onto the target with premul-over.
            let mut tmp = vello_cpu::Pixmap::new(w, h);
            ctx.flush();
            ctx.render_to_pixmap(&mut tmp);
            premul_over_in_place(self.target_mut()?.data_as_u8_slice_mut(), tmp.data_as_u8_slice())?;
        }
        self.ctx = Some(ctx);

        self.stats.scene_draws += 1;
        self.log.push(DrawRecord {
            target: self.bound,
            kind: DrawKind::Scene { meshes },
        });
        Ok(())
    }

    fn draw_fullscreen(
        &mut self,
        program: ProgramId,
        uniforms: &PassUniforms,
        blend: PassBlend,
    ) -> HalationResult<()> {
        self.require(self.opts.caps.shader_programs, "shader programs")?;
        if self.bound.is_some_and(|b| b == uniforms.input || Some(b) == uniforms.aux) {
            return Err(HalationError::evaluation(
                "pass samples from its own render target",
            ));
        }

        let desc = self.program(program)?;
        let label = desc.label.clone();
        let kind = desc.kind.clone();
        let (ow, oh) = {
            let t = self.target()?;
            (u32::from(t.width()), u32::from(t.height()))
        };
        let input = Tex::of(self.surface(uniforms.input)?);
        let aux = match uniforms.aux {
            Some(a) => Some(Tex::of(self.surface(a)?)),
            None => None,
        };
        let out = run_pass(&kind, uniforms, input, aux, ow, oh)?;

        let dst = self.target_mut()?.data_as_u8_slice_mut();
        match blend {
            PassBlend::Replace => dst.copy_from_slice(&out),
            PassBlend::Over => premul_over_in_place(dst, &out)?,
        }

        self.stats.pass_draws += 1;
        self.log.push(DrawRecord {
            target: self.bound,
            kind: DrawKind::Pass { label, blend },
        });
        Ok(())
    }
}

fn new_pixmap(size: SurfaceSize) -> HalationResult<vello_cpu::Pixmap> {
    let w: u16 = size
        .width
        .try_into()
        .map_err(|_| HalationError::allocation(format!("surface width exceeds u16: {}", size.width)))?;
    let h: u16 = size.height.try_into().map_err(|_| {
        HalationError::allocation(format!("surface height exceeds u16: {}", size.height))
    })?;
    if w == 0 || h == 0 {
        return Err(HalationError::allocation("surface size must be non-zero"));
    }
    Ok(vello_cpu::Pixmap::new(w, h))
}

fn pixmap_frame(p: &vello_cpu::Pixmap) -> FrameRGBA {
    FrameRGBA {
        width: u32::from(p.width()),
        height: u32::from(p.height()),
        data: p.data_as_u8_slice().to_vec(),
        premultiplied: true,
    }
}

/// Read-only texture view with GPU-style sampling (texel centers at `(i + 0.5) / size`,
/// clamp-to-edge, bilinear).
#[derive(Clone, Copy)]
struct Tex<'a> {
    data: &'a [u8],
    w: u32,
    h: u32,
}

impl<'a> Tex<'a> {
    fn of(p: &'a vello_cpu::Pixmap) -> Self {
        Self {
            data: p.data_as_u8_slice(),
            w: u32::from(p.width()),
            h: u32::from(p.height()),
        }
    }

    fn fetch(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, i64::from(self.w) - 1) as usize;
        let y = y.clamp(0, i64::from(self.h) - 1) as usize;
        let idx = (y * self.w as usize + x) * 4;
        let px = &self.data[idx..idx + 4];
        [
            u8_to_unit(px[0]),
            u8_to_unit(px[1]),
            u8_to_unit(px[2]),
            u8_to_unit(px[3]),
        ]
    }

    fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        let px = uv[0] * self.w as f32 - 0.5;
        let py = uv[1] * self.h as f32 - 0.5;
        let x0 = px.floor();
        let y0 = py.floor();
        let fx = px - x0;
        let fy = py - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.fetch(x0, y0);
        let b = self.fetch(x0 + 1, y0);
        let c = self.fetch(x0, y0 + 1);
        let d = self.fetch(x0 + 1, y0 + 1);
        let mut out = [0.0f32; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * fx;
            let bottom = c[i] + (d[i] - c[i]) * fx;
            out[i] = top + (bottom - top) * fy;
        }
        out
    }
}

fn run_pass(
    kind: &ProgramKind,
    u: &PassUniforms,
    input: Tex<'_>,
    aux: Option<Tex<'_>>,
    out_w: u32,
    out_h: u32,
) -> HalationResult<Vec<u8>> {
    let mut out = vec![0u8; (out_w as usize) * (out_h as usize) * 4];
    let texel = u.texel_size;

    let shade: Box<dyn Fn([f32; 2]) -> [f32; 4] + '_> = match (kind, &u.params) {
        (ProgramKind::Copy, _) => Box::new(|uv| input.sample(uv)),
        (ProgramKind::Blur, PassParams::Blur { direction, radius }) => {
            let step = [
                direction[0] * texel[0] * radius,
                direction[1] * texel[1] * radius,
            ];
            Box::new(move |uv| {
                let mut acc = input.sample(uv).map(|c| c * BLUR_WEIGHTS[0]);
                for (i, w) in BLUR_WEIGHTS.iter().enumerate().skip(1) {
                    let o = [step[0] * i as f32, step[1] * i as f32];
                    let p = input.sample([uv[0] + o[0], uv[1] + o[1]]);
                    let n = input.sample([uv[0] - o[0], uv[1] - o[1]]);
                    for c in 0..4 {
                        acc[c] += (p[c] + n[c]) * w;
                    }
                }
                acc
            })
        }
        (ProgramKind::Pixelate, PassParams::Pixelate { pixel_size }) => {
            let cell = [pixel_size * texel[0], pixel_size * texel[1]];
            Box::new(move |uv| {
                let q = [
                    (uv[0] / cell[0]).floor() * cell[0] + cell[0] * 0.5,
                    (uv[1] / cell[1]).floor() * cell[1] + cell[1] * 0.5,
                ];
                input.sample(q)
            })
        }
        (ProgramKind::BloomExtract, PassParams::BloomExtract { threshold }) => {
            let threshold = *threshold;
            Box::new(move |uv| {
                let px = input.sample(uv);
                let s = unpremul(px);
                if s[0].max(s[1]).max(s[2]) > threshold {
                    px
                } else {
                    [0.0; 4]
                }
            })
        }
        (ProgramKind::BloomComposite, PassParams::BloomComposite { intensity }) => {
            let Some(bloom) = aux else {
                return Err(HalationError::evaluation(
                    "bloom composite requires an aux texture",
                ));
            };
            let intensity = *intensity;
            Box::new(move |uv| {
                let base = input.sample(uv);
                let glow = bloom.sample(uv);
                [
                    base[0] + glow[0] * intensity,
                    base[1] + glow[1] * intensity,
                    base[2] + glow[2] * intensity,
                    base[3],
                ]
            })
        }
        (ProgramKind::ColorGrade, PassParams::ColorGrade { mode, amount }) => {
            let (mode, amount) = (*mode, *amount);
            let hue = hue_rotation(amount);
            Box::new(move |uv| {
                let s = unpremul(input.sample(uv));
                let rgb = grade([s[0], s[1], s[2]], mode, amount, &hue);
                premul([rgb[0], rgb[1], rgb[2], s[3]])
            })
        }
        (ProgramKind::Custom { cpu_kernel, .. }, PassParams::Custom(uniforms)) => match cpu_kernel
        {
            Some(k) => {
                let k = *k;
                Box::new(move |uv| premul(k(unpremul(input.sample(uv)), uv, uniforms)))
            }
            None => Box::new(|uv| input.sample(uv)),
        },
        (kind, params) => {
            return Err(HalationError::evaluation(format!(
                "program {kind:?} cannot take params {params:?}"
            )));
        }
    };

    for y in 0..out_h {
        for x in 0..out_w {
            let uv = [
                (x as f32 + 0.5) / out_w as f32,
                (y as f32 + 0.5) / out_h as f32,
            ];
            let px = shade(uv);
            let idx = ((y as usize) * (out_w as usize) + (x as usize)) * 4;
            for c in 0..4 {
                out[idx + c] = unit_to_u8(px[c]);
            }
        }
    }
    Ok(out)
}

fn grade(rgb: [f32; 3], mode: ColorMode, amount: f32, hue: &[[f32; 3]; 3]) -> [f32; 3] {
    let out = match mode {
        ColorMode::Brightness => rgb.map(|c| c * amount),
        ColorMode::Contrast => rgb.map(|c| (c - 0.5) * amount + 0.5),
        ColorMode::Saturate => {
            let l = luma(rgb);
            mix3([l; 3], rgb, amount)
        }
        ColorMode::Grayscale => mix3(rgb, [luma(rgb); 3], amount),
        ColorMode::Sepia => mix3(rgb, mat3_mul(&SEPIA, rgb), amount),
        ColorMode::Invert => mix3(rgb, rgb.map(|c| 1.0 - c), amount),
        ColorMode::HueRotate => mat3_mul(hue, rgb),
    };
    out.map(|c| c.clamp(0.0, 1.0))
}

fn unpremul(px: [f32; 4]) -> [f32; 4] {
    let a = px[3];
    if a <= 0.0 {
        return [0.0; 4];
    }
    [
        (px[0] / a).min(1.0),
        (px[1] / a).min(1.0),
        (px[2] / a).min(1.0),
        a,
    ]
}

fn premul(px: [f32; 4]) -> [f32; 4] {
    let a = px[3].clamp(0.0, 1.0);
    [px[0] * a, px[1] * a, px[2] * a, a]
}

fn premul_rgba8(rgba: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = rgba;
    let a16 = u16::from(a);
    let premul = |c: u8| -> u8 { (((u16::from(c) * a16) + 127) / 255) as u8 };
    [premul(r), premul(g), premul(b), a]
}

fn unpremul_rgba8(rgba: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = rgba;
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let a16 = u16::from(a);
    let un = |c: u8| -> u8 { ((u16::from(c) * 255 + a16 / 2) / a16).min(255) as u8 };
    [un(r), un(g), un(b), a]
}

fn premul_over_in_place(dst: &mut [u8], src: &[u8]) -> HalationResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(HalationError::evaluation(
            "premul_over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let inv = 255 - u16::from(s[3]);
        for i in 0..4 {
            let dc = ((u16::from(d[i]) * inv) + 127) / 255;
            d[i] = (u16::from(s[i]) + dc).min(255) as u8;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/engine/cpu.rs"]
mod tests;
