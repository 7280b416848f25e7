use crate::effects::effect::{Effect, EffectChain};
use crate::engine::backend::Engine;
use crate::foundation::core::SurfaceSize;
use crate::foundation::error::{HalationError, HalationResult};
use crate::render::passes::{HORIZONTAL, PassLibrary, VERTICAL};
use crate::render::pool::{PoolOpts, PoolStats, RenderSurface, RenderTargetPool};

pub const MIN_QUALITY_SCALE: f32 = 0.75;
pub const MAX_QUALITY_SCALE: f32 = 1.0;

/// Device pixels of blur amount per tap step at full quality.
pub const BLUR_PIXELS_PER_STEP: f32 = 2.0;

/// Tap spacing of the blur inside a bloom, in texels at full quality.
pub const BLOOM_BLUR_RADIUS: f32 = 3.0;

/// Threads effect chains through the pass library using pooled surfaces.
///
/// Surfaces are sized `round(base * scale)`; changing the scale never touches surfaces already
/// handed out, they are resized lazily on their next lease.
pub struct FilterPipeline {
    base: SurfaceSize,
    scale: f32,
    pool: RenderTargetPool,
    passes: PassLibrary,
}

impl FilterPipeline {
    /// Compile the built-in programs. Fails with `CapabilityMissing` when the engine cannot host
    /// the filtered path at all.
    #[tracing::instrument(skip(engine, pool_opts))]
    pub fn new<E: Engine + ?Sized>(
        engine: &mut E,
        base: SurfaceSize,
        pool_opts: PoolOpts,
    ) -> HalationResult<Self> {
        let caps = engine.caps();
        if !caps.supports_filtering() {
            return Err(HalationError::capability(format!(
                "engine lacks {}",
                caps.missing_for_filtering().join(", ")
            )));
        }
        let passes = PassLibrary::new(engine)?;
        Ok(Self {
            base,
            scale: MAX_QUALITY_SCALE,
            pool: RenderTargetPool::new(pool_opts),
            passes,
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Clamp into `[MIN_QUALITY_SCALE, MAX_QUALITY_SCALE]`. Returns whether the scale changed.
    pub fn set_scale(&mut self, scale: f32) -> bool {
        let s = if scale.is_finite() {
            scale.clamp(MIN_QUALITY_SCALE, MAX_QUALITY_SCALE)
        } else {
            MAX_QUALITY_SCALE
        };
        if s == self.scale {
            return false;
        }
        self.scale = s;
        true
    }

    /// Size every acquired surface currently gets.
    pub fn target_size(&self) -> SurfaceSize {
        self.base.scaled(self.scale)
    }

    pub fn resize(&mut self, base: SurfaceSize) {
        self.base = base;
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn pool_mut(&mut self) -> &mut RenderTargetPool {
        &mut self.pool
    }

    /// Full-screen draws issued through this pipeline so far.
    pub fn passes_run(&self) -> u64 {
        self.passes.passes_run()
    }

    /// Distinct unknown or uncompilable custom filter names reported so far.
    pub fn warned_custom_filters(&self) -> usize {
        self.passes.warned_count()
    }

    pub fn acquire_target<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
    ) -> HalationResult<RenderSurface> {
        let size = self.target_size();
        self.pool.acquire(engine, size)
    }

    pub fn release_target(&mut self, surface: RenderSurface) {
        self.pool.release(surface);
    }

    /// Blend `surface` over the display framebuffer.
    pub fn render_to_screen<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        surface: &RenderSurface,
    ) -> HalationResult<()> {
        self.passes.copy(engine, surface, None)
    }

    /// Run `chain` over `input`, left to right.
    ///
    /// Returns `None` when no effect produced a pass; the caller keeps using `input`, which this
    /// never releases. Intermediates are released as soon as the next stage has consumed them. On
    /// error, every surface leased here is returned to the pool before propagating.
    pub fn apply_filters<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        input: &RenderSurface,
        chain: &EffectChain,
        quality_scale: f32,
    ) -> HalationResult<Option<RenderSurface>> {
        let mut current: Option<RenderSurface> = None;
        for effect in chain.active() {
            let src = current.as_ref().unwrap_or(input);
            match self.apply_one(engine, src, effect, quality_scale) {
                Ok(Some(next)) => {
                    if let Some(prev) = current.replace(next) {
                        self.pool.release(prev);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    if let Some(prev) = current.take() {
                        self.pool.release(prev);
                    }
                    return Err(err);
                }
            }
        }
        Ok(current)
    }

    fn apply_one<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        src: &RenderSurface,
        effect: &Effect,
        scale: f32,
    ) -> HalationResult<Option<RenderSurface>> {
        if let Some((mode, amount)) = effect.color_grade() {
            let out = self.acquire_target(engine)?;
            let res = self.passes.color_grade(engine, src, &out, mode, amount);
            return self.finish(res, out).map(Some);
        }

        match effect {
            Effect::Blur { amount } => {
                let radius = amount * scale / BLUR_PIXELS_PER_STEP;
                self.blur_2d(engine, src, radius).map(Some)
            }
            Effect::Pixelate { size } => {
                let out = self.acquire_target(engine)?;
                let res = self.passes.pixelate(engine, src, &out, size * scale);
                self.finish(res, out).map(Some)
            }
            Effect::Bloom {
                intensity,
                threshold,
            } => self.bloom(engine, src, *intensity, *threshold, scale).map(Some),
            Effect::Custom { name, uniforms } => {
                let Some(pass) = self.passes.custom_pass(engine, name) else {
                    return Ok(None);
                };
                let out = self.acquire_target(engine)?;
                let res = self.passes.custom(engine, &pass, uniforms, src, &out);
                self.finish(res, out).map(Some)
            }
            // Color effects were handled above.
            _ => Ok(None),
        }
    }

    /// Horizontal then vertical pass; the horizontal intermediate is released.
    fn blur_2d<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        src: &RenderSurface,
        radius: f32,
    ) -> HalationResult<RenderSurface> {
        let h = self.acquire_target(engine)?;
        let res = self.passes.blur_1d(engine, src, &h, HORIZONTAL, radius);
        let h = self.finish(res, h)?;

        let v = match self.acquire_target(engine) {
            Ok(v) => v,
            Err(err) => {
                self.pool.release(h);
                return Err(err);
            }
        };
        let res = self.passes.blur_1d(engine, &h, &v, VERTICAL, radius);
        self.pool.release(h);
        self.finish(res, v)
    }

    /// extract -> blur (2 passes) -> composite over `src`.
    fn bloom<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        src: &RenderSurface,
        intensity: f32,
        threshold: f32,
        scale: f32,
    ) -> HalationResult<RenderSurface> {
        let bright = self.acquire_target(engine)?;
        let res = self.passes.bloom_extract(engine, src, &bright, threshold);
        let bright = self.finish(res, bright)?;

        let blurred = self.blur_2d(engine, &bright, BLOOM_BLUR_RADIUS * scale);
        self.pool.release(bright);
        let blurred = blurred?;

        let out = match self.acquire_target(engine) {
            Ok(out) => out,
            Err(err) => {
                self.pool.release(blurred);
                return Err(err);
            }
        };
        let res = self
            .passes
            .bloom_composite(engine, src, &blurred, &out, intensity);
        self.pool.release(blurred);
        self.finish(res, out)
    }

    /// Hand `out` back on success, release it on failure.
    fn finish(
        &mut self,
        res: HalationResult<()>,
        out: RenderSurface,
    ) -> HalationResult<RenderSurface> {
        match res {
            Ok(()) => Ok(out),
            Err(err) => {
                self.pool.release(out);
                Err(err)
            }
        }
    }

    /// Destroy pooled surfaces and every program, custom ones included.
    pub fn dispose<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        self.pool.dispose(engine);
        self.passes.dispose(engine);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/pipeline.rs"]
mod tests;
