use std::collections::HashSet;
use std::time::Instant;

use crate::engine::backend::Engine;
use crate::foundation::core::{FrameId, SurfaceSize};
use crate::foundation::error::{HalationError, HalationResult};
use crate::render::cache::{CacheEntry, FilterCache};
use crate::render::pipeline::{FilterPipeline, MAX_QUALITY_SCALE};
use crate::render::pool::{PoolOpts, RenderSurface};
use crate::render::quality::QualityController;
use crate::scene::model::{Camera, FilterTarget, LayerMask, ObjectId, Scene};

/// Render layer reserved for isolating one filtered subtree at a time.
pub const FILTER_LAYER: u8 = 31;

#[derive(Debug, Clone, Copy)]
pub struct RendererOpts {
    pub(crate) adaptive_quality: bool,
    pub(crate) pool: PoolOpts,
}

impl Default for RendererOpts {
    fn default() -> Self {
        Self {
            adaptive_quality: true,
            pool: PoolOpts::default(),
        }
    }
}

impl RendererOpts {
    /// When disabled, filter work always runs at full resolution.
    pub fn with_adaptive_quality(mut self, on: bool) -> Self {
        self.adaptive_quality = on;
        self
    }

    pub fn with_pool_opts(mut self, pool: PoolOpts) -> Self {
        self.pool = pool;
        self
    }
}

/// Counters of the most recent `render` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Counter of filtered frames; direct-path frames do not advance it.
    pub frame: FrameId,
    /// Whether the frame went through the filtered path.
    pub filtered: bool,
    pub targets: usize,
    pub cache_hits: usize,
    pub isolated_renders: usize,
    /// Full-screen passes issued, screen blits included.
    pub passes: u64,
    pub evictions: usize,
    pub quality_scale: f32,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            frame: FrameId::default(),
            filtered: false,
            targets: 0,
            cache_hits: 0,
            isolated_renders: 0,
            passes: 0,
            evictions: 0,
            quality_scale: MAX_QUALITY_SCALE,
        }
    }
}

struct FilterState {
    pipeline: FilterPipeline,
    cache: FilterCache,
    quality: QualityController,
}

enum Filtering {
    Untried,
    Ready(Box<FilterState>),
    /// The engine cannot host the filtered path; every frame renders directly.
    Unsupported,
}

/// Per-frame orchestrator: renders the backdrop, then each filtered object in isolation through
/// its effect chain, compositing results onto the display and caching them across frames.
pub struct Renderer<E: Engine> {
    engine: E,
    opts: RendererOpts,
    filtering: Filtering,
    frame: FrameId,
    stats: FrameStats,
}

impl<E: Engine> Renderer<E> {
    pub fn new(engine: E, opts: RendererOpts) -> Self {
        Self {
            engine,
            opts,
            filtering: Filtering::Untried,
            frame: FrameId::default(),
            stats: FrameStats::default(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn quality_scale(&self) -> f32 {
        match &self.filtering {
            Filtering::Ready(state) => state.pipeline.scale(),
            _ => MAX_QUALITY_SCALE,
        }
    }

    /// `None` until the first frame with targets, or when the engine cannot filter.
    pub fn cache(&self) -> Option<&FilterCache> {
        match &self.filtering {
            Filtering::Ready(state) => Some(&state.cache),
            _ => None,
        }
    }

    pub fn pipeline(&self) -> Option<&FilterPipeline> {
        match &self.filtering {
            Filtering::Ready(state) => Some(&state.pipeline),
            _ => None,
        }
    }

    /// Whether the filtered path is known to be unavailable for this engine.
    pub fn is_fallback(&self) -> bool {
        matches!(self.filtering, Filtering::Unsupported)
    }

    pub fn render(
        &mut self,
        scene: &mut Scene,
        camera: &mut Camera,
        targets: &[FilterTarget],
    ) -> HalationResult<()> {
        self.render_at(scene, camera, targets, Instant::now())
    }

    /// [`Renderer::render`] with an explicit frame timestamp for the quality controller.
    ///
    /// Visibility flags and layer masks touched during isolation are restored before returning,
    /// on success and on error alike.
    #[tracing::instrument(skip_all, fields(targets = targets.len()))]
    pub fn render_at(
        &mut self,
        scene: &mut Scene,
        camera: &mut Camera,
        targets: &[FilterTarget],
        now: Instant,
    ) -> HalationResult<()> {
        if targets.is_empty() || !self.ensure_filtering() {
            self.render_direct(scene, camera)?;
            self.stats = FrameStats {
                frame: self.frame,
                targets: targets.len(),
                quality_scale: self.quality_scale(),
                ..FrameStats::default()
            };
            return Ok(());
        }
        let Filtering::Ready(state) = &mut self.filtering else {
            return Err(HalationError::evaluation("filter state missing after setup"));
        };
        let engine = &mut self.engine;
        let state = state.as_mut();

        self.frame = self.frame.next();
        let frame = self.frame;
        let passes_before = state.pipeline.passes_run();

        if self.opts.adaptive_quality
            && let Some(s) = state.quality.update(now, active_filter_count(scene, targets))
            && state.pipeline.set_scale(s)
        {
            let n = state.cache.invalidate_all(state.pipeline.pool_mut());
            tracing::debug!(scale = s, invalidated = n, "filter cache invalidated");
        }
        let scale = state.pipeline.scale();

        render_backdrop(engine, scene, camera, targets)?;

        let use_layers = engine.caps().layer_masks;
        let mut stats = FrameStats {
            frame,
            filtered: true,
            targets: targets.len(),
            quality_scale: scale,
            ..FrameStats::default()
        };

        for target in targets {
            if scene.get(target.object).is_none() {
                tracing::debug!(object = target.object.0, "filter target not in scene, skipping");
                continue;
            }

            if let Some(entry) = state.cache.lookup(target, scale, frame) {
                state.pipeline.render_to_screen(engine, &entry.surface)?;
                stats.cache_hits += 1;
                continue;
            }

            let result = render_target(engine, state, scene, camera, target, scale, use_layers)?;
            stats.isolated_renders += 1;
            if let Err(err) = state.pipeline.render_to_screen(engine, &result) {
                state.pipeline.release_target(result);
                return Err(err);
            }
            state.cache.set(
                target.object,
                CacheEntry {
                    surface: result,
                    effects_key: target.effects_key.clone(),
                    last_used: frame,
                    quality_scale: scale,
                },
                state.pipeline.pool_mut(),
            );
        }

        stats.evictions = state.cache.evict(frame, state.pipeline.pool_mut());
        if stats.evictions > 0 {
            tracing::debug!(evicted = stats.evictions, "filter cache eviction");
        }
        state.pipeline.pool_mut().trim(engine);

        stats.passes = state.pipeline.passes_run() - passes_before;
        self.stats = stats;
        Ok(())
    }

    /// Resize the display. Pooled surfaces follow lazily; cached results are dropped.
    pub fn resize(&mut self, width: u32, height: u32) -> HalationResult<()> {
        let size = SurfaceSize::new(width, height)?;
        self.engine.resize_display(size)?;
        if let Filtering::Ready(state) = &mut self.filtering {
            state.pipeline.resize(size);
            let n = state.cache.invalidate_all(state.pipeline.pool_mut());
            tracing::debug!(width, height, invalidated = n, "filter cache invalidated on resize");
        }
        Ok(())
    }

    /// Drop the cached result of a destroyed object. Returns whether one existed.
    pub fn forget_object(&mut self, id: ObjectId) -> bool {
        match &mut self.filtering {
            Filtering::Ready(state) => state.cache.remove(id, state.pipeline.pool_mut()),
            _ => false,
        }
    }

    /// Release every pooled surface and compiled program and hand the engine back.
    pub fn destroy(mut self) -> E {
        if let Filtering::Ready(state) = &mut self.filtering {
            state.cache.invalidate_all(state.pipeline.pool_mut());
            state.pipeline.dispose(&mut self.engine);
        }
        self.engine
    }

    /// Set up the filtered path on first use. Any setup failure disables it for the session.
    fn ensure_filtering(&mut self) -> bool {
        if matches!(self.filtering, Filtering::Untried) {
            let base = self.engine.display_size();
            match FilterPipeline::new(&mut self.engine, base, self.opts.pool) {
                Ok(pipeline) => {
                    self.filtering = Filtering::Ready(Box::new(FilterState {
                        pipeline,
                        cache: FilterCache::new(),
                        quality: QualityController::new(),
                    }));
                }
                Err(HalationError::CapabilityMissing(reason)) => {
                    tracing::debug!(%reason, "filtered path unavailable, rendering directly");
                    self.filtering = Filtering::Unsupported;
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "filter pipeline setup failed, rendering directly"
                    );
                    self.filtering = Filtering::Unsupported;
                }
            }
        }
        matches!(self.filtering, Filtering::Ready(_))
    }

    fn render_direct(&mut self, scene: &Scene, camera: &Camera) -> HalationResult<()> {
        self.engine.bind_render_target(None)?;
        self.engine.clear()?;
        self.engine.draw(scene, camera)
    }
}

/// Targets that resolve to a scene object and carry at least one effect that is not a no-op.
fn active_filter_count(scene: &Scene, targets: &[FilterTarget]) -> usize {
    targets
        .iter()
        .filter(|t| scene.get(t.object).is_some() && t.effects.active().next().is_some())
        .count()
}

/// Clear the display and draw everything outside the union of filtered subtrees.
fn render_backdrop<E: Engine>(
    engine: &mut E,
    scene: &mut Scene,
    camera: &Camera,
    targets: &[FilterTarget],
) -> HalationResult<()> {
    let union: HashSet<ObjectId> = targets
        .iter()
        .flat_map(|t| scene.subtree(t.object))
        .collect();
    let saved = hide(scene, |id, _| union.contains(&id));

    let res = engine
        .bind_render_target(None)
        .and_then(|()| engine.clear())
        .and_then(|()| engine.draw(scene, camera));
    restore_visibility(scene, &saved);
    res
}

/// Draw `target`'s subtree alone into a pooled surface and run its chain.
///
/// Returns the surface to composite; every other surface leased here is back in the pool.
fn render_target<E: Engine>(
    engine: &mut E,
    state: &mut FilterState,
    scene: &mut Scene,
    camera: &mut Camera,
    target: &FilterTarget,
    scale: f32,
    use_layers: bool,
) -> HalationResult<RenderSurface> {
    let surface = state.pipeline.acquire_target(engine)?;
    let subtree: HashSet<ObjectId> = scene.subtree(target.object).into_iter().collect();

    let isolation = Isolation::apply(scene, camera, &subtree, use_layers);
    let drawn = engine
        .bind_render_target(Some(surface.handle()))
        .and_then(|()| engine.clear())
        .and_then(|()| engine.draw(scene, camera));
    isolation.restore(scene, camera);
    if let Err(err) = drawn {
        state.pipeline.release_target(surface);
        return Err(err);
    }

    match state
        .pipeline
        .apply_filters(engine, &surface, &target.effects, scale)
    {
        Ok(Some(out)) => {
            state.pipeline.release_target(surface);
            Ok(out)
        }
        Ok(None) => Ok(surface),
        Err(err) => {
            state.pipeline.release_target(surface);
            Err(err)
        }
    }
}

/// Set `visible = false` on every object matching `pred`; returns the previous flags.
fn hide(scene: &mut Scene, pred: impl Fn(ObjectId, bool) -> bool) -> Vec<(ObjectId, bool)> {
    let mut saved = Vec::new();
    for obj in scene.objects_mut() {
        if pred(obj.id, obj.is_light()) {
            saved.push((obj.id, obj.visible));
            obj.visible = false;
        }
    }
    saved
}

fn restore_visibility(scene: &mut Scene, saved: &[(ObjectId, bool)]) {
    for &(id, visible) in saved {
        if let Some(obj) = scene.get_mut(id) {
            obj.visible = visible;
        }
    }
}

/// Scene and camera state changed to draw one subtree alone.
enum Isolation {
    /// Subtree moved to [`FILTER_LAYER`], lights opted into it, camera restricted to it.
    Layers {
        saved: Vec<(ObjectId, LayerMask)>,
        camera: LayerMask,
    },
    /// Everything outside the subtree hidden, lights excepted.
    Visibility { saved: Vec<(ObjectId, bool)> },
}

impl Isolation {
    fn apply(
        scene: &mut Scene,
        camera: &mut Camera,
        subtree: &HashSet<ObjectId>,
        use_layers: bool,
    ) -> Self {
        if !use_layers {
            let saved = hide(scene, |id, is_light| !is_light && !subtree.contains(&id));
            return Self::Visibility { saved };
        }

        let mut saved = Vec::new();
        for obj in scene.objects_mut() {
            if subtree.contains(&obj.id) {
                saved.push((obj.id, obj.layers));
                obj.layers = LayerMask::single(FILTER_LAYER);
            } else if obj.is_light() {
                saved.push((obj.id, obj.layers));
                obj.layers.enable(FILTER_LAYER);
            }
        }
        let prev = camera.layers;
        camera.layers = LayerMask::single(FILTER_LAYER);
        Self::Layers {
            saved,
            camera: prev,
        }
    }

    fn restore(self, scene: &mut Scene, camera: &mut Camera) {
        match self {
            Self::Layers { saved, camera: cam } => {
                for (id, layers) in saved {
                    if let Some(obj) = scene.get_mut(id) {
                        obj.layers = layers;
                    }
                }
                camera.layers = cam;
            }
            Self::Visibility { saved } => restore_visibility(scene, &saved),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
