use crate::engine::backend::{Engine, SurfaceHandle};
use crate::foundation::core::SurfaceSize;
use crate::foundation::error::HalationResult;

/// Pool configuration for leased render surfaces.
#[derive(Debug, Clone, Copy)]
pub struct PoolOpts {
    /// Free surfaces kept beyond this count are destroyed by [`RenderTargetPool::trim`].
    pub max_free_surfaces: usize,
}

impl Default for PoolOpts {
    fn default() -> Self {
        Self {
            max_free_surfaces: 32,
        }
    }
}

impl PoolOpts {
    pub fn with_max_free_surfaces(mut self, n: usize) -> Self {
        self.max_free_surfaces = n;
        self
    }
}

/// An engine-owned offscreen color target leased from a [`RenderTargetPool`].
///
/// Deliberately not `Clone`: giving it back moves it, so a surface cannot be released twice.
#[derive(Debug, PartialEq, Eq)]
pub struct RenderSurface {
    handle: SurfaceHandle,
    size: SurfaceSize,
}

impl RenderSurface {
    pub fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Surfaces sitting in the free list right now.
    pub free_surfaces: usize,
    /// Surfaces currently handed out.
    pub leased_surfaces: usize,
    pub allocations: u64,
    pub reuses: u64,
    pub resizes: u64,
    pub releases: u64,
    pub destroyed: u64,
}

/// Leases and recycles offscreen render surfaces; owns their destruction.
///
/// Released surfaces keep their engine resources and are resized in place on the next lease
/// when the requested size differs.
pub struct RenderTargetPool {
    opts: PoolOpts,
    free: Vec<RenderSurface>,
    stats: PoolStats,
}

impl RenderTargetPool {
    pub fn new(opts: PoolOpts) -> Self {
        Self {
            opts,
            free: Vec::new(),
            stats: PoolStats::default(),
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            free_surfaces: self.free.len(),
            ..self.stats
        }
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// A released surface resized to `size`, or a fresh one.
    pub fn acquire<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        size: SurfaceSize,
    ) -> HalationResult<RenderSurface> {
        // Prefer an exact size match so steady-state frames never resize.
        let idx = self
            .free
            .iter()
            .rposition(|s| s.size == size)
            .or_else(|| self.free.len().checked_sub(1));

        let surface = match idx {
            Some(i) => {
                let mut s = self.free.swap_remove(i);
                if s.size != size {
                    if let Err(e) = engine.resize_render_surface(s.handle, size) {
                        self.free.push(s);
                        return Err(e);
                    }
                    s.size = size;
                    self.stats.resizes += 1;
                }
                self.stats.reuses += 1;
                s
            }
            None => {
                let handle = engine.create_render_surface(size)?;
                self.stats.allocations += 1;
                RenderSurface { handle, size }
            }
        };
        self.stats.leased_surfaces += 1;
        Ok(surface)
    }

    /// Return a leased surface to the free list. Engine resources stay alive.
    pub fn release(&mut self, surface: RenderSurface) {
        self.stats.releases += 1;
        self.stats.leased_surfaces = self.stats.leased_surfaces.saturating_sub(1);
        self.free.push(surface);
    }

    /// Destroy free surfaces beyond the retention cap. Returns how many were destroyed.
    pub fn trim<E: Engine + ?Sized>(&mut self, engine: &mut E) -> usize {
        let mut n = 0;
        while self.free.len() > self.opts.max_free_surfaces {
            let Some(s) = self.free.pop() else {
                break;
            };
            engine.destroy_render_surface(s.handle);
            self.stats.destroyed += 1;
            n += 1;
        }
        n
    }

    /// Destroy every free surface. Leased surfaces must be released first to be reclaimed.
    pub fn dispose<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        for s in self.free.drain(..) {
            engine.destroy_render_surface(s.handle);
            self.stats.destroyed += 1;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/pool.rs"]
mod tests;
