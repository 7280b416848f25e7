use std::collections::HashMap;

use crate::foundation::core::FrameId;
use crate::render::pool::{RenderSurface, RenderTargetPool};
use crate::scene::model::{FilterTarget, ObjectId};

/// Entries untouched for more than this many frames are evicted.
pub const CACHE_EVICTION_FRAMES: u64 = 120;

/// Last composited result of one filtered object.
#[derive(Debug)]
pub struct CacheEntry {
    pub surface: RenderSurface,
    pub effects_key: String,
    pub last_used: FrameId,
    pub quality_scale: f32,
}

impl CacheEntry {
    /// Reusable iff the object is clean, the chain signature matches and the scale is unchanged.
    pub fn is_reusable(&self, target: &FilterTarget, quality_scale: f32) -> bool {
        !target.dirty
            && self.effects_key == target.effects_key
            && self.quality_scale == quality_scale
    }
}

/// Per-object memo of filtered surfaces. Surfaces always go back through the pool.
#[derive(Debug, Default)]
pub struct FilterCache {
    entries: HashMap<ObjectId, CacheEntry>,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&CacheEntry> {
        self.entries.get(&id)
    }

    /// The entry for `target` if it can be reused this frame, marked as used at `frame`.
    pub fn lookup(
        &mut self,
        target: &FilterTarget,
        quality_scale: f32,
        frame: FrameId,
    ) -> Option<&CacheEntry> {
        let entry = self.entries.get_mut(&target.object)?;
        if !entry.is_reusable(target, quality_scale) {
            return None;
        }
        entry.last_used = frame;
        Some(entry)
    }

    /// Insert or overwrite, releasing the surface previously cached for `id`.
    pub fn set(&mut self, id: ObjectId, entry: CacheEntry, pool: &mut RenderTargetPool) {
        if let Some(old) = self.entries.insert(id, entry) {
            pool.release(old.surface);
        }
    }

    pub fn remove(&mut self, id: ObjectId, pool: &mut RenderTargetPool) -> bool {
        match self.entries.remove(&id) {
            Some(old) => {
                pool.release(old.surface);
                true
            }
            None => false,
        }
    }

    /// Drop entries last used more than [`CACHE_EVICTION_FRAMES`] before `now`. Returns how many
    /// were dropped.
    pub fn evict(&mut self, now: FrameId, pool: &mut RenderTargetPool) -> usize {
        let stale: Vec<ObjectId> = self
            .entries
            .iter()
            .filter(|(_, e)| now.since(e.last_used) > CACHE_EVICTION_FRAMES)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            self.remove(*id, pool);
        }
        stale.len()
    }

    /// Release and clear every entry.
    pub fn invalidate_all(&mut self, pool: &mut RenderTargetPool) -> usize {
        let n = self.entries.len();
        for (_, e) in self.entries.drain() {
            pool.release(e.surface);
        }
        n
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cache.rs"]
mod tests;
