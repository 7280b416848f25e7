use super::*;
use crate::effects::effect::{Effect, EffectChain};
use crate::engine::cpu::{CpuEngine, CpuEngineOpts};
use crate::foundation::core::SurfaceSize;
use crate::render::pool::PoolOpts;

struct Fixture {
    engine: CpuEngine,
    pool: RenderTargetPool,
}

impl Fixture {
    fn new() -> Self {
        let size = SurfaceSize::new(4, 4).unwrap();
        Self {
            engine: CpuEngine::new(size, CpuEngineOpts::default()).unwrap(),
            pool: RenderTargetPool::new(PoolOpts::default()),
        }
    }

    fn entry(&mut self, key: &str, frame: u64, scale: f32) -> CacheEntry {
        let size = SurfaceSize::new(4, 4).unwrap();
        CacheEntry {
            surface: self.pool.acquire(&mut self.engine, size).unwrap(),
            effects_key: key.to_string(),
            last_used: FrameId(frame),
            quality_scale: scale,
        }
    }
}

fn target(id: u32, key: &str) -> FilterTarget {
    FilterTarget::new(ObjectId(id), EffectChain::new().with(Effect::Blur { amount: 2.0 }))
        .with_key(key)
}

#[test]
fn reuse_requires_clean_matching_key_and_scale() {
    let mut f = Fixture::new();
    let e = f.entry("blur:2", 1, 1.0);

    assert!(e.is_reusable(&target(1, "blur:2"), 1.0));
    assert!(!e.is_reusable(&target(1, "blur:3"), 1.0));
    assert!(!e.is_reusable(&target(1, "blur:2").dirty(true), 1.0));
    assert!(!e.is_reusable(&target(1, "blur:2"), 0.75));
}

#[test]
fn lookup_touches_last_used() {
    let mut f = Fixture::new();
    let mut cache = FilterCache::new();
    let e = f.entry("k", 1, 1.0);
    cache.set(ObjectId(1), e, &mut f.pool);

    let hit = cache.lookup(&target(1, "k"), 1.0, FrameId(5)).unwrap();
    assert_eq!(hit.last_used, FrameId(5));
    assert!(cache.lookup(&target(1, "other"), 1.0, FrameId(6)).is_none());
    assert_eq!(cache.get(ObjectId(1)).unwrap().last_used, FrameId(5));
    assert!(cache.lookup(&target(2, "k"), 1.0, FrameId(6)).is_none());
}

#[test]
fn overwrite_releases_previous_surface_once() {
    let mut f = Fixture::new();
    let mut cache = FilterCache::new();
    let first = f.entry("a", 1, 1.0);
    let first_handle = first.surface.handle();
    cache.set(ObjectId(7), first, &mut f.pool);
    let second = f.entry("b", 2, 1.0);
    cache.set(ObjectId(7), second, &mut f.pool);

    assert_eq!(cache.len(), 1);
    assert_eq!(f.pool.free_count(), 1);
    assert_eq!(f.pool.stats().releases, 1);
    let reused = f
        .pool
        .acquire(&mut f.engine, SurfaceSize::new(4, 4).unwrap())
        .unwrap();
    assert_eq!(reused.handle(), first_handle);
}

#[test]
fn evict_drops_entries_past_horizon() {
    let mut f = Fixture::new();
    let mut cache = FilterCache::new();
    let old = f.entry("a", 1, 1.0);
    let fresh = f.entry("b", 100, 1.0);
    cache.set(ObjectId(1), old, &mut f.pool);
    cache.set(ObjectId(2), fresh, &mut f.pool);

    assert_eq!(cache.evict(FrameId(1 + CACHE_EVICTION_FRAMES), &mut f.pool), 0);
    assert_eq!(cache.evict(FrameId(2 + CACHE_EVICTION_FRAMES), &mut f.pool), 1);
    assert!(!cache.contains(ObjectId(1)));
    assert!(cache.contains(ObjectId(2)));
    assert_eq!(f.pool.free_count(), 1);
}

#[test]
fn invalidate_all_routes_through_pool() {
    let mut f = Fixture::new();
    let mut cache = FilterCache::new();
    for id in 0..3 {
        let e = f.entry("k", 1, 1.0);
        cache.set(ObjectId(id), e, &mut f.pool);
    }

    assert_eq!(cache.invalidate_all(&mut f.pool), 3);
    assert!(cache.is_empty());
    assert_eq!(f.pool.free_count(), 3);
    assert_eq!(f.engine.stats().surfaces_destroyed, 0);
}

#[test]
fn remove_is_explicit_and_single() {
    let mut f = Fixture::new();
    let mut cache = FilterCache::new();
    let e = f.entry("k", 1, 1.0);
    cache.set(ObjectId(3), e, &mut f.pool);

    assert!(cache.remove(ObjectId(3), &mut f.pool));
    assert!(!cache.remove(ObjectId(3), &mut f.pool));
    assert_eq!(f.pool.stats().releases, 1);
}
