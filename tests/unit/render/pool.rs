use super::*;
use crate::engine::cpu::{CpuEngine, CpuEngineOpts};

fn size(w: u32, h: u32) -> SurfaceSize {
    SurfaceSize::new(w, h).unwrap()
}

fn engine() -> CpuEngine {
    CpuEngine::new(size(16, 16), CpuEngineOpts::default()).unwrap()
}

#[test]
fn acquire_returns_distinct_surfaces() {
    let mut e = engine();
    let mut pool = RenderTargetPool::new(PoolOpts::default());

    let a = pool.acquire(&mut e, size(8, 8)).unwrap();
    let b = pool.acquire(&mut e, size(8, 8)).unwrap();
    assert_ne!(a.handle(), b.handle());

    let st = pool.stats();
    assert_eq!(st.allocations, 2);
    assert_eq!(st.leased_surfaces, 2);
    assert_eq!(st.free_surfaces, 0);
}

#[test]
fn released_surface_is_reused_without_allocation() {
    let mut e = engine();
    let mut pool = RenderTargetPool::new(PoolOpts::default());

    let a = pool.acquire(&mut e, size(8, 8)).unwrap();
    let handle = a.handle();
    pool.release(a);
    assert_eq!(pool.free_count(), 1);

    let b = pool.acquire(&mut e, size(8, 8)).unwrap();
    assert_eq!(b.handle(), handle);
    assert_eq!(pool.stats().allocations, 1);
    assert_eq!(pool.stats().reuses, 1);
    assert_eq!(e.stats().surfaces_created, 1);
}

#[test]
fn reuse_resizes_in_place() {
    let mut e = engine();
    let mut pool = RenderTargetPool::new(PoolOpts::default());

    let a = pool.acquire(&mut e, size(8, 8)).unwrap();
    let handle = a.handle();
    pool.release(a);

    let b = pool.acquire(&mut e, size(6, 6)).unwrap();
    assert_eq!(b.handle(), handle);
    assert_eq!(b.size(), size(6, 6));
    assert_eq!(e.surface_size(handle).unwrap(), size(6, 6));
    assert_eq!(pool.stats().resizes, 1);
}

#[test]
fn acquire_prefers_matching_size() {
    let mut e = engine();
    let mut pool = RenderTargetPool::new(PoolOpts::default());

    let small = pool.acquire(&mut e, size(4, 4)).unwrap();
    let big = pool.acquire(&mut e, size(8, 8)).unwrap();
    let small_handle = small.handle();
    pool.release(small);
    pool.release(big);

    let s = pool.acquire(&mut e, size(4, 4)).unwrap();
    assert_eq!(s.handle(), small_handle);
    assert_eq!(pool.stats().resizes, 0);
}

#[test]
fn trim_destroys_beyond_cap() {
    let mut e = engine();
    let mut pool = RenderTargetPool::new(PoolOpts::default().with_max_free_surfaces(1));

    let a = pool.acquire(&mut e, size(4, 4)).unwrap();
    let b = pool.acquire(&mut e, size(4, 4)).unwrap();
    pool.release(a);
    pool.release(b);

    assert_eq!(pool.trim(&mut e), 1);
    assert_eq!(pool.free_count(), 1);
    assert_eq!(e.stats().live_surfaces, 1);
}

#[test]
fn dispose_destroys_free_surfaces() {
    let mut e = engine();
    let mut pool = RenderTargetPool::new(PoolOpts::default());

    let a = pool.acquire(&mut e, size(4, 4)).unwrap();
    let b = pool.acquire(&mut e, size(4, 4)).unwrap();
    pool.release(a);
    pool.release(b);
    pool.dispose(&mut e);

    assert_eq!(pool.free_count(), 0);
    assert_eq!(e.stats().surfaces_destroyed, 2);
    assert_eq!(e.stats().live_surfaces, 0);
}

#[test]
fn acquire_fails_without_surface_capability() {
    let caps = crate::engine::caps::EngineCaps {
        render_surfaces: false,
        ..crate::engine::caps::EngineCaps::FULL
    };
    let mut e = CpuEngine::new(size(4, 4), CpuEngineOpts::default().with_caps(caps)).unwrap();
    let mut pool = RenderTargetPool::new(PoolOpts::default());

    let err = pool.acquire(&mut e, size(4, 4)).unwrap_err();
    assert!(err.to_string().starts_with("capability missing:"));
}
