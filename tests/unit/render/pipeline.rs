use super::*;
use crate::effects::effect::UniformMap;
use crate::engine::caps::EngineCaps;
use crate::engine::cpu::{CpuEngine, CpuEngineOpts};
use crate::render::passes::labels;

fn size(w: u32, h: u32) -> SurfaceSize {
    SurfaceSize::new(w, h).unwrap()
}

fn setup(w: u32, h: u32) -> (CpuEngine, FilterPipeline) {
    let mut e = CpuEngine::new(size(w, h), CpuEngineOpts::default()).unwrap();
    let p = FilterPipeline::new(&mut e, size(w, h), PoolOpts::default()).unwrap();
    (e, p)
}

/// Opaque red on the left half, opaque white on the right half.
fn red_white(w: u32, h: u32) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..h {
        for x in 0..w {
            if x < w / 2 {
                out.extend_from_slice(&[255, 0, 0, 255]);
            } else {
                out.extend_from_slice(&[255, 255, 255, 255]);
            }
        }
    }
    out
}

#[test]
fn construction_requires_filtering_caps() {
    let caps = EngineCaps {
        shader_programs: false,
        ..EngineCaps::FULL
    };
    let mut e = CpuEngine::new(size(4, 4), CpuEngineOpts::default().with_caps(caps)).unwrap();
    let err = FilterPipeline::new(&mut e, size(4, 4), PoolOpts::default())
        .err()
        .unwrap();
    assert!(err.to_string().contains("shader programs"));
    assert_eq!(e.stats().programs_created, 0);
}

#[test]
fn set_scale_clamps_and_is_idempotent() {
    let (_, mut p) = setup(8, 8);
    assert_eq!(p.scale(), 1.0);
    assert!(p.set_scale(0.5));
    assert_eq!(p.scale(), MIN_QUALITY_SCALE);
    assert!(!p.set_scale(0.75));
    assert!(p.set_scale(3.0));
    assert_eq!(p.scale(), MAX_QUALITY_SCALE);
    assert!(!p.set_scale(f32::NAN));
}

#[test]
fn scale_changes_resize_lazily_on_acquire() {
    let (mut e, mut p) = setup(8, 8);
    let a = p.acquire_target(&mut e).unwrap();
    assert_eq!(a.size(), size(8, 8));
    p.release_target(a);

    p.set_scale(0.75);
    assert_eq!(p.pool_stats().resizes, 0);
    let b = p.acquire_target(&mut e).unwrap();
    assert_eq!(b.size(), size(6, 6));
    assert_eq!(p.pool_stats().resizes, 1);
}

#[test]
fn noop_chain_is_identity_without_passes() {
    let (mut e, mut p) = setup(4, 4);
    let input = p.acquire_target(&mut e).unwrap();
    let chain: EffectChain = vec![
        Effect::Blur { amount: 0.0001 },
        Effect::Pixelate { size: 0.5 },
        Effect::Bloom {
            intensity: 0.6,
            threshold: 0.99,
        },
        Effect::Bloom {
            intensity: 0.0,
            threshold: 0.5,
        },
        Effect::Brightness { amount: 1.0 },
        Effect::Grayscale { amount: 0.0 },
    ]
    .into();

    let out = p.apply_filters(&mut e, &input, &chain, 1.0).unwrap();
    assert!(out.is_none());
    assert_eq!(p.passes_run(), 0);
    assert_eq!(p.pool_stats().allocations, 1);
}

#[test]
fn blur_runs_two_passes_and_releases_intermediate() {
    let (mut e, mut p) = setup(4, 4);
    let input = p.acquire_target(&mut e).unwrap();
    let chain = EffectChain::new().with(Effect::Blur { amount: 4.0 });

    let out = p.apply_filters(&mut e, &input, &chain, 1.0).unwrap().unwrap();
    assert_ne!(out.handle(), input.handle());
    assert_eq!(e.pass_count(labels::BLUR), 2);

    let st = p.pool_stats();
    assert_eq!(st.leased_surfaces, 2);
    assert_eq!(st.free_surfaces, 1);
}

#[test]
fn bloom_topology() {
    let (mut e, mut p) = setup(4, 4);
    let input = p.acquire_target(&mut e).unwrap();
    let chain = EffectChain::new().with(Effect::Bloom {
        intensity: 0.6,
        threshold: 0.9,
    });

    let out = p.apply_filters(&mut e, &input, &chain, 1.0).unwrap();
    assert!(out.is_some());
    assert_eq!(e.pass_count(labels::BLOOM_EXTRACT), 1);
    assert_eq!(e.pass_count(labels::BLUR), 2);
    assert_eq!(e.pass_count(labels::BLOOM_COMPOSITE), 1);
    assert_eq!(p.passes_run(), 4);
    // input + result stay leased; the composite target reused the extract surface.
    assert_eq!(p.pool_stats().leased_surfaces, 2);
    assert_eq!(p.pool_stats().free_surfaces, 2);
    assert_eq!(p.pool_stats().allocations, 4);
}

#[test]
fn each_color_effect_is_one_pass() {
    let (mut e, mut p) = setup(4, 4);
    let input = p.acquire_target(&mut e).unwrap();
    let chain: EffectChain = vec![
        Effect::Brightness { amount: 1.2 },
        Effect::Sepia { amount: 0.5 },
        Effect::HueRotate { angle_rad: 1.0 },
    ]
    .into();

    p.apply_filters(&mut e, &input, &chain, 1.0).unwrap().unwrap();
    assert_eq!(e.pass_count(labels::COLOR_GRADE), 3);
}

#[test]
fn unknown_custom_is_skipped_and_chain_continues() {
    let (mut e, mut p) = setup(4, 4);
    let input = p.acquire_target(&mut e).unwrap();
    let chain: EffectChain = vec![
        Effect::custom("pipeline-missing-filter", UniformMap::new()),
        Effect::Invert { amount: 1.0 },
    ]
    .into();

    let out = p.apply_filters(&mut e, &input, &chain, 1.0).unwrap();
    assert!(out.is_some());
    assert_eq!(p.passes_run(), 1);
}

#[test]
fn chain_order_is_observable() {
    let (mut e, mut p) = setup(8, 1);
    let input = p.acquire_target(&mut e).unwrap();
    e.upload_rgba8(input.handle(), &red_white(8, 1)).unwrap();

    let blur_then_gray: EffectChain = vec![
        Effect::Blur { amount: 4.0 },
        Effect::Grayscale { amount: 1.0 },
    ]
    .into();
    let gray_then_blur: EffectChain = vec![
        Effect::Grayscale { amount: 1.0 },
        Effect::Blur { amount: 4.0 },
    ]
    .into();

    let a = p
        .apply_filters(&mut e, &input, &blur_then_gray, 1.0)
        .unwrap()
        .unwrap();
    let fa = e.surface_frame(a.handle()).unwrap();
    p.release_target(a);
    let b = p
        .apply_filters(&mut e, &input, &gray_then_blur, 1.0)
        .unwrap()
        .unwrap();
    let fb = e.surface_frame(b.handle()).unwrap();

    // Last red texel: blurring first quantizes the mixed color before taking luma.
    assert_eq!(fa.pixel(3, 0), Some([146, 146, 146, 255]));
    assert_eq!(fb.pixel(3, 0), Some([145, 145, 145, 255]));
    assert_ne!(fa.data, fb.data);
}

#[test]
fn pixelate_size_follows_quality_scale() {
    let (mut e, mut p) = setup(8, 8);
    p.set_scale(0.75);
    let input = p.acquire_target(&mut e).unwrap();
    let chain = EffectChain::new().with(Effect::Pixelate { size: 4.0 });

    let out = p.apply_filters(&mut e, &input, &chain, p.scale()).unwrap().unwrap();
    assert_eq!(out.size(), size(6, 6));
    assert_eq!(e.pass_count(labels::PIXELATE), 1);
}

#[test]
fn render_to_screen_targets_display() {
    let (mut e, mut p) = setup(2, 2);
    let input = p.acquire_target(&mut e).unwrap();
    e.upload_rgba8(input.handle(), &[0, 255, 0, 255].repeat(4)).unwrap();

    p.render_to_screen(&mut e, &input).unwrap();
    assert_eq!(e.screen_frame().pixel(1, 1), Some([0, 255, 0, 255]));
}

#[test]
fn dispose_releases_engine_resources() {
    let (mut e, mut p) = setup(4, 4);
    let a = p.acquire_target(&mut e).unwrap();
    p.release_target(a);
    p.dispose(&mut e);

    let st = e.stats();
    assert_eq!(st.live_surfaces, 0);
    assert_eq!(st.programs_destroyed, st.programs_created);
}
