use super::*;
use crate::effects::custom::register_custom_filter;
use crate::engine::cpu::{CpuEngine, CpuEngineOpts, DrawKind};
use crate::foundation::core::SurfaceSize;
use crate::render::pool::{PoolOpts, RenderTargetPool};

const FS: &str = "@fragment fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> { return textureSample(t_input, s_input, uv); }";

fn size(w: u32, h: u32) -> SurfaceSize {
    SurfaceSize::new(w, h).unwrap()
}

fn setup() -> (CpuEngine, RenderTargetPool, PassLibrary) {
    let mut e = CpuEngine::new(size(4, 4), CpuEngineOpts::default()).unwrap();
    let lib = PassLibrary::new(&mut e).unwrap();
    (e, RenderTargetPool::new(PoolOpts::default()), lib)
}

fn invert_kernel(px: [f32; 4], _uv: [f32; 2], _u: &UniformMap) -> [f32; 4] {
    [1.0 - px[0], 1.0 - px[1], 1.0 - px[2], px[3]]
}

#[test]
fn builtins_compile_once() {
    let (e, _, lib) = setup();
    assert_eq!(e.stats().programs_created, 6);
    assert_eq!(lib.passes_run(), 0);
}

#[test]
fn copy_to_display_blends_over() {
    let (mut e, mut pool, mut lib) = setup();
    let src = pool.acquire(&mut e, size(4, 4)).unwrap();
    e.upload_rgba8(src.handle(), &[0, 0, 0, 0].repeat(16)).unwrap();

    lib.copy(&mut e, &src, None).unwrap();

    let last = e.draw_log().last().unwrap().clone();
    assert_eq!(last.target, None);
    assert_eq!(
        last.kind,
        DrawKind::Pass {
            label: labels::COPY.to_string(),
            blend: PassBlend::Over,
        }
    );
    // Transparent source over the cleared display leaves it untouched.
    assert_eq!(e.screen_frame().pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(lib.passes_run(), 1);
}

#[test]
fn offscreen_passes_replace_their_output() {
    let (mut e, mut pool, mut lib) = setup();
    let src = pool.acquire(&mut e, size(4, 4)).unwrap();
    let dst = pool.acquire(&mut e, size(4, 4)).unwrap();
    e.upload_rgba8(src.handle(), &[255, 0, 0, 255].repeat(16)).unwrap();
    e.upload_rgba8(dst.handle(), &[0, 0, 255, 255].repeat(16)).unwrap();

    lib.color_grade(&mut e, &src, &dst, ColorMode::Invert, 1.0)
        .unwrap();

    let out = e.surface_frame(dst.handle()).unwrap();
    assert_eq!(out.pixel(2, 2), Some([0, 255, 255, 255]));
    assert_eq!(e.pass_count(labels::COLOR_GRADE), 1);
}

#[test]
fn unknown_custom_filter_warns_once_per_raw_name() {
    let (mut e, _, mut lib) = setup();
    assert!(lib.custom_pass(&mut e, "no-such-filter-passes").is_none());
    assert!(lib.custom_pass(&mut e, "no-such-filter-passes").is_none());
    assert_eq!(lib.warned_count(), 1);
    assert!(lib.custom_pass(&mut e, "NO-SUCH-FILTER-PASSES").is_none());
    assert_eq!(lib.warned_count(), 2);
}

#[test]
fn custom_program_is_compiled_once_and_runs_kernel() {
    register_custom_filter(
        "Passes-Invert",
        CustomFilterDef::new(FS).with_cpu_kernel(invert_kernel),
    )
    .unwrap();
    let (mut e, mut pool, mut lib) = setup();
    let before = e.stats().programs_created;

    let pass = lib.custom_pass(&mut e, " passes-invert ").unwrap();
    let again = lib.custom_pass(&mut e, "PASSES-INVERT").unwrap();
    assert_eq!(pass.program, again.program);
    assert_eq!(e.stats().programs_created, before + 1);

    let src = pool.acquire(&mut e, size(4, 4)).unwrap();
    let dst = pool.acquire(&mut e, size(4, 4)).unwrap();
    e.upload_rgba8(src.handle(), &[255, 0, 0, 255].repeat(16)).unwrap();
    lib.custom(&mut e, &pass, &UniformMap::new(), &src, &dst)
        .unwrap();

    let out = e.surface_frame(dst.handle()).unwrap();
    assert_eq!(out.pixel(0, 0), Some([0, 255, 255, 255]));
    assert_eq!(e.pass_count(&labels::custom("passes-invert")), 1);
}

#[test]
fn reregistration_recompiles_custom_program() {
    register_custom_filter("passes-recompile", CustomFilterDef::new(FS)).unwrap();
    let (mut e, _, mut lib) = setup();

    let first = lib.custom_pass(&mut e, "passes-recompile").unwrap();
    register_custom_filter(
        "passes-recompile",
        CustomFilterDef::new(FS).with_uniform("k", 1.0),
    )
    .unwrap();
    let second = lib.custom_pass(&mut e, "passes-recompile").unwrap();

    assert_ne!(first.program, second.program);
    assert_eq!(e.stats().programs_destroyed, 1);
}

#[test]
fn dispose_destroys_every_program() {
    register_custom_filter("passes-dispose", CustomFilterDef::new(FS)).unwrap();
    let (mut e, _, mut lib) = setup();
    lib.custom_pass(&mut e, "passes-dispose").unwrap();

    lib.dispose(&mut e);
    assert_eq!(e.stats().programs_destroyed, 7);
}
