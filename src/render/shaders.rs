//! WGSL sources of the built-in full-screen passes.
//!
//! Every fragment stage shares the `Pass` uniform block bound as `pass_info` (resolution and texel
//! size of the output) and reads its input from binding 1. Effect parameters live in group 1.

pub(crate) const FULLSCREEN_VS: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VsOut {
    // Single oversized triangle covering the viewport.
    let x = f32((vi << 1u) & 2u);
    let y = f32(vi & 2u);
    var out: VsOut;
    out.pos = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
    out.uv = vec2<f32>(x, y);
    return out;
}
"#;

const PASS_HEADER: &str = r#"
struct Pass {
    resolution: vec2<f32>,
    texel_size: vec2<f32>,
};

@group(0) @binding(0) var<uniform> pass_info: Pass;
@group(0) @binding(1) var t_input: texture_2d<f32>;
@group(0) @binding(2) var s_input: sampler;
"#;

const COPY_FS: &str = r#"
@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(t_input, s_input, uv);
}
"#;

const BLUR_FS: &str = r#"
struct Blur {
    direction: vec2<f32>,
    radius: f32,
    _pad: f32,
};
@group(1) @binding(0) var<uniform> blur: Blur;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let step = blur.direction * pass_info.texel_size * blur.radius;
    var acc = textureSample(t_input, s_input, uv) * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let o = step * f32(i);
        acc += textureSample(t_input, s_input, uv + o) * weights[i];
        acc += textureSample(t_input, s_input, uv - o) * weights[i];
    }
    return acc;
}
"#;

const PIXELATE_FS: &str = r#"
struct Pixelate {
    pixel_size: f32,
    _pad: vec3<f32>,
};
@group(1) @binding(0) var<uniform> px: Pixelate;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let cell = px.pixel_size * pass_info.texel_size;
    let coord = floor(uv / cell) * cell + cell * 0.5;
    return textureSample(t_input, s_input, coord);
}
"#;

const BLOOM_EXTRACT_FS: &str = r#"
struct Extract {
    threshold: f32,
    _pad: vec3<f32>,
};
@group(1) @binding(0) var<uniform> extract: Extract;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let c = textureSample(t_input, s_input, uv);
    let straight = select(vec3<f32>(0.0), c.rgb / c.a, c.a > 0.0);
    let peak = max(straight.r, max(straight.g, straight.b));
    return select(vec4<f32>(0.0), c, peak > extract.threshold);
}
"#;

const BLOOM_COMPOSITE_FS: &str = r#"
struct Composite {
    intensity: f32,
    _pad: vec3<f32>,
};
@group(1) @binding(0) var<uniform> composite: Composite;
@group(1) @binding(1) var t_bloom: texture_2d<f32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let base = textureSample(t_input, s_input, uv);
    let glow = textureSample(t_bloom, s_input, uv);
    return vec4<f32>(base.rgb + glow.rgb * composite.intensity, base.a);
}
"#;

const COLOR_GRADE_FS: &str = r#"
struct Grade {
    mode: u32,
    amount: f32,
    _pad: vec2<f32>,
};
@group(1) @binding(0) var<uniform> grade: Grade;

const LUMA = vec3<f32>(0.299, 0.587, 0.114);

fn hue_rotate(rgb: vec3<f32>, angle: f32) -> vec3<f32> {
    let c = cos(angle);
    let s = sin(angle);
    let m = mat3x3<f32>(
        vec3<f32>(0.213 + c * 0.787 - s * 0.213, 0.213 - c * 0.213 + s * 0.143, 0.213 - c * 0.213 - s * 0.787),
        vec3<f32>(0.715 - c * 0.715 - s * 0.715, 0.715 + c * 0.285 + s * 0.140, 0.715 - c * 0.715 + s * 0.715),
        vec3<f32>(0.072 - c * 0.072 + s * 0.928, 0.072 - c * 0.072 - s * 0.283, 0.072 + c * 0.928 + s * 0.072),
    );
    return m * rgb;
}

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let c = textureSample(t_input, s_input, uv);
    if (c.a <= 0.0) {
        return vec4<f32>(0.0);
    }
    var rgb = c.rgb / c.a;
    let t = grade.amount;
    switch grade.mode {
        case 0u: { rgb = rgb * t; }
        case 1u: { rgb = (rgb - 0.5) * t + 0.5; }
        case 2u: { rgb = mix(vec3<f32>(dot(rgb, LUMA)), rgb, t); }
        case 3u: { rgb = mix(rgb, vec3<f32>(dot(rgb, LUMA)), t); }
        case 4u: {
            let sepia = vec3<f32>(
                dot(rgb, vec3<f32>(0.393, 0.769, 0.189)),
                dot(rgb, vec3<f32>(0.349, 0.686, 0.168)),
                dot(rgb, vec3<f32>(0.272, 0.534, 0.131)),
            );
            rgb = mix(rgb, sepia, t);
        }
        case 5u: { rgb = mix(rgb, vec3<f32>(1.0) - rgb, t); }
        case 6u: { rgb = hue_rotate(rgb, t); }
        default: {}
    }
    return vec4<f32>(clamp(rgb, vec3<f32>(0.0), vec3<f32>(1.0)) * c.a, c.a);
}
"#;

/// Fragment source of a built-in pass, with the shared header prepended.
pub(crate) fn builtin_fragment(body: &str) -> String {
    let mut s = String::with_capacity(PASS_HEADER.len() + body.len());
    s.push_str(PASS_HEADER);
    s.push_str(body);
    s
}

pub(crate) fn copy_fs() -> String {
    builtin_fragment(COPY_FS)
}

pub(crate) fn blur_fs() -> String {
    builtin_fragment(BLUR_FS)
}

pub(crate) fn pixelate_fs() -> String {
    builtin_fragment(PIXELATE_FS)
}

pub(crate) fn bloom_extract_fs() -> String {
    builtin_fragment(BLOOM_EXTRACT_FS)
}

pub(crate) fn bloom_composite_fs() -> String {
    builtin_fragment(BLOOM_COMPOSITE_FS)
}

pub(crate) fn color_grade_fs() -> String {
    builtin_fragment(COLOR_GRADE_FS)
}

/// User fragment stages get the shared header too, so they can sample `t_input` directly.
pub(crate) fn custom_fs(user: &str) -> String {
    builtin_fragment(user)
}

#[cfg(test)]
#[path = "../../tests/unit/render/shaders.rs"]
mod tests;
