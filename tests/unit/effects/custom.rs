use super::*;

const PASSTHROUGH_WGSL: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(0.0); }";

#[test]
fn lookup_is_trimmed_and_case_insensitive() {
    let mut reg = CustomFilterRegistry::new();
    reg.register("  Ripple ", CustomFilterDef::new(PASSTHROUGH_WGSL))
        .unwrap();
    assert!(reg.contains("ripple"));
    assert!(reg.get("RIPPLE\t").is_some());
    assert!(reg.get("ripples").is_none());
    assert_eq!(reg.len(), 1);
}

#[test]
fn overwrite_bumps_revision() {
    let mut reg = CustomFilterRegistry::new();
    reg.register("wave", CustomFilterDef::new(PASSTHROUGH_WGSL))
        .unwrap();
    let first = reg.get("wave").unwrap().revision;
    reg.register("WAVE", CustomFilterDef::new(PASSTHROUGH_WGSL).with_uniform("k", 2.0))
        .unwrap();
    let second = reg.get("wave").unwrap();
    assert!(second.revision > first);
    assert_eq!(second.def.uniforms["k"], UniformValue::Float(2.0));
    assert_eq!(reg.len(), 1);
}

#[test]
fn blank_names_are_rejected() {
    let mut reg = CustomFilterRegistry::new();
    assert!(
        reg.register("   ", CustomFilterDef::new(PASSTHROUGH_WGSL))
            .is_err()
    );
    assert!(reg.is_empty());
}

#[test]
fn merged_uniforms_prefer_overrides() {
    let def = CustomFilterDef::new(PASSTHROUGH_WGSL)
        .with_uniform("strength", 1.0)
        .with_uniform("speed", 3.0);
    let mut overrides = UniformMap::new();
    overrides.insert("strength".to_string(), UniformValue::Float(0.25));
    let merged = def.merged_uniforms(&overrides);
    assert_eq!(merged["strength"], UniformValue::Float(0.25));
    assert_eq!(merged["speed"], UniformValue::Float(3.0));
}

#[test]
fn default_parser_reads_json_objects() {
    let def = CustomFilterDef::new(PASSTHROUGH_WGSL);
    let u = def.parse_args(r#"{"strength": 0.5, "tint": [1, 0, 0, 1]}"#).unwrap();
    assert_eq!(u["strength"], UniformValue::Float(0.5));
    assert_eq!(u["tint"], UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
    assert!(def.parse_args("").unwrap().is_empty());
    assert!(def.parse_args("[1, 2]").is_err());
    assert!(def.parse_args("strength=1").is_err());
}

#[test]
fn custom_parser_hook_is_used() {
    fn one_number(raw: &str) -> HalationResult<UniformMap> {
        let v: f32 = raw
            .trim()
            .parse()
            .map_err(|_| HalationError::validation("expected a number"))?;
        Ok(UniformMap::from([("amount".to_string(), UniformValue::Float(v))]))
    }

    let def = CustomFilterDef::new(PASSTHROUGH_WGSL).with_parser(one_number);
    assert_eq!(
        def.parse_args(" 0.75 ").unwrap()["amount"],
        UniformValue::Float(0.75)
    );
}

#[test]
fn global_registry_round_trip() {
    register_custom_filter(
        "unit-test-global-filter",
        CustomFilterDef::new(PASSTHROUGH_WGSL),
    )
    .unwrap();
    assert!(lookup_custom_filter(" UNIT-TEST-GLOBAL-FILTER ").is_some());
    assert!(lookup_custom_filter("unit-test-missing-filter").is_none());
}
