use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::effects::effect::{UniformMap, UniformValue};
use crate::foundation::error::{HalationError, HalationResult};

/// Turns a raw argument string (as written by the style collaborator) into uniforms.
pub type UniformParser = fn(&str) -> HalationResult<UniformMap>;

/// Per-texel software fallback for a custom filter: `(straight rgba, uv, uniforms) -> rgba`.
pub type CpuKernel = fn([f32; 4], [f32; 2], &UniformMap) -> [f32; 4];

/// A user-registered full-screen filter.
#[derive(Clone, Debug)]
pub struct CustomFilterDef {
    /// WGSL fragment entry point `fs_main`, bound against the shared full-screen vertex stage.
    pub fragment_shader: String,
    /// Default uniform values; per-effect uniforms override these by name.
    pub uniforms: UniformMap,
    pub parse: Option<UniformParser>,
    pub cpu_kernel: Option<CpuKernel>,
}

impl CustomFilterDef {
    pub fn new(fragment_shader: impl Into<String>) -> Self {
        Self {
            fragment_shader: fragment_shader.into(),
            uniforms: UniformMap::new(),
            parse: None,
            cpu_kernel: None,
        }
    }

    pub fn with_uniform(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.uniforms.insert(name.into(), value.into());
        self
    }

    pub fn with_parser(mut self, parse: UniformParser) -> Self {
        self.parse = Some(parse);
        self
    }

    pub fn with_cpu_kernel(mut self, kernel: CpuKernel) -> Self {
        self.cpu_kernel = Some(kernel);
        self
    }

    /// Defaults overlaid with `overrides`.
    pub fn merged_uniforms(&self, overrides: &UniformMap) -> UniformMap {
        let mut out = self.uniforms.clone();
        for (k, v) in overrides {
            out.insert(k.clone(), v.clone());
        }
        out
    }

    /// Parse raw arguments with the registered hook, or as a JSON object of uniform values.
    pub fn parse_args(&self, raw: &str) -> HalationResult<UniformMap> {
        match self.parse {
            Some(parse) => parse(raw),
            None => parse_json_uniforms(raw),
        }
    }
}

/// Default argument parser: `{"name": value, ...}` with values as accepted by [`UniformValue`].
pub fn parse_json_uniforms(raw: &str) -> HalationResult<UniformMap> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(UniformMap::new());
    }
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| HalationError::validation(format!("custom filter args are not JSON: {e}")))?;
    let Some(obj) = value.as_object() else {
        return Err(HalationError::validation(
            "custom filter args must be a JSON object",
        ));
    };
    obj.iter()
        .map(|(k, v)| Ok((k.clone(), UniformValue::from_json(v)?)))
        .collect()
}

/// A registry entry together with the revision it was registered at.
#[derive(Clone, Debug)]
pub struct RegisteredFilter {
    pub def: Arc<CustomFilterDef>,
    /// Bumped on every overwrite so compiled programs can be refreshed.
    pub revision: u64,
}

/// Name-keyed table of custom filters. Names are matched trimmed and case-insensitively.
#[derive(Debug, Default)]
pub struct CustomFilterRegistry {
    filters: HashMap<String, RegisteredFilter>,
    next_revision: u64,
}

impl CustomFilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, empty until the first registration.
    pub fn global() -> &'static RwLock<CustomFilterRegistry> {
        static GLOBAL: OnceLock<RwLock<CustomFilterRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| RwLock::new(CustomFilterRegistry::new()))
    }

    pub fn normalize_name(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Insert or overwrite `name`. Blank names are rejected.
    pub fn register(&mut self, name: &str, def: CustomFilterDef) -> HalationResult<()> {
        let key = Self::normalize_name(name);
        if key.is_empty() {
            return Err(HalationError::validation(
                "custom filter name must be non-empty",
            ));
        }
        self.next_revision += 1;
        self.filters.insert(
            key,
            RegisteredFilter {
                def: Arc::new(def),
                revision: self.next_revision,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<RegisteredFilter> {
        self.filters.get(&Self::normalize_name(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(&Self::normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Register `def` under `name` in the process-wide registry.
pub fn register_custom_filter(name: &str, def: CustomFilterDef) -> HalationResult<()> {
    CustomFilterRegistry::global()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(name, def)
}

/// Look `name` up in the process-wide registry.
pub fn lookup_custom_filter(name: &str) -> Option<RegisteredFilter> {
    CustomFilterRegistry::global()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/custom.rs"]
mod tests;
