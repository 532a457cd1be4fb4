//! Layered sampler configuration.
//!
//! Precedence, lowest first: profile preset, JSON parameter file, individual
//! overrides (command-line flags). Keys absent from the file keep the
//! profile's values, not the general-product defaults.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::sampler::{Profile, SamplerParams};

/// Single-field overrides; `None` leaves the layered value untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParamOverrides {
    pub crop_fraction: Option<f64>,
    pub brightness_threshold: Option<u8>,
    pub cluster_count: Option<usize>,
    pub max_iterations: Option<u32>,
    pub seed: Option<u64>,
}

impl ParamOverrides {
    pub fn apply(&self, params: &mut SamplerParams) {
        if let Some(v) = self.crop_fraction {
            params.crop_fraction = v;
        }
        if let Some(v) = self.brightness_threshold {
            params.brightness_threshold = v;
        }
        if let Some(v) = self.cluster_count {
            params.cluster_count = v;
        }
        if let Some(v) = self.max_iterations {
            params.max_iterations = v;
        }
        if let Some(v) = self.seed {
            params.seed = v;
        }
    }
}

/// Merge a JSON object of parameter fields over `base`.
pub fn layer_json(base: SamplerParams, json: &str) -> Result<SamplerParams> {
    let fields: Map<String, Value> = serde_json::from_str(json)?;
    let mut merged = serde_json::to_value(base)?;
    if let Some(object) = merged.as_object_mut() {
        object.extend(fields);
    }
    Ok(serde_json::from_value(merged)?)
}

/// Resolve the final parameters and validate them.
pub fn resolve_params(
    profile: Profile,
    params_json: Option<&str>,
    overrides: &ParamOverrides,
) -> Result<SamplerParams> {
    let mut params = match params_json {
        Some(json) => layer_json(profile.params(), json)?,
        None => profile.params(),
    };
    overrides.apply(&mut params);
    params.validate()?;
    Ok(params)
}

/// Read a parameter file; I/O failures surface as `std::io::Error`.
pub fn read_params_file(path: &Path) -> std::io::Result<String> {
    let content = fs::read_to_string(path)?;
    log::debug!("loaded sampler parameters from {}", path.display());
    Ok(content)
}
