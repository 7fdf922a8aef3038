//! CTL transform selection.
//!
//! Transforms are named on the command line or picked from defaults, then
//! located as `<name>.ctl` files along `CTL_MODULE_PATH`. Interpreting the
//! CTL programs is left to an external interpreter.

use anyhow::{bail, Result};
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const MODULE_PATH_VAR: &str = "CTL_MODULE_PATH";
pub const DISPLAY_TRANSFORM_VAR: &str = "CTL_DISPLAY_TRANSFORM";
pub const DEFAULT_RENDERING_TRANSFORM: &str = "transform_RRT";
pub const DEFAULT_DISPLAY_TRANSFORM: &str = "transform_display_video";
const MODULE_EXTENSION: &str = "ctl";

/// Environment that controls transform lookup
#[derive(Debug, Clone, Default)]
pub struct TransformSettings {
    pub module_path: Vec<PathBuf>,
    pub display_transform: Option<String>,
}

impl TransformSettings {
    pub fn from_env() -> Self {
        Self::from_vars(env::var_os(MODULE_PATH_VAR), env::var(DISPLAY_TRANSFORM_VAR).ok())
    }

    pub fn from_vars(module_path: Option<OsString>, display_transform: Option<String>) -> Self {
        Self {
            module_path: module_path
                .map(|paths| env::split_paths(&paths).collect())
                .unwrap_or_default(),
            display_transform: display_transform.filter(|name| !name.is_empty()),
        }
    }

    /// First `<name>.ctl` found along the module path
    pub fn find_module(&self, name: &str) -> Option<PathBuf> {
        self.module_path
            .iter()
            .map(|dir| dir.join(format!("{name}.{MODULE_EXTENSION}")))
            .find(|candidate| candidate.is_file())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransform {
    pub name: String,
    /// `None` for a default transform whose module was not found
    pub module: Option<PathBuf>,
}

/// Ordered transforms applied to every frame, switchable at runtime.
#[derive(Debug, Clone)]
pub struct TransformChain {
    transforms: Vec<ResolvedTransform>,
    enabled: bool,
}

impl TransformChain {
    /// Resolve the transforms named on the command line, or the default
    /// rendering + display pair when none were named.
    ///
    /// A named transform whose module cannot be found is an error; a missing
    /// default is only logged.
    pub fn resolve(names: &[String], settings: &TransformSettings) -> Result<Self> {
        let mut transforms = Vec::new();

        if names.is_empty() {
            let display = settings
                .display_transform
                .as_deref()
                .unwrap_or(DEFAULT_DISPLAY_TRANSFORM);
            for name in [DEFAULT_RENDERING_TRANSFORM, display] {
                let module = settings.find_module(name);
                if module.is_none() {
                    warn!(transform = name, "CTL module not found");
                }
                transforms.push(ResolvedTransform {
                    name: name.to_string(),
                    module,
                });
            }
        } else {
            for name in names {
                let Some(module) = settings.find_module(name) else {
                    bail!(
                        "Cannot find CTL transform \"{name}\" (searched {MODULE_PATH_VAR} = {:?}).",
                        settings.module_path
                    );
                };
                transforms.push(ResolvedTransform {
                    name: name.clone(),
                    module: Some(module),
                });
            }
        }

        debug!(?transforms, "resolved CTL transforms");
        Ok(Self {
            transforms,
            enabled: true,
        })
    }

    pub fn transforms(&self) -> &[ResolvedTransform] {
        &self.transforms
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    /// Names joined in application order, for the overlay
    pub fn describe(&self) -> String {
        self.transforms
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Scale RGB by `2^stops`, leaving alpha untouched.
pub fn apply_exposure(rgba: &[u8], stops: f32) -> Vec<u8> {
    if stops == 0.0 {
        return rgba.to_vec();
    }

    let gain = stops.exp2();
    let mut out = Vec::with_capacity(rgba.len());
    for pixel in rgba.chunks_exact(4) {
        for &channel in &pixel[..3] {
            out.push((f32::from(channel) * gain).round().clamp(0.0, 255.0) as u8);
        }
        out.push(pixel[3]);
    }
    out
}
