// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading.
//!
//! A config is assembled from three layers, later layers winning:
//! compiled defaults, TOML files (`/etc/linkmap/linkmap.toml`, the user's
//! XDG config dir, then `./linkmap.toml`), and `LINKMAP_*` environment
//! variables.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LinkmapConfig;

/// Top-level section names, used to translate env var names into the
/// nested keys figment expects.
const SECTIONS: [&str; 9] = [
    "server",
    "storage",
    "log",
    "auth",
    "runtime",
    "pipeline",
    "anthropic",
    "embeddings",
    "scraper",
];

/// Load the full layered configuration.
#[allow(clippy::result_large_err)]
pub fn load_config() -> Result<LinkmapConfig, figment::Error> {
    let mut figment = Figment::from(Serialized::defaults(LinkmapConfig::default()));
    for file in toml_locations() {
        figment = figment.merge(Toml::file(file));
    }
    figment.merge(env_overrides()).extract()
}

/// Load from one explicit TOML file plus env overrides, skipping the
/// search path. Backs the `--config` flag.
#[allow(clippy::result_large_err)]
pub fn load_config_from_path(path: &Path) -> Result<LinkmapConfig, figment::Error> {
    Figment::from(Serialized::defaults(LinkmapConfig::default()))
        .merge(Toml::file(path))
        .merge(env_overrides())
        .extract()
}

/// Load from inline TOML over the defaults, nothing else. For tests.
#[allow(clippy::result_large_err)]
pub fn load_config_from_str(toml_content: &str) -> Result<LinkmapConfig, figment::Error> {
    Figment::from(Serialized::defaults(LinkmapConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// TOML files in ascending priority; missing files are simply skipped by
/// figment.
fn toml_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from("/etc/linkmap/linkmap.toml")];
    if let Some(xdg) = dirs::config_dir() {
        locations.push(xdg.join("linkmap").join("linkmap.toml"));
    }
    locations.push(PathBuf::from("linkmap.toml"));
    locations
}

/// The `LINKMAP_*` provider, with env var names rewritten into
/// `section.key` form.
///
/// Key names themselves contain underscores (`session_secret`,
/// `claim_timeout_secs`), so blindly splitting on `_` would shatter them.
/// Instead, only a known leading section name becomes the dot:
/// `LINKMAP_RUNTIME_CLAIM_TIMEOUT_SECS` ends up as
/// `runtime.claim_timeout_secs`.
fn env_overrides() -> Env {
    Env::prefixed("LINKMAP_").map(|key| {
        let name = key.as_str();
        for section in SECTIONS {
            if let Some(rest) = name
                .strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        // No known section: hand the name through untouched.
        name.to_string().into()
    })
}
