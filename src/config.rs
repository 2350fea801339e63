/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Runtime configuration for the bridge, layered defaults → config file →
/// environment.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Context-update debounce/throttle interval, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Keep-alive ping interval, in seconds.
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,

    /// Consecutive missed pings before a session is abandoned.
    #[serde(default = "default_keepalive_miss_threshold")]
    pub keepalive_miss_threshold: u32,

    /// Maximum accepted HTTP request body size, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_keepalive_interval_secs() -> u64 {
    60
}

fn default_keepalive_miss_threshold() -> u32 {
    3
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Config {
    /// Loads configuration from defaults, an optional user config directory
    /// file, an optional explicit file, then environment variables prefixed
    /// `IDE_BRIDGE_`.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured source cannot be parsed or if the
    /// merged configuration cannot be deserialized into [`Config`].
    pub fn load(explicit_file: Option<PathBuf>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("debounce_ms", default_debounce_ms())?
            .set_default("keepalive_interval_secs", default_keepalive_interval_secs())?
            .set_default("keepalive_miss_threshold", default_keepalive_miss_threshold())?
            .set_default("max_body_bytes", default_max_body_bytes() as i64)?;

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("ide-companion-bridge").join("config.toml");
            if config_path.exists() {
                builder = builder.add_source(config::File::from(config_path));
            }
        }

        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(config::Environment::with_prefix("IDE_BRIDGE"));

        let config = builder.build().context("failed to build configuration")?;

        config
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}
