// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, File};

use super::*;

/// Prefix of every environment variable read by the relayer.
pub const ENV_PREFIX: &str = "RELAYER";

/// Environment variable pointing at a config file or directory.
pub const CONFIG_PATH_ENV: &str = "RELAYER_CONFIG_PATH";

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> worboo_relayer_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(worboo_relayer_utils::Error::from))
        .collect()
}

/// Try to parse the [`WorbooRelayerConfig`] from the given config file(s),
/// merged with the `RELAYER_*` variables of the process environment.
pub fn parse_from_files(
    files: &[PathBuf],
) -> worboo_relayer_utils::Result<WorbooRelayerConfig> {
    parse_with_env(files, None)
}

/// Same as [`parse_from_files`], but reads the environment variables from
/// `env` instead of the process environment when it is given.
pub fn parse_with_env(
    files: &[PathBuf],
    env: Option<HashMap<String, String>>,
) -> worboo_relayer_utils::Result<WorbooRelayerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        // get file extension
        let ext = config_file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // the environment comes last, so it overrides the files. Values are kept
    // as strings, rewards are parsed from the exact decimal text.
    let builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .source(env),
    );
    let cfg = builder.build()?;
    let config: Result<
        WorbooRelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration from a config file, or from every config file of
/// a directory.
///
/// # Arguments
///
/// * `path` - A config file, or a directory searched with [`search_config_files`].
///
/// # Example
///
/// ```no_run
/// use worboo_relayer_config::utils::load;
///
/// let path = "/path/to/config.toml";
/// load(path);
/// ```
pub fn load<P: AsRef<Path>>(
    path: P,
) -> worboo_relayer_utils::Result<WorbooRelayerConfig> {
    let path = path.as_ref();
    if path.is_dir() {
        parse_from_files(&search_config_files(path)?)
    } else {
        parse_from_files(&[path.to_path_buf()])
    }
}

/// The postloading_process exists to validate configuration before the
/// relayer starts.
pub fn postloading_process(
    config: WorbooRelayerConfig,
) -> worboo_relayer_utils::Result<WorbooRelayerConfig> {
    tracing::trace!("Checking configration sanity ...");
    config.verify()?;
    if config.reward_per_win.base_units().is_zero() {
        tracing::warn!("!!WARNING!!: reward_per_win is zero, victories mint nothing");
    }
    if config.max_concurrent_events == 0 {
        tracing::warn!(
            "max_concurrent_events is 0, events will be handled one at a time"
        );
    }
    if config.max_blocks_per_step == 0 {
        tracing::warn!("max_blocks_per_step is 0, using 1 instead");
    }
    Ok(config)
}
