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

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use directories_next::ProjectDirs;
use structopt::StructOpt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use worboo_relayer_store::{
    InMemoryStore, JsonlStore, ProcessedEventStore,
};

use crate::log_file::RotatingLogFile;
use crate::utils::CONFIG_PATH_ENV;
use crate::WorbooRelayerConfig;

/// Package identifier, where the default configuration is looked up.
/// If the user does not start the relayer with the `--config-dir`
/// nor `RELAYER_CONFIG_PATH`, it will try the default location depending
/// on the OS.
pub const PACKAGE_ID: [&str; 3] = ["xyz", "worboo", "worboo-relayer"];

/// The Worboo Reward Relayer Command-line tool
///
/// Start the relayer from a config file:
///
/// $ worboo-relayer -vvv -c <CONFIG_FILE_PATH>
#[derive(StructOpt)]
#[structopt(name = "Worboo Relayer")]
pub struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Config file, or directory that contains configration files.
    #[structopt(
        short = "c",
        long = "config-dir",
        value_name = "PATH",
        parse(from_os_str)
    )]
    pub config_dir: Option<PathBuf>,
    /// Keep the processed events in memory only,
    /// they are forgotten when the process exits.
    #[structopt(long)]
    pub tmp: bool,
}

/// Loads the configuration.
///
/// The first of these that is set is used as the config source, it may be a
/// single file or a directory:
/// 1. `config_dir`.
/// 2. the `RELAYER_CONFIG_PATH` environment variable.
/// 3. the OS specific config directory, if it exists.
///
/// Without any of them, the configuration comes from the environment only.
pub fn load_config<P>(
    config_dir: Option<P>,
) -> Result<WorbooRelayerConfig, anyhow::Error>
where
    P: AsRef<Path>,
{
    let explicit = config_dir
        .map(|p| p.as_ref().to_path_buf())
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
    let path = match explicit {
        Some(p) => {
            // an explicit path must exist.
            if !p.exists() {
                return Err(anyhow::anyhow!("{} does not exist", p.display()));
            }
            Some(p)
        }
        None => {
            tracing::debug!("Getting default dirs for worboo relayer");
            ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
                .map(|dirs| dirs.config_dir().to_path_buf())
                .filter(|p| p.is_dir())
        }
    };
    let config = match path {
        Some(path) => {
            tracing::trace!("Loading Config from {} ..", path.display());
            crate::utils::load(&path).with_context(|| {
                format!("failed to load config from {}", path.display())
            })?
        }
        None => {
            tracing::trace!("Loading Config from the environment ..");
            crate::utils::parse_from_files(&[])
                .context("failed to load config from the environment")?
        }
    };
    tracing::trace!("Config loaded..");
    Ok(config)
}

/// Sets up the logger for the relayer, based on the verbosity level passed in.
///
/// Human readable logs go to stdout. When `log_file_path` is configured, the
/// same events are also written as JSON lines into a size rotated file.
///
/// Returns `Ok(())` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `verbosity` - An i32 integer representing the verbosity level.
/// * `config` - Where the optional log file settings are read from.
pub fn setup_logger(
    verbosity: i32,
    config: Option<&WorbooRelayerConfig>,
) -> anyhow::Result<()> {
    use tracing::Level;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for target in [
        "worboo_relayer",
        "worboo_ew_evm",
        "worboo_event_watcher_traits",
        worboo_relayer_utils::probe::TARGET,
    ] {
        env_filter = env_filter.add_directive(
            format!("{target}={log_level}")
                .parse()
                .context("invalid log directive")?,
        );
    }

    let stdout = tracing_subscriber::fmt::layer().with_target(true).pretty();

    let log_file =
        config.and_then(|c| c.log_file_path.as_ref().map(|p| (c, p)));
    let file = match log_file {
        Some((c, path)) => {
            let writer =
                RotatingLogFile::open(path, c.log_max_bytes, c.log_backup_count)
                    .with_context(|| {
                        format!("failed to open log file {}", path.display())
                    })?;
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout)
        .with(file)
        .try_init()
        .context("failed to install the logger")?;
    Ok(())
}

/// Creates the processed events store for the relayer based on the
/// configuration passed in.
///
/// With `--tmp` the store lives in memory only.
pub async fn create_store(
    opts: &Opts,
    config: &WorbooRelayerConfig,
) -> anyhow::Result<Arc<dyn ProcessedEventStore>> {
    // check if we shall keep everything in memory.
    if opts.tmp {
        tracing::debug!("Using in memory store");
        let store = InMemoryStore::with_max_entries(config.cache_max_entries());
        return Ok(Arc::new(store));
    }
    let store = JsonlStore::open(&config.cache_path, config.cache_max_entries())
        .await
        .with_context(|| {
            format!(
                "failed to open processed events log {}",
                config.cache_path.display()
            )
        })?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parses_from_process_args<T: paw::ParseArgs>() {}

    #[test]
    fn opts_are_paw_arguments() {
        parses_from_process_args::<Opts>();
        let opts = Opts::from_iter([
            "worboo-relayer",
            "-vv",
            "--tmp",
            "-c",
            "/etc/worboo",
        ]);
        assert_eq!(opts.verbose, 2);
        assert!(opts.tmp);
        assert_eq!(opts.config_dir, Some(PathBuf::from("/etc/worboo")));
    }
}
