//! Ambient logging setup. The crate itself only ever calls the `log` macros
//! (`warn!`, `debug!`, `info!`); it never installs a logger on its own so a
//! binary embedding this crate can choose its own backend. This module is a
//! convenience binding to `env_logger` for callers who don't want to.
use std::sync::OnceLock;

use crate::config::CoreConfig;

static INIT: OnceLock<()> = OnceLock::new();

/// Install `env_logger` as the global logger, honouring `config.debug` as a
/// floor on the default filter level. Idempotent — safe to call more than
/// once; only the first call actually installs a logger.
pub fn init_from_config(config: &CoreConfig) {
    INIT.get_or_init(|| {
        let default_level = if config.debug { "debug" } else { "warn" };
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(default_level),
        )
        .try_init();
    });
}
