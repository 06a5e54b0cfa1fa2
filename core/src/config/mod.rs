pub mod errors;
pub mod types;

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};

use errors::ConfigError;
use types::AppConfig;

const ENV_PREFIX: &str = "SWEEPER_";

impl AppConfig {
    /// Layered load rooted at the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Precedence, lowest first: `default.toml`, `local.toml`,
    /// `exchanges/*.toml`, then `SWEEPER_` env vars (`__` separates levels).
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Toml::file(dir.join("default.toml")))
            .merge(Toml::file(dir.join("local.toml")));

        // Credentials live in git-ignored per-exchange files
        if let Ok(entries) = std::fs::read_dir(dir.join("exchanges")) {
            let mut paths: Vec<_> = entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("toml"))
                .collect();
            paths.sort();
            for path in paths {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment.extract()?;

        let validation_errors = config.validate();
        if !validation_errors.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: validation_errors.join(", "),
            });
        }

        Ok(config)
    }
}
