use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from the default TOML file and `BOURSE_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration by layering built-in defaults, a TOML file, and environment
    /// variables (`BOURSE_DATABASE__URL`, `BOURSE_INGEST__WORKERS`, ...).
    ///
    /// A missing file is not an error; the defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be parsed or a value has the
    /// wrong type.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading configuration");

        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("BOURSE_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::path::PathBuf;

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = ConfigLoader::load_from("does/not/exist.toml").expect("defaults");
            assert_eq!(config.database.url, "postgresql://localhost/bourse");
            assert_eq!(config.ingest.chunk_size, 1000);
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [database]
                url = "postgresql://db:5432/bourse"
                max_connections = 4

                [ingest]
                source_dir = "/data/quotes"
                workers = 3
                chunk_size = 250
                "#,
            )?;

            let config = ConfigLoader::load_from("Config.toml").expect("config");
            assert_eq!(config.database.url, "postgresql://db:5432/bourse");
            assert_eq!(config.database.max_connections, 4);
            assert_eq!(config.ingest.source_dir, PathBuf::from("/data/quotes"));
            assert_eq!(config.ingest.workers, 3);
            assert_eq!(config.ingest.chunk_size, 250);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("Config.toml", "[ingest]\nworkers = 3\n")?;
            jail.set_env("BOURSE_INGEST__WORKERS", "8");
            jail.set_env("BOURSE_DATABASE__URL", "postgresql://env/bourse");

            let config = ConfigLoader::load_from("Config.toml").expect("config");
            assert_eq!(config.ingest.workers, 8);
            assert_eq!(config.database.url, "postgresql://env/bourse");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_type_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("Config.toml", "[ingest]\nworkers = \"many\"\n")?;
            assert!(ConfigLoader::load_from("Config.toml").is_err());
            Ok(())
        });
    }
}
