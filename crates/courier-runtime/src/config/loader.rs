//! Layered configuration loading.
//!
//! Sources are stacked with figment; a later layer overrides an earlier one:
//!
//! | Layer | Source |
//! |-------|--------|
//! | 1 | [`CourierConfig::default`] |
//! | 2 | values passed to [`ConfigLoader::merge`] |
//! | 3 | `courier.{profile}.toml` |
//! | 4 | `courier.toml` |
//! | 5 | `COURIER_*` environment variables |
//!
//! Nested keys in environment variables are separated by a double
//! underscore, so `COURIER_SERVER__PORT=7000` sets `server.port`.
//!
//! ```rust,ignore
//! use courier_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("prod")
//!     .search_path("/etc/courier")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CourierConfig;
use super::validation::validate_config;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "COURIER_";

/// Name of the main configuration file.
pub const CONFIG_FILE: &str = "courier.toml";

/// A named deployment profile selecting `courier.{name}.toml`.
///
/// `dev` and `prod` are accepted as short forms; names are lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile(String);

impl Profile {
    /// Profile used when none is selected.
    pub const DEFAULT: &'static str = "development";

    pub fn new(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        let name = match name.as_str() {
            "dev" => "development".to_string(),
            "prod" => "production".to_string(),
            _ => name,
        };
        Self(name)
    }

    /// Reads `COURIER_PROFILE`, falling back to [`Profile::DEFAULT`].
    pub fn from_env() -> Self {
        match std::env::var(format!("{ENV_PREFIX}PROFILE")) {
            Ok(name) if !name.trim().is_empty() => Self::new(&name),
            _ => Self::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// File name of the profile-specific configuration.
    pub fn file_name(&self) -> String {
        format!("courier.{}.toml", self.0)
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration files picked for one load.
#[derive(Debug, Default, PartialEq, Eq)]
struct FileLayers {
    profile: Option<PathBuf>,
    main: Option<PathBuf>,
}

/// Builder that assembles a [`CourierConfig`] from layered sources.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    explicit_file: Option<PathBuf>,
    env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with the profile from the environment and
    /// environment overrides enabled.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            explicit_file: None,
            env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::new(profile.as_ref());
        self
    }

    /// Adds a directory to look for configuration files in. Directories
    /// are tried in the order added.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/courier` to the search path.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("courier")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.explicit_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Layers `config` directly above the built-in defaults.
    ///
    /// Configuration files and environment variables still override it.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads and validates the configuration.
    pub fn load(self) -> ConfigResult<CourierConfig> {
        let profile = self.profile.clone();
        let config: CourierConfig = self
            .into_figment()?
            .extract()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            level = %config.logging.level,
            remotes = config.remotes.len(),
            "configuration ready"
        );
        Ok(config)
    }

    fn into_figment(self) -> ConfigResult<Figment> {
        let files = self.locate_files()?;

        let mut figment =
            Figment::from(Serialized::defaults(CourierConfig::default())).merge(self.overrides);

        for path in [&files.profile, &files.main].into_iter().flatten() {
            info!(path = %path.display(), "reading configuration file");
            figment = merge_file(figment, path)?;
        }
        if files == FileLayers::default() {
            warn!("no configuration file found, using defaults");
        }

        if self.env {
            trace!(prefix = ENV_PREFIX, "applying environment overrides");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    /// Picks the files to read. An explicit file wins over searching;
    /// otherwise the first directory containing `courier.toml` supplies it,
    /// and profile files are taken from directories up to that one.
    fn locate_files(&self) -> ConfigResult<FileLayers> {
        if let Some(path) = &self.explicit_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            return Ok(FileLayers {
                profile: None,
                main: Some(path.clone()),
            });
        }

        let mut files = FileLayers::default();
        for dir in self.directories() {
            let candidate = dir.join(self.profile.file_name());
            if files.profile.is_none() && candidate.is_file() {
                files.profile = Some(candidate);
            }
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                files.main = Some(candidate);
                break;
            }
        }
        Ok(files)
    }

    /// The configured search path, or the working directory followed by
    /// the user config directory.
    fn directories(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("courier")))
            .collect()
    }
}

#[cfg(feature = "toml-config")]
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(figment.merge(Toml::file(path))),
        other => Err(ConfigError::Parse(format!(
            "{}: expected a .toml file, got extension {:?}",
            path.display(),
            other.unwrap_or("")
        ))),
    }
}

#[cfg(not(feature = "toml-config"))]
fn merge_file(_figment: Figment, path: &Path) -> ConfigResult<Figment> {
    Err(ConfigError::Parse(format!(
        "{}: file configuration needs the 'toml-config' feature",
        path.display()
    )))
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<CourierConfig> {
    ConfigLoader::new().load()
}

/// Loads one configuration file plus environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<CourierConfig> {
    ConfigLoader::new().file(path).load()
}
