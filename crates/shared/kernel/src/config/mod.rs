use config::{Config, Environment, File, Map};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "FILEVAULT";

/// Separator between the prefix and nested keys (`FILEVAULT__VAULT__ITERATIONS`).
pub const ENV_SEPARATOR: &str = "__";

/// Base name of the settings file looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "filevault";

/// Custom error type for config loading.
#[fv_derive::fv_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// A reusable configuration loader that combines file-based settings with environment overrides.
///
/// Layers, later ones winning:
/// 1. **Base File**: an explicit `path` must exist. Without one, a `filevault.{toml,json,...}`
///    in the working directory is used if present; otherwise only defaults apply.
/// 2. **Environment Overrides**: variables prefixed with `FILEVAULT__`. Nested keys are joined
///    with double underscores (`FILEVAULT__LOGGING__LEVEL` maps to `logging.level`).
///
/// # Errors
/// * The explicitly requested file is missing or unreadable.
/// * A value cannot be deserialized into `T`.
///
/// # Example
/// ```rust
/// use fv_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// let cfg: AppConfig = load_config(Some("config/local")).unwrap_or_default();
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load_layered(path, None)
}

/// Same as [`load_config`], but reads overrides from `env` instead of the process
/// environment. Keys are full variable names, e.g. `FILEVAULT__VAULT__ITERATIONS`.
///
/// # Errors
/// Same as [`load_config`].
pub fn load_config_with_env<T>(
    path: Option<impl AsRef<Path>>,
    env: Map<String, String>,
) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load_layered(path, Some(env))
}

fn load_layered<T>(
    path: Option<impl AsRef<Path>>,
    env: Option<Map<String, String>>,
) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let required = path.is_some();
    let effective_path =
        path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), |p| p.as_ref().to_path_buf());

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .convert_case(config::Case::Snake)
                .try_parsing(true)
                .source(env),
        );

    info!(path = %effective_path.display(), required, "Loading config");

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
