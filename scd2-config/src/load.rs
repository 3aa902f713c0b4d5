use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory holding the configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// File extensions probed, in order, for every configuration file.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix of environment variables overriding configuration values.
const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator between nested keys, e.g. `APP_PIPELINE__HISTORY_TABLE`.
const ENV_SEPARATOR: &str = "__";

const LIST_SEPARATOR: &str = ",";

/// Implemented by top-level configuration structures.
pub trait Config {
    /// Keys whose environment values are split on commas into lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

#[derive(Debug, Clone, Copy)]
enum ConfigFile {
    Base,
    Environment(Environment),
}

impl ConfigFile {
    fn stem(&self) -> &'static str {
        match self {
            ConfigFile::Base => "base",
            ConfigFile::Environment(environment) => environment.as_str(),
        }
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFile::Base => f.write_str("base configuration"),
            ConfigFile::Environment(environment) => {
                write!(f, "{environment} environment configuration")
            }
        }
    }
}

/// Errors raised while assembling a configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate the {description} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        description: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to load the {description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        description: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[source] io::Error),

    #[error("failed to build the configuration: {0}")]
    Builder(#[source] config::ConfigError),

    #[error("failed to deserialize the configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads a configuration from `./configuration`.
///
/// Reads `base.(yaml|yml|json)`, then the file named after the current [`Environment`], then
/// applies `APP_`-prefixed environment variables (`APP_PIPELINE__NAME=...`).
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads a configuration from an explicit directory and environment.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let mut builder = config::Config::builder();
    for file in [ConfigFile::Base, ConfigFile::Environment(environment)] {
        let path = find_configuration_file(directory, file)?;
        builder = builder.add_source(config::File::from(path.as_path()));

        // Building after each file pins parse errors to the file that caused them.
        builder
            .build_cloned()
            .map_err(|source| LoadConfigError::ConfigurationFileLoad {
                description: file.to_string(),
                path: path.clone(),
                source,
            })?;
    }

    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);
    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);
        for key in T::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn find_configuration_file(directory: &Path, file: ConfigFile) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{}.{extension}", file.stem())))
        .collect();

    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let attempted = candidates
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::ConfigurationFileMissing {
        description: file.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        size: u32,
    }

    impl Config for Sample {
        const LIST_PARSE_KEYS: &'static [&'static str] = &[];
    }

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "scd2-config-{label}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let dir = scratch_dir("override");
        std::fs::write(dir.join("base.yaml"), "name: base\nsize: 1\n").unwrap();
        std::fs::write(dir.join("prod.yaml"), "size: 7\n").unwrap();

        let sample: Sample = load_config_from(&dir, Environment::Prod).unwrap();
        assert_eq!(sample.name, "base");
        assert_eq!(sample.size, 7);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_environment_file_is_reported() {
        let dir = scratch_dir("missing");
        std::fs::write(dir.join("base.json"), r#"{"name": "base", "size": 1}"#).unwrap();

        let err = load_config_from::<Sample>(&dir, Environment::Dev).unwrap_err();
        assert!(matches!(err, LoadConfigError::ConfigurationFileMissing { .. }));
        assert!(err.to_string().contains("dev environment configuration"));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = std::env::temp_dir().join("scd2-config-does-not-exist");
        let err = load_config_from::<Sample>(&dir, Environment::Dev).unwrap_err();
        assert!(matches!(err, LoadConfigError::MissingConfigurationDirectory(_)));
    }
}
