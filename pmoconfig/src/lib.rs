//! # PMOAirPlay Configuration Module
//!
//! Configuration of the media server and of the commands sent to receivers:
//! - Loading configuration from a `config.yaml` file
//! - Merging with the embedded default configuration
//! - Environment variable overrides (`PMOAIRPLAY_CONFIG__<KEY>`)
//! - Validated getters and setters
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::Config;
//!
//! let config = Config::load_config("")?;
//! let port = config.get_http_port()?;
//! let transition = config.get_transition()?;
//!
//! config.set_http_port(9000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use pmoutils::guess_local_ip;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmoairplay.yaml");

const CONFIG_DIR_NAME: &str = ".pmoairplay";
const CONFIG_FILE_NAME: &str = "config.yaml";
const ENV_CONFIG_DIR: &str = "PMOAIRPLAY_CONFIG";
const ENV_PREFIX: &str = "PMOAIRPLAY_CONFIG__";

pub const DEFAULT_HTTP_PORT: u16 = 9999;
pub const MIN_HTTP_PORT: u16 = 1024;

/// Image transitions accepted by receivers, in presentation order.
pub const TRANSITION_NAMES: &[&str] = &["None", "Random", "Dissolve", "SlideLeft", "SlideRight"];
pub const DEFAULT_TRANSITION: &str = "None";

const KEY_HTTP_PORT: &[&str] = &["http_port"];
const KEY_TRANSITION: &[&str] = &["transition"];
const KEY_ADVERTISED_HOST: &[&str] = &["advertised_host"];

/// Typed snapshot of the configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub http_port: u16,
    /// One of [`TRANSITION_NAMES`].
    pub transition: String,
    pub advertised_host: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            transition: DEFAULT_TRANSITION.to_string(),
            advertised_host: None,
        }
    }
}

/// Configuration manager for PMOAirPlay
///
/// The YAML tree is kept as loaded, so keys unknown to this version survive
/// a [`Config::save`].
#[derive(Debug)]
pub struct Config {
    config_dir: PathBuf,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str, vars: &[(String, String)]) -> PathBuf {
        // 1. Try provided directory
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        // 2. Try environment variable
        if let Some((_, env_path)) = vars.iter().find(|(k, _)| k == ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return PathBuf::from(CONFIG_DIR_NAME);
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        PathBuf::from(CONFIG_DIR_NAME)
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Cannot create config directory {}", path.display()))?;
        }

        if !path.is_dir() {
            bail!("{} is not a directory", path.display());
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")
            .with_context(|| format!("Config directory {} is not writable", path.display()))?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;
        Ok(())
    }

    /// Loads the configuration, reading overrides from the process environment
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOAIRPLAY_CONFIG` environment variable
    /// 3. `.pmoairplay` in the current directory
    /// 4. `.pmoairplay` in the user's home directory
    pub fn load_config(directory: &str) -> Result<Self> {
        Self::load_config_with_env(directory, env::vars())
    }

    /// Loads the configuration with an explicit set of environment variables
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies `PMOAIRPLAY_CONFIG__*` overrides
    /// 5. Validates the result and saves it
    pub fn load_config_with_env<I>(directory: &str, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        let config_dir = Self::find_config_dir(directory, &vars);
        Self::validate_config_dir(&config_dir)?;
        info!(config_dir = %config_dir.display(), "Using config directory");

        let path = config_dir.join(CONFIG_FILE_NAME);
        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)
                    .with_context(|| format!("Invalid YAML in {}", path.display()))?;
                merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using default embedded config");
            }
        }

        Self::apply_env_overrides(&mut config_value, &vars);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config
            .settings()
            .with_context(|| format!("Invalid configuration in {}", config.path.display()))?;
        config.save()?;
        Ok(config)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.lock())?;
        fs::write(&self.path, yaml)
            .with_context(|| format!("Cannot write {}", self.path.display()))?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        Self::set_value_internal(&mut self.lock(), path, value)?;
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        Self::get_value_internal(&self.lock(), path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(&Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value, vars: &[(String, String)]) {
        for (key, value) in vars {
            let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let key_path = suffix.split("__").collect::<Vec<_>>();
            if let Err(err) =
                Self::set_value_internal(config, &key_path, Self::convert_env_value(value))
            {
                warn!(env_var = %key, "Ignoring environment override: {}", err);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| {
                        let k = match k {
                            Value::String(s) => Value::String(s.to_lowercase()),
                            other => other,
                        };
                        (k, Self::lower_keys_value(v))
                    })
                    .collect(),
            ),
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// All validated values at once.
    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings {
            http_port: self.get_http_port()?,
            transition: self.get_transition()?,
            advertised_host: self.get_advertised_host(),
        })
    }

    /// Gets the media server port, which must lie in 1024-65535
    pub fn get_http_port(&self) -> Result<u16> {
        let port = match self.get_value(KEY_HTTP_PORT) {
            Err(_) | Ok(Value::Null) => return Ok(DEFAULT_HTTP_PORT),
            Ok(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| anyhow!("HTTP port {} is not a positive integer", n))?,
            Ok(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| anyhow!("HTTP port '{}' is not a number", s))?,
            Ok(other) => bail!("HTTP port has an unexpected value {:?}", other),
        };
        check_port(port)
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        check_port(port.into())?;
        self.set_value(KEY_HTTP_PORT, Value::Number(Number::from(port)))
    }

    /// Gets the image transition sent with every pushed picture
    ///
    /// The name is matched case-insensitively and returned in its canonical
    /// spelling (`slideleft` gives `SlideLeft`).
    pub fn get_transition(&self) -> Result<String> {
        match self.get_value(KEY_TRANSITION) {
            Err(_) | Ok(Value::Null) => Ok(DEFAULT_TRANSITION.to_string()),
            Ok(Value::String(s)) => canonical_transition(&s),
            Ok(other) => bail!("Transition has an unexpected value {:?}", other),
        }
    }

    pub fn set_transition(&self, transition: &str) -> Result<()> {
        let name = canonical_transition(transition)?;
        self.set_value(KEY_TRANSITION, Value::String(name))
    }

    /// Host put in media URLs, when one is configured
    pub fn get_advertised_host(&self) -> Option<String> {
        match self.get_value(KEY_ADVERTISED_HOST) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    pub fn set_advertised_host(&self, host: Option<String>) -> Result<()> {
        let value = host.map_or(Value::Null, Value::String);
        self.set_value(KEY_ADVERTISED_HOST, value)
    }

    /// Gets the host used in media URLs
    ///
    /// Returns the advertised host, or the guessed local IP address if none is configured.
    pub fn get_media_host(&self) -> String {
        self.get_advertised_host().unwrap_or_else(guess_local_ip)
    }
}

fn canonical_transition(name: &str) -> Result<String> {
    TRANSITION_NAMES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(name.trim()))
        .map(|known| known.to_string())
        .ok_or_else(|| {
            anyhow!(
                "Unknown image transition '{}', expected one of {}",
                name,
                TRANSITION_NAMES.join(", ")
            )
        })
}

fn check_port(port: u64) -> Result<u16> {
    match u16::try_from(port) {
        Ok(p) if p >= MIN_HTTP_PORT => Ok(p),
        _ => bail!(
            "HTTP port {} is outside of {}-{}",
            port,
            MIN_HTTP_PORT,
            u16::MAX
        ),
    }
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key, scalars and sequences from `external`
/// replace those of `default`.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(dir: &TempDir, vars: &[(&str, &str)]) -> Result<Config> {
        Config::load_config_with_env(
            dir.path().to_str().unwrap(),
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn test_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir, &[]).unwrap();

        assert_eq!(config.settings().unwrap(), Settings::default());
        // the merged configuration is written back
        assert!(dir.path().join("config.yaml").exists());
    }

    #[test]
    fn test_file_values_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "HTTP_PORT: 8000\ntransition: slideleft\nextra:\n  kept: true\n",
        )
        .unwrap();

        let config = load(&dir, &[]).unwrap();
        let settings = config.settings().unwrap();
        assert_eq!(settings.http_port, 8000);
        assert_eq!(settings.transition, "SlideLeft");
        assert_eq!(settings.advertised_host, None);
        assert_eq!(config.get_value(&["extra", "kept"]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(
            &dir,
            &[
                ("PMOAIRPLAY_CONFIG__HTTP_PORT", "9100"),
                ("PMOAIRPLAY_CONFIG__TRANSITION", "Dissolve"),
                ("PMOAIRPLAY_CONFIG__ADVERTISED_HOST", "192.168.1.5"),
                ("UNRELATED", "1"),
            ],
        )
        .unwrap();

        assert_eq!(
            config.settings().unwrap(),
            Settings {
                http_port: 9100,
                transition: "Dissolve".to_string(),
                advertised_host: Some("192.168.1.5".to_string()),
            }
        );
        assert_eq!(config.get_media_host(), "192.168.1.5");
    }

    #[test]
    fn test_config_dir_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let config = Config::load_config_with_env(
            "",
            [(
                ENV_CONFIG_DIR.to_string(),
                nested.to_string_lossy().to_string(),
            )],
        )
        .unwrap();
        assert_eq!(config.config_dir(), nested);
        assert!(nested.join("config.yaml").exists());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir, &[("PMOAIRPLAY_CONFIG__HTTP_PORT", "80")]).is_err());
        assert!(load(&dir, &[("PMOAIRPLAY_CONFIG__HTTP_PORT", "70000")]).is_err());
        assert!(load(&dir, &[("PMOAIRPLAY_CONFIG__TRANSITION", "Wipe")]).is_err());

        fs::write(dir.path().join("config.yaml"), "http_port: abc\n").unwrap();
        assert!(load(&dir, &[]).is_err());
    }

    #[test]
    fn test_setters_validate_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir, &[]).unwrap();

        assert!(config.set_http_port(80).is_err());
        config.set_http_port(12000).unwrap();
        assert!(config.set_transition("Wipe").is_err());
        config.set_transition("slideright").unwrap();
        config
            .set_advertised_host(Some("media.local".to_string()))
            .unwrap();

        let reloaded = load(&dir, &[]).unwrap();
        assert_eq!(
            reloaded.settings().unwrap(),
            Settings {
                http_port: 12000,
                transition: "SlideRight".to_string(),
                advertised_host: Some("media.local".to_string()),
            }
        );

        reloaded.set_advertised_host(None).unwrap();
        assert_eq!(reloaded.get_advertised_host(), None);
    }

    #[test]
    fn test_merge_yaml() {
        let mut default: Value = serde_yaml::from_str("a: 1\nb:\n  c: 2\n  d: 3\n").unwrap();
        let external: Value = serde_yaml::from_str("b:\n  c: 20\ne: 5\n").unwrap();
        merge_yaml(&mut default, &external);

        let expected: Value = serde_yaml::from_str("a: 1\nb:\n  c: 20\n  d: 3\ne: 5\n").unwrap();
        assert_eq!(default, expected);
    }
}
