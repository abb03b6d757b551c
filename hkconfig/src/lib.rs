//! # Heimklang configuration
//!
//! Configuration of the control point, stored as a YAML tree:
//! - an embedded default document,
//! - merged with an optional `config.yaml` from the configuration directory,
//! - then patched by `HEIMKLANG_CONFIG__SECTION__KEY=value` environment variables.
//!
//! ```no_run
//! use hkconfig::get_config;
//!
//! let config = get_config();
//! let quiet = config.get_renderer_debounce_ms()?;
//! let base = config.get_gateway_base_url();
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = include_str!("heimklang.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(Config::load_config("").unwrap_or_else(|err| {
        warn!(error = %err, "Cannot load configuration, using embedded defaults");
        Config::from_defaults()
    }));
}

const ENV_CONFIG_DIR: &str = "HEIMKLANG_CONFIG";
const ENV_PREFIX: &str = "HEIMKLANG_CONFIG__";
const CONFIG_DIR_NAME: &str = ".heimklang";
const CONFIG_FILE_NAME: &str = "config.yaml";

pub const DEFAULT_GATEWAY_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_VOLUME_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_OPTIMISTIC_VOLUME: bool = true;
pub const DEFAULT_INSTANCE_ID: &str = "0";
pub const DEFAULT_ROOT_ID: &str = "0";
pub const DEFAULT_LOG_LEVEL: &str = "info";

macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path)? {
                Value::Number(n) if n.is_u64() => Ok(n.as_u64().unwrap_or($default)),
                Value::String(s) => Ok(s.trim().parse().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path)? {
                Value::Bool(b) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => s,
                Ok(Value::Number(n)) => n.to_string(),
                _ => $default.to_string(),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration tree of the control point.
#[derive(Debug)]
pub struct Config {
    path: Option<PathBuf>,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Configuration made of the embedded defaults only, never written to disk.
    pub fn from_defaults() -> Self {
        let value: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap_or(Value::Null);
        Self {
            path: None,
            data: Mutex::new(Self::lower_keys_value(value)),
        }
    }

    /// Embedded defaults merged with a YAML document. Environment overrides
    /// are not applied.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external: Value = serde_yaml::from_str(yaml)?;
        merge_yaml(&mut value, &external);
        Ok(Self {
            path: None,
            data: Mutex::new(Self::lower_keys_value(value)),
        })
    }

    /// Finds the configuration directory, trying in order the provided
    /// directory, `$HEIMKLANG_CONFIG`, `./.heimklang` and `~/.heimklang`.
    fn find_config_dir(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        let local = Path::new(CONFIG_DIR_NAME);
        if local.exists() {
            return local.to_path_buf();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        local.to_path_buf()
    }

    /// Loads the configuration.
    ///
    /// A missing `config.yaml` is not an error: the embedded defaults are
    /// used and nothing is written until a setter is called.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        let path = config_dir.join(CONFIG_FILE_NAME);

        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut value, &external);
            }
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using embedded defaults");
            }
        }

        let mut value = Self::lower_keys_value(value);
        Self::apply_env_overrides(&mut value);

        Ok(Self {
            path: Some(path),
            data: Mutex::new(value),
        })
    }

    /// Writes the configuration back to its file. Configurations built from
    /// strings or defaults have no file and are kept in memory.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Sets a value at `path` (e.g. `&["renderer", "debounce_ms"]`) and saves.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value)?;
        drop(data);
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

    /// Gets the value at `path`, failing when the path does not exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        let mut current = &*data;
        for (i, key) in path.iter().enumerate() {
            let Value::Mapping(map) = current else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            };
            match map.get(&Value::String(key.to_lowercase())) {
                Some(next) => current = next,
                None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = serde_yaml::from_str::<Value>(&value)
                    .unwrap_or_else(|_| Value::String(value.clone()));
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(variable = %key, error = %err, "Ignoring environment override");
                }
            }
        }
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(k, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    impl_string_config!(
        get_gateway_base_url,
        set_gateway_base_url,
        &["gateway", "base_url"],
        DEFAULT_GATEWAY_BASE_URL
    );

    impl_u64_config!(
        get_gateway_timeout_secs,
        set_gateway_timeout_secs,
        &["gateway", "timeout_secs"],
        DEFAULT_GATEWAY_TIMEOUT_SECS
    );

    impl_u64_config!(
        get_renderer_debounce_ms,
        set_renderer_debounce_ms,
        &["renderer", "debounce_ms"],
        DEFAULT_DEBOUNCE_MS
    );

    impl_u64_config!(
        get_volume_debounce_ms,
        set_volume_debounce_ms,
        &["renderer", "volume_debounce_ms"],
        DEFAULT_VOLUME_DEBOUNCE_MS
    );

    impl_bool_config!(
        get_optimistic_volume,
        set_optimistic_volume,
        &["renderer", "optimistic_volume"],
        DEFAULT_OPTIMISTIC_VOLUME
    );

    impl_string_config!(
        get_default_instance_id,
        set_default_instance_id,
        &["renderer", "default_instance_id"],
        DEFAULT_INSTANCE_ID
    );

    impl_string_config!(
        get_browser_root_id,
        set_browser_root_id,
        &["browser", "root_id"],
        DEFAULT_ROOT_ID
    );

    impl_string_config!(get_log_level, set_log_level, &["log", "level"], DEFAULT_LOG_LEVEL);
}

/// Returns the global configuration, loaded on first access.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Recursively merges `external` into `default`: mappings are merged key by
/// key, scalars and sequences are replaced.
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

    #[test]
    fn test_embedded_defaults() {
        let config = Config::from_defaults();
        assert_eq!(config.get_gateway_base_url(), DEFAULT_GATEWAY_BASE_URL);
        assert_eq!(config.get_renderer_debounce_ms().unwrap(), 500);
        assert_eq!(config.get_volume_debounce_ms().unwrap(), 500);
        assert!(config.get_optimistic_volume().unwrap());
        assert_eq!(config.get_default_instance_id(), "0");
        assert_eq!(config.get_browser_root_id(), "0");
        assert_eq!(config.get_log_level(), "info");
    }

    #[test]
    fn test_yaml_overrides_are_merged() {
        let config = Config::from_yaml_str(
            "Renderer:\n  Debounce_MS: 250\n  optimistic_volume: false\n",
        )
        .unwrap();
        assert_eq!(config.get_renderer_debounce_ms().unwrap(), 250);
        assert!(!config.get_optimistic_volume().unwrap());
        // untouched keys keep their defaults
        assert_eq!(config.get_volume_debounce_ms().unwrap(), 500);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let config = Config::from_defaults();
        assert!(config.get_value(&["nope", "missing"]).is_err());
    }

    #[test]
    fn test_set_value_creates_intermediate_maps() {
        let config = Config::from_defaults();
        config
            .set_value(&["extra", "nested", "key"], Value::Bool(true))
            .unwrap();
        assert_eq!(
            config.get_value(&["extra", "nested", "key"]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_load_and_save_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "gateway:\n  base_url: \"http://nas.local:9000/api\"\n",
        )
        .unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.get_gateway_base_url(), "http://nas.local:9000/api");

        config.set_renderer_debounce_ms(100).unwrap();
        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(reloaded.get_renderer_debounce_ms().unwrap(), 100);
    }

    #[test]
    fn test_merge_replaces_scalars() {
        let mut base: Value = serde_yaml::from_str("a: 1\nb:\n  c: 2\n").unwrap();
        let ext: Value = serde_yaml::from_str("b:\n  c: 3\n  d: 4\n").unwrap();
        merge_yaml(&mut base, &ext);
        let expected: Value = serde_yaml::from_str("a: 1\nb:\n  c: 3\n  d: 4\n").unwrap();
        assert_eq!(base, expected);
    }
}
