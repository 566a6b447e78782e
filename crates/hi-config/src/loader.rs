//! YAML loader with include and environment tags
//!
//! Two custom tags are understood:
//! - `!include path` - splice in another YAML file (relative to the including file)
//! - `!env_var VAR` - substitute an environment variable
//!
//! Any other tag is kept as-is with its inner value processed.

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader that resolves custom tags
pub struct YamlLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    /// Files currently being loaded, to detect include cycles
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!(path = ?path, "Loading YAML file");

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let processed_key = self.process_value(k, source_path)?;
                    let processed_value = self.process_value(v, source_path)?;
                    result.insert(processed_key, processed_value);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => {
                let result: ConfigResult<Vec<Value>> = seq
                    .into_iter()
                    .map(|v| self.process_value(v, source_path))
                    .collect();
                Ok(Value::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        let value = tagged.value;

        trace!(tag = %tag, "Processing tag");

        match tag.as_str() {
            "!include" => {
                let include_path = self.value_to_path(&value, source_path)?;
                debug!(path = ?include_path, "Including file");
                self.load_file(&include_path)
            }
            "!env_var" => self.process_env_var(value),
            _ => {
                let processed = self.process_value(value, source_path)?;
                Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                    tag: tagged.tag,
                    value: processed,
                })))
            }
        }
    }

    /// `!env_var VAR` or `!env_var VAR fallback`
    fn process_env_var(&self, value: Value) -> ConfigResult<Value> {
        let directive = match value {
            Value::String(s) => s,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "!env_var".to_string(),
                    reason: "environment variable name must be a string".to_string(),
                })
            }
        };

        let mut parts = directive.splitn(2, ' ');
        let var_name = parts.next().unwrap_or_default().to_string();
        let fallback = parts.next().map(str::to_string);

        let env_value = match (std::env::var(&var_name), fallback) {
            (Ok(v), _) => v,
            (Err(_), Some(fallback)) => fallback,
            (Err(_), None) => return Err(ConfigError::EnvVarNotFound { var: var_name }),
        };

        debug!(var = %var_name, "Substituted env var");
        // Re-parse so numbers and booleans keep their YAML type
        Ok(serde_yaml::from_str(&env_value).unwrap_or(Value::String(env_value)))
    }

    fn value_to_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let path_str = match value {
            Value::String(s) => s.clone(),
            _ => {
                return Err(ConfigError::InvalidIncludePath {
                    path: format!("{:?}", value),
                    reason: "path must be a string".to_string(),
                })
            }
        };

        let base_dir = source_path.parent().unwrap_or(&self.config_dir);
        let resolved = if Path::new(&path_str).is_absolute() {
            PathBuf::from(&path_str)
        } else {
            base_dir.join(&path_str)
        };

        Ok(resolved)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// Load a YAML file with tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_file(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
        value.as_mapping()?.get(Value::String(key.to_string()))
    }

    #[test]
    fn test_include_relative_to_including_file() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "lanes/zones.yaml",
            "zone1:\n  enabled: true\n  outputs: [fan.kitchen_extractor]\n",
        );
        write_file(
            dir.path(),
            "humidity_intelligence.yaml",
            "zones: !include lanes/zones.yaml\n",
        );

        let value = load_yaml(dir.path(), "humidity_intelligence.yaml").unwrap();
        let zones = get(&value, "zones").unwrap();
        let zone1 = get(zones, "zone1").unwrap();
        assert_eq!(get(zone1, "enabled"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_env_var_keeps_yaml_type() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("HI_TEST_INTERVAL", "7");
        write_file(
            dir.path(),
            "config.yaml",
            "interval_minutes: !env_var HI_TEST_INTERVAL\n",
        );

        let value = load_yaml(dir.path(), "config.yaml").unwrap();
        assert_eq!(get(&value, "interval_minutes").and_then(Value::as_u64), Some(7));
        std::env::remove_var("HI_TEST_INTERVAL");
    }

    #[test]
    fn test_env_var_fallback_and_missing() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "fallback.yaml",
            "label: !env_var HI_TEST_UNSET_LABEL Kitchen\n",
        );
        write_file(dir.path(), "missing.yaml", "label: !env_var HI_TEST_UNSET_LABEL\n");

        let value = load_yaml(dir.path(), "fallback.yaml").unwrap();
        assert_eq!(
            get(&value, "label"),
            Some(&Value::String("Kitchen".to_string()))
        );

        let result = load_yaml(dir.path(), "missing.yaml");
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound { .. })));
    }

    #[test]
    fn test_circular_include_detection() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "include_b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "include_a: !include a.yaml\n");

        let result = load_yaml(dir.path(), "a.yaml");
        assert!(matches!(result, Err(ConfigError::CircularInclude { .. })));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_yaml(dir.path(), "absent.yaml");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
