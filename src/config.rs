use crate::energy::CalculatorOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level emodel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmodelConfig {
    pub model: ModelConfig,
    pub calculator: CalculatorConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Energy model file used when `--model` is not given.
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("energy_model"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    /// Cluster idle state whose entries are counted as cluster wake-ups.
    pub cluster_wakeup_state: String,
    /// CPU idle state whose entries are counted as core wake-ups.
    pub core_wakeup_state: String,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        let opts = CalculatorOptions::default();
        Self {
            cluster_wakeup_state: opts.cluster_wakeup_state,
            core_wakeup_state: opts.core_wakeup_state,
        }
    }
}

impl CalculatorConfig {
    pub fn options(&self) -> CalculatorOptions {
        CalculatorOptions {
            cluster_wakeup_state: self.cluster_wakeup_state.clone(),
            core_wakeup_state: self.core_wakeup_state.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Baseline verbosity; `-v` flags add to it.
    pub verbosity: u8,
}

const SYSTEM_CONFIG: &str = "/etc/emodel/config.toml";

fn load_system() -> Option<toml::Value> {
    let content = std::fs::read_to_string(Path::new(SYSTEM_CONFIG)).ok()?;
    toml::from_str(&content).ok()
}

/// Load the user config file (~/.config/emodel/config.toml) if it exists.
fn load_user() -> Option<toml::Value> {
    let path = dirs::config_dir()?.join("emodel").join("config.toml");
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Recursively merge two TOML values. Tables are merged key-by-key;
/// all other types in `overlay` replace `base`.
fn merge_values(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_values(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

fn load_from_path(path: &Path) -> EmodelConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            log::warn!("failed to parse config at {}: {}", path.display(), e);
            EmodelConfig::default()
        }),
        Err(e) => {
            log::warn!("failed to read config at {}: {}", path.display(), e);
            EmodelConfig::default()
        }
    }
}

/// Load the merged config: system defaults, then user overrides.
/// If `override_path` is provided, use only that file instead.
pub fn load(override_path: Option<&Path>) -> EmodelConfig {
    if let Some(path) = override_path {
        return load_from_path(path);
    }

    let merged = match (load_system(), load_user()) {
        (Some(s), Some(u)) => Some(merge_values(s, u)),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    };

    match merged {
        Some(value) => value.try_into().unwrap_or_else(|e| {
            log::warn!("failed to deserialize config: {}", e);
            EmodelConfig::default()
        }),
        None => EmodelConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmodelConfig::default();
        assert_eq!(config.model.path, PathBuf::from("energy_model"));
        assert_eq!(config.calculator.cluster_wakeup_state, "C1");
        assert_eq!(config.calculator.core_wakeup_state, "WFI");
        assert_eq!(config.report.verbosity, 0);
        assert_eq!(config.calculator.options(), CalculatorOptions::default());
    }

    #[test]
    fn test_merge_values_tables() {
        let base: toml::Value = toml::from_str(
            r#"
            [calculator]
            cluster_wakeup_state = "C1"
            core_wakeup_state = "WFI"
            [report]
            verbosity = 1
        "#,
        )
        .unwrap();

        let overlay: toml::Value = toml::from_str(
            r#"
            [calculator]
            core_wakeup_state = "C0"
        "#,
        )
        .unwrap();

        let merged = merge_values(base, overlay);
        let table = merged.as_table().unwrap();

        let calc = table["calculator"].as_table().unwrap();
        assert_eq!(calc["core_wakeup_state"].as_str(), Some("C0"));
        assert_eq!(calc["cluster_wakeup_state"].as_str(), Some("C1"));

        let report = table["report"].as_table().unwrap();
        assert_eq!(report["verbosity"].as_integer(), Some(1));
    }

    #[test]
    fn test_merged_values_deserialize_into_config() {
        let system: toml::Value = toml::from_str("[model]\npath = \"/etc/emodel/juno.model\"\n").unwrap();
        let user: toml::Value = toml::from_str("[report]\nverbosity = 1\n").unwrap();

        let config: EmodelConfig = merge_values(system, user).try_into().unwrap();
        assert_eq!(config.model.path, PathBuf::from("/etc/emodel/juno.model"));
        assert_eq!(config.report.verbosity, 1);
        assert_eq!(config.calculator.cluster_wakeup_state, "C1");
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: EmodelConfig = toml::from_str(
            r#"
            [model]
            path = "/etc/emodel/juno.model"
        "#,
        )
        .unwrap();
        assert_eq!(config.model.path, PathBuf::from("/etc/emodel/juno.model"));
        assert_eq!(config.calculator.core_wakeup_state, "WFI");
        assert_eq!(config.report.verbosity, 0);
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[report]\nverbosity = 2\n").unwrap();
        let config = load(Some(path.as_path()));
        assert_eq!(config.report.verbosity, 2);
    }

    #[test]
    fn test_load_from_nonexistent_path() {
        let config = load_from_path(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.report.verbosity, 0);
    }

    #[test]
    fn test_load_invalid_file_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[report\n").unwrap();
        let config = load(Some(path.as_path()));
        assert_eq!(config.calculator.cluster_wakeup_state, "C1");
    }
}
