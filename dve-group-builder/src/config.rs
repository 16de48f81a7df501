//! Configuration loading and parsing
//!
//! The YAML file is deserialized in two steps: serde structs (with
//! `deny_unknown_fields`) cover the fixed parts of the schema, then the group tree is
//! converted into the validated [`layout`](crate::layout) model. Unknown keys are
//! rejected everywhere - DVE gives poor diagnostics for malformed generated commands,
//! so the configuration has to fail first.

use crate::layout::{self, GroupNode};
use crate::types::{ConfigError, Radix};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Radices DVE accepts when `settings.allowed_radices` is not given
pub const DEFAULT_RADICES: &[&str] = &["decimal", "binary", "hex", "oct", "ascii"];

/// A fully loaded and validated configuration
#[derive(Debug, Clone)]
pub struct WaveConfig {
    pub settings: Settings,
    pub defaults: Defaults,
    /// Configuration variables in declaration order (still unexpanded)
    pub vars: Vec<(String, String)>,
    /// Group tree, validated but not expanded
    pub groups: Vec<GroupNode>,
}

/// `settings:` section
#[derive(Debug, Clone)]
pub struct Settings {
    /// Wave view the groups are added to (DVE's default is `Wave.1`)
    pub wave_name: String,
    /// First `_session_group_<id>` number to assign
    pub starting_id: u32,
    pub allowed_radices: Vec<String>,
}

/// `defaults:` section
#[derive(Debug, Clone)]
pub struct Defaults {
    pub collapse: bool,
    pub divider_name: String,
    /// Radix used by signals with no radix-bearing ancestor
    pub radix: Radix,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    settings: RawSettings,
    #[serde(default)]
    defaults: RawDefaults,
    /// Older configurations name this section `env:`
    #[serde(default, alias = "env")]
    vars: serde_yaml::Mapping,
    groups: Vec<GroupConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    wave_name: String,
    #[serde(default = "default_starting_id")]
    starting_id: u32,
    allowed_radices: Option<Vec<String>>,
}

fn default_starting_id() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefaults {
    collapse: Option<bool>,
    divider_name: Option<String>,
    radix: Option<String>,
}

/// One entry of `groups:` or `subgroups:`
///
/// `children` stay raw YAML mappings: a child is classified by the keys it carries
/// (`path`, `divider` or `base`), which serde's untagged enums report poorly.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub base: String,
    pub radix: Option<String>,
    pub collapse: Option<bool>,
    #[serde(default)]
    pub iterators: serde_yaml::Mapping,
    #[serde(default)]
    pub expr: serde_yaml::Mapping,
    #[serde(default)]
    pub children: Vec<serde_yaml::Mapping>,
    #[serde(default)]
    pub subgroups: Vec<GroupConfig>,
}

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<WaveConfig, ConfigError> {
    log::info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(&content)?;

    log::debug!(
        "Configuration loaded: {} top-level groups, {} variables",
        config.groups.len(),
        config.vars.len()
    );
    Ok(config)
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<WaveConfig, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(content)?;

    let allowed_radices = match raw.settings.allowed_radices {
        Some(list) if list.is_empty() => {
            return Err(ConfigError::InvalidField {
                field: "allowed_radices".to_string(),
                location: "settings".to_string(),
                reason: "list must not be empty".to_string(),
            })
        }
        Some(list) => list,
        None => DEFAULT_RADICES.iter().map(|r| r.to_string()).collect(),
    };

    let settings = Settings {
        wave_name: raw.settings.wave_name,
        starting_id: raw.settings.starting_id,
        allowed_radices,
    };

    let fallback = raw.defaults.radix.unwrap_or_else(|| "hex".to_string());
    let defaults = Defaults {
        collapse: raw.defaults.collapse.unwrap_or(true),
        divider_name: raw
            .defaults
            .divider_name
            .unwrap_or_else(|| "Divider".to_string()),
        radix: check_radix(&fallback, &settings.allowed_radices, "defaults.radix")?,
    };

    let vars = raw
        .vars
        .iter()
        .map(|(key, value)| {
            let name = layout::scalar_to_string(key).ok_or_else(|| ConfigError::InvalidField {
                field: format!("{:?}", key),
                location: "vars".to_string(),
                reason: "variable names must be strings".to_string(),
            })?;
            let value = layout::scalar_to_string(value).ok_or_else(|| ConfigError::InvalidField {
                field: name.clone(),
                location: "vars".to_string(),
                reason: "variable values must be strings or numbers".to_string(),
            })?;
            Ok((name, value))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let groups = raw
        .groups
        .iter()
        .enumerate()
        .map(|(idx, group)| {
            layout::build_group(group, &format!("groups[{}]", idx), &settings, &defaults)
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(WaveConfig {
        settings,
        defaults,
        vars,
        groups,
    })
}

/// Validate a radix name against the allowed list
pub(crate) fn check_radix(
    radix: &str,
    allowed: &[String],
    location: &str,
) -> Result<Radix, ConfigError> {
    if allowed.iter().any(|a| a == radix) {
        Ok(Radix::new(radix))
    } else {
        Err(ConfigError::InvalidRadix {
            radix: radix.to_string(),
            location: location.to_string(),
            allowed: allowed.join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
settings:
  wave_name: Wave.1
groups:
  - name: Core
    base: top.core.
    children:
      - path: valid
"#;

        let config = parse_config(yaml).unwrap();
        assert_eq!(config.settings.wave_name, "Wave.1");
        assert_eq!(config.settings.starting_id, 1);
        assert_eq!(config.settings.allowed_radices.len(), DEFAULT_RADICES.len());
        assert!(config.defaults.collapse);
        assert_eq!(config.defaults.divider_name, "Divider");
        assert_eq!(config.defaults.radix.as_str(), "hex");
        assert_eq!(config.groups.len(), 1);
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let yaml = r#"
settings:
  wave_name: Wave.1
signals: []
groups: []
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("unknown field `signals`"));
    }

    #[test]
    fn test_unknown_group_key_rejected() {
        let yaml = r#"
settings:
  wave_name: Wave.1
groups:
  - name: Core
    colapse: false
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("colapse"));
    }

    #[test]
    fn test_missing_wave_name() {
        let yaml = r#"
settings:
  starting_id: 4
groups: []
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("wave_name"));
    }

    #[test]
    fn test_fallback_radix_must_be_allowed() {
        let yaml = r#"
settings:
  wave_name: Wave.1
  allowed_radices: [binary, hex]
defaults:
  radix: decimal
groups: []
"#;
        let err = parse_config(yaml).unwrap_err();
        match err {
            ConfigError::InvalidRadix { radix, location, .. } => {
                assert_eq!(radix, "decimal");
                assert_eq!(location, "defaults.radix");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_vars_keep_declaration_order() {
        let yaml = r#"
settings:
  wave_name: Wave.1
vars:
  zeta: top
  alpha: 3
groups: []
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(
            config.vars,
            vec![
                ("zeta".to_string(), "top".to_string()),
                ("alpha".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_env_section_accepted_as_vars() {
        let yaml = r#"
settings:
  wave_name: Wave.1
  starting_id: 5
  allowed_radices: [decimal, binary, hex]
defaults:
  collapse: false
  divider_name: "----"
env:
  core: top.core
  issue: "${core}.issue"
groups:
  - name: Issue
    base: "${issue}."
    children:
      - path: valid
        radix: binary
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(
            config.vars,
            vec![
                ("core".to_string(), "top.core".to_string()),
                ("issue".to_string(), "${core}.issue".to_string()),
            ]
        );
        assert_eq!(config.settings.starting_id, 5);
    }
}
