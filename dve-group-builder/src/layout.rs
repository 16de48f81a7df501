//! Validated group tree
//!
//! Converts the raw `groups:` section into typed nodes. Every node remembers its
//! location in the configuration (e.g. `groups[0].subgroups[1].children[3]`) so that
//! expansion errors can point back at the offending entry.

use crate::config::{check_radix, Defaults, GroupConfig, Settings};
use crate::expand::expression::{self, Expr};
use crate::types::{ConfigError, Radix};
use serde_yaml::{Mapping, Value};

const SIGNAL_KEYS: &[&str] = &["path", "radix", "iterators"];
const DIVIDER_KEYS: &[&str] = &["divider"];
const BUNDLE_KEYS: &[&str] = &["base", "radix", "iterators", "children"];

/// Most values a single iterator may produce
pub const MAX_ITERATOR_VALUES: i64 = 65_536;

/// A group as declared (iterators not yet expanded)
#[derive(Debug, Clone)]
pub struct GroupNode {
    pub name: String,
    pub base: String,
    pub radix: Option<Radix>,
    pub collapse: bool,
    pub iterators: Vec<IteratorBinding>,
    pub expressions: Vec<ExpressionBinding>,
    pub children: Vec<ChildNode>,
    pub subgroups: Vec<GroupNode>,
    pub location: String,
}

/// Entry of a group's `children:` list
#[derive(Debug, Clone)]
pub enum ChildNode {
    Signal(SignalNode),
    Divider(DividerNode),
    Bundle(BundleNode),
}

#[derive(Debug, Clone)]
pub struct SignalNode {
    /// Path template relative to the enclosing bases
    pub path: String,
    pub radix: Option<Radix>,
    pub iterators: Vec<IteratorBinding>,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct DividerNode {
    pub label: String,
    pub location: String,
}

/// A `base:` prefix shared by a list of children
#[derive(Debug, Clone)]
pub struct BundleNode {
    pub base: String,
    pub radix: Option<Radix>,
    pub iterators: Vec<IteratorBinding>,
    pub children: Vec<ChildNode>,
    pub location: String,
}

/// Iterator name bound to its ordered values
///
/// Values may still contain placeholders; they are substituted when bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratorBinding {
    pub name: String,
    pub values: Vec<String>,
}

/// Derived integer variable, evaluated once per iteration
#[derive(Debug, Clone)]
pub struct ExpressionBinding {
    pub name: String,
    pub source: String,
    pub expr: Expr,
}

/// Render a YAML scalar as placeholder text
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// True if `name` can be used inside `${...}`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn build_group(
    raw: &GroupConfig,
    location: &str,
    settings: &Settings,
    defaults: &Defaults,
) -> Result<GroupNode, ConfigError> {
    let radix = raw
        .radix
        .as_deref()
        .map(|r| check_radix(r, &settings.allowed_radices, &format!("{}.radix", location)))
        .transpose()?;

    let iterators = parse_iterators(&raw.iterators, location)?;
    let expressions = parse_expressions(&raw.expr, location)?;

    let children = raw
        .children
        .iter()
        .enumerate()
        .map(|(idx, child)| {
            build_child(
                child,
                &format!("{}.children[{}]", location, idx),
                settings,
                defaults,
            )
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let subgroups = raw
        .subgroups
        .iter()
        .enumerate()
        .map(|(idx, sg)| {
            build_group(
                sg,
                &format!("{}.subgroups[{}]", location, idx),
                settings,
                defaults,
            )
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(GroupNode {
        name: raw.name.clone(),
        base: raw.base.clone(),
        radix,
        collapse: raw.collapse.unwrap_or(defaults.collapse),
        iterators,
        expressions,
        children,
        subgroups,
        location: location.to_string(),
    })
}

fn build_child(
    raw: &Mapping,
    location: &str,
    settings: &Settings,
    defaults: &Defaults,
) -> Result<ChildNode, ConfigError> {
    let keys = raw
        .keys()
        .map(|k| {
            k.as_str().map(str::to_string).ok_or_else(|| ConfigError::InvalidField {
                field: format!("{:?}", k),
                location: location.to_string(),
                reason: "keys must be strings".to_string(),
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;
    let has = |key: &str| keys.iter().any(|k| k == key);

    if has("divider") {
        check_keys(&keys, DIVIDER_KEYS, location)?;
        let label = match raw.get("divider") {
            Some(Value::Null) | None => defaults.divider_name.clone(),
            Some(value) => scalar_to_string(value).ok_or_else(|| ConfigError::InvalidField {
                field: "divider".to_string(),
                location: location.to_string(),
                reason: "divider label must be a string".to_string(),
            })?,
        };
        return Ok(ChildNode::Divider(DividerNode {
            label,
            location: location.to_string(),
        }));
    }

    if has("path") {
        check_keys(&keys, SIGNAL_KEYS, location)?;
        let path = string_field(raw, "path", location)?;
        if path.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "path".to_string(),
                location: location.to_string(),
                reason: "signal path must not be empty".to_string(),
            });
        }
        return Ok(ChildNode::Signal(SignalNode {
            path,
            radix: child_radix(raw, location, settings)?,
            iterators: child_iterators(raw, location)?,
            location: location.to_string(),
        }));
    }

    if has("base") {
        check_keys(&keys, BUNDLE_KEYS, location)?;
        let children = match raw.get("children") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| {
                    let child_location = format!("{}.children[{}]", location, idx);
                    match item {
                        Value::Mapping(map) => build_child(map, &child_location, settings, defaults),
                        _ => Err(ConfigError::InvalidField {
                            field: "children".to_string(),
                            location: child_location,
                            reason: "each child must be a mapping".to_string(),
                        }),
                    }
                })
                .collect::<Result<Vec<_>, ConfigError>>()?,
            Some(_) => {
                return Err(ConfigError::InvalidField {
                    field: "children".to_string(),
                    location: location.to_string(),
                    reason: "children must be a list".to_string(),
                })
            }
        };
        return Ok(ChildNode::Bundle(BundleNode {
            base: string_field(raw, "base", location)?,
            radix: child_radix(raw, location, settings)?,
            iterators: child_iterators(raw, location)?,
            children,
            location: location.to_string(),
        }));
    }

    Err(ConfigError::MissingField {
        field: "path, divider or base".to_string(),
        location: location.to_string(),
    })
}

fn check_keys(keys: &[String], allowed: &[&str], location: &str) -> Result<(), ConfigError> {
    match keys.iter().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(ConfigError::UnknownKey {
            key: key.clone(),
            location: location.to_string(),
            allowed: allowed.join(", "),
        }),
        None => Ok(()),
    }
}

fn string_field(raw: &Mapping, field: &str, location: &str) -> Result<String, ConfigError> {
    match raw.get(field) {
        Some(Value::Null) | None => Ok(String::new()),
        Some(value) => scalar_to_string(value).ok_or_else(|| ConfigError::InvalidField {
            field: field.to_string(),
            location: location.to_string(),
            reason: "expected a string".to_string(),
        }),
    }
}

fn child_radix(
    raw: &Mapping,
    location: &str,
    settings: &Settings,
) -> Result<Option<Radix>, ConfigError> {
    match raw.get("radix") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(r)) => Ok(Some(check_radix(
            r,
            &settings.allowed_radices,
            &format!("{}.radix", location),
        )?)),
        Some(_) => Err(ConfigError::InvalidField {
            field: "radix".to_string(),
            location: location.to_string(),
            reason: "radix must be a string".to_string(),
        }),
    }
}

fn child_iterators(raw: &Mapping, location: &str) -> Result<Vec<IteratorBinding>, ConfigError> {
    match raw.get("iterators") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Mapping(map)) => parse_iterators(map, location),
        Some(_) => Err(ConfigError::InvalidField {
            field: "iterators".to_string(),
            location: location.to_string(),
            reason: "iterators must be a mapping of name to values".to_string(),
        }),
    }
}

/// Parse an `iterators:` mapping, keeping declaration order
pub(crate) fn parse_iterators(
    raw: &Mapping,
    location: &str,
) -> Result<Vec<IteratorBinding>, ConfigError> {
    let mut bindings: Vec<IteratorBinding> = Vec::with_capacity(raw.len());

    for (key, value) in raw {
        let name = binding_name(key, location)?;
        if bindings.iter().any(|b| b.name == name) {
            return Err(ConfigError::InvalidIterator {
                name,
                location: location.to_string(),
                reason: "declared twice".to_string(),
            });
        }
        let values = iterator_values(&name, value, location)?;
        bindings.push(IteratorBinding { name, values });
    }

    Ok(bindings)
}

fn binding_name(key: &Value, location: &str) -> Result<String, ConfigError> {
    let name = key.as_str().ok_or_else(|| ConfigError::InvalidField {
        field: format!("{:?}", key),
        location: location.to_string(),
        reason: "binding names must be strings".to_string(),
    })?;
    if !is_identifier(name) {
        return Err(ConfigError::InvalidField {
            field: name.to_string(),
            location: location.to_string(),
            reason: "binding names must be identifiers ([A-Za-z_][A-Za-z0-9_]*)".to_string(),
        });
    }
    Ok(name.to_string())
}

fn iterator_values(name: &str, value: &Value, location: &str) -> Result<Vec<String>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidIterator {
        name: name.to_string(),
        location: location.to_string(),
        reason: reason.to_string(),
    };

    match value {
        // Count form: N -> 0..N-1
        Value::Number(n) => {
            let count = n
                .as_i64()
                .ok_or_else(|| invalid("count must be an integer"))?;
            if count < 0 {
                return Err(invalid("count must not be negative"));
            }
            if count > MAX_ITERATOR_VALUES {
                return Err(invalid(&format!(
                    "count {} exceeds the limit of {} values",
                    count, MAX_ITERATOR_VALUES
                )));
            }
            Ok((0..count).map(|v| v.to_string()).collect())
        }
        Value::String(text) => {
            let (start, end) = parse_range_text(text)
                .ok_or_else(|| invalid("expected a count, a 'start..end' range, a {from, to} mapping or a list"))?;
            inclusive_range(name, start, end, location)
        }
        Value::Mapping(map) => {
            let mut from = None;
            let mut to = None;
            for (k, v) in map {
                let bound = v.as_i64();
                match k.as_str() {
                    Some("from") => from = Some(bound.ok_or_else(|| invalid("'from' must be an integer"))?),
                    Some("to") => to = Some(bound.ok_or_else(|| invalid("'to' must be an integer"))?),
                    _ => {
                        return Err(ConfigError::UnknownKey {
                            key: k.as_str().unwrap_or("<non-string>").to_string(),
                            location: format!("{}.iterators.{}", location, name),
                            allowed: "from, to".to_string(),
                        })
                    }
                }
            }
            match (from, to) {
                (Some(start), Some(end)) => inclusive_range(name, start, end, location),
                _ => Err(invalid("range mapping needs both 'from' and 'to'")),
            }
        }
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar_to_string(item).ok_or_else(|| invalid("list values must be strings or numbers")))
            .collect(),
        _ => Err(invalid("expected a count, a 'start..end' range, a {from, to} mapping or a list")),
    }
}

fn parse_range_text(text: &str) -> Option<(i64, i64)> {
    let (start, end) = text.split_once("..")?;
    let start = start.trim().parse().ok()?;
    let end = end.trim().parse().ok()?;
    Some((start, end))
}

fn inclusive_range(
    name: &str,
    start: i64,
    end: i64,
    location: &str,
) -> Result<Vec<String>, ConfigError> {
    if end < start {
        return Err(ConfigError::MalformedRange {
            name: name.to_string(),
            start,
            end,
            location: location.to_string(),
        });
    }
    let len = i128::from(end) - i128::from(start) + 1;
    if len > i128::from(MAX_ITERATOR_VALUES) {
        return Err(ConfigError::InvalidIterator {
            name: name.to_string(),
            location: location.to_string(),
            reason: format!(
                "range {}..{} has {} values, more than the limit of {}",
                start, end, len, MAX_ITERATOR_VALUES
            ),
        });
    }
    Ok((start..=end).map(|v| v.to_string()).collect())
}

fn parse_expressions(raw: &Mapping, location: &str) -> Result<Vec<ExpressionBinding>, ConfigError> {
    raw.iter()
        .map(|(key, value)| {
            let name = binding_name(key, location)?;
            let source = value.as_str().ok_or_else(|| ConfigError::InvalidField {
                field: name.clone(),
                location: format!("{}.expr", location),
                reason: "expressions must be strings".to_string(),
            })?;
            let expr = expression::parse(source).map_err(|reason| ConfigError::Expression {
                name: name.clone(),
                expr: source.to_string(),
                location: location.to_string(),
                reason,
            })?;
            Ok(ExpressionBinding {
                name,
                source: source.to_string(),
                expr,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn iterators(yaml: &str) -> Result<Vec<IteratorBinding>, ConfigError> {
        let map: Mapping = serde_yaml::from_str(yaml).unwrap();
        parse_iterators(&map, "groups[0]")
    }

    #[test]
    fn test_count_iterator() {
        let bindings = iterators("i: 3").unwrap();
        assert_eq!(bindings[0].values, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_range_iterator_is_inclusive() {
        let bindings = iterators("i: '1..4'").unwrap();
        assert_eq!(bindings[0].values, vec!["1", "2", "3", "4"]);

        let bindings = iterators("i: {from: 1, to: 4}").unwrap();
        assert_eq!(bindings[0].values, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let err = iterators("i: '4..1'").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MalformedRange { start: 4, end: 1, .. }
        ));

        let err = iterators("i: {from: 9, to: 2}").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedRange { .. }));
    }

    #[test]
    fn test_oversized_iterators_rejected() {
        for yaml in [
            "i: 9223372036854775807",
            "i: '0..9223372036854775807'",
            "i: '-9223372036854775808..9223372036854775807'",
            "i: {from: 0, to: 65536}",
        ] {
            assert!(
                matches!(iterators(yaml).unwrap_err(), ConfigError::InvalidIterator { .. }),
                "{yaml} should be rejected"
            );
        }

        let bindings = iterators("i: 65536").unwrap();
        assert_eq!(bindings[0].values.len(), 65_536);
        let bindings = iterators("i: {from: 1, to: 65536}").unwrap();
        assert_eq!(bindings[0].values.len(), 65_536);
    }

    #[test]
    fn test_list_iterator_keeps_order() {
        let bindings = iterators("lane: [north, south, 3]").unwrap();
        assert_eq!(bindings[0].values, vec!["north", "south", "3"]);
    }

    #[test]
    fn test_iterators_keep_declaration_order() {
        let bindings = iterators("z: 1\na: 2").unwrap();
        let names: Vec<_> = bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a"]);
    }

    #[test]
    fn test_bad_iterator_values() {
        assert!(matches!(
            iterators("i: -1").unwrap_err(),
            ConfigError::InvalidIterator { .. }
        ));
        assert!(matches!(
            iterators("i: 'abc'").unwrap_err(),
            ConfigError::InvalidIterator { .. }
        ));
        assert!(matches!(
            iterators("i: {from: 1, upto: 3}").unwrap_err(),
            ConfigError::UnknownKey { .. }
        ));
        assert!(matches!(
            iterators("'not valid': 2").unwrap_err(),
            ConfigError::InvalidField { .. }
        ));
    }

    #[test]
    fn test_child_classification() {
        let yaml = r#"
settings:
  wave_name: Wave.1
defaults:
  divider_name: "----"
groups:
  - name: Core
    children:
      - path: valid
        radix: binary
      - divider:
      - divider: Control
      - base: "uop_"
        children:
          - path: pc
"#;
        let config = parse_config(yaml).unwrap();
        let children = &config.groups[0].children;
        assert_eq!(children.len(), 4);
        match &children[0] {
            ChildNode::Signal(s) => {
                assert_eq!(s.path, "valid");
                assert_eq!(s.radix.as_ref().map(|r| r.as_str()), Some("binary"));
                assert_eq!(s.location, "groups[0].children[0]");
            }
            other => panic!("expected signal, got {:?}", other),
        }
        match &children[1] {
            ChildNode::Divider(d) => assert_eq!(d.label, "----"),
            other => panic!("expected divider, got {:?}", other),
        }
        match &children[2] {
            ChildNode::Divider(d) => assert_eq!(d.label, "Control"),
            other => panic!("expected divider, got {:?}", other),
        }
        match &children[3] {
            ChildNode::Bundle(b) => {
                assert_eq!(b.base, "uop_");
                assert_eq!(b.children.len(), 1);
            }
            other => panic!("expected bundle, got {:?}", other),
        }
    }

    #[test]
    fn test_child_with_extra_key_rejected() {
        let yaml = r#"
settings:
  wave_name: Wave.1
groups:
  - name: Core
    children:
      - divider: Control
        radix: hex
"#;
        match parse_config(yaml).unwrap_err() {
            ConfigError::UnknownKey { key, location, .. } => {
                assert_eq!(key, "radix");
                assert_eq!(location, "groups[0].children[0]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unclassifiable_child() {
        let yaml = r#"
settings:
  wave_name: Wave.1
groups:
  - name: Core
    children:
      - radix: hex
"#;
        assert!(matches!(
            parse_config(yaml).unwrap_err(),
            ConfigError::MissingField { .. }
        ));
    }

    #[test]
    fn test_signal_radix_validated() {
        let yaml = r#"
settings:
  wave_name: Wave.1
  allowed_radices: [hex]
groups:
  - name: Core
    subgroups:
      - name: Inner
        children:
          - path: data
            radix: binary
"#;
        match parse_config(yaml).unwrap_err() {
            ConfigError::InvalidRadix { location, .. } => {
                assert_eq!(location, "groups[0].subgroups[0].children[0].radix");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("slot"));
        assert!(is_identifier("_i2"));
        assert!(!is_identifier("2i"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
