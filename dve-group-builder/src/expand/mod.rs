//! Configuration expander
//!
//! Walks the group tree depth-first, carrying a scoped substitution environment.
//! Iterator and expression bindings are pushed when a node is entered and popped when
//! it is left, so a binding is visible exactly in the subtree that declares it.
//!
//! Placeholder lookup order:
//! 1. iterator / expression bindings, innermost first
//! 2. configuration `vars` (expanded recursively, cycles rejected)
//! 3. process environment

pub mod expression;
pub mod placeholder;

use crate::config::{Defaults, WaveConfig};
use crate::layout::{ChildNode, GroupNode, IteratorBinding};
use crate::types::{ConfigError, Instruction, Radix};
use std::collections::{HashMap, HashSet};

/// Placement anchor DVE uses for the first group of a fresh wave view
pub const FIRST_GROUP_ANCHOR: &str = "New Group";

/// Expands a [`WaveConfig`] into a flat instruction list
pub struct Expander<'a> {
    config: &'a WaveConfig,
    environment: HashMap<String, String>,
}

impl<'a> Expander<'a> {
    /// Create an expander reading placeholders from the process environment
    pub fn new(config: &'a WaveConfig) -> Self {
        Self {
            config,
            environment: std::env::vars().collect(),
        }
    }

    /// Builder method: replace the process environment snapshot
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Expand every group, returning instructions in declaration order
    pub fn expand(&self) -> Result<Vec<Instruction>, ConfigError> {
        let mut walker = Walker {
            vars: &self.config.vars,
            environment: &self.environment,
            defaults: &self.config.defaults,
            scope: Vec::new(),
            out: Vec::new(),
            next_id: u64::from(self.config.settings.starting_id),
            seen_paths: HashSet::new(),
            previous_top: FIRST_GROUP_ANCHOR.to_string(),
        };

        for group in &self.config.groups {
            walker.with_iterators(&group.iterators, &group.location, &mut |w| {
                w.expand_group(group, None)
            })?;
        }

        log::info!(
            "Expanded {} groups into {} instructions",
            walker.seen_paths.len(),
            walker.out.len()
        );
        Ok(walker.out)
    }
}

/// The expanded group a child or subgroup is being emitted into
struct GroupContext {
    id: u32,
    path: String,
    base: String,
    radix: Option<Radix>,
    /// List entry the next subgroup is placed after in the wave view
    last_shown: String,
}

struct Walker<'a> {
    vars: &'a [(String, String)],
    environment: &'a HashMap<String, String>,
    defaults: &'a Defaults,
    scope: Vec<(String, String)>,
    out: Vec<Instruction>,
    /// Wider than the ids so running past `u32::MAX` is detectable
    next_id: u64,
    seen_paths: HashSet<String>,
    previous_top: String,
}

impl<'a> Walker<'a> {
    /// Run `body` once per element of the cross-product of `bindings`
    ///
    /// The first binding varies slowest. Iterator values are substituted before they
    /// are bound.
    fn with_iterators<F>(
        &mut self,
        bindings: &[IteratorBinding],
        location: &str,
        body: &mut F,
    ) -> Result<(), ConfigError>
    where
        F: FnMut(&mut Self) -> Result<(), ConfigError>,
    {
        let Some((first, rest)) = bindings.split_first() else {
            return body(self);
        };

        for raw in &first.values {
            let value = self.substitute(raw, location)?;
            self.scope.push((first.name.clone(), value));
            let result = self.with_iterators(rest, location, body);
            self.scope.pop();
            result?;
        }
        Ok(())
    }

    fn expand_group(
        &mut self,
        group: &GroupNode,
        parent: Option<&mut GroupContext>,
    ) -> Result<(), ConfigError> {
        let bound = self.bind_expressions(group)?;
        let result = self.emit_group(group, parent);
        self.scope.truncate(self.scope.len() - bound);
        result
    }

    fn bind_expressions(&mut self, group: &GroupNode) -> Result<usize, ConfigError> {
        let mut bound = 0;
        for binding in &group.expressions {
            let mut lookup_error = None;
            let evaluated = binding.expr.eval(&mut |name: &str| {
                match self.lookup(name, &mut Vec::new()) {
                    Ok(value) => value,
                    Err(err) => {
                        lookup_error.get_or_insert(err);
                        None
                    }
                }
            });
            if let Some(err) = lookup_error {
                self.scope.truncate(self.scope.len() - bound);
                return Err(err);
            }
            match evaluated {
                Ok(value) => {
                    log::trace!("{} = {} ({})", binding.name, value, binding.source);
                    self.scope.push((binding.name.clone(), value.to_string()));
                    bound += 1;
                }
                Err(reason) => {
                    self.scope.truncate(self.scope.len() - bound);
                    return Err(ConfigError::Expression {
                        name: binding.name.clone(),
                        expr: binding.source.clone(),
                        location: group.location.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(bound)
    }

    fn emit_group(
        &mut self,
        group: &GroupNode,
        parent: Option<&mut GroupContext>,
    ) -> Result<(), ConfigError> {
        let name = self.substitute(&group.name, &group.location)?;
        check_name(&name, &group.location, true)?;
        let own_base = self.substitute(&group.base, &group.location)?;

        let (path, base, radix, parent_id) = match &parent {
            Some(p) => (
                format!("{}|{}", p.path, name),
                format!("{}{}", p.base, own_base),
                group.radix.clone().or_else(|| p.radix.clone()),
                Some(p.id),
            ),
            None => (name.clone(), own_base, group.radix.clone(), None),
        };

        if !self.seen_paths.insert(path.clone()) {
            return Err(ConfigError::DuplicateGroup {
                path,
                location: group.location.clone(),
            });
        }

        let id = u32::try_from(self.next_id).map_err(|_| ConfigError::InvalidField {
            field: "starting_id".to_string(),
            location: "settings".to_string(),
            reason: format!("group ids run past {} at group '{}'", u32::MAX, path),
        })?;
        self.next_id += 1;
        log::debug!("Group {} -> _session_group_{} (base '{}')", path, id, base);

        let after = match parent {
            Some(p) => std::mem::replace(&mut p.last_shown, path.clone()),
            None => std::mem::replace(&mut self.previous_top, path.clone()),
        };

        self.out.push(Instruction::OpenGroup {
            id,
            parent: parent_id,
            name,
            path: path.clone(),
        });
        self.out.push(Instruction::SetCollapse {
            path: path.clone(),
            collapsed: group.collapse,
        });
        self.out.push(Instruction::ShowGroup {
            path: path.clone(),
            after,
        });

        let mut context = GroupContext {
            id,
            path: path.clone(),
            base,
            radix,
            last_shown: path.clone(),
        };

        for child in &group.children {
            self.expand_child(child, &context, &context.base, context.radix.as_ref())?;
        }

        for subgroup in &group.subgroups {
            self.with_iterators(&subgroup.iterators, &subgroup.location, &mut |w| {
                w.expand_group(subgroup, Some(&mut context))
            })?;
        }

        self.out.push(Instruction::CloseGroup { id, path });
        Ok(())
    }

    fn expand_child(
        &mut self,
        child: &ChildNode,
        group: &GroupContext,
        prefix: &str,
        inherited: Option<&Radix>,
    ) -> Result<(), ConfigError> {
        match child {
            ChildNode::Signal(signal) => {
                self.with_iterators(&signal.iterators, &signal.location, &mut |w| {
                    let path = w.substitute(&signal.path, &signal.location)?;
                    let full = format!("{}{}", prefix, path);
                    check_name(&full, &signal.location, false)?;
                    let radix = signal
                        .radix
                        .as_ref()
                        .or(inherited)
                        .unwrap_or(&w.defaults.radix)
                        .clone();
                    log::trace!("  + {} ({})", full, radix);
                    w.out.push(Instruction::AddSignal {
                        group: group.id,
                        signal: full,
                        radix,
                    });
                    Ok(())
                })
            }
            ChildNode::Divider(divider) => {
                let label = self.substitute(&divider.label, &divider.location)?;
                check_name(&label, &divider.location, false)?;
                self.out.push(Instruction::AddDivider {
                    group: group.id,
                    label,
                });
                Ok(())
            }
            ChildNode::Bundle(bundle) => {
                self.with_iterators(&bundle.iterators, &bundle.location, &mut |w| {
                    let base = w.substitute(&bundle.base, &bundle.location)?;
                    let prefix = format!("{}{}", prefix, base);
                    let radix = bundle.radix.as_ref().or(inherited);
                    for child in &bundle.children {
                        w.expand_child(child, group, &prefix, radix)?;
                    }
                    Ok(())
                })
            }
        }
    }

    fn substitute(&self, text: &str, location: &str) -> Result<String, ConfigError> {
        self.substitute_with_chain(text, location, &mut Vec::new())
    }

    fn substitute_with_chain(
        &self,
        text: &str,
        location: &str,
        chain: &mut Vec<String>,
    ) -> Result<String, ConfigError> {
        placeholder::substitute(text, location, &mut |name: &str| self.lookup(name, chain))
    }

    /// Resolve one placeholder name; `chain` tracks the variables being expanded
    fn lookup(&self, name: &str, chain: &mut Vec<String>) -> Result<Option<String>, ConfigError> {
        if let Some((_, value)) = self.scope.iter().rev().find(|(k, _)| k == name) {
            return Ok(Some(value.clone()));
        }

        if let Some((_, raw)) = self.vars.iter().find(|(k, _)| k == name) {
            if chain.iter().any(|c| c == name) {
                let mut cycle = chain.clone();
                cycle.push(name.to_string());
                return Err(ConfigError::VariableCycle {
                    name: name.to_string(),
                    chain: cycle.join(" -> "),
                });
            }
            chain.push(name.to_string());
            let value = self.substitute_with_chain(raw, &format!("vars.{}", name), chain);
            chain.pop();
            return value.map(Some);
        }

        Ok(self.environment.get(name).cloned())
    }
}

/// Reject names DVE cannot represent
///
/// Braces would break Tcl quoting; `|` is the group hierarchy separator.
fn check_name(text: &str, location: &str, is_group: bool) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidName {
        text: text.to_string(),
        location: location.to_string(),
        reason: reason.to_string(),
    };

    if text.trim().is_empty() {
        return Err(invalid("name is empty after substitution"));
    }
    if text.contains('{') || text.contains('}') {
        return Err(invalid("braces cannot be quoted in DVE commands"));
    }
    if is_group && text.contains('|') {
        return Err(invalid("'|' separates group levels and cannot appear in a group name"));
    }
    if text.contains('\n') || text.contains('\r') {
        return Err(invalid("line breaks are not allowed"));
    }
    if text.ends_with('\\') {
        return Err(invalid("a trailing backslash would escape the closing brace"));
    }
    Ok(())
}
