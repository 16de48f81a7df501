//! Core types for the DVE group builder library
//!
//! This module defines the error taxonomy and the flat instruction stream that the
//! expander produces and the emitter consumes. Instructions are fully resolved: no
//! placeholder survives past expansion.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Result type for builder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error: either the configuration is unusable or the host file is.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Splice(#[from] SpliceError),
}

/// Errors raised while loading, validating or expanding a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unknown key '{key}' at {location} (allowed: {allowed})")]
    UnknownKey {
        key: String,
        location: String,
        allowed: String,
    },

    #[error("Missing required field '{field}' at {location}")]
    MissingField { field: String, location: String },

    #[error("Invalid value for '{field}' at {location}: {reason}")]
    InvalidField {
        field: String,
        location: String,
        reason: String,
    },

    #[error("Unresolved placeholder '${{{name}}}' in \"{text}\" at {location}")]
    UnresolvedPlaceholder {
        name: String,
        text: String,
        location: String,
    },

    #[error("Malformed placeholder in \"{text}\" at {location}: {reason}")]
    MalformedPlaceholder {
        text: String,
        location: String,
        reason: String,
    },

    #[error("Malformed range for iterator '{name}' at {location}: end {end} is before start {start}")]
    MalformedRange {
        name: String,
        start: i64,
        end: i64,
        location: String,
    },

    #[error("Invalid iterator '{name}' at {location}: {reason}")]
    InvalidIterator {
        name: String,
        location: String,
        reason: String,
    },

    #[error("Radix '{radix}' at {location} is not one of the allowed radices [{allowed}]")]
    InvalidRadix {
        radix: String,
        location: String,
        allowed: String,
    },

    #[error("Error evaluating expression '{name}: {expr}' at {location}: {reason}")]
    Expression {
        name: String,
        expr: String,
        location: String,
        reason: String,
    },

    #[error("Group '{path}' is defined more than once (second definition at {location})")]
    DuplicateGroup { path: String, location: String },

    #[error("Variable '{name}' references itself through: {chain}")]
    VariableCycle { name: String, chain: String },

    #[error("Invalid name \"{text}\" at {location}: {reason}")]
    InvalidName {
        text: String,
        location: String,
        reason: String,
    },
}

/// Errors raised while inserting the generated block into a host session file
#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("Failed to read source file {path:?}: {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Anchor `{anchor}` not found in {path:?}: not a recognized DVE session template")]
    AnchorNotFound { anchor: String, path: PathBuf },

    #[error("Anchor `{anchor}` found {} times in {path:?} (lines {}): ambiguous insertion point", .lines.len(), join_lines(.lines))]
    AmbiguousAnchor {
        anchor: String,
        path: PathBuf,
        lines: Vec<usize>,
    },

    #[error("Output path {path:?} is the source file; refusing to overwrite it")]
    OutputIsSource { path: PathBuf },

    #[error("Failed to write output file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn join_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Display radix of a signal in the waveform viewer (e.g. `hex`, `binary`)
///
/// Radices are validated against `settings.allowed_radices` when the configuration
/// is loaded, so any `Radix` reaching the emitter is accepted by the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Radix(String);

impl Radix {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Radix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fully resolved emit instruction - the output of the expander
///
/// The order of instructions matches the declaration order after expansion; DVE
/// renders groups in the order they are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    /// Create a signal group
    OpenGroup {
        /// Numeric id backing the `_session_group_<id>` Tcl variable
        id: u32,
        /// Id of the enclosing group (None for top-level groups)
        parent: Option<u32>,
        /// Group name (last path component)
        name: String,
        /// Full `Parent|Child` path
        path: String,
    },

    /// Collapse or expand a group in the wave view
    SetCollapse { path: String, collapsed: bool },

    /// Place a group in the wave view after another list entry
    ShowGroup { path: String, after: String },

    /// Add one signal to a group and set its display radix
    AddSignal {
        group: u32,
        signal: String,
        radix: Radix,
    },

    /// Add a divider to a group
    AddDivider { group: u32, label: String },

    /// End of a group's contents
    CloseGroup { id: u32, path: String },
}

impl Instruction {
    /// True for the per-group wave view instructions (placement and collapse state)
    pub fn is_view(&self) -> bool {
        matches!(
            self,
            Instruction::SetCollapse { .. } | Instruction::ShowGroup { .. }
        )
    }
}
