//! Session file splicer
//!
//! Inserts the rendered sections into a copy of a DVE session file:
//! - the signal-groups section after the `# Global: Signal Groups` line
//! - the view section after the `gui_wv_zoom_timerange -id ${<wave>}` line, which is
//!   replaced by a zoom-out-full command
//!
//! The source file is never modified. Output is written through a temporary file in
//! the destination directory and renamed into place.

use crate::emitter::RenderedScript;
use crate::types::SpliceError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Marker line DVE writes before the global signal group definitions
pub const SIGNAL_GROUPS_ANCHOR: &str = "# Global: Signal Groups";

/// Prefix of the default output file name
pub const OUTPUT_PREFIX: &str = "patched_";

/// What to do when an anchor occurs more than once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnchorPolicy {
    /// Fail with [`SpliceError::AmbiguousAnchor`]
    #[default]
    Unique,
    /// Insert at the first occurrence only
    FirstMatch,
}

/// Configuration for the splicer
#[derive(Debug, Clone)]
pub struct SpliceConfig {
    pub policy: AnchorPolicy,
    /// Wave view whose zoom command anchors the view section
    pub wave_name: String,
}

impl SpliceConfig {
    /// Create a splice configuration for a wave view with the default (unique) policy
    pub fn new(wave_name: impl Into<String>) -> Self {
        Self {
            policy: AnchorPolicy::default(),
            wave_name: wave_name.into(),
        }
    }

    /// Builder method: set the duplicate-anchor policy
    pub fn with_policy(mut self, policy: AnchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The zoom command that anchors the view section
    pub fn view_anchor(&self) -> String {
        format!("gui_wv_zoom_timerange -id ${{{}}}", self.wave_name)
    }
}

/// Derive the default output path: `patched_<name>` next to the source
pub fn default_output_path(source: &Path) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session.tcl".to_string());
    source.with_file_name(format!("{}{}", OUTPUT_PREFIX, file_name))
}

/// Read the host session file
pub fn read_source(path: &Path) -> Result<String, SpliceError> {
    fs::read_to_string(path).map_err(|source| SpliceError::ReadSource {
        path: path.to_path_buf(),
        source,
    })
}

/// Insert `script` into `host`, returning the patched text
///
/// `source` is only used for error messages.
pub fn splice(
    host: &str,
    script: &RenderedScript,
    config: &SpliceConfig,
    source: &Path,
) -> Result<String, SpliceError> {
    let lines: Vec<&str> = host.split_inclusive('\n').collect();

    let groups_at = find_anchor(&lines, SIGNAL_GROUPS_ANCHOR, config.policy, source, |line| {
        line.trim() == SIGNAL_GROUPS_ANCHOR
    })?;
    let view_anchor = config.view_anchor();
    let view_at = find_anchor(&lines, &view_anchor, config.policy, source, |line| {
        line.contains(&view_anchor)
    })?;
    log::debug!(
        "Anchors in {:?}: signal groups at line {}, view at line {}",
        source,
        groups_at + 1,
        view_at + 1
    );

    let mut out = String::with_capacity(host.len() + script.signal_groups.len() + script.view.len());
    for (idx, line) in lines.iter().enumerate() {
        if idx == view_at {
            out.push_str("# Zooming out\n");
            out.push_str(&format!("gui_wv_zoom_outfull -id ${{{}}}\n", config.wave_name));
            out.push_str(&script.view);
            out.push('\n');
            continue;
        }

        out.push_str(line);
        if idx == groups_at {
            if !line.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
            out.push_str(&script.signal_groups);
        }
    }

    Ok(out)
}

fn find_anchor<F>(
    lines: &[&str],
    anchor: &str,
    policy: AnchorPolicy,
    source: &Path,
    matches: F,
) -> Result<usize, SpliceError>
where
    F: Fn(&str) -> bool,
{
    let hits: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| matches(line.trim_end_matches(['\n', '\r'])))
        .map(|(idx, _)| idx)
        .collect();

    match (hits.as_slice(), policy) {
        ([], _) => Err(SpliceError::AnchorNotFound {
            anchor: anchor.to_string(),
            path: source.to_path_buf(),
        }),
        ([only], _) => Ok(*only),
        ([first, ..], AnchorPolicy::FirstMatch) => {
            log::warn!(
                "Anchor `{}` occurs {} times in {:?}; using line {}",
                anchor,
                hits.len(),
                source,
                first + 1
            );
            Ok(*first)
        }
        (_, AnchorPolicy::Unique) => Err(SpliceError::AmbiguousAnchor {
            anchor: anchor.to_string(),
            path: source.to_path_buf(),
            lines: hits.iter().map(|idx| idx + 1).collect(),
        }),
    }
}

/// True if both paths name the same file
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Write `content` to `path` atomically
///
/// On failure the temporary file is removed and any existing file at `path` is left
/// as it was.
pub fn write_output(path: &Path, content: &str) -> Result<(), SpliceError> {
    let write_error = |source: std::io::Error| SpliceError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
    tmp.write_all(content.as_bytes()).map_err(write_error)?;
    tmp.flush().map_err(write_error)?;
    tmp.persist(path).map_err(|e| write_error(e.error))?;

    log::info!("Wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}
