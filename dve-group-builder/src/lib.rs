//! DVE Group Builder Library
//!
//! Turns a declarative YAML description of signal groups into DVE Tcl session
//! commands and splices them into an existing session file.
//!
//! # Architecture
//!
//! Data flows one way, once per run:
//! - `config` + `layout`: parse and validate the YAML into a group tree
//! - `expand`: resolve iterators, expressions, variables and environment placeholders
//!   into a flat, ordered list of [`Instruction`]s
//! - `emitter`: render each instruction as one line of Tcl
//! - `splicer`: insert the rendered sections at the session file's anchors and write
//!   the result atomically
//!
//! Same configuration, environment and host file always give byte-identical output.
//!
//! # Example Usage
//!
//! ```no_run
//! use dve_group_builder::{AnchorPolicy, Generator};
//! use std::path::Path;
//!
//! let generator = Generator::from_file(Path::new("groups.yaml"))
//!     .unwrap()
//!     .with_anchor_policy(AnchorPolicy::Unique);
//!
//! let output = generator
//!     .patch_file(Path::new("session.tcl"), None)
//!     .unwrap();
//! println!("Wrote {:?}", output);
//! ```

// Public modules
pub mod config;
pub mod emitter;
pub mod expand;
pub mod generator;
pub mod layout;
pub mod splicer;
pub mod types;

// Re-export main types for convenience
pub use config::{load_config, parse_config, WaveConfig};
pub use emitter::{Emitter, RenderedScript};
pub use expand::Expander;
pub use generator::{Generation, GenerationStats, Generator};
pub use splicer::{AnchorPolicy, SpliceConfig};
pub use types::{ConfigError, Error, Instruction, Radix, Result, SpliceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty group list renders only the section headers
        let config = parse_config("settings: {wave_name: Wave.1}\ngroups: []\n").unwrap();
        let script = Generator::new(config).render().unwrap();
        assert_eq!(script.signal_groups.lines().count(), 1);
        assert_eq!(script.view.lines().count(), 2);
    }
}
