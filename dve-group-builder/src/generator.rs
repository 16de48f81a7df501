//! Main generator API
//!
//! The Generator struct ties the stages together: expand the configuration, render
//! the Tcl sections, splice them into a session file and write the result.

use crate::config::{self, WaveConfig};
use crate::emitter::{Emitter, RenderedScript};
use crate::expand::Expander;
use crate::splicer::{self, AnchorPolicy, SpliceConfig};
use crate::types::{Instruction, Result, SpliceError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The main generator struct - entry point for all generation operations
pub struct Generator {
    config: WaveConfig,
    /// Process environment override (None = read the real environment)
    environment: Option<HashMap<String, String>>,
    policy: AnchorPolicy,
}

impl Generator {
    /// Create a generator for an already loaded configuration
    pub fn new(config: WaveConfig) -> Self {
        Self {
            config,
            environment: None,
            policy: AnchorPolicy::default(),
        }
    }

    /// Load a YAML configuration file
    ///
    /// # Example
    /// ```no_run
    /// use dve_group_builder::Generator;
    /// use std::path::Path;
    ///
    /// let generator = Generator::from_file(Path::new("groups.yaml")).unwrap();
    /// let script = generator.render().unwrap();
    /// print!("{}", script.signal_groups);
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(config::load_config(path)?))
    }

    /// Builder method: resolve environment placeholders from `environment`
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Builder method: set the duplicate-anchor policy
    pub fn with_anchor_policy(mut self, policy: AnchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &WaveConfig {
        &self.config
    }

    /// Expand the configuration into emit instructions
    pub fn instructions(&self) -> Result<Vec<Instruction>> {
        let expander = Expander::new(&self.config);
        let expander = match &self.environment {
            Some(env) => expander.with_environment(env.clone()),
            None => expander,
        };
        Ok(expander.expand()?)
    }

    /// Expand once and render, keeping every intermediate result
    pub fn generate(&self) -> Result<Generation> {
        let instructions = self.instructions()?;
        let script = self.render_instructions(&instructions);
        let stats = GenerationStats::from_instructions(&instructions);
        Ok(Generation {
            instructions,
            script,
            stats,
        })
    }

    /// Render already expanded instructions into both Tcl sections
    pub fn render_instructions(&self, instructions: &[Instruction]) -> RenderedScript {
        Emitter::new(&self.config.settings.wave_name).render(instructions)
    }

    /// Expand and render both Tcl sections
    pub fn render(&self) -> Result<RenderedScript> {
        Ok(self.render_instructions(&self.instructions()?))
    }

    /// Patch host session text in memory
    pub fn patch_text(&self, host: &str, source: &Path) -> Result<String> {
        let script = self.render()?;
        self.splice_script(host, &script, source)
    }

    /// Insert an already rendered script into host session text
    pub fn splice_script(&self, host: &str, script: &RenderedScript, source: &Path) -> Result<String> {
        Ok(splicer::splice(host, script, &self.splice_config(), source)?)
    }

    /// Patch `source` and write the result to `output` (or `patched_<source>`)
    ///
    /// Nothing is written unless every stage succeeds. Returns the output path.
    pub fn patch_file(&self, source: &Path, output: Option<&Path>) -> Result<PathBuf> {
        let output = resolve_output(source, output)?;

        // Expand before touching the filesystem so configuration errors come first
        let script = self.render()?;
        self.write_script(&script, source, &output)?;
        Ok(output)
    }

    /// Patch `source` with an already rendered script
    pub fn patch_file_with(
        &self,
        script: &RenderedScript,
        source: &Path,
        output: Option<&Path>,
    ) -> Result<PathBuf> {
        let output = resolve_output(source, output)?;
        self.write_script(script, source, &output)?;
        Ok(output)
    }

    fn write_script(&self, script: &RenderedScript, source: &Path, output: &Path) -> Result<()> {
        log::info!("Patching {:?} -> {:?}", source, output);
        let host = splicer::read_source(source)?;
        let patched = self.splice_script(&host, script, source)?;
        splicer::write_output(output, &patched)?;
        Ok(())
    }

    fn splice_config(&self) -> SpliceConfig {
        SpliceConfig::new(self.config.settings.wave_name.clone()).with_policy(self.policy)
    }
}

/// Pick the output path and refuse to overwrite the source
fn resolve_output(source: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| splicer::default_output_path(source));

    if splicer::is_same_file(source, &output) {
        return Err(SpliceError::OutputIsSource { path: output }.into());
    }
    Ok(output)
}

/// Everything one expansion produces
#[derive(Debug, Clone)]
pub struct Generation {
    pub instructions: Vec<Instruction>,
    pub script: RenderedScript,
    pub stats: GenerationStats,
}

/// Counts of what an instruction list adds to the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub groups: usize,
    pub signals: usize,
    pub dividers: usize,
}

impl GenerationStats {
    pub fn from_instructions(instructions: &[Instruction]) -> Self {
        instructions
            .iter()
            .fold(Self::default(), |mut stats, instruction| {
                match instruction {
                    Instruction::OpenGroup { .. } => stats.groups += 1,
                    Instruction::AddSignal { .. } => stats.signals += 1,
                    Instruction::AddDivider { .. } => stats.dividers += 1,
                    _ => {}
                }
                stats
            })
    }
}
