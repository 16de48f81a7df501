//! Tcl command emitter
//!
//! Renders each instruction as exactly one line of DVE Tcl. Commands that DVE session
//! files spread over several statements (group creation) are joined with `;` so the
//! one-instruction-one-line mapping holds.
//!
//! The output is split in two sections: groups must be created before the wave window
//! exists, while placement and collapse commands need the window.

use crate::types::Instruction;

/// Header of the section inserted after the signal-groups anchor
pub const SIGNAL_GROUPS_HEADER: &str = "# Creating groups and adding signals";
/// Header of the wave-view placement block
pub const VIEW_HEADER: &str = "# Adding groups to the view";
/// Header of the collapse/expand block
pub const COLLAPSE_HEADER: &str = "# Collapsing groups and its children";

/// Rendered text for both insertion points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedScript {
    /// Group creation and signal commands (newline terminated)
    pub signal_groups: String,
    /// Wave view placement and collapse commands (newline terminated)
    pub view: String,
}

/// Renders instructions for one wave view
pub struct Emitter<'a> {
    wave_name: &'a str,
}

impl<'a> Emitter<'a> {
    pub fn new(wave_name: &'a str) -> Self {
        Self { wave_name }
    }

    /// Render one instruction as a single line (without the trailing newline)
    pub fn render_line(&self, instruction: &Instruction) -> String {
        let wave = self.wave_name;
        match instruction {
            Instruction::OpenGroup {
                id,
                parent: None,
                name,
                path,
            } => format!(
                "set _session_group_{id} {{{name}}}; gui_sg_create \"$_session_group_{id}\"; set {{{path}}} \"$_session_group_{id}\""
            ),
            Instruction::OpenGroup {
                id,
                parent: Some(parent),
                name,
                path,
            } => format!(
                "set _session_group_{id} $_session_group_{parent}|; append _session_group_{id} {{{name}}}; gui_sg_create \"$_session_group_{id}\"; set {{{path}}} \"$_session_group_{id}\""
            ),
            Instruction::AddSignal {
                group,
                signal,
                radix,
            } => {
                let signal = tcl_word(signal);
                format!(
                    "gui_sg_addsignal -group \"$_session_group_{group}\" {{ {signal} }}; gui_set_radix -radix {{{radix}}} -signals {{ {signal} }}"
                )
            }
            Instruction::AddDivider { group, label } => format!(
                "gui_sg_addsignal -group \"$_session_group_{group}\" {{ {} }} -divider",
                tcl_word(label)
            ),
            Instruction::CloseGroup { path, .. } => format!("# End of group: {path}"),
            Instruction::ShowGroup { path, after } => {
                format!("gui_list_add_group -id ${{{wave}}} -after {{{after}}} {{{{{path}}}}}")
            }
            Instruction::SetCollapse { path, collapsed } => {
                let command = if *collapsed {
                    "gui_list_collapse"
                } else {
                    "gui_list_expand"
                };
                format!("{command} -id ${{{wave}}} {{{path}}}")
            }
        }
    }

    /// Render all instructions into the two sections
    ///
    /// Within the view section all placements come first, then all collapse states,
    /// each in instruction order: a group must be in the view before it can collapse.
    pub fn render(&self, instructions: &[Instruction]) -> RenderedScript {
        let mut signal_groups = format!("{}\n", SIGNAL_GROUPS_HEADER);
        let mut placements = format!("{}\n", VIEW_HEADER);
        let mut collapses = format!("{}\n", COLLAPSE_HEADER);

        for instruction in instructions {
            let target = match instruction {
                Instruction::ShowGroup { .. } => &mut placements,
                Instruction::SetCollapse { .. } => &mut collapses,
                _ => &mut signal_groups,
            };
            target.push_str(&self.render_line(instruction));
            target.push('\n');
        }

        log::debug!(
            "Rendered {} instructions ({} bytes of signal groups, {} bytes of view commands)",
            instructions.len(),
            signal_groups.len(),
            placements.len() + collapses.len()
        );

        RenderedScript {
            signal_groups,
            view: placements + &collapses,
        }
    }
}

/// Quote a list element for Tcl if it needs it
///
/// Names are validated brace-free during expansion, so brace quoting is always safe.
pub fn tcl_word(text: &str) -> String {
    let needs_quoting = text.is_empty()
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '$' | '[' | ']' | '"' | '\\' | '#'));
    if needs_quoting {
        format!("{{{}}}", text)
    } else {
        text.to_string()
    }
}
