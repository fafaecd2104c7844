//! Render phases
//!
//! The fixed stages every component element passes through. Phase values are
//! process-wide constants; diagnostics print them by name.

use std::fmt;

use crate::queue::CommandRc;
use crate::RenderError;

/// One stage of the render-phase state machine, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPhase {
    SetupRender,
    BeginRender,
    BeforeRenderTemplate,
    AfterRenderTemplate,
    BeforeRenderBody,
    AfterRenderBody,
    AfterRender,
    CleanupRender,
}

impl RenderPhase {
    /// All phases in execution order.
    pub const ALL: [RenderPhase; 8] = [
        RenderPhase::SetupRender,
        RenderPhase::BeginRender,
        RenderPhase::BeforeRenderTemplate,
        RenderPhase::AfterRenderTemplate,
        RenderPhase::BeforeRenderBody,
        RenderPhase::AfterRenderBody,
        RenderPhase::AfterRender,
        RenderPhase::CleanupRender,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RenderPhase::SetupRender => "SetupRender",
            RenderPhase::BeginRender => "BeginRender",
            RenderPhase::BeforeRenderTemplate => "BeforeRenderTemplate",
            RenderPhase::AfterRenderTemplate => "AfterRenderTemplate",
            RenderPhase::BeforeRenderBody => "BeforeRenderBody",
            RenderPhase::AfterRenderBody => "AfterRenderBody",
            RenderPhase::AfterRender => "AfterRender",
            RenderPhase::CleanupRender => "CleanupRender",
        }
    }
}

impl fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamic result produced by a phase handler.
pub enum PhaseResult {
    /// Continue (true) or veto (false) the rest of the phase chain.
    Continue(bool),
    /// Follow-up render work, queued right after the current phase.
    Command(CommandRc),
    /// Anything else — a contract violation; carries a description of the
    /// offending value for the error message.
    Other(String),
}

/// Accumulates the outcome of invoking one phase across a component and its
/// mixins: the combined continue/veto flag plus any follow-up commands.
pub struct PhaseEvent {
    continue_rendering: bool,
    commands: Vec<CommandRc>,
}

impl Default for PhaseEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseEvent {
    pub fn new() -> Self {
        Self {
            continue_rendering: true,
            commands: Vec::new(),
        }
    }

    /// Veto the normal continuation of the phase chain.
    pub fn veto(&mut self) {
        self.continue_rendering = false;
    }

    pub fn continue_rendering(&self) -> bool {
        self.continue_rendering
    }

    /// Queue follow-up render work.
    pub fn push_command(&mut self, command: CommandRc) {
        self.commands.push(command);
    }

    /// Classify a dynamic handler result. The first value that is neither a
    /// boolean nor a render command is a programming error and fails fast.
    pub fn store(&mut self, result: PhaseResult) -> Result<(), RenderError> {
        match result {
            PhaseResult::Continue(flag) => {
                if !flag {
                    self.continue_rendering = false;
                }
                Ok(())
            }
            PhaseResult::Command(command) => {
                self.commands.push(command);
                Ok(())
            }
            PhaseResult::Other(value) => Err(RenderError::PhaseContract { value }),
        }
    }

    pub fn take_commands(&mut self) -> Vec<CommandRc> {
        std::mem::take(&mut self.commands)
    }
}
