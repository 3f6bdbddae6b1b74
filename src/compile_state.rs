//! Compile State Machine
//!
//! Tracks where a compilation run is and refuses transitions that would skip
//! a stage, go backwards, or leave a terminal state.
//!
//! # Stage Flow
//!
//! ```text
//! Configured
//!     ↓
//! Resolving   ──┐
//!     ↓         │
//! Merging     ──┤
//!     ↓         ↓
//! Finalized   Failed
//! ```
//!
//! `Failed` is reachable only from `Resolving` and `Merging`: a compiler that
//! never started has nothing to fail, and a finalized archive stays valid.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Stages of one compilation run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompileStage {
    /// Configuration loaded, nothing done yet
    Configured = 0,

    /// Reading the descriptor and listing required components
    Resolving = 1,

    /// Writing entries to the output archive
    Merging = 2,

    /// Archive closed and moved into place (terminal)
    Finalized = 3,

    /// Run aborted, no archive produced (terminal)
    Failed = 255,
}

impl CompileStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }

    /// Stages from which a run may fail
    #[inline]
    pub const fn can_fail(self) -> bool {
        matches!(self, Self::Resolving | Self::Merging)
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Configured => Some(Self::Resolving),
            Self::Resolving => Some(Self::Merging),
            Self::Merging => Some(Self::Finalized),
            Self::Finalized | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Configured => "Configured",
            Self::Resolving => "Resolving components",
            Self::Merging => "Merging archive entries",
            Self::Finalized => "Archive finalized",
            Self::Failed => "Compilation failed",
        }
    }

    /// All stages on the success path
    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::Configured,
            Self::Resolving,
            Self::Merging,
            Self::Finalized,
        ]
    }
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Refused stage transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileTransitionError {
    #[error("Cannot skip from {from} to {to}")]
    SkippedStage { from: CompileStage, to: CompileStage },

    #[error("Cannot go backwards from {from} to {to}")]
    BackwardTransition { from: CompileStage, to: CompileStage },

    #[error("Cannot leave terminal stage {from}")]
    FromTerminalState { from: CompileStage },

    #[error("Cannot fail from stage {stage}")]
    CannotFail { stage: CompileStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: CompileStage },
}

/// Current stage plus when each stage was entered
#[derive(Debug, Clone)]
pub struct CompileContext {
    current: CompileStage,
    failed_at: Option<CompileStage>,
    started: Instant,
    stage_history: Vec<(CompileStage, Instant)>,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompileContext {
    pub fn new() -> Self {
        Self {
            current: CompileStage::Configured,
            failed_at: None,
            started: Instant::now(),
            stage_history: Vec::with_capacity(CompileStage::all_stages().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> CompileStage {
        self.current
    }

    /// Stage the run was in when it failed
    #[inline]
    pub fn failed_at(&self) -> Option<CompileStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.current == CompileStage::Finalized
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.current == CompileStage::Failed
    }

    pub fn stage_history(&self) -> &[(CompileStage, Instant)] {
        &self.stage_history
    }

    /// Time since the context was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Move to `target`, which must be the stage right after the current one.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if the run is finalized or failed
    /// - `AlreadyAtStage` if `target` is the current stage
    /// - `BackwardTransition` if `target` comes before the current stage
    /// - `SkippedStage` if `target` is not the immediate next stage
    pub fn transition_to(
        &mut self,
        target: CompileStage,
    ) -> Result<CompileStage, CompileTransitionError> {
        if self.current.is_terminal() {
            return Err(CompileTransitionError::FromTerminalState { from: self.current });
        }
        if target == self.current {
            return Err(CompileTransitionError::AlreadyAtStage { stage: target });
        }
        // Failed goes through fail()
        if target == CompileStage::Failed {
            return Err(CompileTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }
        if target.order() < self.current.order() {
            return Err(CompileTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(CompileTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.enter(target);
        Ok(target)
    }

    /// Mark the run as failed, remembering the stage it failed in.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if already finalized or failed
    /// - `CannotFail` from `Configured`
    pub fn fail(&mut self) -> Result<(), CompileTransitionError> {
        if self.current.is_terminal() {
            return Err(CompileTransitionError::FromTerminalState { from: self.current });
        }
        if !self.current.can_fail() {
            return Err(CompileTransitionError::CannotFail {
                stage: self.current,
            });
        }

        self.failed_at = Some(self.current);
        self.enter(CompileStage::Failed);
        Ok(())
    }

    fn enter(&mut self, stage: CompileStage) {
        let now = Instant::now();
        if let Some((previous, since)) = self.stage_history.last() {
            tracing::debug!(
                from = %previous,
                to = %stage,
                took_ms = now.duration_since(*since).as_millis() as u64,
                "stage transition"
            );
        }
        self.stage_history.push((stage, now));
        self.current = stage;
    }
}

impl From<CompileTransitionError> for crate::error::CompileError {
    fn from(err: CompileTransitionError) -> Self {
        crate::error::CompileError::Transition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // CompileStage Tests
    // =========================================================================

    #[test]
    fn test_stage_order_is_sequential() {
        for (i, stage) in CompileStage::all_stages().iter().enumerate() {
            assert_eq!(stage.order() as usize, i, "{stage:?} should have order {i}");
        }
    }

    #[test]
    fn test_stage_next_forms_chain() {
        let mut current = CompileStage::Configured;
        let mut count = 0;
        while let Some(next) = current.next() {
            current = next;
            count += 1;
        }
        assert_eq!(current, CompileStage::Finalized);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_terminal_and_failable_stages() {
        assert!(CompileStage::Finalized.is_terminal());
        assert!(CompileStage::Failed.is_terminal());
        assert!(!CompileStage::Merging.is_terminal());

        assert!(CompileStage::Resolving.can_fail());
        assert!(CompileStage::Merging.can_fail());
        assert!(!CompileStage::Configured.can_fail());
        assert!(!CompileStage::Finalized.can_fail());
    }

    // =========================================================================
    // CompileContext Tests
    // =========================================================================

    #[test]
    fn test_context_walks_success_path() {
        let mut ctx = CompileContext::new();
        assert_eq!(ctx.current_stage(), CompileStage::Configured);

        ctx.transition_to(CompileStage::Resolving).expect("resolving");
        ctx.transition_to(CompileStage::Merging).expect("merging");
        ctx.transition_to(CompileStage::Finalized).expect("finalized");

        assert!(ctx.is_finalized());
        assert_eq!(ctx.stage_history().len(), 3);
    }

    #[test]
    fn test_cannot_skip_stages() {
        let mut ctx = CompileContext::new();
        let err = ctx.transition_to(CompileStage::Merging).unwrap_err();
        assert!(matches!(err, CompileTransitionError::SkippedStage { .. }));
    }

    #[test]
    fn test_cannot_go_backwards() {
        let mut ctx = CompileContext::new();
        ctx.transition_to(CompileStage::Resolving).expect("resolving");
        ctx.transition_to(CompileStage::Merging).expect("merging");
        let err = ctx.transition_to(CompileStage::Resolving).unwrap_err();
        assert!(matches!(err, CompileTransitionError::BackwardTransition { .. }));
    }

    #[test]
    fn test_cannot_fail_before_starting() {
        let mut ctx = CompileContext::new();
        assert!(matches!(
            ctx.fail(),
            Err(CompileTransitionError::CannotFail { .. })
        ));
    }

    #[test]
    fn test_fail_records_stage() {
        let mut ctx = CompileContext::new();
        ctx.transition_to(CompileStage::Resolving).expect("resolving");
        ctx.transition_to(CompileStage::Merging).expect("merging");
        ctx.fail().expect("fail");

        assert!(ctx.is_failed());
        assert_eq!(ctx.failed_at(), Some(CompileStage::Merging));
        assert!(matches!(
            ctx.transition_to(CompileStage::Finalized),
            Err(CompileTransitionError::FromTerminalState { .. })
        ));
    }

    #[test]
    fn test_cannot_fail_after_finalize() {
        let mut ctx = CompileContext::new();
        for stage in &CompileStage::all_stages()[1..] {
            ctx.transition_to(*stage).expect("advance");
        }
        assert!(matches!(
            ctx.fail(),
            Err(CompileTransitionError::FromTerminalState { .. })
        ));
    }

    #[test]
    fn test_error_display() {
        let err = CompileTransitionError::SkippedStage {
            from: CompileStage::Configured,
            to: CompileStage::Merging,
        };
        let msg = err.to_string();
        assert!(msg.contains("Cannot skip"));
        assert!(msg.contains("Configured"));
        assert!(msg.contains("Merging archive entries"));
    }
}
