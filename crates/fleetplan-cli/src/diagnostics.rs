//! Diagnostic output for the CLI
//!
//! Engine diagnostics are written to stderr as `level[kind]: subject: message`
//! lines. In JSON mode they travel inside the report on stdout instead.
//!
//! ## Exit Code Semantics
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success (diagnostics and non-critical conflicts allowed) |
//! | 1 | Failure: input could not be loaded, or `--strict` and a critical conflict |
//!
//! - **`--quiet`**: hides informational diagnostics, never changes the exit code
//! - **`--format=json`**: exit codes identical to text mode

use std::io::Write;
use std::process;

use fleetplan_core::{ConflictSeverity, Diagnostic, DiagnosticLevel, ScheduleConflict};

// ============================================================================
// Exit Code
// ============================================================================

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
}

impl ExitCode {
    pub fn from_error_count(count: usize) -> Self {
        if count > 0 {
            ExitCode::Failure
        } else {
            ExitCode::Success
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, ExitCode::Failure)
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code as u8)
    }
}

// ============================================================================
// Diagnostic Config
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticConfig {
    /// Critical conflicts fail the run
    pub strict: bool,
    /// Hide informational diagnostics
    pub quiet: bool,
}

impl DiagnosticConfig {
    pub fn should_show(&self, diagnostic: &Diagnostic) -> bool {
        !(self.quiet && diagnostic.level == DiagnosticLevel::Info)
    }

    /// Conflicts that count as errors under the current policy
    pub fn failing_conflicts(&self, conflicts: &[ScheduleConflict]) -> usize {
        if !self.strict {
            return 0;
        }
        conflicts
            .iter()
            .filter(|c| c.severity == ConflictSeverity::Critical)
            .count()
    }

    pub fn exit_code(&self, conflicts: &[ScheduleConflict]) -> ExitCode {
        ExitCode::from_error_count(self.failing_conflicts(conflicts))
    }
}

/// Writes engine diagnostics to a terminal stream
pub struct TerminalEmitter<W: Write> {
    writer: W,
    config: DiagnosticConfig,
    warning_count: usize,
}

impl<W: Write> TerminalEmitter<W> {
    pub fn new(writer: W, config: DiagnosticConfig) -> Self {
        Self {
            writer,
            config,
            warning_count: 0,
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn emit_all(&mut self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            self.emit(diagnostic);
        }
    }

    pub fn emit(&mut self, diagnostic: &Diagnostic) {
        // stderr may be closed
        let _ = self.write_diagnostic(diagnostic);
    }

    fn write_diagnostic(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()> {
        if diagnostic.level == DiagnosticLevel::Warning {
            self.warning_count += 1;
        }
        if !self.config.should_show(diagnostic) {
            return Ok(());
        }
        writeln!(
            self.writer,
            "{}[{}]: {}: {}",
            diagnostic.level, diagnostic.kind, diagnostic.subject, diagnostic.message
        )
    }
}
