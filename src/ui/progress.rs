//! Terminal rendering for a running operation, via `indicatif`.
//!
//! The workflow core emits events; this observer renders them. Nothing in
//! here feeds back into the state machine.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::workflow::WorkflowObserver;
use crate::workflow::state::{LogEntry, RunOutcome, WorkflowPhase};

/// Progress bar plus log echo for one operation run.
///
/// The bar tracks the pipeline's 0–100 progress with a live elapsed readout.
/// It stays dormant until the run actually enters `Running`, so pre-start
/// prompts are not fighting a ticking bar; once terminal it freezes with a
/// `completed`/`interrupted` label.
pub struct ProgressUi {
    bar: ProgressBar,
    verbose: bool,
    active: AtomicBool,
}

impl ProgressUi {
    pub fn new(verbose: bool) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos:>3}% {msg} {elapsed}")
                .expect("progress bar template is a valid static string")
                .progress_chars("█▓▒░"),
        );
        bar.set_prefix("Stages");
        Self {
            bar,
            verbose,
            active: AtomicBool::new(false),
        }
    }

    fn print_line(&self, msg: String) {
        if self.active.load(Ordering::Acquire) {
            self.bar.println(msg);
        } else {
            println!("{msg}");
        }
    }
}

impl WorkflowObserver for ProgressUi {
    fn phase_changed(&self, phase: WorkflowPhase) {
        match phase {
            WorkflowPhase::Running(op) => {
                self.active.store(true, Ordering::Release);
                self.bar.set_message(op.to_string());
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
            WorkflowPhase::Terminal(RunOutcome::Success) => {
                self.bar
                    .finish_with_message(style("completed").green().to_string());
            }
            WorkflowPhase::Terminal(RunOutcome::Failure) => {
                self.bar
                    .abandon_with_message(style("interrupted").red().to_string());
            }
            _ => {}
        }
    }

    fn log_appended(&self, entry: &LogEntry) {
        if self.verbose {
            self.print_line(format!(
                "  {} {} {}",
                style("→").dim(),
                style(entry.at.format("%H:%M:%S")).dim(),
                entry.message
            ));
        } else {
            self.print_line(format!("  {} {}", style("→").dim(), entry.message));
        }
    }

    fn progress_changed(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }
}
