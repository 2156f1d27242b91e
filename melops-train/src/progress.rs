//! Progress reporting hooks.

use std::io::{self, Stdout, Write};

/// Emitted after every optimizer step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepEvent {
    /// Global pass index, 0-based
    pub pass: usize,
    /// Batch index within the pass, 0-based
    pub batch: usize,
    pub batch_size: usize,
    pub cost: f32,
}

/// Emitted after a pass has been evaluated and checkpointed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassEvent {
    pub pass: usize,
    pub steps: usize,
    /// Mean training cost over finite steps
    pub train_cost: f32,
    /// Held-out cost, weighted by batch size
    pub test_cost: f32,
}

/// Receives training progress.
pub trait ProgressReporter {
    fn on_step(&mut self, event: &StepEvent);

    fn on_pass_end(&mut self, event: &PassEvent);
}

/// Line-oriented console output.
///
/// Prints a summary line every `log_interval` batches and a dot for the
/// others, then one test-cost line per pass.
pub struct ConsoleReporter<W: Write> {
    writer: W,
    log_interval: usize,
}

impl ConsoleReporter<Stdout> {
    pub fn stdout(log_interval: usize) -> Self {
        Self::new(io::stdout(), log_interval)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(writer: W, log_interval: usize) -> Self {
        Self {
            writer,
            log_interval: log_interval.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, args: std::fmt::Arguments<'_>) {
        let result = self
            .writer
            .write_fmt(args)
            .and_then(|()| self.writer.flush());

        if let Err(error) = result {
            tracing::warn!(%error, "failed to write progress");
        }
    }
}

impl<W: Write> ProgressReporter for ConsoleReporter<W> {
    fn on_step(&mut self, event: &StepEvent) {
        if event.batch % self.log_interval == 0 {
            self.emit(format_args!(
                "\nPass: {}, Batch: {}, TrainCost: {:.6}\n",
                event.pass, event.batch, event.cost
            ));
        } else {
            self.emit(format_args!("."));
        }
    }

    fn on_pass_end(&mut self, event: &PassEvent) {
        self.emit(format_args!(
            "\nPass: {}, TestCost: {:.6}\n",
            event.pass, event.test_cost
        ));
    }
}
