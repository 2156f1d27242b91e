//! Training loop controller.
//!
//! Runs a [`CurriculumPlan`] segment by segment. Every pass draws a fresh
//! example pass in the segment's order, feeds the batches to the model one
//! optimizer step at a time, then evaluates on the held-out source and hands
//! a parameter snapshot to the checkpoint sink.
//!
//! ```text
//! Idle -> RunningSegment -> EvaluatingPass -> RunningSegment ... -> Done
//! ```

use crate::batch::Batcher;
use crate::checkpoint::CheckpointSink;
use crate::curriculum::CurriculumPlan;
use crate::error::{ModelError, Result};
use crate::model::{AcousticModel, TrainingContext};
use crate::progress::{PassEvent, ProgressReporter, StepEvent};
use crate::source::{ExampleSource, PassOrder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainerState {
    Idle,
    RunningSegment { segment: usize, pass: usize },
    EvaluatingPass { pass: usize },
    Done,
}

/// Cooperative stop request, checked before every batch.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of a training run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingSummary {
    /// Passes trained, evaluated and checkpointed
    pub passes: usize,
    /// Optimizer steps executed
    pub steps: usize,
    /// Steps whose cost was NaN or infinite
    pub non_finite_steps: usize,
    pub last_test_cost: Option<f32>,
    /// Stopped by a [`StopSignal`] before the plan finished
    pub interrupted: bool,
}

enum PassOutcome {
    Completed { steps: usize, train_cost: f32 },
    Interrupted,
}

/// Drives a model through a curriculum plan.
pub struct Trainer<'a, M> {
    context: &'a TrainingContext,
    model: M,
    batcher: Batcher,
    train: ExampleSource,
    dev: ExampleSource,
    stop: StopSignal,
    state: TrainerState,
}

impl<'a, M: AcousticModel> Trainer<'a, M> {
    /// Create a trainer over a training and a held-out source.
    pub fn new(
        context: &'a TrainingContext,
        model: M,
        batcher: Batcher,
        train: ExampleSource,
        dev: ExampleSource,
    ) -> Self {
        Self {
            context,
            model,
            batcher,
            train,
            dev,
            stop: StopSignal::new(),
            state: TrainerState::Idle,
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Handle that stops the run at the next batch boundary.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Run every pass of `plan`.
    ///
    /// A non-finite step cost is reported and training continues. Any error
    /// (batch shape, model, checkpoint) ends the run. A stop request ends the
    /// run before the next batch without checkpointing the partial pass.
    pub fn run(
        &mut self,
        plan: &CurriculumPlan,
        reporter: &mut dyn ProgressReporter,
        sink: &mut dyn CheckpointSink,
    ) -> Result<TrainingSummary> {
        tracing::info!(
            passes = plan.total_passes(),
            segments = plan.segments().len(),
            batch_size = self.batcher.batch_size(),
            train_examples = self.train.manifest().len(),
            dev_examples = self.dev.manifest().len(),
            use_gpu = self.context.use_gpu,
            trainer_count = self.context.trainer_count,
            "training started"
        );

        let mut summary = TrainingSummary::default();
        let mut pass = 0;

        'plan: for (segment_index, segment) in plan.segments().iter().enumerate() {
            tracing::info!(
                segment = segment_index,
                order = ?segment.order,
                passes = segment.passes,
                "segment started"
            );

            for _ in 0..segment.passes {
                self.transition(TrainerState::RunningSegment {
                    segment: segment_index,
                    pass,
                });

                let (steps, train_cost) =
                    match self.train_pass(pass, segment.order, reporter, &mut summary)? {
                        PassOutcome::Completed { steps, train_cost } => (steps, train_cost),
                        PassOutcome::Interrupted => {
                            tracing::info!(pass, "stop requested, partial pass not checkpointed");
                            summary.interrupted = true;
                            break 'plan;
                        }
                    };

                self.transition(TrainerState::EvaluatingPass { pass });

                let test_cost = self.evaluate(pass)?;

                let parameters = self
                    .model
                    .export_parameters()
                    .map_err(|source| ModelError::Export { pass, source })?;
                sink.save(pass, &parameters)?;

                reporter.on_pass_end(&PassEvent {
                    pass,
                    steps,
                    train_cost,
                    test_cost,
                });

                summary.passes += 1;
                summary.last_test_cost = Some(test_cost);
                pass += 1;
            }
        }

        self.transition(TrainerState::Done);

        tracing::info!(
            passes = summary.passes,
            steps = summary.steps,
            non_finite_steps = summary.non_finite_steps,
            interrupted = summary.interrupted,
            "training finished"
        );

        Ok(summary)
    }

    fn train_pass(
        &mut self,
        pass: usize,
        order: PassOrder,
        reporter: &mut dyn ProgressReporter,
        summary: &mut TrainingSummary,
    ) -> Result<PassOutcome> {
        let mut steps = 0;
        let mut finite_cost_sum = 0.0f64;
        let mut finite_steps = 0usize;

        // An exhausted pass completes even if a stop arrived during its last step
        for batch in self.batcher.batches(self.train.pass(order)) {
            if self.stop.is_requested() {
                return Ok(PassOutcome::Interrupted);
            }
            let batch = batch?;

            let cost = self
                .model
                .train_step(&batch)
                .map_err(|source| ModelError::Step {
                    pass,
                    batch: steps,
                    source,
                })?;

            if cost.is_finite() {
                finite_cost_sum += f64::from(cost);
                finite_steps += 1;
            } else {
                tracing::warn!(pass, batch = steps, cost, "non-finite training cost");
                summary.non_finite_steps += 1;
            }

            reporter.on_step(&StepEvent {
                pass,
                batch: steps,
                batch_size: batch.len(),
                cost,
            });

            steps += 1;
            summary.steps += 1;
        }

        if steps == 0 {
            tracing::warn!(pass, "pass produced no batches");
        }

        let train_cost = if finite_steps == 0 {
            f32::NAN
        } else {
            (finite_cost_sum / finite_steps as f64) as f32
        };

        Ok(PassOutcome::Completed { steps, train_cost })
    }

    /// Held-out cost in manifest order, weighted by batch size.
    fn evaluate(&mut self, pass: usize) -> Result<f32> {
        let mut weighted_sum = 0.0f64;
        let mut examples = 0usize;

        for batch in self.batcher.batches(self.dev.pass(PassOrder::Manifest)) {
            let batch = batch?;
            let cost = self
                .model
                .evaluate(&batch)
                .map_err(|source| ModelError::Evaluation { pass, source })?;

            weighted_sum += f64::from(cost) * batch.len() as f64;
            examples += batch.len();
        }

        Ok(if examples == 0 {
            f32::NAN
        } else {
            (weighted_sum / examples as f64) as f32
        })
    }

    fn transition(&mut self, next: TrainerState) {
        tracing::debug!(from = ?self.state, to = ?next, "trainer state");
        self.state = next;
    }
}
