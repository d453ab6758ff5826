//! # Crowd Evaluation
//!
//! Evaluates many Instances per frame on a fixed set of workers, each with
//! its own Workspace. Entity count and worker count are independent.
//!
//! ```text
//!   &mut Instance 0 ──┐                    ┌──> worker 0 (Workspace 0) ──┐
//!   &mut Instance 1 ──┼──> [work channel] ─┼──> worker 1 (Workspace 1) ──┼──> sink(index, palette)
//!   &mut Instance N ──┘                    └──> worker W (Workspace W) ──┘
//! ```
//!
//! Each Instance is handed out exactly once per call and each Workspace
//! belongs to exactly one worker, so every evaluation runs on an exclusive
//! (Instance, Workspace) pair. Failures are collected per entity; one bad
//! entity never stops the rest of the crowd.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use sinew_core::{ArenaBuffer, Evaluator, Instance, PoseError, PoseResult, Skeleton, Workspace};

/// Outcome of one [`CrowdEvaluator::evaluate`] call.
#[derive(Debug, Default)]
pub struct CrowdReport {
    /// Entities whose palette reached the sink.
    pub evaluated: usize,
    /// Failed entities by index, ascending.
    pub errors: Vec<(usize, PoseError)>,
}

impl CrowdReport {
    /// True if every entity was evaluated.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Schedules Instances over per-worker Workspaces.
#[derive(Debug)]
pub struct CrowdEvaluator {
    evaluator: Evaluator,
    skeleton: Arc<Skeleton>,
    workspaces: Vec<ArenaBuffer>,
}

impl CrowdEvaluator {
    /// Creates a crowd evaluator with `workers` Workspaces for `skeleton`.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] if `workers` is zero.
    pub fn new(evaluator: Evaluator, skeleton: Arc<Skeleton>, workers: usize) -> PoseResult<Self> {
        if workers == 0 {
            return Err(PoseError::invalid("crowd needs at least one worker"));
        }
        let requirements = Workspace::required_bytes(&skeleton);
        let workspaces = (0..workers)
            .map(|_| ArenaBuffer::new(requirements))
            .collect::<PoseResult<Vec<_>>>()?;
        tracing::debug!(
            workers,
            workspace_bytes = requirements.size,
            joints = skeleton.num_joints(),
            "crowd evaluator ready"
        );
        Ok(Self {
            evaluator,
            skeleton,
            workspaces,
        })
    }

    /// Number of workers (and Workspaces).
    #[inline]
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workspaces.len()
    }

    /// Skeleton the Workspaces are built for.
    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// Evaluates every instance and passes each palette to `sink` together
    /// with the instance's index. `sink` runs on worker threads, in no
    /// particular order, and must copy what it needs before returning.
    ///
    /// Per-entity failures, including a panic inside the evaluator or the
    /// sink, are reported in [`CrowdReport::errors`]; a panic becomes
    /// [`PoseError::Unknown`].
    ///
    /// # Errors
    ///
    /// Only if a Workspace cannot be carved from its buffer.
    pub fn evaluate<F>(&mut self, instances: &mut [Instance<'_>], sink: F) -> PoseResult<CrowdReport>
    where
        F: Fn(usize, &[f32]) + Sync,
    {
        let mut workspaces = self
            .workspaces
            .iter_mut()
            .map(|bytes| Workspace::init(bytes.as_bytes_mut(), Arc::clone(&self.skeleton)))
            .collect::<PoseResult<Vec<_>>>()?;

        let total = instances.len();
        let (sender, receiver) = crossbeam_channel::bounded(total.max(1));
        for job in instances.iter_mut().enumerate() {
            // Capacity covers every job, so this never blocks.
            if sender.send(job).is_err() {
                break;
            }
        }
        drop(sender);

        let evaluated = AtomicUsize::new(0);
        let errors = Mutex::new(Vec::new());
        let evaluator = &self.evaluator;
        let sink = &sink;

        thread::scope(|scope| {
            for workspace in &mut workspaces {
                let receiver = receiver.clone();
                let evaluated = &evaluated;
                let errors = &errors;
                scope.spawn(move || {
                    for (index, instance) in receiver.iter() {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            evaluator
                                .run(instance, workspace)
                                .map(|palette| sink(index, palette))
                        }));
                        match outcome {
                            Ok(Ok(())) => {
                                evaluated.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(Err(err)) => errors.lock().push((index, err)),
                            Err(payload) => {
                                let err = PoseError::Unknown(panic_message(payload.as_ref()).into());
                                errors.lock().push((index, err));
                            }
                        }
                    }
                });
            }
        });

        let mut errors = errors.into_inner();
        errors.sort_by_key(|(index, _)| *index);
        let report = CrowdReport {
            evaluated: evaluated.into_inner(),
            errors,
        };
        if !report.is_clean() {
            tracing::warn!(
                total,
                failed = report.errors.len(),
                "crowd evaluation had failures"
            );
        }
        Ok(report)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("evaluation panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("evaluation panicked: {message}")
    } else {
        "evaluation panicked".to_owned()
    }
}
