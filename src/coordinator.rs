//! This module provides [CorrectionCoordinator], which owns the
//! correction of one document. At most one correction is in flight
//! at a time: a request made while another is being fetched or
//! replayed is rejected. Cancellation always succeeds, stops future
//! ticks, and never rolls back edits already applied.
//!
//! A request goes through two states. While the oracle works the
//! coordinator is `Requesting`; no lock is held during the call. If
//! a cancel arrives meanwhile, the oracle's answer is thrown away
//! when it comes back. Each request gets a generation number so a
//! stale answer or a stale replay task can't touch a newer request's
//! state.

use crate::doc::{Presence, SharedText};
use crate::error::{FixError, FixResult};
use crate::oracle::CorrectionOracle;
use crate::scheduler::{run_replay, CorrectionJob, ReplayConfig, ReplayEnd};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

// *** Types

/// What happened to an accepted correction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// The replay started and runs in the background.
    Started,
    /// The request was canceled while the oracle was working; its
    /// answer was dropped.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorStatus {
    Idle,
    /// Waiting for the oracle.
    Requesting,
    /// Replaying a correction.
    Active,
}

#[derive(Debug)]
enum JobState {
    Idle,
    Requesting {
        generation: u64,
    },
    Active {
        generation: u64,
        cancel: CancellationToken,
    },
}

impl JobState {
    fn generation(&self) -> Option<u64> {
        match self {
            JobState::Idle => None,
            JobState::Requesting { generation } => Some(*generation),
            JobState::Active { generation, .. } => Some(*generation),
        }
    }
}

#[derive(Debug)]
struct State {
    next_generation: u64,
    job: JobState,
}

// The state is only ever mutated with plain assignments, so it's
// consistent even if a holder panicked.
fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|err| err.into_inner())
}

/// Set the state to idle if `generation` is still the current one.
fn finish(state: &Mutex<State>, generation: u64) {
    let mut state = lock(state);
    if state.job.generation() == Some(generation) {
        state.job = JobState::Idle;
    }
}

/// Calls [finish] when dropped. Held by whoever drives a request, so
/// the coordinator goes back to idle even if the request future is
/// dropped or the replay task panics.
struct FinishGuard {
    state: Arc<Mutex<State>>,
    generation: u64,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        finish(&self.state, self.generation);
    }
}

// *** CorrectionCoordinator

pub struct CorrectionCoordinator<D> {
    doc: Arc<Mutex<D>>,
    oracle: Arc<dyn CorrectionOracle>,
    config: ReplayConfig,
    state: Arc<Mutex<State>>,
}

impl<D> CorrectionCoordinator<D>
where
    D: SharedText + Presence + Send + 'static,
{
    pub fn new(
        doc: Arc<Mutex<D>>,
        oracle: Arc<dyn CorrectionOracle>,
        config: ReplayConfig,
    ) -> CorrectionCoordinator<D> {
        CorrectionCoordinator {
            doc,
            oracle,
            config,
            state: Arc::new(Mutex::new(State {
                next_generation: 1,
                job: JobState::Idle,
            })),
        }
    }

    /// The document this coordinator corrects.
    pub fn doc(&self) -> &Arc<Mutex<D>> {
        &self.doc
    }

    pub fn status(&self) -> CoordinatorStatus {
        match lock(&self.state).job {
            JobState::Idle => CoordinatorStatus::Idle,
            JobState::Requesting { .. } => CoordinatorStatus::Requesting,
            JobState::Active { .. } => CoordinatorStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() != CoordinatorStatus::Idle
    }

    /// Ask the oracle to correct `original` and replay the correction
    /// onto the document. `original` must be the document's current
    /// text. Return once the replay has started; it proceeds in the
    /// background.
    #[tracing::instrument(skip_all)]
    pub async fn request_correction(&self, original: &str) -> FixResult<CorrectionOutcome> {
        let generation = {
            let mut state = lock(&self.state);
            if !matches!(state.job, JobState::Idle) {
                tracing::info!("Not starting a correction as one is already in progress");
                return Err(FixError::AlreadyInProgress);
            }
            // The edits are computed from `original` but applied to
            // the document, so the two must agree.
            if self.doc.lock()?.text() != original {
                tracing::info!("Not starting a correction of text that isn't the document's");
                return Err(FixError::TextMismatch);
            }
            let generation = state.next_generation;
            state.next_generation += 1;
            state.job = JobState::Requesting { generation };
            generation
        };
        let guard = FinishGuard {
            state: Arc::clone(&self.state),
            generation,
        };

        let job = match self.prepare(original).await {
            Ok(job) => job,
            Err(err) => {
                tracing::warn!("Correction {} failed: {}", generation, err);
                return Err(err);
            }
        };

        let cancel = CancellationToken::new();
        {
            let mut state = lock(&self.state);
            match state.job {
                JobState::Requesting { generation: current } if current == generation => {}
                _ => {
                    tracing::info!(
                        "Discarding correction {}, it was canceled while waiting for the oracle",
                        generation
                    );
                    return Ok(CorrectionOutcome::Discarded);
                }
            }
            state.job = JobState::Active {
                generation,
                cancel: cancel.clone(),
            };
        }

        tracing::info!(
            "Replaying correction {}: {} edits, {} selections",
            generation,
            job.batches().len(),
            job.selections().len()
        );
        let doc = Arc::clone(&self.doc);
        let config = self.config.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match run_replay(job, doc, config, cancel).await {
                ReplayEnd::Completed => tracing::info!("Correction {} replayed", generation),
                ReplayEnd::Canceled => tracing::info!("Correction {} canceled", generation),
                ReplayEnd::Failed(err) => {
                    tracing::warn!("Correction {} abandoned: {}", generation, err)
                }
            }
        });

        Ok(CorrectionOutcome::Started)
    }

    /// Fetch the correction and compile it into a job.
    async fn prepare(&self, original: &str) -> FixResult<CorrectionJob> {
        let corrected = self.oracle.correct(original).await?;
        tracing::debug!("Corrected text: {:?}", corrected);
        CorrectionJob::compile(original, &corrected)
    }

    /// Stop the current correction, if any. Edits already replayed
    /// stay. Does nothing when idle.
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        match std::mem::replace(&mut state.job, JobState::Idle) {
            JobState::Idle => {}
            JobState::Requesting { generation } => {
                tracing::info!("Canceled correction {} before the oracle answered", generation);
            }
            JobState::Active { generation, cancel } => {
                cancel.cancel();
                tracing::info!("Canceled correction {} during replay", generation);
            }
        }
    }

    /// Called when a person edits the document. Their edit wins: any
    /// correction in flight is canceled.
    pub fn on_local_edit(&self) {
        if self.is_active() {
            tracing::debug!("Local edit interrupts the correction");
        }
        self.cancel();
    }
}
