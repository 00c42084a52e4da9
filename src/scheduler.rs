//! Replay scheduler. A [CorrectionJob] holds the edit script and the
//! highlights for one correction; [run_replay] plays them onto the
//! live document at a fixed cadence, alternating between publishing
//! a highlight and applying an edit, one action per tick, so
//! co-editors see the correction typed out rather than pasted in.

use crate::delta::compile_document;
use crate::doc::{Actor, Presence, SharedText};
use crate::error::{FixError, FixResult};
use crate::op::{batch_to_string, OperationBatch};
use crate::selection::{derive_selections, SelectionSpan};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default pause between two replay actions. Simulates a
/// high-latency typist.
pub const TEXT_LATENCY: Duration = Duration::from_millis(400);

// *** Types

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayAction {
    Selection,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPhase {
    /// Next tick publishes a highlight.
    Selecting,
    /// Next tick applies an edit.
    Editing,
    /// Nothing left to replay.
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayEnd {
    /// Every highlight and edit was replayed.
    Completed,
    /// The cancellation token fired. Edits already applied stay.
    Canceled,
    /// An edit couldn't be applied to the live document.
    Failed(FixError),
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Time between two ticks.
    pub period: Duration,
    /// Who the highlights are attributed to.
    pub actor: Actor,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            period: TEXT_LATENCY,
            actor: Actor::default(),
        }
    }
}

// *** CorrectionJob

/// Run state of one correction.
#[derive(Debug, Clone)]
pub struct CorrectionJob {
    batches: Vec<OperationBatch>,
    selections: Vec<SelectionSpan>,
    /// Index of the next batch to apply.
    edit_cursor: usize,
    /// Index of the next selection to publish.
    selection_cursor: usize,
    last_action: Option<ReplayAction>,
}

impl CorrectionJob {
    pub fn new(batches: Vec<OperationBatch>, selections: Vec<SelectionSpan>) -> CorrectionJob {
        CorrectionJob {
            batches,
            selections,
            edit_cursor: 0,
            selection_cursor: 0,
            last_action: None,
        }
    }

    /// Compile the job that turns `original` into `corrected`.
    pub fn compile(original: &str, corrected: &str) -> FixResult<CorrectionJob> {
        let batches = compile_document(original, corrected)?;
        let selections = derive_selections(&batches);
        Ok(CorrectionJob::new(batches, selections))
    }

    pub fn batches(&self) -> &[OperationBatch] {
        &self.batches
    }

    pub fn selections(&self) -> &[SelectionSpan] {
        &self.selections
    }

    pub fn edit_cursor(&self) -> usize {
        self.edit_cursor
    }

    pub fn selection_cursor(&self) -> usize {
        self.selection_cursor
    }

    /// Number of ticks a full replay takes.
    pub fn total_ticks(&self) -> usize {
        self.batches.len() + self.selections.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.edit_cursor >= self.batches.len() && self.selection_cursor >= self.selections.len()
    }

    pub fn phase(&self) -> ReplayPhase {
        match self.next_action() {
            Some(ReplayAction::Selection) => ReplayPhase::Selecting,
            Some(ReplayAction::Edit) => ReplayPhase::Editing,
            None => ReplayPhase::Done,
        }
    }

    fn next_action(&self) -> Option<ReplayAction> {
        let selection_left = self.selection_cursor < self.selections.len();
        let edit_left = self.edit_cursor < self.batches.len();
        if selection_left && self.last_action != Some(ReplayAction::Selection) {
            Some(ReplayAction::Selection)
        } else if edit_left && self.last_action != Some(ReplayAction::Edit) {
            Some(ReplayAction::Edit)
        } else if selection_left {
            // Only highlights are left; they can't alternate anymore.
            Some(ReplayAction::Selection)
        } else if edit_left {
            Some(ReplayAction::Edit)
        } else {
            None
        }
    }

    /// Perform one replay action on `doc`. Return the action taken, or
    /// None if the job is exhausted. If the edit can't be applied the
    /// job doesn't advance.
    pub fn tick<D: SharedText + Presence>(
        &mut self,
        doc: &mut D,
        actor: &Actor,
    ) -> FixResult<Option<ReplayAction>> {
        match self.next_action() {
            Some(ReplayAction::Selection) => {
                let span = self.selections[self.selection_cursor];
                // Positions are taken against the live document, so
                // the highlight stays put if others edit meanwhile.
                let anchor = doc.relative_position(span.index);
                let head = doc.relative_position(span.index + span.length);
                doc.publish_selection(anchor, head, actor);
                tracing::trace!(
                    "Selection {}/{}: {:?}",
                    self.selection_cursor + 1,
                    self.selections.len(),
                    span
                );
                self.selection_cursor += 1;
                self.last_action = Some(ReplayAction::Selection);
                Ok(Some(ReplayAction::Selection))
            }
            Some(ReplayAction::Edit) => {
                let batch = &self.batches[self.edit_cursor];
                doc.apply_batch(batch)?;
                tracing::trace!(
                    "Edit {}/{}: {}",
                    self.edit_cursor + 1,
                    self.batches.len(),
                    batch_to_string(batch)
                );
                self.edit_cursor += 1;
                self.last_action = Some(ReplayAction::Edit);
                Ok(Some(ReplayAction::Edit))
            }
            None => {
                self.last_action = None;
                Ok(None)
            }
        }
    }
}

// *** Replay loop

/// Replay `job` onto `doc`, one action every `config.period`,
/// starting one period from now. Return as soon as the job is
/// exhausted, the token is cancelled, or an edit fails.
pub async fn run_replay<D>(
    mut job: CorrectionJob,
    doc: Arc<Mutex<D>>,
    config: ReplayConfig,
    cancel: CancellationToken,
) -> ReplayEnd
where
    D: SharedText + Presence,
{
    if job.is_exhausted() {
        return ReplayEnd::Completed;
    }
    let mut ticker = interval_at(Instant::now() + config.period, config.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return ReplayEnd::Canceled;
            }
            _ = ticker.tick() => {
                let res = match doc.lock() {
                    Ok(mut doc) => {
                        // Cancel could've landed while we waited for
                        // the lock.
                        if cancel.is_cancelled() {
                            return ReplayEnd::Canceled;
                        }
                        job.tick(&mut *doc, &config.actor)
                    }
                    Err(err) => Err(FixError::from(err)),
                };
                if let Err(err) = res {
                    tracing::warn!(
                        "Stopped replay at edit {}/{}: {}",
                        job.edit_cursor() + 1,
                        job.batches().len(),
                        err
                    );
                    return ReplayEnd::Failed(err);
                }
                if job.is_exhausted() {
                    return ReplayEnd::Completed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::LocalDoc;
    use crate::op::Operation;

    fn cat_job() -> CorrectionJob {
        let batches = vec![vec![
            Operation::Retain(4),
            Operation::Delete(3),
            Operation::Insert("ran".to_string()),
        ]];
        let selections = derive_selections(&batches);
        CorrectionJob::new(batches, selections)
    }

    fn local_selection(doc: &LocalDoc) -> Option<SelectionSpan> {
        doc.local_state()
            .and_then(|state| doc.resolve_selection(state))
    }

    #[test]
    fn test_tick_alternates_starting_with_selection() {
        let original = "The mouse was chased by the cat.\nHe is a man who is very tall.";
        let corrected = "The cat chased the mouse.\nHe is tall.";
        let mut job = CorrectionJob::compile(original, corrected).unwrap();
        let mut doc = LocalDoc::new(0, original);
        let actor = Actor::default();
        let total = job.total_ticks();
        assert!(job.batches().len() > 1);

        let mut actions = vec![];
        while let Some(action) = job.tick(&mut doc, &actor).unwrap() {
            actions.push(action);
            assert!(job.edit_cursor() <= job.batches().len());
            assert!(job.selection_cursor() <= job.selections().len());
        }

        assert_eq!(actions.len(), total);
        for (idx, action) in actions.iter().enumerate() {
            let expected = if idx % 2 == 0 {
                ReplayAction::Selection
            } else {
                ReplayAction::Edit
            };
            assert_eq!(*action, expected, "tick {}", idx);
        }
        assert_eq!(doc.text(), corrected);
        assert_eq!(local_selection(&doc), Some(SelectionSpan::START));
        assert_eq!(job.phase(), ReplayPhase::Done);
    }

    #[test]
    fn test_tick_selection_precedes_edit() {
        let mut job = cat_job();
        let mut doc = LocalDoc::new(0, "cat sat");
        let actor = Actor::default();

        assert_eq!(job.phase(), ReplayPhase::Selecting);
        assert_eq!(
            job.tick(&mut doc, &actor).unwrap(),
            Some(ReplayAction::Selection)
        );
        assert_eq!(doc.text(), "cat sat");
        assert_eq!(
            local_selection(&doc),
            Some(SelectionSpan {
                index: 4,
                length: 3
            })
        );
        assert_eq!(doc.local_state().unwrap().user, actor);

        assert_eq!(job.phase(), ReplayPhase::Editing);
        assert_eq!(job.tick(&mut doc, &actor).unwrap(), Some(ReplayAction::Edit));
        assert_eq!(doc.text(), "cat ran");

        assert_eq!(
            job.tick(&mut doc, &actor).unwrap(),
            Some(ReplayAction::Selection)
        );
        assert_eq!(local_selection(&doc), Some(SelectionSpan::START));
        assert!(job.is_exhausted());
        assert_eq!(job.tick(&mut doc, &actor).unwrap(), None);
    }

    #[test]
    fn test_tick_failed_edit_does_not_advance() {
        let mut job = cat_job();
        let mut doc = LocalDoc::new(0, "cat");
        let actor = Actor::default();
        job.tick(&mut doc, &actor).unwrap();
        let err = job.tick(&mut doc, &actor).unwrap_err();
        assert_eq!(err, FixError::OpOutOfBound(Operation::Retain(4), 3));
        assert_eq!(job.edit_cursor(), 0);
        assert_eq!(doc.text(), "cat");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_replay_takes_one_period_per_action() {
        let original = "hello\nwrold";
        let corrected = "Hello\nworld!";
        let job = CorrectionJob::compile(original, corrected).unwrap();
        let ticks = job.total_ticks() as u32;
        let doc = Arc::new(Mutex::new(LocalDoc::new(0, original)));

        let start = Instant::now();
        let end = run_replay(
            job,
            doc.clone(),
            ReplayConfig::default(),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(end, ReplayEnd::Completed);
        assert_eq!(Instant::now() - start, TEXT_LATENCY * ticks);
        assert_eq!(doc.lock().unwrap().text(), corrected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_replay_waits_one_period_before_first_action() {
        let doc = Arc::new(Mutex::new(LocalDoc::new(0, "cat sat")));
        let handle = tokio::spawn(run_replay(
            cat_job(),
            doc.clone(),
            ReplayConfig::default(),
            CancellationToken::new(),
        ));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(doc.lock().unwrap().local_state().is_none());

        // First tick at 400ms publishes the highlight.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(doc.lock().unwrap().local_state().is_some());
        assert_eq!(doc.lock().unwrap().text(), "cat sat");

        // Second tick at 800ms applies the edit.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(doc.lock().unwrap().text(), "cat ran");

        assert_eq!(handle.await.unwrap(), ReplayEnd::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_replay_cancel_keeps_applied_edits() {
        let original = "a b c";
        let corrected = "A b C";
        let job = CorrectionJob::compile(original, corrected).unwrap();
        assert_eq!(job.batches().len(), 2);
        let doc = Arc::new(Mutex::new(LocalDoc::new(0, original)));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_replay(
            job,
            doc.clone(),
            ReplayConfig::default(),
            cancel.clone(),
        ));

        // Selection at 400ms, first edit at 800ms.
        tokio::time::sleep(Duration::from_millis(1000)).await;
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), ReplayEnd::Canceled);
        assert_eq!(doc.lock().unwrap().text(), "A b c");

        // Nothing happens after cancellation.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(doc.lock().unwrap().text(), "A b c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_replay_fails_on_diverged_document() {
        // The document changed under us and the edit no longer fits.
        let doc = Arc::new(Mutex::new(LocalDoc::new(0, "cat")));
        let end = run_replay(
            cat_job(),
            doc.clone(),
            ReplayConfig::default(),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(
            end,
            ReplayEnd::Failed(FixError::OpOutOfBound(Operation::Retain(4), 3))
        );
    }
}
