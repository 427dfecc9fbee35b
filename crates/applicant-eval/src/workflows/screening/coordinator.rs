//! Async owner of a reviewer's working state for one candidate at a time.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an `.await`. Every
//! remote call captures a ticket before suspending and re-validates it on resume, so a
//! result that arrives after the reviewer navigated away or switched templates is
//! dropped instead of overwriting newer state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::composite::{RatioAdjustment, ScoreRatio};
use super::domain::{AiEvaluation, Candidate, CandidateId, CriteriaTemplate, UpsertOutcome};
use super::error::ScreeningError;
use super::repository::{
    CandidateStore, CatalogError, CriteriaCatalog, StageRegistry, StoreError,
};
use super::resolution::{
    resolve, ActiveCriteria, CatalogSnapshot, FallbackPolicy, Resolution, ResolutionChange,
};
use super::session::{ScoringSession, SessionSource};

/// Result of a load or re-resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready(Resolution),
    /// A newer request took over before this one finished; nothing was applied.
    Superseded,
}

/// Result of a commit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Saved(UpsertOutcome),
    /// A commit for the same candidate and template is still in flight.
    AlreadyPending,
}

type CommitKey = (CandidateId, String);

#[derive(Debug)]
struct ReviewState {
    generation: u64,
    selection_epoch: u64,
    candidate_load_seq: u64,
    candidate: Option<Candidate>,
    snapshot: Option<CatalogSnapshot>,
    resolution: Option<Resolution>,
    active: ActiveCriteria,
    session: Option<ScoringSession>,
    ratio: RatioAdjustment,
    error: Option<ScreeningError>,
    pending_commits: HashSet<CommitKey>,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            generation: 0,
            selection_epoch: 0,
            candidate_load_seq: 0,
            candidate: None,
            snapshot: None,
            resolution: None,
            active: ActiveCriteria::default(),
            session: None,
            ratio: RatioAdjustment::new(ScoreRatio::DEFAULT),
            error: None,
            pending_commits: HashSet::new(),
        }
    }
}

impl ReviewState {
    fn drop_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.discard_on_switch();
        }
    }

    /// Forgets everything tied to the previous candidate and returns the new generation.
    fn navigate(&mut self) -> u64 {
        self.generation += 1;
        self.selection_epoch += 1;
        self.drop_session();
        self.candidate = None;
        self.snapshot = None;
        self.resolution = None;
        self.active.clear();
        self.error = None;
        self.ratio = RatioAdjustment::new(ScoreRatio::DEFAULT);
        self.generation
    }
}

/// Template fetch that has to be re-validated once it completes.
struct FetchTicket {
    generation: u64,
    epoch: u64,
    candidate_id: CandidateId,
    filename: String,
}

/// Releases the per-key commit marker even when the commit future is dropped.
struct PendingCommit<'a> {
    state: &'a Mutex<ReviewState>,
    key: Option<CommitKey>,
}

impl PendingCommit<'_> {
    fn release(&mut self, state: &mut ReviewState) {
        if let Some(key) = self.key.take() {
            state.pending_commits.remove(&key);
        }
    }
}

impl Drop for PendingCommit<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pending_commits
                .remove(&key);
        }
    }
}

/// Drives resolution, session seeding and commits against the remote collaborators.
pub struct ReviewCoordinator<S, C> {
    store: Arc<S>,
    catalog: Arc<C>,
    fallback: FallbackPolicy,
    state: Mutex<ReviewState>,
}

impl<S, C> ReviewCoordinator<S, C>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
{
    pub fn new(store: Arc<S>, catalog: Arc<C>, fallback: FallbackPolicy) -> Self {
        Self {
            store,
            catalog,
            fallback,
            state: Mutex::new(ReviewState::default()),
        }
    }

    /// Loads candidate, stages and catalog concurrently, then resolves and seeds.
    pub async fn open(&self, candidate_id: &CandidateId) -> Result<LoadOutcome, ScreeningError> {
        let generation = self.lock().navigate();

        let (candidate, stages, names) = tokio::join!(
            self.store.get_candidate(candidate_id),
            self.store.list_stages(),
            self.catalog.list_criteria_names(),
        );

        {
            let mut state = self.lock();
            if state.generation != generation {
                debug!(candidate = %candidate_id, "discarding superseded candidate load");
                return Ok(LoadOutcome::Superseded);
            }

            let loaded = candidate
                .map_err(|err| match err {
                    StoreError::NotFound => {
                        ScreeningError::NotFound(format!("candidate {candidate_id}"))
                    }
                    other => ScreeningError::from(other),
                })
                .and_then(|candidate| Ok((candidate, stages?, names?)));

            match loaded {
                Ok((candidate, stages, names)) => {
                    state.ratio = RatioAdjustment::from_evaluation(candidate.ai_evaluation.as_ref());
                    state.candidate = Some(candidate);
                    state.snapshot = Some(CatalogSnapshot::new(stages, names));
                }
                Err(err) => {
                    warn!(candidate = %candidate_id, error = %err, "review load failed");
                    state.error = Some(err.clone());
                    return Err(err);
                }
            }
        }

        self.reconcile(generation).await
    }

    /// Re-fetches the open candidate (e.g. after an evaluation was saved elsewhere).
    pub async fn reload_candidate(&self) -> Result<LoadOutcome, ScreeningError> {
        let (generation, ticket, candidate_id) = {
            let mut state = self.lock();
            let candidate_id = state
                .candidate
                .as_ref()
                .map(|candidate| candidate.id.clone())
                .ok_or_else(|| ScreeningError::validation("no candidate is open"))?;
            state.candidate_load_seq += 1;
            (state.generation, state.candidate_load_seq, candidate_id)
        };

        let fetched = self.store.get_candidate(&candidate_id).await;

        {
            let mut state = self.lock();
            if state.generation != generation || state.candidate_load_seq != ticket {
                debug!(candidate = %candidate_id, "discarding superseded candidate reload");
                return Ok(LoadOutcome::Superseded);
            }
            match fetched {
                Ok(candidate) => state.candidate = Some(candidate),
                Err(err) => {
                    let err = ScreeningError::from(err);
                    state.error = Some(err.clone());
                    return Err(err);
                }
            }
        }

        self.reconcile(generation).await
    }

    /// Reloads stages and catalog names, then re-resolves.
    pub async fn refresh_catalog(&self) -> Result<LoadOutcome, ScreeningError> {
        let generation = {
            let state = self.lock();
            if state.candidate.is_none() {
                return Err(ScreeningError::validation("no candidate is open"));
            }
            state.generation
        };

        let (stages, names) = tokio::join!(
            self.store.list_stages(),
            self.catalog.list_criteria_names()
        );

        {
            let mut state = self.lock();
            if state.generation != generation {
                return Ok(LoadOutcome::Superseded);
            }
            match stages
                .map_err(ScreeningError::from)
                .and_then(|stages| Ok((stages, names?)))
            {
                Ok((stages, names)) => state.snapshot = Some(CatalogSnapshot::new(stages, names)),
                Err(err) => {
                    state.error = Some(err.clone());
                    return Err(err);
                }
            }
        }

        self.reconcile(generation).await
    }

    /// Reviewer override of the resolved template.
    pub async fn select_criteria(&self, filename: &str) -> Result<LoadOutcome, ScreeningError> {
        let ticket = {
            let mut state = self.lock();
            let known = state
                .snapshot
                .as_ref()
                .map(|snapshot| snapshot.contains_criteria(filename))
                .unwrap_or(false);
            if !known {
                return Err(ScreeningError::NotFound(format!(
                    "criteria '{filename}' is not in the catalog"
                )));
            }
            let resolution = Resolution::Selected {
                criteria_filename: filename.to_string(),
            };
            state.resolution = Some(resolution.clone());
            let change = state.active.set(Some(filename));
            match Self::apply_change(&mut state, change) {
                Some(ticket) => (resolution, ticket),
                None => return Ok(LoadOutcome::Ready(resolution)),
            }
        };

        let (resolution, ticket) = ticket;
        if self.fetch_and_install(ticket).await? {
            Ok(LoadOutcome::Ready(resolution))
        } else {
            Ok(LoadOutcome::Superseded)
        }
    }

    /// Navigates away; outstanding loads and fetches for the old candidate are ignored.
    pub fn close(&self) {
        self.lock().navigate();
    }

    pub fn set_score(&self, index: usize, value: i32) -> Result<u8, ScreeningError> {
        let mut state = self.lock();
        let session = Self::session_mut(&mut state)?;
        Ok(session.set_score(index, value)?)
    }

    pub fn set_memo(&self, index: usize, memo: impl Into<String>) -> Result<(), ScreeningError> {
        let mut state = self.lock();
        let session = Self::session_mut(&mut state)?;
        Ok(session.set_memo(index, memo)?)
    }

    pub fn set_comment(&self, comment: impl Into<String>) -> Result<(), ScreeningError> {
        let mut state = self.lock();
        Self::session_mut(&mut state)?.set_comment(comment);
        Ok(())
    }

    /// Upserts the working copy; a second call for the same key while one is pending
    /// is a no-op.
    pub async fn commit(&self) -> Result<CommitOutcome, ScreeningError> {
        let (key, payload, generation) = {
            let mut state = self.lock();
            let session = state
                .session
                .as_ref()
                .ok_or_else(|| ScreeningError::validation("no active scoring session"))?;
            if session.source() == SessionSource::Unavailable {
                return Err(ScreeningError::validation(format!(
                    "criteria '{}' is not loaded",
                    session.criteria_filename()
                )));
            }
            let key = (
                session.candidate_id().clone(),
                session.criteria_filename().to_string(),
            );
            let payload = session.commit_payload();
            if !state.pending_commits.insert(key.clone()) {
                debug!(candidate = %key.0, criteria = %key.1, "commit already in flight");
                return Ok(CommitOutcome::AlreadyPending);
            }
            (key, payload, state.generation)
        };

        let mut pending = PendingCommit {
            state: &self.state,
            key: Some(key.clone()),
        };
        let result = self
            .store
            .upsert_manual_evaluation(&key.0, payload.clone())
            .await;

        let mut state = self.lock();
        pending.release(&mut state);

        match result {
            Ok(outcome) => {
                if state.generation == generation {
                    if let Some(candidate) = state.candidate.as_mut() {
                        candidate.upsert_manual_evaluation(payload.clone());
                    }
                    if let Some(session) = state.session.as_mut() {
                        if session.candidate_id() == &key.0 {
                            session.mark_committed(&payload);
                        }
                    }
                    state.error = None;
                }
                info!(candidate = %key.0, criteria = %key.1, ?outcome, "manual evaluation saved");
                Ok(CommitOutcome::Saved(outcome))
            }
            Err(err) => {
                let err = ScreeningError::from(err);
                warn!(candidate = %key.0, criteria = %key.1, error = %err, "manual evaluation save failed");
                if state.generation == generation {
                    state.error = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    /// Moves the pending ratio; the displayed composite is unchanged until recompute.
    pub fn adjust_ratio(&self, skill: f64) -> Result<ScoreRatio, ScreeningError> {
        Ok(self.lock().ratio.slide_to(skill)?)
    }

    /// Applies the pending ratio to the open candidate's AI evaluation.
    pub fn recompute_composite(&self) -> Result<AiEvaluation, ScreeningError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let candidate = state
            .candidate
            .as_mut()
            .ok_or_else(|| ScreeningError::validation("no candidate is open"))?;
        let evaluation = candidate
            .ai_evaluation
            .as_ref()
            .ok_or_else(|| ScreeningError::NotFound("AI evaluation".to_string()))?;
        let updated = state.ratio.recompute(evaluation);
        candidate.ai_evaluation = Some(updated.clone());
        Ok(updated)
    }

    pub fn pending_ratio(&self) -> ScoreRatio {
        self.lock().ratio.pending()
    }

    pub fn session(&self) -> Option<ScoringSession> {
        self.lock().session.clone()
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.lock().resolution.clone()
    }

    pub fn active_criteria(&self) -> Option<String> {
        self.lock().active.current().map(str::to_string)
    }

    pub fn candidate(&self) -> Option<Candidate> {
        self.lock().candidate.clone()
    }

    pub fn last_error(&self) -> Option<ScreeningError> {
        self.lock().error.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ReviewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_mut(state: &mut ReviewState) -> Result<&mut ScoringSession, ScreeningError> {
        state
            .session
            .as_mut()
            .ok_or_else(|| ScreeningError::validation("no active scoring session"))
    }

    /// Resolves against the loaded candidate and snapshot. An unchanged filename only
    /// triggers a fetch when its last load failed.
    async fn reconcile(&self, generation: u64) -> Result<LoadOutcome, ScreeningError> {
        let (resolution, ticket) = {
            let mut guard = self.lock();
            if guard.generation != generation {
                return Ok(LoadOutcome::Superseded);
            }
            let state = &mut *guard;
            let (Some(candidate), Some(snapshot)) = (&state.candidate, &state.snapshot) else {
                return Err(ScreeningError::validation("review data is not loaded"));
            };

            let resolution = resolve(candidate.current_stage.as_deref(), snapshot, &self.fallback);
            state.resolution = Some(resolution.clone());
            let change = state.active.update(&resolution);
            debug!(candidate = %candidate.id, ?resolution, ?change, "criteria resolved");
            (resolution, Self::apply_change(state, change))
        };

        if let Some(ticket) = ticket {
            if !self.fetch_and_install(ticket).await? {
                return Ok(LoadOutcome::Superseded);
            }
        }
        Ok(LoadOutcome::Ready(resolution))
    }

    /// Updates the session for a resolution change. Returns a ticket when the template
    /// has to come from the catalog.
    fn apply_change(state: &mut ReviewState, change: ResolutionChange) -> Option<FetchTicket> {
        let candidate = state.candidate.as_ref()?;

        match change {
            ResolutionChange::Unchanged => {
                let filename = state.active.current()?.to_string();
                let restored = ScoringSession::restore(candidate, &filename);
                let candidate_id = candidate.id.clone();
                let retry = restored.is_none()
                    && state
                        .session
                        .as_ref()
                        .is_some_and(|current| current.source() == SessionSource::Unavailable);
                let replace = match (&state.session, &restored) {
                    (Some(current), Some(restored)) => !current.is_dirty() && current != restored,
                    (None, Some(_)) => true,
                    _ => false,
                };

                if replace {
                    // An in-flight fetch for this filename must not overwrite the restore.
                    state.selection_epoch += 1;
                    state.session = restored;
                    return None;
                }
                if !retry {
                    return None;
                }
                state.selection_epoch += 1;
                debug!(criteria = %filename, "retrying unavailable criteria");
                Some(FetchTicket {
                    generation: state.generation,
                    epoch: state.selection_epoch,
                    candidate_id,
                    filename,
                })
            }
            ResolutionChange::Switched { next, .. } => {
                state.selection_epoch += 1;
                let restored = next
                    .as_deref()
                    .and_then(|filename| ScoringSession::restore(candidate, filename));
                let candidate_id = candidate.id.clone();
                state.drop_session();

                let filename = next?;
                if let Some(session) = restored {
                    state.session = Some(session);
                    return None;
                }
                Some(FetchTicket {
                    generation: state.generation,
                    epoch: state.selection_epoch,
                    candidate_id,
                    filename,
                })
            }
        }
    }

    /// Returns `false` when the result arrived too late and was dropped.
    async fn fetch_and_install(&self, ticket: FetchTicket) -> Result<bool, ScreeningError> {
        let fetched = self.catalog.get_criteria_template(&ticket.filename).await;
        self.install(ticket, fetched)
    }

    fn install(
        &self,
        ticket: FetchTicket,
        fetched: Result<CriteriaTemplate, CatalogError>,
    ) -> Result<bool, ScreeningError> {
        let mut state = self.lock();
        if state.generation != ticket.generation || state.selection_epoch != ticket.epoch {
            debug!(criteria = %ticket.filename, "discarding stale criteria fetch");
            return Ok(false);
        }

        let session = ScoringSession::from_fetch(ticket.candidate_id, &ticket.filename, fetched);
        let scoped_error = session.error().cloned();
        info!(
            criteria = %ticket.filename,
            items = session.items().len(),
            source = ?session.source(),
            "scoring session seeded"
        );
        state.session = Some(session);

        match scoped_error {
            Some(err) => {
                let err = ScreeningError::from(err);
                state.error = Some(err.clone());
                Err(err)
            }
            None => {
                state.error = None;
                Ok(true)
            }
        }
    }
}
