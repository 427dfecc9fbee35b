use serde::Serialize;
use tracing::{debug, warn};

use super::domain::{Candidate, CandidateId, CriteriaItem, CriteriaTemplate, ManualEvaluation};
use super::repository::{CatalogError, CriteriaCatalog};

/// Where a session's working items came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    Saved,
    Template,
    Unavailable,
}

/// Errors scoped to a single session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionError {
    #[error("criteria '{filename}' could not be loaded: {cause}")]
    TemplateUnavailable {
        filename: String,
        cause: CatalogError,
    },
    #[error("item {index} is out of range for {len} criteria items")]
    ItemOutOfRange { index: usize, len: usize },
}

/// Mutable working copy of one reconciled template for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoringSession {
    candidate_id: CandidateId,
    criteria_filename: String,
    items: Vec<CriteriaItem>,
    comment: String,
    dirty: bool,
    source: SessionSource,
    error: Option<SessionError>,
}

impl ScoringSession {
    pub fn from_saved(candidate_id: CandidateId, saved: &ManualEvaluation) -> Self {
        Self {
            candidate_id,
            criteria_filename: saved.criteria_filename.clone(),
            items: saved.evaluation_data.clone(),
            comment: saved.overall_comment.clone(),
            dirty: false,
            source: SessionSource::Saved,
            error: None,
        }
    }

    pub fn from_template(candidate_id: CandidateId, template: &CriteriaTemplate) -> Self {
        Self {
            candidate_id,
            criteria_filename: template.criteria_filename.clone(),
            items: template.default_items(),
            comment: String::new(),
            dirty: false,
            source: SessionSource::Template,
            error: None,
        }
    }

    /// Empty session carrying a load error for `filename`.
    pub fn unavailable(
        candidate_id: CandidateId,
        filename: impl Into<String>,
        cause: CatalogError,
    ) -> Self {
        let filename = filename.into();
        Self {
            candidate_id,
            error: Some(SessionError::TemplateUnavailable {
                filename: filename.clone(),
                cause,
            }),
            criteria_filename: filename,
            items: Vec::new(),
            comment: String::new(),
            dirty: false,
            source: SessionSource::Unavailable,
        }
    }

    /// Restores a previously saved evaluation for `filename`, if the candidate has one.
    pub fn restore(candidate: &Candidate, filename: &str) -> Option<Self> {
        candidate
            .manual_evaluation(filename)
            .map(|saved| Self::from_saved(candidate.id.clone(), saved))
    }

    pub fn from_fetch(
        candidate_id: CandidateId,
        filename: &str,
        fetched: Result<CriteriaTemplate, CatalogError>,
    ) -> Self {
        match fetched {
            Ok(template) => {
                let mut session = Self::from_template(candidate_id, &template);
                session.criteria_filename = filename.to_string();
                session
            }
            Err(err) => {
                warn!(criteria = filename, error = %err, "criteria template unavailable");
                Self::unavailable(candidate_id, filename, err)
            }
        }
    }

    /// Saved evaluation first, otherwise a fresh template from the catalog.
    pub async fn seed<C>(candidate: &Candidate, filename: &str, catalog: &C) -> Self
    where
        C: CriteriaCatalog + ?Sized,
    {
        if let Some(session) = Self::restore(candidate, filename) {
            debug!(candidate = %candidate.id, criteria = filename, "restored saved evaluation");
            return session;
        }

        let fetched = catalog.get_criteria_template(filename).await;
        Self::from_fetch(candidate.id.clone(), filename, fetched)
    }

    pub fn candidate_id(&self) -> &CandidateId {
        &self.candidate_id
    }

    pub fn criteria_filename(&self) -> &str {
        &self.criteria_filename
    }

    pub fn items(&self) -> &[CriteriaItem] {
        &self.items
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn source(&self) -> SessionSource {
        self.source
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Clamps `value` into the item score range and returns the stored score.
    pub fn set_score(&mut self, index: usize, value: i32) -> Result<u8, SessionError> {
        let item = self.item_mut(index)?;
        item.score = CriteriaItem::clamp_score(value);
        let stored = item.score;
        self.dirty = true;
        Ok(stored)
    }

    pub fn set_memo(&mut self, index: usize, memo: impl Into<String>) -> Result<(), SessionError> {
        self.item_mut(index)?.memo = memo.into();
        self.dirty = true;
        Ok(())
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
        self.dirty = true;
    }

    pub fn commit_payload(&self) -> ManualEvaluation {
        ManualEvaluation {
            criteria_filename: self.criteria_filename.clone(),
            evaluation_data: self.items.clone(),
            overall_comment: self.comment.clone(),
        }
    }

    /// Clears `dirty` unless the session moved on from the committed snapshot.
    pub fn mark_committed(&mut self, committed: &ManualEvaluation) {
        if committed.criteria_filename != self.criteria_filename {
            return;
        }
        self.dirty = self.items != committed.evaluation_data
            || self.comment != committed.overall_comment;
        if self.source == SessionSource::Template {
            self.source = SessionSource::Saved;
        }
    }

    /// Same item count and name order as `template`.
    pub fn is_shape_compatible(&self, template: &CriteriaTemplate) -> bool {
        self.items.len() == template.items.len()
            && self
                .items
                .iter()
                .map(|item| item.name.as_str())
                .eq(template.item_names())
    }

    /// Drops the session when the active template changes. Unsaved edits are lost;
    /// returns whether that happened.
    pub fn discard_on_switch(self) -> bool {
        if self.dirty {
            warn!(
                candidate = %self.candidate_id,
                criteria = %self.criteria_filename,
                "discarding unsaved manual scores on criteria switch"
            );
        }
        self.dirty
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut CriteriaItem, SessionError> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(SessionError::ItemOutOfRange { index, len })
    }
}
