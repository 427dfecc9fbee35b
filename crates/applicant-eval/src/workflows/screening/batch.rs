use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::composite::{reweigh, ScoreRatio};
use super::domain::{CandidateId, CandidateProfile, NewCandidate};
use super::error::ScreeningError;
use super::repository::{AiEvaluator, CandidateStore};

/// One candidate as read from an uploaded batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRow {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub profile: CandidateProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Success,
    Error,
}

/// Per-row result; exactly one of `total_score` or `error` is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOutcome {
    pub name: String,
    pub email: String,
    pub status: RowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<CandidateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RowOutcome {
    fn success(row: &BatchRow, candidate_id: CandidateId, total_score: f64) -> Self {
        Self {
            name: row.name.clone(),
            email: row.email.clone(),
            status: RowStatus::Success,
            candidate_id: Some(candidate_id),
            total_score: Some(total_score),
            error: None,
        }
    }

    fn failure(row: &BatchRow, error: &ScreeningError) -> Self {
        let or_unknown = |value: &str| {
            if value.trim().is_empty() {
                "Unknown".to_string()
            } else {
                value.to_string()
            }
        };
        Self {
            name: or_unknown(&row.name),
            email: or_unknown(&row.email),
            status: RowStatus::Error,
            candidate_id: None,
            total_score: None,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregate over all rows, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub results: Vec<RowOutcome>,
}

impl BatchResult {
    pub fn from_outcomes(results: Vec<RowOutcome>) -> Self {
        let success_count = results
            .iter()
            .filter(|outcome| outcome.status == RowStatus::Success)
            .count();
        Self {
            total_count: results.len(),
            success_count,
            error_count: results.len() - success_count,
            results,
        }
    }
}

/// Creates and AI-scores candidates row by row with a shared ratio.
pub struct BatchDriver<S, A> {
    store: Arc<S>,
    evaluator: Arc<A>,
    concurrency: usize,
}

impl<S, A> BatchDriver<S, A>
where
    S: CandidateStore + 'static,
    A: AiEvaluator + 'static,
{
    pub fn new(store: Arc<S>, evaluator: Arc<A>, concurrency: usize) -> Self {
        Self {
            store,
            evaluator,
            concurrency: concurrency.max(1),
        }
    }

    /// Rows run as independent futures, at most `concurrency` at a time. A failing row
    /// only affects its own outcome.
    pub async fn process(&self, rows: Vec<BatchRow>, ratio: ScoreRatio) -> BatchResult {
        let outcomes: Vec<RowOutcome> = stream::iter(rows)
            .map(|row| self.process_row(row, ratio))
            .buffered(self.concurrency)
            .collect()
            .await;

        let result = BatchResult::from_outcomes(outcomes);
        info!(
            total = result.total_count,
            succeeded = result.success_count,
            failed = result.error_count,
            skill_ratio = ratio.skill(),
            "batch evaluation finished"
        );
        result
    }

    async fn process_row(&self, row: BatchRow, ratio: ScoreRatio) -> RowOutcome {
        match self.evaluate_row(&row, ratio).await {
            Ok((candidate_id, total_score)) => RowOutcome::success(&row, candidate_id, total_score),
            Err(err) => {
                warn!(name = %row.name, email = %row.email, error = %err, "batch row failed");
                RowOutcome::failure(&row, &err)
            }
        }
    }

    async fn evaluate_row(
        &self,
        row: &BatchRow,
        ratio: ScoreRatio,
    ) -> Result<(CandidateId, f64), ScreeningError> {
        if row.name.trim().is_empty() {
            return Err(ScreeningError::validation("row is missing a name"));
        }
        if row.email.trim().is_empty() {
            return Err(ScreeningError::validation("row is missing an email"));
        }

        let candidate = self
            .store
            .create_candidate(NewCandidate {
                name: row.name.trim().to_string(),
                email: row.email.trim().to_string(),
                phone: row.phone.clone(),
                profile: Some(row.profile.clone()),
            })
            .await?;

        let evaluation = self.evaluator.evaluate(&candidate, ratio).await?;
        let evaluation = reweigh(&evaluation, ratio);
        let total_score = evaluation.total_score;
        self.store
            .record_ai_evaluation(&candidate.id, evaluation)
            .await?;

        Ok((candidate.id, total_score))
    }
}
