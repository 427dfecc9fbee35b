use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::batch::{BatchDriver, BatchResult, BatchRow};
use super::composite::{reweigh, ScoreRatio};
use super::domain::{
    AiEvaluation, Candidate, CandidateFilter, CandidateId, CandidatePatch, CriteriaTemplate,
    ManualEvaluation, NewCandidate, Stage, UpsertOutcome, DEFAULT_QUESTION_COUNT,
    MAX_QUESTION_COUNT,
};
use super::error::ScreeningError;
use super::export::{export_rows, ExportFilter, ExportRow};
use super::repository::{
    AiEvaluator, CandidateStore, CriteriaCatalog, QuestionGenerator, StageRegistry, StoreError,
};
use super::resolution::{resolve, CatalogSnapshot, FallbackPolicy, Resolution};
use crate::config::ScoringConfig;

/// Resolved template for a candidate together with any saved scores for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateCriteria {
    pub candidate_id: CandidateId,
    pub current_stage: Option<String>,
    pub resolution: Resolution,
    pub manual_evaluation: Option<ManualEvaluation>,
}

/// Service composing the candidate store, criteria catalog, AI evaluator and
/// interview question generator.
pub struct ScreeningService<S, C, A, Q> {
    store: Arc<S>,
    catalog: Arc<C>,
    evaluator: Arc<A>,
    questions: Arc<Q>,
    config: ScoringConfig,
}

impl<S, C, A, Q> ScreeningService<S, C, A, Q>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    pub fn new(
        store: Arc<S>,
        catalog: Arc<C>,
        evaluator: Arc<A>,
        questions: Arc<Q>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            evaluator,
            questions,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn fallback(&self) -> &FallbackPolicy {
        &self.config.fallback
    }

    pub async fn list_candidates(
        &self,
        filter: CandidateFilter,
    ) -> Result<Vec<Candidate>, ScreeningError> {
        Ok(self.store.list_candidates(filter).await?)
    }

    pub async fn get_candidate(&self, id: &CandidateId) -> Result<Candidate, ScreeningError> {
        self.store
            .get_candidate(id)
            .await
            .map_err(|err| candidate_error(id, err))
    }

    pub async fn create_candidate(&self, draft: NewCandidate) -> Result<Candidate, ScreeningError> {
        if draft.name.trim().is_empty() {
            return Err(ScreeningError::validation("candidate name is required"));
        }
        if draft.email.trim().is_empty() {
            return Err(ScreeningError::validation("candidate email is required"));
        }
        let candidate = self.store.create_candidate(draft).await?;
        info!(candidate = %candidate.id, "candidate registered");
        Ok(candidate)
    }

    pub async fn update_candidate(
        &self,
        id: &CandidateId,
        patch: CandidatePatch,
    ) -> Result<Candidate, ScreeningError> {
        if patch
            .name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(ScreeningError::validation("candidate name cannot be blank"));
        }
        self.store
            .update_candidate(id, patch)
            .await
            .map_err(|err| candidate_error(id, err))
    }

    pub async fn delete_candidate(&self, id: &CandidateId) -> Result<(), ScreeningError> {
        self.store
            .delete_candidate(id)
            .await
            .map_err(|err| candidate_error(id, err))?;
        info!(candidate = %id, "candidate deleted");
        Ok(())
    }

    /// Upserts by criteria filename; scores outside 1..=5 are rejected before the store is touched.
    pub async fn save_manual_evaluation(
        &self,
        id: &CandidateId,
        evaluation: ManualEvaluation,
    ) -> Result<UpsertOutcome, ScreeningError> {
        if evaluation.criteria_filename.trim().is_empty() {
            return Err(ScreeningError::validation("criteria filename is required"));
        }
        if let Some(item) = evaluation
            .evaluation_data
            .iter()
            .find(|item| !item.has_valid_score())
        {
            return Err(ScreeningError::validation(format!(
                "score {} for '{}' is outside 1..=5",
                item.score, item.name
            )));
        }

        let criteria = evaluation.criteria_filename.clone();
        let outcome = self
            .store
            .upsert_manual_evaluation(id, evaluation)
            .await
            .map_err(|err| candidate_error(id, err))?;
        info!(candidate = %id, %criteria, ?outcome, "manual evaluation saved");
        Ok(outcome)
    }

    /// Runs the AI evaluator; missing ratios fall back to the configured default.
    pub async fn evaluate_candidate(
        &self,
        id: &CandidateId,
        skill_ratio: Option<f64>,
        mindset_ratio: Option<f64>,
    ) -> Result<AiEvaluation, ScreeningError> {
        let ratio = self.ratio_from_request(skill_ratio, mindset_ratio)?;
        let candidate = self.get_candidate(id).await?;

        let evaluation = self.evaluator.evaluate(&candidate, ratio).await?;
        let evaluation = reweigh(&evaluation, ratio);
        self.store
            .record_ai_evaluation(id, evaluation.clone())
            .await
            .map_err(|err| candidate_error(id, err))?;
        info!(
            candidate = %id,
            total = evaluation.total_score,
            skill_ratio = ratio.skill(),
            "AI evaluation recorded"
        );
        Ok(evaluation)
    }

    /// Recomputes the composite from the stored dimension scores; the evaluator is not re-run.
    pub async fn update_ratio(
        &self,
        id: &CandidateId,
        skill_ratio: f64,
        mindset_ratio: Option<f64>,
    ) -> Result<AiEvaluation, ScreeningError> {
        let ratio = self.ratio_from_request(Some(skill_ratio), mindset_ratio)?;
        let candidate = self.get_candidate(id).await?;
        let current = candidate
            .ai_evaluation
            .as_ref()
            .ok_or_else(|| ScreeningError::NotFound(format!("AI evaluation for candidate {id}")))?;

        let updated = reweigh(current, ratio);
        self.store
            .record_ai_evaluation(id, updated.clone())
            .await
            .map_err(|err| candidate_error(id, err))?;
        info!(candidate = %id, total = updated.total_score, "composite score reweighed");
        Ok(updated)
    }

    /// Drafts first-interview questions for an evaluated candidate and stores them.
    /// The candidate moves into the interview step.
    pub async fn generate_interview_questions(
        &self,
        id: &CandidateId,
        count: Option<usize>,
    ) -> Result<Vec<String>, ScreeningError> {
        let count = count.unwrap_or(DEFAULT_QUESTION_COUNT);
        if !(1..=MAX_QUESTION_COUNT).contains(&count) {
            return Err(ScreeningError::validation(format!(
                "question count must be between 1 and {MAX_QUESTION_COUNT}"
            )));
        }
        let candidate = self.get_candidate(id).await?;
        if candidate.profile.is_none() {
            return Err(ScreeningError::validation(
                "candidate profile has not been extracted yet",
            ));
        }
        let evaluation = candidate
            .ai_evaluation
            .as_ref()
            .ok_or_else(|| ScreeningError::validation("candidate has not been evaluated yet"))?;

        let mut questions = self
            .questions
            .generate_questions(&candidate, evaluation, count)
            .await?;
        questions.retain(|question| !question.trim().is_empty());
        questions.truncate(count);

        self.store
            .record_interview_questions(id, questions.clone())
            .await
            .map_err(|err| candidate_error(id, err))?;
        info!(candidate = %id, count = questions.len(), "interview questions drafted");
        Ok(questions)
    }

    pub async fn interview_questions(
        &self,
        id: &CandidateId,
    ) -> Result<Vec<String>, ScreeningError> {
        Ok(self.get_candidate(id).await?.interview_questions)
    }

    pub async fn list_stages(&self) -> Result<Vec<Stage>, ScreeningError> {
        Ok(self.store.list_stages().await?)
    }

    pub async fn create_stage(&self, stage: Stage) -> Result<Stage, ScreeningError> {
        if stage.stage_name.trim().is_empty() {
            return Err(ScreeningError::validation("stage name is required"));
        }
        if stage.criteria_filename.trim().is_empty() {
            return Err(ScreeningError::validation("stage criteria filename is required"));
        }
        if stage.order == 0 {
            return Err(ScreeningError::validation("stage order must be a positive integer"));
        }
        let created = self.store.create_stage(stage).await.map_err(|err| match err {
            StoreError::Conflict(name) => {
                ScreeningError::Conflict(format!("stage '{name}' already exists"))
            }
            other => ScreeningError::from(other),
        })?;
        info!(stage = %created.stage_name, order = created.order, "stage registered");
        Ok(created)
    }

    pub async fn list_criteria(&self) -> Result<Vec<String>, ScreeningError> {
        Ok(self.catalog.list_criteria_names().await?)
    }

    pub async fn get_criteria(&self, name: &str) -> Result<CriteriaTemplate, ScreeningError> {
        Ok(self.catalog.get_criteria_template(name).await?)
    }

    pub async fn upload_criteria(
        &self,
        name: &str,
        contents: &[u8],
    ) -> Result<String, ScreeningError> {
        if contents.is_empty() {
            return Err(ScreeningError::validation("criteria document is empty"));
        }
        Ok(self.catalog.store_criteria(name, contents).await?)
    }

    pub async fn delete_criteria(&self, name: &str) -> Result<(), ScreeningError> {
        Ok(self.catalog.delete_criteria(name).await?)
    }

    /// Stage match first, then the configured fallback, against a fresh catalog snapshot.
    pub async fn resolve_for_candidate(
        &self,
        id: &CandidateId,
    ) -> Result<CandidateCriteria, ScreeningError> {
        let (candidate, stages, names) = tokio::join!(
            self.store.get_candidate(id),
            self.store.list_stages(),
            self.catalog.list_criteria_names(),
        );
        let candidate = candidate.map_err(|err| candidate_error(id, err))?;
        let snapshot = CatalogSnapshot::new(stages?, names?);

        let resolution = resolve(
            candidate.current_stage.as_deref(),
            &snapshot,
            &self.config.fallback,
        );
        let manual_evaluation = resolution
            .criteria_filename()
            .and_then(|filename| candidate.manual_evaluation(filename))
            .cloned();

        Ok(CandidateCriteria {
            candidate_id: candidate.id,
            current_stage: candidate.current_stage,
            resolution,
            manual_evaluation,
        })
    }

    pub async fn process_batch(
        &self,
        rows: Vec<BatchRow>,
        skill_ratio: Option<f64>,
    ) -> Result<BatchResult, ScreeningError> {
        let ratio = self.ratio_from_request(skill_ratio, None)?;
        if rows.is_empty() {
            warn!("batch upload contained no rows");
        }
        let driver = BatchDriver::new(
            Arc::clone(&self.store),
            Arc::clone(&self.evaluator),
            self.config.batch_concurrency,
        );
        Ok(driver.process(rows, ratio).await)
    }

    pub async fn export_results(
        &self,
        filter: ExportFilter,
    ) -> Result<Vec<ExportRow>, ScreeningError> {
        let candidates = self
            .store
            .list_candidates(CandidateFilter {
                status: filter.status,
                limit: usize::MAX,
                offset: 0,
            })
            .await?;
        Ok(export_rows(&candidates, &filter))
    }

    fn ratio_from_request(
        &self,
        skill: Option<f64>,
        mindset: Option<f64>,
    ) -> Result<ScoreRatio, ScreeningError> {
        let ratio = match (skill, mindset) {
            (Some(skill), Some(mindset)) => ScoreRatio::from_pair(skill, mindset)?,
            (Some(skill), None) => ScoreRatio::new(skill)?,
            (None, Some(mindset)) => ScoreRatio::new(1.0 - mindset)?,
            (None, None) => self.config.default_ratio,
        };
        Ok(ratio)
    }
}

fn candidate_error(id: &CandidateId, err: StoreError) -> ScreeningError {
    match err {
        StoreError::NotFound => ScreeningError::NotFound(format!("candidate {id}")),
        other => ScreeningError::from(other),
    }
}
