use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use applicant_eval::workflows::screening::{
    AiEvaluation, AiEvaluator, Candidate, CandidateFilter, CandidateId, CandidatePatch,
    CandidateStatus, CandidateStore, EvaluatorError, ManualEvaluation, NewCandidate,
    QuestionGenerator, ScoreRatio, Stage, StageRegistry, StoreError, UpsertOutcome,
};
use async_trait::async_trait;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;

/// Dimension score used when no model is configured, on the evaluator's 0-10 scale.
const NEUTRAL_DIMENSION_SCORE: f64 = 5.0;

/// Mindset-oriented first-interview questions asked when no model is configured.
const STOCK_QUESTIONS: [&str; 10] = [
    "Tell us about the hardest situation in your career so far and how you got through it.",
    "Describe a time your view clashed with your team's. How did you handle it?",
    "What new skill or knowledge did you pick up over the last year?",
    "What is the most important lesson you learned from a failure?",
    "Why do you want to join us, and how does it fit your career plans?",
    "Where do you see your career in five and ten years?",
    "Name three strengths and three weaknesses, and how you are working on the weaknesses.",
    "How do you keep yourself motivated when under pressure?",
    "Which project or result are you most proud of?",
    "What do you value most in your work?",
];

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryStore {
    candidates: Arc<Mutex<HashMap<CandidateId, Candidate>>>,
    stages: Arc<Mutex<Vec<Stage>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("in-memory store mutex poisoned".to_string()))
}

#[async_trait]
impl CandidateStore for InMemoryStore {
    async fn get_candidate(&self, id: &CandidateId) -> Result<Candidate, StoreError> {
        let guard = lock(&self.candidates)?;
        guard.get(id).cloned().ok_or(StoreError::NotFound)
    }

    /// Newest first.
    async fn list_candidates(&self, filter: CandidateFilter) -> Result<Vec<Candidate>, StoreError> {
        let guard = lock(&self.candidates)?;
        let mut candidates: Vec<Candidate> = guard
            .values()
            .filter(|candidate| filter.status.map_or(true, |status| candidate.status == status))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(candidates
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn create_candidate(&self, draft: NewCandidate) -> Result<Candidate, StoreError> {
        let candidate = Candidate::new(CandidateId::generate(), draft, Utc::now());
        let mut guard = lock(&self.candidates)?;
        if guard.contains_key(&candidate.id) {
            return Err(StoreError::Conflict(candidate.id.to_string()));
        }
        guard.insert(candidate.id.clone(), candidate.clone());
        Ok(candidate)
    }

    async fn update_candidate(
        &self,
        id: &CandidateId,
        patch: CandidatePatch,
    ) -> Result<Candidate, StoreError> {
        let mut guard = lock(&self.candidates)?;
        let candidate = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        candidate.apply_patch(patch);
        candidate.updated_at = Utc::now();
        Ok(candidate.clone())
    }

    async fn delete_candidate(&self, id: &CandidateId) -> Result<(), StoreError> {
        let mut guard = lock(&self.candidates)?;
        guard.remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn upsert_manual_evaluation(
        &self,
        id: &CandidateId,
        evaluation: ManualEvaluation,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut guard = lock(&self.candidates)?;
        let candidate = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        let outcome = candidate.upsert_manual_evaluation(evaluation);
        candidate.updated_at = Utc::now();
        Ok(outcome)
    }

    async fn record_ai_evaluation(
        &self,
        id: &CandidateId,
        evaluation: AiEvaluation,
    ) -> Result<Candidate, StoreError> {
        let mut guard = lock(&self.candidates)?;
        let candidate = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        candidate.ai_evaluation = Some(evaluation);
        if candidate.status == CandidateStatus::Pending {
            candidate.status = CandidateStatus::Screening;
        }
        candidate.updated_at = Utc::now();
        Ok(candidate.clone())
    }

    async fn record_interview_questions(
        &self,
        id: &CandidateId,
        questions: Vec<String>,
    ) -> Result<Candidate, StoreError> {
        let mut guard = lock(&self.candidates)?;
        let candidate = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        candidate.record_interview_questions(questions);
        candidate.updated_at = Utc::now();
        Ok(candidate.clone())
    }
}

#[async_trait]
impl StageRegistry for InMemoryStore {
    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError> {
        let mut stages = lock(&self.stages)?.clone();
        stages.sort_by_key(|stage| stage.order);
        Ok(stages)
    }

    async fn create_stage(&self, stage: Stage) -> Result<Stage, StoreError> {
        let mut guard = lock(&self.stages)?;
        if guard
            .iter()
            .any(|existing| existing.stage_name == stage.stage_name)
        {
            return Err(StoreError::Conflict(stage.stage_name));
        }
        guard.push(stage.clone());
        Ok(stage)
    }
}

/// Evaluator used when no model backend is wired in: every dimension scores neutral.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NeutralEvaluator;

#[async_trait]
impl AiEvaluator for NeutralEvaluator {
    async fn evaluate(
        &self,
        candidate: &Candidate,
        ratio: ScoreRatio,
    ) -> Result<AiEvaluation, EvaluatorError> {
        let skills = candidate
            .profile
            .as_ref()
            .map(|profile| profile.technical_skills.len())
            .unwrap_or_default();
        Ok(AiEvaluation {
            skill_score: NEUTRAL_DIMENSION_SCORE,
            mindset_score: NEUTRAL_DIMENSION_SCORE,
            total_score: ratio.combine(NEUTRAL_DIMENSION_SCORE, NEUTRAL_DIMENSION_SCORE),
            skill_ratio: ratio.skill(),
            mindset_ratio: ratio.mindset(),
            summary: format!(
                "No evaluation model configured; neutral scores assigned ({skills} listed skills)"
            ),
            strengths: Vec::new(),
            concerns: Vec::new(),
        })
    }
}

/// Question generator used when no model backend is wired in. Flagged concerns come
/// first, then the stock questions.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StockQuestions;

#[async_trait]
impl QuestionGenerator for StockQuestions {
    async fn generate_questions(
        &self,
        _candidate: &Candidate,
        evaluation: &AiEvaluation,
        count: usize,
    ) -> Result<Vec<String>, EvaluatorError> {
        let follow_ups = evaluation.concerns.iter().map(|concern| {
            format!("Our screening noted: \"{concern}\". Can you walk us through it?")
        });
        Ok(follow_ups
            .chain(STOCK_QUESTIONS.iter().map(|question| question.to_string()))
            .take(count)
            .collect())
    }
}

/// Stages registered on startup so the resolution engine has something to match.
pub(crate) fn default_stages() -> Vec<Stage> {
    [
        (1, "document_screening", "document_screening.csv"),
        (2, "first_interview", "first_interview.csv"),
        (3, "final_interview", "final_interview.csv"),
    ]
    .into_iter()
    .map(|(order, stage_name, criteria_filename)| Stage {
        order,
        stage_name: stage_name.to_string(),
        criteria_filename: criteria_filename.to_string(),
    })
    .collect()
}

impl InMemoryStore {
    pub(crate) fn with_stages(stages: Vec<Stage>) -> Self {
        Self {
            candidates: Arc::default(),
            stages: Arc::new(Mutex::new(stages)),
        }
    }
}
