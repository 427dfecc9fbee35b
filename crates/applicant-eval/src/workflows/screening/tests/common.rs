use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::Notify;

use crate::config::ScoringConfig;
use crate::workflows::screening::catalog::parse_document;
use crate::workflows::screening::composite::{combine, ScoreRatio};
use crate::workflows::screening::domain::{
    AiEvaluation, Candidate, CandidateFilter, CandidateId, CandidatePatch, CandidateStatus,
    CriteriaItem, CriteriaTemplate, ManualEvaluation, NewCandidate, Stage, UpsertOutcome,
};
use crate::workflows::screening::repository::{
    AiEvaluator, CandidateStore, CatalogError, CriteriaCatalog, EvaluatorError,
    QuestionGenerator, StageRegistry, StoreError,
};
use crate::workflows::screening::{screening_router, ScreeningService};

pub(super) const FIRST_ROUND: &str = "first_interview.csv";
pub(super) const SECOND_ROUND: &str = "second_interview.md";
pub(super) const GENERAL: &str = "general.csv";

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap()
}

pub(super) fn template(name: &str) -> CriteriaTemplate {
    CriteriaTemplate {
        criteria_filename: name.to_string(),
        items: vec![
            CriteriaItem::unscored("Logical thinking", "Builds arguments step by step"),
            CriteriaItem::unscored("Ownership", "Carries work through to the end"),
            CriteriaItem::unscored("Curiosity", "Asks why and digs deeper"),
        ],
    }
}

pub(super) fn stages() -> Vec<Stage> {
    vec![
        Stage {
            order: 2,
            stage_name: "second_interview".to_string(),
            criteria_filename: SECOND_ROUND.to_string(),
        },
        Stage {
            order: 1,
            stage_name: "first_interview".to_string(),
            criteria_filename: FIRST_ROUND.to_string(),
        },
    ]
}

pub(super) fn draft(name: &str) -> NewCandidate {
    NewCandidate {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_ascii_lowercase()),
        phone: None,
        profile: None,
    }
}

pub(super) fn evaluation(skill: f64, mindset: f64, ratio: ScoreRatio) -> AiEvaluation {
    AiEvaluation {
        skill_score: skill,
        mindset_score: mindset,
        total_score: combine(skill, mindset, ratio.skill()),
        skill_ratio: ratio.skill(),
        mindset_ratio: ratio.mindset(),
        summary: "Solid fundamentals".to_string(),
        strengths: vec!["structured answers".to_string()],
        concerns: Vec::new(),
    }
}

/// Holds a call until the test releases it; `entered` fires once the call is waiting.
#[derive(Default)]
pub(super) struct Gate {
    pub(super) entered: Notify,
    pub(super) release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    candidates: Mutex<BTreeMap<CandidateId, Candidate>>,
    stages: Mutex<Vec<Stage>>,
    next_id: AtomicUsize,
    upserts: AtomicUsize,
    upsert_gate: Mutex<Option<Arc<Gate>>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub(super) fn with_stages(stages: Vec<Stage>) -> Self {
        let store = Self::default();
        *store.stages.lock().unwrap() = stages;
        store
    }

    pub(super) fn insert(&self, draft: NewCandidate, stage: Option<&str>) -> CandidateId {
        let id = self.next_id();
        let mut candidate = Candidate::new(id.clone(), draft, fixed_now());
        candidate.current_stage = stage.map(str::to_string);
        self.candidates.lock().unwrap().insert(id.clone(), candidate);
        id
    }

    pub(super) fn modify(&self, id: &CandidateId, change: impl FnOnce(&mut Candidate)) {
        let mut guard = self.candidates.lock().unwrap();
        change(guard.get_mut(id).expect("candidate exists"));
    }

    pub(super) fn candidate(&self, id: &CandidateId) -> Candidate {
        self.candidates.lock().unwrap()[id].clone()
    }

    pub(super) fn len(&self) -> usize {
        self.candidates.lock().unwrap().len()
    }

    pub(super) fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub(super) fn gate_upserts(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.upsert_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(super) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn next_id(&self) -> CandidateId {
        let next = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        CandidateId(format!("cand-{next:03}"))
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn get_candidate(&self, id: &CandidateId) -> Result<Candidate, StoreError> {
        self.check_available()?;
        self.candidates
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_candidates(&self, filter: CandidateFilter) -> Result<Vec<Candidate>, StoreError> {
        self.check_available()?;
        Ok(self
            .candidates
            .lock()
            .unwrap()
            .values()
            .filter(|candidate| filter.status.map_or(true, |status| status == candidate.status))
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn create_candidate(&self, draft: NewCandidate) -> Result<Candidate, StoreError> {
        self.check_available()?;
        let id = self.next_id();
        let candidate = Candidate::new(id.clone(), draft, fixed_now());
        self.candidates
            .lock()
            .unwrap()
            .insert(id, candidate.clone());
        Ok(candidate)
    }

    async fn update_candidate(
        &self,
        id: &CandidateId,
        patch: CandidatePatch,
    ) -> Result<Candidate, StoreError> {
        self.check_available()?;
        let mut guard = self.candidates.lock().unwrap();
        let candidate = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        candidate.apply_patch(patch);
        Ok(candidate.clone())
    }

    async fn delete_candidate(&self, id: &CandidateId) -> Result<(), StoreError> {
        self.check_available()?;
        self.candidates
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn upsert_manual_evaluation(
        &self,
        id: &CandidateId,
        evaluation: ManualEvaluation,
    ) -> Result<UpsertOutcome, StoreError> {
        let gate = self.upsert_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut guard = self.candidates.lock().unwrap();
        let candidate = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        Ok(candidate.upsert_manual_evaluation(evaluation))
    }

    async fn record_ai_evaluation(
        &self,
        id: &CandidateId,
        evaluation: AiEvaluation,
    ) -> Result<Candidate, StoreError> {
        self.check_available()?;
        let mut guard = self.candidates.lock().unwrap();
        let candidate = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        candidate.ai_evaluation = Some(evaluation);
        if candidate.status == CandidateStatus::Pending {
            candidate.status = CandidateStatus::Screening;
        }
        Ok(candidate.clone())
    }

    async fn record_interview_questions(
        &self,
        id: &CandidateId,
        questions: Vec<String>,
    ) -> Result<Candidate, StoreError> {
        self.check_available()?;
        let mut guard = self.candidates.lock().unwrap();
        let candidate = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        candidate.record_interview_questions(questions);
        Ok(candidate.clone())
    }
}

#[async_trait]
impl StageRegistry for MemoryStore {
    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError> {
        self.check_available()?;
        let mut stages = self.stages.lock().unwrap().clone();
        stages.sort_by_key(|stage| stage.order);
        Ok(stages)
    }

    async fn create_stage(&self, stage: Stage) -> Result<Stage, StoreError> {
        self.check_available()?;
        let mut guard = self.stages.lock().unwrap();
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

/// Catalog that lists entries in insertion order and records every template fetch.
#[derive(Default)]
pub(super) struct MemoryCatalog {
    entries: Mutex<Vec<(String, Result<CriteriaTemplate, CatalogError>)>>,
    fetches: Mutex<Vec<String>>,
    gates: Mutex<BTreeMap<String, Arc<Gate>>>,
}

impl MemoryCatalog {
    pub(super) fn with_templates(names: &[&str]) -> Self {
        let catalog = Self::default();
        for name in names {
            catalog.insert(Ok(template(name)), name);
        }
        catalog
    }

    pub(super) fn insert_broken(&self, name: &str) {
        self.insert_failure(
            name,
            CatalogError::Parse {
                name: name.to_string(),
                reason: "unexpected end of table".to_string(),
            },
        );
    }

    pub(super) fn insert_failure(&self, name: &str, error: CatalogError) {
        self.insert(Err(error), name);
    }

    pub(super) fn repair(&self, name: &str) {
        self.insert(Ok(template(name)), name);
    }

    pub(super) fn gate(&self, name: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates
            .lock()
            .unwrap()
            .insert(name.to_string(), gate.clone());
        gate
    }

    pub(super) fn fetch_count(&self, name: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|fetched| fetched.as_str() == name)
            .count()
    }

    pub(super) fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub(super) fn template_for(&self, name: &str) -> Option<CriteriaTemplate> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(entry, _)| entry == name)
            .and_then(|(_, template)| template.clone().ok())
    }

    fn insert(&self, template: Result<CriteriaTemplate, CatalogError>, name: &str) {
        let mut guard = self.entries.lock().unwrap();
        guard.retain(|(entry, _)| entry != name);
        guard.push((name.to_string(), template));
    }
}

#[async_trait]
impl CriteriaCatalog for MemoryCatalog {
    async fn list_criteria_names(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn get_criteria_template(&self, name: &str) -> Result<CriteriaTemplate, CatalogError> {
        self.fetches.lock().unwrap().push(name.to_string());
        let gate = self.gates.lock().unwrap().get(name).cloned();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, template)| template.clone())
            .unwrap_or_else(|| Err(CatalogError::NotFound(name.to_string())))
    }

    async fn store_criteria(&self, name: &str, contents: &[u8]) -> Result<String, CatalogError> {
        let parsed = parse_document(name, contents);
        self.insert(parsed, name);
        Ok(name.to_string())
    }

    async fn delete_criteria(&self, name: &str) -> Result<(), CatalogError> {
        let mut guard = self.entries.lock().unwrap();
        let before = guard.len();
        guard.retain(|(entry, _)| entry != name);
        if guard.len() == before {
            return Err(CatalogError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

/// Evaluator returning fixed dimension scores; names in `failing` time out.
pub(super) struct ScriptedEvaluator {
    skill: f64,
    mindset: f64,
    failing: HashSet<String>,
    calls: AtomicUsize,
    question_requests: AtomicUsize,
}

impl ScriptedEvaluator {
    pub(super) fn new(skill: f64, mindset: f64) -> Self {
        Self {
            skill,
            mindset,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
            question_requests: AtomicUsize::new(0),
        }
    }

    pub(super) fn failing_for(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn question_requests(&self) -> usize {
        self.question_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiEvaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        candidate: &Candidate,
        ratio: ScoreRatio,
    ) -> Result<AiEvaluation, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.failing.contains(&candidate.name) {
            return Err(EvaluatorError::Unavailable("model request timed out".to_string()));
        }
        // Total left stale so callers have to reweigh.
        let mut evaluation = evaluation(self.skill, self.mindset, ratio);
        evaluation.total_score = 0.0;
        Ok(evaluation)
    }
}

/// Drafts a couple more questions than asked for so callers have to trim.
#[async_trait]
impl QuestionGenerator for ScriptedEvaluator {
    async fn generate_questions(
        &self,
        candidate: &Candidate,
        _evaluation: &AiEvaluation,
        count: usize,
    ) -> Result<Vec<String>, EvaluatorError> {
        self.question_requests.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&candidate.name) {
            return Err(EvaluatorError::Unavailable("model request timed out".to_string()));
        }
        Ok((1..=count + 2)
            .map(|index| format!("Question {index} for {}", candidate.name))
            .collect())
    }
}

pub(super) type TestService =
    ScreeningService<MemoryStore, MemoryCatalog, ScriptedEvaluator, ScriptedEvaluator>;

pub(super) fn build_service(
    store: Arc<MemoryStore>,
    catalog: Arc<MemoryCatalog>,
    evaluator: Arc<ScriptedEvaluator>,
) -> Arc<TestService> {
    Arc::new(ScreeningService::new(
        store,
        catalog,
        evaluator.clone(),
        evaluator,
        ScoringConfig::default(),
    ))
}

pub(super) fn router_with_service(service: Arc<TestService>) -> axum::Router {
    screening_router(service)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}
