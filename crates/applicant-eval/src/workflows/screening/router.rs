use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{
    CandidateFilter, CandidateId, CandidatePatch, CandidateStatus, ManualEvaluation, NewCandidate,
    Stage,
};
use super::error::ScreeningError;
use super::export::{write_csv, ExportFilter};
use super::import::rows_from_reader;
use super::repository::{
    AiEvaluator, CandidateStore, CriteriaCatalog, QuestionGenerator, StageRegistry,
};
use super::service::ScreeningService;

type SharedService<S, C, A, Q> = Arc<ScreeningService<S, C, A, Q>>;

impl ScreeningError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScreeningError::NotFound(_) => StatusCode::NOT_FOUND,
            ScreeningError::Parse(_) | ScreeningError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ScreeningError::Conflict(_) => StatusCode::CONFLICT,
            ScreeningError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ScreeningError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            warn!(error = %self, "screening request failed");
        }
        let payload = json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        });
        (status, Json(payload)).into_response()
    }
}

/// Router builder exposing candidate, evaluation, stage, criteria and batch endpoints.
pub fn screening_router<S, C, A, Q>(service: SharedService<S, C, A, Q>) -> Router
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    Router::new()
        .route(
            "/api/applicants",
            get(list_candidates_handler::<S, C, A, Q>).post(create_candidate_handler::<S, C, A, Q>),
        )
        .route(
            "/api/applicants/:id",
            get(get_candidate_handler::<S, C, A, Q>)
                .patch(update_candidate_handler::<S, C, A, Q>)
                .delete(delete_candidate_handler::<S, C, A, Q>),
        )
        .route(
            "/api/applicants/:id/criteria",
            get(candidate_criteria_handler::<S, C, A, Q>),
        )
        .route(
            "/api/evaluation/evaluate",
            post(evaluate_handler::<S, C, A, Q>),
        )
        .route(
            "/api/evaluation/:id/update-ratio",
            post(update_ratio_handler::<S, C, A, Q>),
        )
        .route(
            "/api/evaluation/:id/manual",
            post(manual_evaluation_handler::<S, C, A, Q>),
        )
        .route(
            "/api/interview/generate-questions",
            post(generate_questions_handler::<S, C, A, Q>),
        )
        .route(
            "/api/interview/:id/questions",
            get(interview_questions_handler::<S, C, A, Q>),
        )
        .route(
            "/api/stages",
            get(list_stages_handler::<S, C, A, Q>).post(create_stage_handler::<S, C, A, Q>),
        )
        .route("/api/criteria", get(list_criteria_handler::<S, C, A, Q>))
        .route(
            "/api/criteria/:filename",
            get(get_criteria_handler::<S, C, A, Q>)
                .put(upload_criteria_handler::<S, C, A, Q>)
                .delete(delete_criteria_handler::<S, C, A, Q>),
        )
        .route(
            "/api/batch/upload-csv",
            post(batch_upload_handler::<S, C, A, Q>),
        )
        .route(
            "/api/batch/export-results",
            get(export_results_handler::<S, C, A, Q>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvaluateRequest {
    applicant_id: String,
    #[serde(default)]
    skill_ratio: Option<f64>,
    #[serde(default)]
    mindset_ratio: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateRatioRequest {
    skill_ratio: f64,
    #[serde(default)]
    mindset_ratio: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateQuestionsRequest {
    applicant_id: String,
    #[serde(default)]
    question_count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BatchQuery {
    skill_ratio: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExportQuery {
    status: Option<String>,
    min_score: Option<f64>,
    format: Option<String>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<CandidateStatus>, ScreeningError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => CandidateStatus::parse(value)
            .map(Some)
            .ok_or_else(|| ScreeningError::validation(format!("unknown status '{value}'"))),
    }
}

pub(crate) async fn list_candidates_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let defaults = CandidateFilter::default();
    let filter = CandidateFilter {
        status: parse_status(query.status.as_deref())?,
        limit: query.limit.unwrap_or(defaults.limit),
        offset: query.offset.unwrap_or(defaults.offset),
    };
    let candidates = service.list_candidates(filter).await?;
    Ok(Json(candidates).into_response())
}

pub(crate) async fn create_candidate_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Json(draft): Json<NewCandidate>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let candidate = service.create_candidate(draft).await?;
    Ok((StatusCode::CREATED, Json(candidate)).into_response())
}

pub(crate) async fn get_candidate_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(id): Path<String>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let candidate = service.get_candidate(&CandidateId(id)).await?;
    Ok(Json(candidate).into_response())
}

pub(crate) async fn update_candidate_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(id): Path<String>,
    Json(patch): Json<CandidatePatch>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let candidate = service.update_candidate(&CandidateId(id), patch).await?;
    Ok(Json(candidate).into_response())
}

pub(crate) async fn delete_candidate_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(id): Path<String>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let id = CandidateId(id);
    service.delete_candidate(&id).await?;
    Ok(Json(json!({ "deleted": id })).into_response())
}

pub(crate) async fn candidate_criteria_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(id): Path<String>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let resolved = service.resolve_for_candidate(&CandidateId(id)).await?;
    Ok(Json(resolved).into_response())
}

pub(crate) async fn evaluate_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let id = CandidateId(request.applicant_id);
    let evaluation = service
        .evaluate_candidate(&id, request.skill_ratio, request.mindset_ratio)
        .await?;
    Ok(Json(json!({ "applicant_id": id, "evaluation": evaluation })).into_response())
}

pub(crate) async fn update_ratio_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRatioRequest>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let id = CandidateId(id);
    let evaluation = service
        .update_ratio(&id, request.skill_ratio, request.mindset_ratio)
        .await?;
    Ok(Json(json!({ "applicant_id": id, "evaluation": evaluation })).into_response())
}

pub(crate) async fn manual_evaluation_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(id): Path<String>,
    Json(evaluation): Json<ManualEvaluation>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let id = CandidateId(id);
    let criteria_filename = evaluation.criteria_filename.clone();
    let outcome = service.save_manual_evaluation(&id, evaluation).await?;
    Ok(Json(json!({
        "applicant_id": id,
        "criteria_filename": criteria_filename,
        "outcome": outcome,
    }))
    .into_response())
}

pub(crate) async fn generate_questions_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Json(request): Json<GenerateQuestionsRequest>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let id = CandidateId(request.applicant_id);
    let questions = service
        .generate_interview_questions(&id, request.question_count)
        .await?;
    Ok(Json(json!({
        "message": "Interview questions generated successfully",
        "applicant_id": id,
        "questions": questions,
    }))
    .into_response())
}

pub(crate) async fn interview_questions_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(id): Path<String>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let questions = service.interview_questions(&CandidateId(id)).await?;
    Ok(Json(json!({ "questions": questions })).into_response())
}

pub(crate) async fn list_stages_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let stages = service.list_stages().await?;
    Ok(Json(stages).into_response())
}

pub(crate) async fn create_stage_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Json(stage): Json<Stage>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let stage = service.create_stage(stage).await?;
    Ok((StatusCode::CREATED, Json(stage)).into_response())
}

pub(crate) async fn list_criteria_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let names = service.list_criteria().await?;
    Ok(Json(names).into_response())
}

pub(crate) async fn get_criteria_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(filename): Path<String>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let template = service.get_criteria(&filename).await?;
    Ok(Json(template).into_response())
}

pub(crate) async fn upload_criteria_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(filename): Path<String>,
    body: Bytes,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let stored = service.upload_criteria(&filename, &body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "criteria_filename": stored, "bytes": body.len() })),
    )
        .into_response())
}

pub(crate) async fn delete_criteria_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Path(filename): Path<String>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    service.delete_criteria(&filename).await?;
    Ok(Json(json!({ "deleted": filename })).into_response())
}

pub(crate) async fn batch_upload_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Query(query): Query<BatchQuery>,
    body: Bytes,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let rows =
        rows_from_reader(body.as_ref()).map_err(|err| ScreeningError::Parse(err.to_string()))?;
    let result = service.process_batch(rows, query.skill_ratio).await?;
    Ok(Json(result).into_response())
}

pub(crate) async fn export_results_handler<S, C, A, Q>(
    State(service): State<SharedService<S, C, A, Q>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ScreeningError>
where
    S: CandidateStore + StageRegistry + 'static,
    C: CriteriaCatalog + 'static,
    A: AiEvaluator + 'static,
    Q: QuestionGenerator + 'static,
{
    let filter = ExportFilter {
        status: parse_status(query.status.as_deref())?,
        min_score: query.min_score,
    };
    let rows = service.export_results(filter).await?;

    if query
        .format
        .as_deref()
        .is_some_and(|format| format.eq_ignore_ascii_case("csv"))
    {
        let mut buffer = Vec::new();
        write_csv(&rows, &mut buffer)
            .map_err(|err| ScreeningError::Transient(format!("export failed: {err}")))?;
        return Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            buffer,
        )
            .into_response());
    }

    Ok(Json(json!({ "count": rows.len(), "data": rows })).into_response())
}
