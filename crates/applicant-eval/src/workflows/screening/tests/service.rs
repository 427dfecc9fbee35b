use std::sync::Arc;

use super::common::*;
use crate::workflows::screening::composite::ScoreRatio;
use crate::workflows::screening::domain::{
    CandidateFilter, CandidateId, CandidatePatch, CandidateProfile, CandidateStatus,
    ManualEvaluation, Stage, UpsertOutcome, DEFAULT_QUESTION_COUNT,
};
use crate::workflows::screening::error::ScreeningError;
use crate::workflows::screening::export::ExportFilter;
use crate::workflows::screening::resolution::Resolution;

fn fixtures() -> (Arc<MemoryStore>, Arc<MemoryCatalog>, Arc<ScriptedEvaluator>) {
    (
        Arc::new(MemoryStore::with_stages(stages())),
        Arc::new(MemoryCatalog::with_templates(&[GENERAL, FIRST_ROUND, SECOND_ROUND])),
        Arc::new(ScriptedEvaluator::new(80.0, 60.0)),
    )
}

fn manual(filename: &str, first_score: u8) -> ManualEvaluation {
    let mut items = template(filename).default_items();
    items[0].score = first_score;
    ManualEvaluation {
        criteria_filename: filename.to_string(),
        evaluation_data: items,
        overall_comment: String::new(),
    }
}

#[tokio::test]
async fn create_candidate_requires_name_and_email() {
    let (store, catalog, evaluator) = fixtures();
    let service = build_service(store.clone(), catalog, evaluator);

    let mut nameless = draft("Aiko");
    nameless.name = " ".to_string();
    assert!(matches!(
        service.create_candidate(nameless).await,
        Err(ScreeningError::Validation(_))
    ));

    let created = service.create_candidate(draft("Aiko")).await.unwrap();
    assert_eq!(created.status, CandidateStatus::Pending);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn manual_evaluation_rejects_scores_outside_range() {
    let (store, catalog, evaluator) = fixtures();
    let id = store.insert(draft("Aiko"), None);
    let service = build_service(store.clone(), catalog, evaluator);

    for score in [0, 6] {
        let err = service
            .save_manual_evaluation(&id, manual(FIRST_ROUND, score))
            .await
            .unwrap_err();
        assert!(matches!(err, ScreeningError::Validation(_)), "score {score}");
    }
    assert_eq!(store.upsert_count(), 0);

    let mut unnamed = manual(FIRST_ROUND, 3);
    unnamed.criteria_filename.clear();
    assert!(service.save_manual_evaluation(&id, unnamed).await.is_err());
}

#[tokio::test]
async fn manual_evaluation_upserts_by_filename() {
    let (store, catalog, evaluator) = fixtures();
    let id = store.insert(draft("Aiko"), None);
    let service = build_service(store.clone(), catalog, evaluator);

    assert_eq!(
        service
            .save_manual_evaluation(&id, manual(FIRST_ROUND, 4))
            .await
            .unwrap(),
        UpsertOutcome::Inserted
    );
    assert_eq!(
        service
            .save_manual_evaluation(&id, manual(SECOND_ROUND, 2))
            .await
            .unwrap(),
        UpsertOutcome::Inserted
    );
    assert_eq!(
        service
            .save_manual_evaluation(&id, manual(FIRST_ROUND, 5))
            .await
            .unwrap(),
        UpsertOutcome::Updated
    );

    let stored = store.candidate(&id);
    assert_eq!(stored.manual_evaluations.len(), 2);
    assert_eq!(
        stored.manual_evaluation(FIRST_ROUND).unwrap().evaluation_data[0].score,
        5
    );

    let missing = CandidateId("ghost".to_string());
    assert!(matches!(
        service
            .save_manual_evaluation(&missing, manual(FIRST_ROUND, 3))
            .await,
        Err(ScreeningError::NotFound(_))
    ));
}

#[tokio::test]
async fn evaluate_applies_default_ratio_and_moves_to_screening() {
    let (store, catalog, evaluator) = fixtures();
    let id = store.insert(draft("Aiko"), None);
    let service = build_service(store.clone(), catalog, evaluator.clone());

    let evaluation = service.evaluate_candidate(&id, None, None).await.unwrap();

    assert!((evaluation.total_score - 64.0).abs() < 1e-9);
    assert!((evaluation.skill_ratio - ScoreRatio::DEFAULT.skill()).abs() < 1e-9);
    let stored = store.candidate(&id);
    assert_eq!(stored.status, CandidateStatus::Screening);
    assert_eq!(stored.ai_evaluation, Some(evaluation));
    assert_eq!(evaluator.calls(), 1);
}

#[tokio::test]
async fn evaluate_rejects_mismatched_ratio_pair_before_calling_evaluator() {
    let (store, catalog, evaluator) = fixtures();
    let id = store.insert(draft("Aiko"), None);
    let service = build_service(store, catalog, evaluator.clone());

    let err = service
        .evaluate_candidate(&id, Some(0.3), Some(0.3))
        .await
        .unwrap_err();

    assert!(matches!(err, ScreeningError::Validation(_)));
    assert_eq!(evaluator.calls(), 0);

    let evaluation = service
        .evaluate_candidate(&id, None, Some(0.0))
        .await
        .unwrap();
    assert!((evaluation.total_score - 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn update_ratio_reweighs_without_re_evaluating() {
    let (store, catalog, evaluator) = fixtures();
    let id = store.insert(draft("Aiko"), None);
    let service = build_service(store.clone(), catalog, evaluator.clone());
    service.evaluate_candidate(&id, None, None).await.unwrap();

    let updated = service.update_ratio(&id, 0.5, None).await.unwrap();

    assert!((updated.total_score - 70.0).abs() < 1e-9);
    assert!((updated.mindset_ratio - 0.5).abs() < 1e-9);
    assert_eq!(evaluator.calls(), 1);
    assert_eq!(store.candidate(&id).ai_evaluation, Some(updated));

    let other = store.insert(draft("Ben"), None);
    assert!(matches!(
        service.update_ratio(&other, 0.5, None).await,
        Err(ScreeningError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_ratio_keeps_later_pipeline_status() {
    let (store, catalog, evaluator) = fixtures();
    let id = store.insert(draft("Aiko"), None);
    let service = build_service(store.clone(), catalog, evaluator);
    service.evaluate_candidate(&id, None, None).await.unwrap();
    service
        .update_candidate(
            &id,
            CandidatePatch {
                status: Some(CandidateStatus::Interview),
                ..CandidatePatch::default()
            },
        )
        .await
        .unwrap();

    service.update_ratio(&id, 0.4, Some(0.6)).await.unwrap();

    assert_eq!(store.candidate(&id).status, CandidateStatus::Interview);
}

#[tokio::test]
async fn duplicate_stage_is_a_conflict() {
    let (store, catalog, evaluator) = fixtures();
    let service = build_service(store, catalog, evaluator);

    let err = service
        .create_stage(Stage {
            order: 3,
            stage_name: "first_interview".to_string(),
            criteria_filename: GENERAL.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ScreeningError::Conflict(_)));

    service
        .create_stage(Stage {
            order: 3,
            stage_name: "final_interview".to_string(),
            criteria_filename: GENERAL.to_string(),
        })
        .await
        .unwrap();
    let names: Vec<_> = service
        .list_stages()
        .await
        .unwrap()
        .into_iter()
        .map(|stage| stage.stage_name)
        .collect();
    assert_eq!(
        names,
        vec!["first_interview", "second_interview", "final_interview"]
    );
}

#[tokio::test]
async fn stage_order_must_be_positive() {
    let (store, catalog, evaluator) = fixtures();
    let service = build_service(store, catalog, evaluator);

    let err = service
        .create_stage(Stage {
            order: 0,
            stage_name: "document_screening".to_string(),
            criteria_filename: GENERAL.to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ScreeningError::Validation(_)));
    assert_eq!(service.list_stages().await.unwrap().len(), 2);
}

#[tokio::test]
async fn resolve_for_candidate_includes_saved_scores() {
    let (store, catalog, evaluator) = fixtures();
    let id = store.insert(draft("Aiko"), Some("second_interview"));
    let service = build_service(store.clone(), catalog, evaluator);
    service
        .save_manual_evaluation(&id, manual(SECOND_ROUND, 5))
        .await
        .unwrap();

    let resolved = service.resolve_for_candidate(&id).await.unwrap();

    assert_eq!(
        resolved.resolution,
        Resolution::Stage {
            stage_name: "second_interview".to_string(),
            criteria_filename: SECOND_ROUND.to_string(),
        }
    );
    assert_eq!(
        resolved.manual_evaluation.unwrap().evaluation_data[0].score,
        5
    );

    let other = store.insert(draft("Ben"), None);
    let fallback = service.resolve_for_candidate(&other).await.unwrap();
    assert_eq!(fallback.resolution.criteria_filename(), Some(GENERAL));
    assert!(fallback.manual_evaluation.is_none());
}

#[tokio::test]
async fn uploaded_criteria_become_listable_templates() {
    let (store, catalog, evaluator) = fixtures();
    let service = build_service(store, catalog, evaluator);

    let stored = service
        .upload_criteria("sales.md", b"## Listening\nHears the customer out.\n")
        .await
        .unwrap();
    assert_eq!(stored, "sales.md");
    assert!(service.list_criteria().await.unwrap().contains(&stored));
    let template = service.get_criteria("sales.md").await.unwrap();
    assert_eq!(template.items[0].name, "Listening");

    assert!(matches!(
        service.upload_criteria("empty.csv", b"").await,
        Err(ScreeningError::Validation(_))
    ));

    service.delete_criteria("sales.md").await.unwrap();
    assert!(matches!(
        service.get_criteria("sales.md").await,
        Err(ScreeningError::NotFound(_))
    ));
}

#[tokio::test]
async fn batch_and_export_share_the_store() {
    let (store, catalog, _) = fixtures();
    let evaluator = Arc::new(ScriptedEvaluator::new(80.0, 60.0).failing_for("Ben"));
    let service = build_service(store.clone(), catalog, evaluator);
    let rows = crate::workflows::screening::import::rows_from_reader(
        "name,email\nAiko,aiko@example.com\nBen,ben@example.com\nCara,cara@example.com\n"
            .as_bytes(),
    )
    .unwrap();

    let result = service.process_batch(rows, Some(0.2)).await.unwrap();
    assert_eq!((result.success_count, result.error_count), (2, 1));

    let exported = service
        .export_results(ExportFilter {
            status: Some(CandidateStatus::Screening),
            min_score: Some(60.0),
        })
        .await
        .unwrap();
    let names: Vec<_> = exported.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["Aiko", "Cara"]);

    assert!(service
        .export_results(ExportFilter {
            status: None,
            min_score: Some(90.0),
        })
        .await
        .unwrap()
        .is_empty());

    assert!(matches!(
        service.process_batch(Vec::new(), Some(2.0)).await,
        Err(ScreeningError::Validation(_))
    ));
}

#[tokio::test]
async fn store_outage_maps_to_transient() {
    let (store, catalog, evaluator) = fixtures();
    store.set_unavailable(true);
    let service = build_service(store, catalog, evaluator);

    let err = service
        .list_candidates(CandidateFilter::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ScreeningError::Transient(_)));
    assert!(err.is_retryable());
}

fn evaluated(store: &MemoryStore, name: &str) -> CandidateId {
    let id = store.insert(draft(name), Some("first_interview"));
    store.modify(&id, |candidate| {
        candidate.profile = Some(CandidateProfile::default());
        candidate.ai_evaluation = Some(evaluation(80.0, 60.0, ScoreRatio::DEFAULT));
    });
    id
}

#[tokio::test]
async fn generated_questions_are_trimmed_stored_and_move_to_interview() {
    let (store, catalog, evaluator) = fixtures();
    let id = evaluated(&store, "Aiko");
    let service = build_service(store.clone(), catalog, evaluator.clone());

    let questions = service
        .generate_interview_questions(&id, Some(4))
        .await
        .unwrap();

    assert_eq!(questions.len(), 4);
    assert_eq!(questions[0], "Question 1 for Aiko");
    let stored = store.candidate(&id);
    assert_eq!(stored.interview_questions, questions);
    assert_eq!(stored.status, CandidateStatus::Interview);
    assert_eq!(service.interview_questions(&id).await.unwrap(), questions);
    assert_eq!(evaluator.question_requests(), 1);
}

#[tokio::test]
async fn question_count_defaults_and_is_bounded() {
    let (store, catalog, evaluator) = fixtures();
    let id = evaluated(&store, "Ben");
    let service = build_service(store.clone(), catalog, evaluator.clone());

    let questions = service.generate_interview_questions(&id, None).await.unwrap();
    assert_eq!(questions.len(), DEFAULT_QUESTION_COUNT);

    let err = service
        .generate_interview_questions(&id, Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, ScreeningError::Validation(_)));
    assert_eq!(evaluator.question_requests(), 1);
}

#[tokio::test]
async fn questions_require_profile_and_evaluation() {
    let (store, catalog, evaluator) = fixtures();
    let bare = store.insert(draft("Cara"), None);
    let unevaluated = store.insert(draft("Dan"), None);
    store.modify(&unevaluated, |candidate| {
        candidate.profile = Some(CandidateProfile::default());
    });
    let service = build_service(store.clone(), catalog, evaluator.clone());

    for id in [&bare, &unevaluated] {
        let err = service
            .generate_interview_questions(id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScreeningError::Validation(_)));
    }
    assert_eq!(evaluator.question_requests(), 0);
    assert!(store.candidate(&unevaluated).interview_questions.is_empty());
    assert!(matches!(
        service
            .interview_questions(&CandidateId("ghost".to_string()))
            .await,
        Err(ScreeningError::NotFound(_))
    ));
}

#[tokio::test]
async fn unavailable_question_generator_leaves_candidate_untouched() {
    let (store, catalog, _) = fixtures();
    let evaluator = Arc::new(ScriptedEvaluator::new(80.0, 60.0).failing_for("Eve"));
    let id = evaluated(&store, "Eve");
    let service = build_service(store.clone(), catalog, evaluator);

    let err = service
        .generate_interview_questions(&id, None)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    let stored = store.candidate(&id);
    assert!(stored.interview_questions.is_empty());
    assert_eq!(stored.status, CandidateStatus::Pending);
}
