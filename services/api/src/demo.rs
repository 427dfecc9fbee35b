use crate::infra::{default_stages, InMemoryStore, NeutralEvaluator, StockQuestions};
use applicant_eval::config::ScoringConfig;
use applicant_eval::error::AppError;
use applicant_eval::workflows::screening::export::write_csv;
use applicant_eval::workflows::screening::import::rows_from_path;
use applicant_eval::workflows::screening::{
    BatchImportError, BatchResult, BatchRow, CandidatePatch, CandidateProfile, CommitOutcome,
    DirectoryCatalog, ExportFilter, LoadOutcome, NewCandidate, Resolution, ReviewCoordinator,
    RowStatus, ScreeningService,
};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_FIRST_ROUND: &str = "要件/構成要素,定義\n論理的思考,筋道を立てて説明できる\n主体性,自ら課題を見つけて動ける\n学習意欲,新しい技術を自分から学ぶ\n";
const DEMO_GENERAL: &str = "# General interview\n\n## Communication\nExplains ideas clearly to non-specialists.\n\n## Teamwork\nShares context and asks for help early.\n";

type DemoService =
    ScreeningService<InMemoryStore, DirectoryCatalog, NeutralEvaluator, StockQuestions>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Directory used for the demo criteria templates. Defaults to a temp directory.
    #[arg(long)]
    pub(crate) criteria_dir: Option<PathBuf>,
    /// Skill share applied when recomputing the composite (0.0 - 1.0).
    #[arg(long, default_value_t = 0.5)]
    pub(crate) skill_ratio: f64,
    /// Skip the batch portion of the demo.
    #[arg(long)]
    pub(crate) skip_batch: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// Candidate CSV with at least `name` and `email` columns
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Skill share for the composite; the mindset share is derived.
    #[arg(long)]
    pub(crate) skill_ratio: Option<f64>,
    /// Write the evaluated candidates to this CSV file.
    #[arg(long)]
    pub(crate) export: Option<PathBuf>,
    /// Only export candidates at or above this composite score.
    #[arg(long)]
    pub(crate) min_score: Option<f64>,
}

fn offline_service(
    criteria_dir: PathBuf,
) -> (Arc<InMemoryStore>, Arc<DirectoryCatalog>, DemoService) {
    let store = Arc::new(InMemoryStore::with_stages(default_stages()));
    let catalog = Arc::new(DirectoryCatalog::new(criteria_dir));
    let service = ScreeningService::new(
        store.clone(),
        catalog.clone(),
        Arc::new(NeutralEvaluator),
        Arc::new(StockQuestions),
        ScoringConfig::default(),
    );
    (store, catalog, service)
}

pub(crate) async fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let BatchArgs {
        csv,
        skill_ratio,
        export,
        min_score,
    } = args;

    let rows = rows_from_path(&csv)?;
    let (_, _, service) = offline_service(std::env::temp_dir());

    println!("Batch evaluation of {}", csv.display());
    let result = service.process_batch(rows, skill_ratio).await?;
    render_batch(&result);

    if let Some(path) = export {
        let rows = service
            .export_results(ExportFilter {
                status: None,
                min_score,
            })
            .await?;
        let file = std::fs::File::create(&path)?;
        write_csv(&rows, file).map_err(BatchImportError::from)?;
        println!("Exported {} candidates to {}", rows.len(), path.display());
    }

    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        criteria_dir,
        skill_ratio,
        skip_batch,
    } = args;

    let criteria_dir =
        criteria_dir.unwrap_or_else(|| std::env::temp_dir().join("applicant-eval-demo"));
    let (store, catalog, service) = offline_service(criteria_dir.clone());

    println!("Applicant evaluation demo");
    println!("Criteria directory: {}", criteria_dir.display());
    service
        .upload_criteria("first_interview.csv", DEMO_FIRST_ROUND.as_bytes())
        .await?;
    service
        .upload_criteria("general.md", DEMO_GENERAL.as_bytes())
        .await?;
    for name in service.list_criteria().await? {
        println!("- template {}", name);
    }

    let candidate = service
        .create_candidate(NewCandidate {
            name: "Aiko Tanaka".to_string(),
            email: "aiko@example.com".to_string(),
            phone: None,
            profile: Some(demo_profile(&["Rust", "PostgreSQL", "Kubernetes"])),
        })
        .await?;
    service
        .update_candidate(
            &candidate.id,
            CandidatePatch {
                current_stage: Some("first_interview".to_string()),
                ..CandidatePatch::default()
            },
        )
        .await?;
    println!("\nRegistered candidate {} ({})", candidate.name, candidate.id);

    let evaluation = service.evaluate_candidate(&candidate.id, None, None).await?;
    println!(
        "  AI evaluation: skill {:.1} | mindset {:.1} | composite {:.2} at {:.0}% skill",
        evaluation.skill_score,
        evaluation.mindset_score,
        evaluation.total_score,
        evaluation.skill_ratio * 100.0
    );

    let questions = service
        .generate_interview_questions(&candidate.id, Some(3))
        .await?;
    println!("  Interview questions:");
    for question in &questions {
        println!("    - {}", question);
    }

    let coordinator = ReviewCoordinator::new(store, catalog, service.fallback().clone());
    match coordinator.open(&candidate.id).await? {
        LoadOutcome::Ready(resolution) => {
            println!("  Criteria resolution: {}", describe(&resolution));
        }
        LoadOutcome::Superseded => println!("  Criteria resolution superseded"),
    }

    if let Some(session) = coordinator.session() {
        println!(
            "  Scoring session for {} ({:?}, {} items)",
            session.criteria_filename(),
            session.source(),
            session.items().len()
        );
        for (index, item) in session.items().iter().enumerate() {
            println!("    {}. {} [{}] {}", index + 1, item.name, item.score, item.definition);
        }
        coordinator.set_score(0, 5)?;
        coordinator.set_score(1, 4)?;
        coordinator.set_memo(1, "Drove the incident retro without being asked")?;
        coordinator.set_comment("Strong first round; dig into system design next.")?;
        match coordinator.commit().await? {
            CommitOutcome::Saved(outcome) => println!("  Manual evaluation saved ({:?})", outcome),
            CommitOutcome::AlreadyPending => println!("  Manual evaluation already in flight"),
        }
    }

    let pending = coordinator.adjust_ratio(skill_ratio)?;
    let recomputed = coordinator.recompute_composite()?;
    println!(
        "  Composite at {:.0}% skill / {:.0}% mindset: {:.2}",
        pending.skill() * 100.0,
        pending.mindset() * 100.0,
        recomputed.total_score
    );
    let stored = service
        .update_ratio(&candidate.id, pending.skill(), None)
        .await?;
    println!("  Stored composite updated to {:.2}", stored.total_score);

    if skip_batch {
        return Ok(());
    }

    println!("\nBatch evaluation");
    let rows = vec![
        demo_row("Ben Carter", "ben@example.com", &["Go", "gRPC"]),
        demo_row("", "missing-name@example.com", &[]),
        demo_row("Cara Silva", "cara@example.com", &["TypeScript"]),
    ];
    let result = service.process_batch(rows, Some(pending.skill())).await?;
    render_batch(&result);

    let exported = service.export_results(ExportFilter::default()).await?;
    println!("\nExport preview ({} evaluated candidates)", exported.len());
    for row in exported {
        println!(
            "- {} <{}> {} composite {:.2}",
            row.name,
            row.email,
            row.status.label(),
            row.total_score
        );
    }

    Ok(())
}

fn describe(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Stage {
            stage_name,
            criteria_filename,
        } => format!("stage '{}' -> {}", stage_name, criteria_filename),
        Resolution::Fallback { criteria_filename } => {
            format!("fallback -> {}", criteria_filename)
        }
        Resolution::Selected { criteria_filename } => {
            format!("selected -> {}", criteria_filename)
        }
        Resolution::Unavailable => "no criteria available".to_string(),
    }
}

fn render_batch(result: &BatchResult) {
    println!(
        "- {} rows | {} evaluated | {} failed",
        result.total_count, result.success_count, result.error_count
    );
    for outcome in &result.results {
        match (outcome.status, outcome.total_score) {
            (RowStatus::Success, Some(score)) => {
                println!("  - {} <{}>: composite {:.2}", outcome.name, outcome.email, score)
            }
            _ => println!(
                "  - {} <{}>: {}",
                outcome.name,
                outcome.email,
                outcome.error.as_deref().unwrap_or("failed")
            ),
        }
    }
}

fn demo_profile(skills: &[&str]) -> CandidateProfile {
    CandidateProfile {
        technical_skills: skills.iter().map(|skill| skill.to_string()).collect(),
        motivation: "Wants to build reliable hiring tools".to_string(),
        ..CandidateProfile::default()
    }
}

fn demo_row(name: &str, email: &str, skills: &[&str]) -> BatchRow {
    BatchRow {
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
        profile: demo_profile(skills),
    }
}
