//! Seed script for pmbook
//!
//! Creates an admin, a project manager and a sample project with a small
//! WBS, so a fresh install has something to log in to.
//! Run: cargo run --bin load_data
//! Re-running reuses existing accounts and adds another sample project.

use pmbook::config::Config;
use pmbook::error::AppError;
use pmbook::ids::RecordId;
use pmbook::logging;
use pmbook::models::{Caller, User};
use pmbook::phases::update_phase_section;
use pmbook::sections::{Milestone, ProjectCharter};
use pmbook::service::deliverables::{self, CreateDeliverable};
use pmbook::service::projects::{self, AcsPatch, CreateProject};
use pmbook::service::users::{self, AddUser};
use pmbook::service::works::{self, CreateWork};
use pmbook::storage::Storage;

fn ensure_user(storage: &Storage, config: &Config, body: AddUser) -> Result<User, AppError> {
    if let Some(existing) = storage.find_user_by_email(&body.email)? {
        tracing::info!(email = %existing.email, "user already present");
        return Ok(existing);
    }
    // Bootstrap identity: nobody can log in as it.
    let root = Caller { id: RecordId::generate(), admin: true, pm: false };
    users::add(storage, config, &root, body)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config)?;
    let storage = Storage::open(&config.db_path)?;

    let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());

    let admin = ensure_user(
        &storage,
        &config,
        AddUser {
            email: env("ADMIN_EMAIL", "admin@pmbook.local"),
            password: env("ADMIN_PASSWORD", "admin1234"),
            name: Some("Administrator".into()),
            phone: None,
            admin: true,
            pm: false,
        },
    )?;
    let pm = ensure_user(
        &storage,
        &config,
        AddUser {
            email: env("PM_EMAIL", "pm@pmbook.local"),
            password: env("PM_PASSWORD", "pm123456"),
            name: Some("Project Manager".into()),
            phone: None,
            admin: false,
            pm: true,
        },
    )?;
    let pm_caller = Caller::from(&pm);

    let project = projects::create(
        &storage,
        &pm_caller,
        CreateProject {
            name: "Sample: office relocation".into(),
            start_date: None,
            acs: Some(AcsPatch {
                planning: Some(vec![admin.id.clone()]),
                ..Default::default()
            }),
            closed: None,
        },
    )?;
    let project_id = project.id.to_string();

    update_phase_section(
        &storage,
        &pm_caller,
        &project_id,
        ProjectCharter {
            title: Some("Office relocation".into()),
            purpose: Some("Move the team to the new site without downtime".into()),
            objectives: Some(vec!["Zero lost working days".into()]),
            milestones: Some(vec![Milestone { name: "Lease signed".into(), date: String::new() }]),
            ..Default::default()
        },
    )?;

    let handover = deliverables::create(
        &storage,
        &pm_caller,
        CreateDeliverable {
            name: "Keys handover".into(),
            description: "Access cards and keys for every employee".into(),
            project: project_id.clone(),
        },
    )?;

    for (name, deliverable) in [("Planning", None), ("Move", Some(handover.id.clone()))] {
        works::create(
            &storage,
            &pm_caller,
            CreateWork {
                name: name.into(),
                description: String::new(),
                project: project_id.clone(),
                work: None,
                deliverable,
            },
        )?;
    }

    storage.flush()?;
    tracing::info!(project = %project.id, admin = %admin.email, pm = %pm.email, "sample data loaded");
    println!("Seeded project {} (PM: {}, admin: {})", project.id, pm.email, admin.email);
    Ok(())
}
