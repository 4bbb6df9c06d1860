use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use super::{load_project, non_empty, present, Validate, INVALID_PROJECT, PROJECT_NOT_FOUND};
use crate::access::{authorize_manager, require_admin, require_pm};
use crate::error::AppError;
use crate::ids::{existing_id, RecordId};
use crate::models::{
    local_date, Acs, Caller, Phase, PopulatedAcs, Project, ProjectDetail, ProjectSummary, UserSummary,
};
use crate::sections::{ClosingPhase, InitiatingPhase, PlanningPhase};
use crate::storage::Storage;

/// Phase assignment lists sent by the client; each list present replaces
/// the stored one.
#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AcsPatch {
    pub initiating: Option<Vec<RecordId>>,
    pub planning: Option<Vec<RecordId>>,
    pub executing: Option<Vec<RecordId>>,
    pub monitoring: Option<Vec<RecordId>>,
    pub closing: Option<Vec<RecordId>>,
}

impl AcsPatch {
    fn lists(&self) -> [(Phase, &Option<Vec<RecordId>>); 5] {
        [
            (Phase::Initiating, &self.initiating),
            (Phase::Planning, &self.planning),
            (Phase::Executing, &self.executing),
            (Phase::Monitoring, &self.monitoring),
            (Phase::Closing, &self.closing),
        ]
    }

    fn apply(&self, acs: &mut Acs) {
        for (phase, list) in self.lists() {
            if let Some(list) = list {
                *acs.members_mut(phase) = list.clone();
            }
        }
    }
}

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProject {
    pub name: String,
    pub start_date: Option<String>,
    pub acs: Option<AcsPatch>,
    pub closed: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub acs: Option<AcsPatch>,
    pub closed: Option<bool>,
    /// New manager; admins only.
    pub pm: Option<String>,
}

impl Validate for CreateProject {
    fn validate(&self) -> Result<(), String> {
        non_empty(&self.name, "name")
    }
}

impl Validate for UpdateProject {
    fn validate(&self) -> Result<(), String> {
        match &self.name {
            Some(name) => non_empty(name, "name"),
            None => Ok(()),
        }
    }
}

pub fn create(storage: &Storage, caller: &Caller, body: CreateProject) -> Result<Project, AppError> {
    require_pm(caller).into_result()?;
    let mut acs = Acs::default();
    if let Some(patch) = &body.acs {
        patch.apply(&mut acs);
    }
    let now = Utc::now();
    let mut project = Project {
        id: RecordId::generate(),
        name: body.name.trim().to_string(),
        pm: caller.id.clone(),
        start_date: present(&body.start_date).map_or_else(local_date, str::to_string),
        acs,
        closed: false,
        initiating: InitiatingPhase::default(),
        planning: PlanningPhase::default(),
        closing: ClosingPhase::default(),
        created_at: now,
        updated_at: now,
    };
    project.set_closed(body.closed.unwrap_or(false), now);
    storage.projects.put(&project)?;
    tracing::info!(project = %project.id, pm = %caller.id, "project created");
    Ok(project)
}

/// Every project, with its manager's name and email.
pub fn all(storage: &Storage) -> Result<Vec<ProjectSummary>, AppError> {
    let mut summaries = vec![];
    for project in storage.projects.all()? {
        let pm = storage.users.get(&project.pm)?;
        summaries.push(project.summary(pm.as_ref()));
    }
    Ok(summaries)
}

fn managed_project(storage: &Storage, caller: &Caller, id: &str) -> Result<Project, AppError> {
    require_pm(caller).into_result()?;
    let project = load_project(storage, id)?;
    authorize_manager(caller, &project).into_result()?;
    Ok(project)
}

fn user_summaries(storage: &Storage, ids: &[RecordId]) -> Result<Vec<UserSummary>, AppError> {
    let mut found = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = storage.users.get(id)? {
            found.push(UserSummary::from(&user));
        }
    }
    Ok(found)
}

pub fn populate(storage: &Storage, project: Project) -> Result<ProjectDetail, AppError> {
    let pm = storage.users.get(&project.pm)?.map(|u| UserSummary::from(&u));
    let acs = PopulatedAcs {
        initiating: user_summaries(storage, &project.acs.initiating)?,
        planning: user_summaries(storage, &project.acs.planning)?,
        executing: user_summaries(storage, &project.acs.executing)?,
        monitoring: user_summaries(storage, &project.acs.monitoring)?,
        closing: user_summaries(storage, &project.acs.closing)?,
    };
    Ok(ProjectDetail {
        id: project.id,
        name: project.name,
        pm,
        start_date: project.start_date,
        acs,
        closed: project.closed,
        initiating: project.initiating,
        planning: project.planning,
        closing: project.closing,
        created_at: project.created_at,
        updated_at: project.updated_at,
    })
}

/// The project with its manager and phase assignments resolved.
pub fn detail(storage: &Storage, caller: &Caller, id: &str) -> Result<ProjectDetail, AppError> {
    let project = managed_project(storage, caller, id)?;
    populate(storage, project)
}

pub fn update(storage: &Storage, caller: &Caller, id: &str, body: UpdateProject) -> Result<Project, AppError> {
    require_pm(caller).into_result()?;
    let id = existing_id(id, INVALID_PROJECT)?;

    let new_pm = match &body.pm {
        Some(raw) => {
            require_admin(caller).into_result()?;
            let user_id = existing_id(raw, "User not found")?;
            if storage.users.get(&user_id)?.is_none() {
                return Err(AppError::NotFound("User not found".to_string()));
            }
            Some(user_id)
        }
        None => None,
    };

    let now = Utc::now();
    let (project, ()) = storage
        .projects
        .update_with(&id, |project| {
            authorize_manager(caller, project).into_result()?;
            if let Some(name) = &body.name {
                project.name = name.trim().to_string();
            }
            if let Some(start_date) = present(&body.start_date) {
                project.start_date = start_date.to_string();
            }
            if let Some(acs) = &body.acs {
                acs.apply(&mut project.acs);
            }
            if let Some(closed) = body.closed {
                project.set_closed(closed, now);
            }
            if let Some(pm) = &new_pm {
                project.pm = pm.clone();
            }
            project.touch();
            Ok::<_, AppError>(())
        })?
        .ok_or_else(|| AppError::NotFound(PROJECT_NOT_FOUND.to_string()))?;
    tracing::info!(project = %project.id, caller = %caller.id, "project updated");
    Ok(project)
}

/// Removes the project document. Its works, deliverables and activities stay.
pub fn delete(storage: &Storage, caller: &Caller, id: &str) -> Result<Project, AppError> {
    let project = managed_project(storage, caller, id)?;
    let removed = storage
        .projects
        .remove(&project.id)?
        .ok_or_else(|| AppError::NotFound(PROJECT_NOT_FOUND.to_string()))?;
    tracing::info!(project = %removed.id, caller = %caller.id, "project deleted");
    Ok(removed)
}
