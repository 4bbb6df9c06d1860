use serde::de::IgnoredAny;
use serde::Deserialize;
use utoipa::ToSchema;

use super::{non_empty, non_negative, planning_project, Validate, INVALID_PROJECT};
use crate::error::AppError;
use crate::ids::{existing_id, RecordId};
use crate::models::{Activity, ActivityView, Caller};
use crate::storage::Storage;

const ACTIVITY_NOT_FOUND: &str = "Activity not found";

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateActivity {
    pub work_package: RecordId,
    pub name: String,
    #[serde(default)]
    pub initial_scope_description: String,
    #[serde(default)]
    pub detailed_scope_description: String,
    #[serde(default)]
    pub predecessor_activities: Vec<RecordId>,
    #[serde(default)]
    pub resource_requirements: Vec<String>,
    #[serde(default)]
    pub duration: f64,
    pub project: String,
}

/// Partial update; the owning project comes from the stored record.
#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateActivity {
    pub work_package: Option<RecordId>,
    pub name: Option<String>,
    pub initial_scope_description: Option<String>,
    pub detailed_scope_description: Option<String>,
    pub predecessor_activities: Option<Vec<RecordId>>,
    pub resource_requirements: Option<Vec<String>>,
    pub duration: Option<f64>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub project: Option<IgnoredAny>,
}

impl Validate for CreateActivity {
    fn validate(&self) -> Result<(), String> {
        non_empty(&self.name, "name")?;
        non_negative(self.duration, "duration")
    }
}

impl Validate for UpdateActivity {
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            non_empty(name, "name")?;
        }
        if let Some(duration) = self.duration {
            non_negative(duration, "duration")?;
        }
        Ok(())
    }
}

pub fn create(storage: &Storage, caller: &Caller, body: CreateActivity) -> Result<Activity, AppError> {
    let project = existing_id(&body.project, INVALID_PROJECT)?;
    planning_project(storage, caller, &project)?;
    let activity = Activity {
        id: RecordId::generate(),
        work_package: body.work_package,
        name: body.name,
        initial_scope_description: body.initial_scope_description,
        detailed_scope_description: body.detailed_scope_description,
        predecessor_activities: body.predecessor_activities,
        resource_requirements: body.resource_requirements,
        duration: body.duration,
        project,
    };
    storage.activities.put(&activity)?;
    tracing::info!(activity = %activity.id, project = %activity.project, "activity created");
    Ok(activity)
}

fn populate(storage: &Storage, activity: Activity) -> Result<ActivityView, AppError> {
    Ok(ActivityView {
        work_package: storage.works.get(&activity.work_package)?,
        predecessor_activities: storage.activities.resolve(&activity.predecessor_activities)?,
        id: activity.id,
        name: activity.name,
        initial_scope_description: activity.initial_scope_description,
        detailed_scope_description: activity.detailed_scope_description,
        resource_requirements: activity.resource_requirements,
        duration: activity.duration,
        project: activity.project,
    })
}

/// Activities of a project with work package and predecessors resolved.
pub fn list(storage: &Storage, caller: &Caller, project_id: &str) -> Result<Vec<ActivityView>, AppError> {
    let project = existing_id(project_id, INVALID_PROJECT)?;
    planning_project(storage, caller, &project)?;
    storage
        .activities
        .for_project(&project)?
        .into_iter()
        .map(|activity| populate(storage, activity))
        .collect()
}

fn authorized_activity(storage: &Storage, caller: &Caller, id: &str) -> Result<Activity, AppError> {
    let id = existing_id(id, ACTIVITY_NOT_FOUND)?;
    let activity = storage
        .activities
        .get(&id)?
        .ok_or_else(|| AppError::NotFound(ACTIVITY_NOT_FOUND.to_string()))?;
    planning_project(storage, caller, &activity.project)?;
    Ok(activity)
}

pub fn update(storage: &Storage, caller: &Caller, id: &str, body: UpdateActivity) -> Result<Activity, AppError> {
    let current = authorized_activity(storage, caller, id)?;
    let (activity, ()) = storage
        .activities
        .update_with(&current.id, |activity| {
            if let Some(work_package) = &body.work_package {
                activity.work_package = work_package.clone();
            }
            if let Some(name) = &body.name {
                activity.name = name.clone();
            }
            if let Some(text) = &body.initial_scope_description {
                activity.initial_scope_description = text.clone();
            }
            if let Some(text) = &body.detailed_scope_description {
                activity.detailed_scope_description = text.clone();
            }
            if let Some(predecessors) = &body.predecessor_activities {
                activity.predecessor_activities = predecessors.clone();
            }
            if let Some(requirements) = &body.resource_requirements {
                activity.resource_requirements = requirements.clone();
            }
            if let Some(duration) = body.duration {
                activity.duration = duration;
            }
            Ok::<_, AppError>(())
        })?
        .ok_or_else(|| AppError::NotFound(ACTIVITY_NOT_FOUND.to_string()))?;
    tracing::info!(activity = %activity.id, caller = %caller.id, "activity updated");
    Ok(activity)
}

pub fn delete(storage: &Storage, caller: &Caller, id: &str) -> Result<Activity, AppError> {
    let activity = authorized_activity(storage, caller, id)?;
    let removed = storage
        .activities
        .remove(&activity.id)?
        .ok_or_else(|| AppError::NotFound(ACTIVITY_NOT_FOUND.to_string()))?;
    tracing::info!(activity = %removed.id, caller = %caller.id, "activity deleted");
    Ok(removed)
}
