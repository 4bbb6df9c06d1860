use serde::de::IgnoredAny;
use serde::Deserialize;
use utoipa::ToSchema;

use super::{non_empty, planning_project, Validate, INVALID_PROJECT};
use crate::error::AppError;
use crate::ids::{existing_id, RecordId};
use crate::models::{Caller, Deliverable};
use crate::storage::Storage;

const DELIVERABLE_NOT_FOUND: &str = "Deliverable not found";

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateDeliverable {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub project: String,
}

#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateDeliverable {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub project: Option<IgnoredAny>,
}

impl Validate for CreateDeliverable {
    fn validate(&self) -> Result<(), String> {
        non_empty(&self.name, "name")
    }
}

impl Validate for UpdateDeliverable {
    fn validate(&self) -> Result<(), String> {
        self.name.as_deref().map_or(Ok(()), |name| non_empty(name, "name"))
    }
}

pub fn create(storage: &Storage, caller: &Caller, body: CreateDeliverable) -> Result<Deliverable, AppError> {
    let project = existing_id(&body.project, INVALID_PROJECT)?;
    planning_project(storage, caller, &project)?;
    let deliverable = Deliverable {
        id: RecordId::generate(),
        name: body.name,
        description: body.description,
        project,
    };
    storage.deliverables.put(&deliverable)?;
    tracing::info!(deliverable = %deliverable.id, project = %deliverable.project, "deliverable created");
    Ok(deliverable)
}

pub fn list(storage: &Storage, caller: &Caller, project_id: &str) -> Result<Vec<Deliverable>, AppError> {
    let project = existing_id(project_id, INVALID_PROJECT)?;
    planning_project(storage, caller, &project)?;
    Ok(storage.deliverables.for_project(&project)?)
}

fn authorized_deliverable(storage: &Storage, caller: &Caller, id: &str) -> Result<Deliverable, AppError> {
    let id = existing_id(id, DELIVERABLE_NOT_FOUND)?;
    let deliverable = storage
        .deliverables
        .get(&id)?
        .ok_or_else(|| AppError::NotFound(DELIVERABLE_NOT_FOUND.to_string()))?;
    planning_project(storage, caller, &deliverable.project)?;
    Ok(deliverable)
}

pub fn update(
    storage: &Storage,
    caller: &Caller,
    id: &str,
    body: UpdateDeliverable,
) -> Result<Deliverable, AppError> {
    let current = authorized_deliverable(storage, caller, id)?;
    let (deliverable, ()) = storage
        .deliverables
        .update_with(&current.id, |deliverable| {
            if let Some(name) = &body.name {
                deliverable.name = name.clone();
            }
            if let Some(description) = &body.description {
                deliverable.description = description.clone();
            }
            Ok::<_, AppError>(())
        })?
        .ok_or_else(|| AppError::NotFound(DELIVERABLE_NOT_FOUND.to_string()))?;
    tracing::info!(deliverable = %deliverable.id, caller = %caller.id, "deliverable updated");
    Ok(deliverable)
}

pub fn delete(storage: &Storage, caller: &Caller, id: &str) -> Result<Deliverable, AppError> {
    let deliverable = authorized_deliverable(storage, caller, id)?;
    let removed = storage
        .deliverables
        .remove(&deliverable.id)?
        .ok_or_else(|| AppError::NotFound(DELIVERABLE_NOT_FOUND.to_string()))?;
    tracing::info!(deliverable = %removed.id, caller = %caller.id, "deliverable deleted");
    Ok(removed)
}
