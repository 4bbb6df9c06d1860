//! Per-entity operations. Every call receives the authenticated caller
//! explicitly and touches one document at a time.

use serde::{Deserialize, Deserializer};

use crate::access::authorize_phase;
use crate::error::AppError;
use crate::ids::{existing_id, RecordId};
pub use crate::models::Validate;
use crate::models::{Caller, Phase, Project};
pub(crate) use crate::sections::{non_empty, non_negative};
use crate::storage::Storage;

pub mod activities;
pub mod deliverables;
pub mod projects;
pub mod users;
pub mod works;

pub const PROJECT_NOT_FOUND: &str = "Project not found";
pub const INVALID_PROJECT: &str = "Invalid project ID";

/// A value the client may send either bare or wrapped in a list.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Keeps "field absent" (`None`) apart from "field is null" (`Some(None)`).
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trims a form value; empty strings count as absent.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Loads the project by a client-supplied id.
pub fn load_project(storage: &Storage, project_id: &str) -> Result<Project, AppError> {
    let id = existing_id(project_id, INVALID_PROJECT)?;
    load_project_by_id(storage, &id)
}

pub fn load_project_by_id(storage: &Storage, id: &RecordId) -> Result<Project, AppError> {
    storage
        .projects
        .get(id)?
        .ok_or_else(|| AppError::NotFound(PROJECT_NOT_FOUND.to_string()))
}

/// Loads the parent project and checks the caller may act in its planning phase.
pub(crate) fn planning_project(
    storage: &Storage,
    caller: &Caller,
    project: &RecordId,
) -> Result<Project, AppError> {
    let project = load_project_by_id(storage, project)?;
    authorize_phase(caller, &project, Phase::Planning).into_result()?;
    Ok(project)
}
