use serde::de::IgnoredAny;
use serde::Deserialize;
use utoipa::ToSchema;

use super::{non_empty, nullable, planning_project, OneOrMany, Validate, INVALID_PROJECT};
use crate::error::AppError;
use crate::ids::{existing_id, RecordId};
use crate::models::{Caller, Work, WorkView};
use crate::storage::Storage;

const WORK_NOT_FOUND: &str = "Work not found";

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateWork {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub project: String,
    #[schema(value_type = Option<Vec<String>>)]
    pub work: Option<OneOrMany<RecordId>>,
    #[schema(value_type = Option<String>)]
    pub deliverable: Option<RecordId>,
}

/// Partial update. `deliverable: null` unlinks; a `project` key is accepted
/// and ignored.
#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateWork {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub work: Option<OneOrMany<RecordId>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>, nullable)]
    pub deliverable: Option<Option<RecordId>>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub project: Option<IgnoredAny>,
}

impl Validate for CreateWork {
    fn validate(&self) -> Result<(), String> {
        non_empty(&self.name, "name")
    }
}

impl Validate for UpdateWork {
    fn validate(&self) -> Result<(), String> {
        match &self.name {
            Some(name) => non_empty(name, "name"),
            None => Ok(()),
        }
    }
}

pub fn create(storage: &Storage, caller: &Caller, body: CreateWork) -> Result<Work, AppError> {
    let project = existing_id(&body.project, INVALID_PROJECT)?;
    planning_project(storage, caller, &project)?;
    let work = Work {
        id: RecordId::generate(),
        name: body.name,
        description: body.description,
        work: body.work.map(OneOrMany::into_vec).unwrap_or_default(),
        deliverable: body.deliverable,
        project,
    };
    storage.works.put(&work)?;
    tracing::info!(work = %work.id, project = %work.project, "work created");
    Ok(work)
}

fn populate(storage: &Storage, work: Work) -> Result<WorkView, AppError> {
    let children = storage.works.resolve(&work.work)?;
    let deliverable = match &work.deliverable {
        Some(id) => storage.deliverables.get(id)?,
        None => None,
    };
    Ok(WorkView {
        id: work.id,
        name: work.name,
        description: work.description,
        work: children,
        deliverable,
        project: work.project,
    })
}

/// Works of a project with their child works and deliverable resolved.
pub fn list(storage: &Storage, caller: &Caller, project_id: &str) -> Result<Vec<WorkView>, AppError> {
    let project = existing_id(project_id, INVALID_PROJECT)?;
    planning_project(storage, caller, &project)?;
    storage
        .works
        .for_project(&project)?
        .into_iter()
        .map(|work| populate(storage, work))
        .collect()
}

fn authorized_work(storage: &Storage, caller: &Caller, id: &str) -> Result<Work, AppError> {
    let id = existing_id(id, WORK_NOT_FOUND)?;
    let work = storage
        .works
        .get(&id)?
        .ok_or_else(|| AppError::NotFound(WORK_NOT_FOUND.to_string()))?;
    planning_project(storage, caller, &work.project)?;
    Ok(work)
}

/// Applies the provided fields. The owning project never changes.
pub fn update(storage: &Storage, caller: &Caller, id: &str, body: UpdateWork) -> Result<Work, AppError> {
    let current = authorized_work(storage, caller, id)?;
    let children = body.work.map(OneOrMany::into_vec);
    let (work, ()) = storage
        .works
        .update_with(&current.id, |work| {
            if let Some(name) = &body.name {
                work.name = name.clone();
            }
            if let Some(description) = &body.description {
                work.description = description.clone();
            }
            if let Some(children) = &children {
                work.work = children.clone();
            }
            if let Some(deliverable) = &body.deliverable {
                work.deliverable = deliverable.clone();
            }
            Ok::<_, AppError>(())
        })?
        .ok_or_else(|| AppError::NotFound(WORK_NOT_FOUND.to_string()))?;
    tracing::info!(work = %work.id, caller = %caller.id, "work updated");
    Ok(work)
}

pub fn delete(storage: &Storage, caller: &Caller, id: &str) -> Result<Work, AppError> {
    let work = authorized_work(storage, caller, id)?;
    let removed = storage
        .works
        .remove(&work.id)?
        .ok_or_else(|| AppError::NotFound(WORK_NOT_FOUND.to_string()))?;
    tracing::info!(work = %removed.id, caller = %caller.id, "work deleted");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Deliverable;
    use crate::service::testing;

    fn body(project: &RecordId, name: &str) -> CreateWork {
        CreateWork {
            name: name.into(),
            description: String::new(),
            project: project.to_string(),
            work: None,
            deliverable: None,
        }
    }

    #[test]
    fn create_checks_the_parent_project() {
        let storage = Storage::temporary().unwrap();
        let pm = testing::caller(false, true);
        let project = testing::project(&storage, &pm);

        let mut bad = body(&project.id, "Site prep");
        bad.project = "123".into();
        let err = create(&storage, &pm, bad).unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == INVALID_PROJECT));

        let err = create(&storage, &pm, body(&RecordId::generate(), "Site prep")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let outsider = testing::caller(false, false);
        let err = create(&storage, &outsider, body(&project.id, "Site prep")).unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(msg) if msg.contains("planning")));

        let work = create(&storage, &pm, body(&project.id, "Site prep")).unwrap();
        assert_eq!(work.project, project.id);
        assert!(work.work.is_empty());
    }

    #[test]
    fn update_never_reparents_and_normalizes_children() {
        let storage = Storage::temporary().unwrap();
        let pm = testing::caller(false, true);
        let project = testing::project(&storage, &pm);
        let child = create(&storage, &pm, body(&project.id, "Child")).unwrap();
        let parent = create(&storage, &pm, body(&project.id, "Parent")).unwrap();

        let patch: UpdateWork = serde_json::from_value(serde_json::json!({
            "name": "Parent v2",
            "work": child.id.to_string(),
            "project": RecordId::generate().to_string(),
        }))
        .unwrap();
        let updated = update(&storage, &pm, parent.id.as_str(), patch).unwrap();
        assert_eq!(updated.name, "Parent v2");
        assert_eq!(updated.work, vec![child.id.clone()]);
        assert_eq!(updated.project, project.id);
    }

    #[test]
    fn null_deliverable_clears_the_link() {
        let storage = Storage::temporary().unwrap();
        let pm = testing::caller(false, true);
        let project = testing::project(&storage, &pm);
        let deliverable = RecordId::generate();
        let mut create_body = body(&project.id, "Pour");
        create_body.deliverable = Some(deliverable.clone());
        let work = create(&storage, &pm, create_body).unwrap();

        let keep: UpdateWork = serde_json::from_value(serde_json::json!({"description": "slab"})).unwrap();
        let kept = update(&storage, &pm, work.id.as_str(), keep).unwrap();
        assert_eq!(kept.deliverable, Some(deliverable));

        let clear: UpdateWork = serde_json::from_value(serde_json::json!({"deliverable": null})).unwrap();
        let cleared = update(&storage, &pm, work.id.as_str(), clear).unwrap();
        assert_eq!(cleared.deliverable, None);
    }

    #[test]
    fn malformed_child_ids_fail_to_parse() {
        let parsed = serde_json::from_value::<UpdateWork>(serde_json::json!({"work": ["nope"]}));
        assert!(parsed.is_err());
    }

    #[test]
    fn list_populates_references() {
        let storage = Storage::temporary().unwrap();
        let pm = testing::caller(false, true);
        let project = testing::project(&storage, &pm);
        let deliverable = Deliverable {
            id: RecordId::generate(),
            name: "Report".into(),
            description: String::new(),
            project: project.id.clone(),
        };
        storage.deliverables.put(&deliverable).unwrap();

        let child = create(&storage, &pm, body(&project.id, "Child")).unwrap();
        let mut parent = body(&project.id, "Parent");
        parent.work = Some(OneOrMany::Many(vec![child.id.clone(), RecordId::generate()]));
        parent.deliverable = Some(deliverable.id.clone());
        let parent = create(&storage, &pm, parent).unwrap();

        let views = list(&storage, &pm, project.id.as_str()).unwrap();
        assert_eq!(views.len(), 2);
        let view = views.iter().find(|v| v.id == parent.id).unwrap();
        assert_eq!(view.work.len(), 1);
        assert_eq!(view.work[0].name, "Child");
        assert_eq!(view.deliverable.as_ref().unwrap().name, "Report");

        let outsider = testing::caller(false, true);
        assert!(list(&storage, &outsider, project.id.as_str()).is_err());
    }

    #[test]
    fn delete_returns_the_removed_work() {
        let storage = Storage::temporary().unwrap();
        let pm = testing::caller(false, true);
        let project = testing::project(&storage, &pm);
        let work = create(&storage, &pm, body(&project.id, "Temp")).unwrap();

        let outsider = testing::caller(false, false);
        assert!(delete(&storage, &outsider, work.id.as_str()).is_err());

        let removed = delete(&storage, &pm, work.id.as_str()).unwrap();
        assert_eq!(removed.id, work.id);
        let err = delete(&storage, &pm, work.id.as_str()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == WORK_NOT_FOUND));
    }
}
