//! Project phase document manager.
//!
//! Applies a caller's value to one phase section of a project: resolve the
//! project, authorize against the section's phase, merge or replace, persist
//! the whole project document.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::access::authorize_phase;
use crate::error::AppError;
use crate::ids::existing_id;
use crate::models::{Caller, Phase, Project, Validate};
use crate::sections::{ClosedProject, CloseProjectPatch, MergePolicy, PhaseSection, CLOSE_PROJECT_PATH};
use crate::storage::Storage;

const INVALID_PROJECT: &str = "Invalid project ID";
const PROJECT_NOT_FOUND: &str = "Project not found";

/// Owning phase of a dotted section path: its first segment.
pub fn section_phase(path: &str) -> Result<Phase, AppError> {
    path.split('.')
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(AppError::Unexpected)
}

/// Load-authorize-mutate-save for the phase sections of a project.
pub trait PhaseSections {
    /// Overlays the keys present in `patch` onto the stored section.
    fn merge_shallow<S: PhaseSection>(&self, caller: &Caller, project_id: &str, patch: S) -> Result<S, AppError>;

    /// Replaces the stored section with `value`.
    fn replace<S: PhaseSection>(&self, caller: &Caller, project_id: &str, value: S) -> Result<S, AppError>;

    /// Closes or reopens the project.
    fn close_project(&self, caller: &Caller, project_id: &str, patch: CloseProjectPatch) -> Result<ClosedProject, AppError>;
}

/// Applies `patch` with the merge policy of its section.
pub fn update_phase_section<R, S>(repo: &R, caller: &Caller, project_id: &str, patch: S) -> Result<S, AppError>
where
    R: PhaseSections + ?Sized,
    S: PhaseSection,
{
    patch.validate().map_err(AppError::Validation)?;
    match S::POLICY {
        MergePolicy::Shallow => repo.merge_shallow(caller, project_id, patch),
        MergePolicy::Replace => repo.replace(caller, project_id, patch),
    }
}

/// Result of overlaying `patch`'s serialized keys onto `existing`.
pub fn overlay<S: PhaseSection>(existing: Option<&S>, patch: &S) -> Result<S, AppError> {
    let mut merged = match existing {
        Some(section) => match serde_json::to_value(section)? {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        None => Map::new(),
    };
    match serde_json::to_value(patch)? {
        Value::Object(fields) => merged.extend(fields),
        other => {
            return Err(AppError::Unexpected(format!(
                "section {} serialized to a non-object: {other}",
                S::PATH
            )))
        }
    }
    Ok(serde_json::from_value(Value::Object(merged))?)
}

impl Storage {
    /// Runs `apply` on the project after authorizing `phase`, then persists it.
    fn mutate_phase<R, F>(&self, caller: &Caller, project_id: &str, phase: Phase, mut apply: F) -> Result<R, AppError>
    where
        F: FnMut(&mut Project) -> Result<R, AppError>,
    {
        let id = existing_id(project_id, INVALID_PROJECT)?;
        let (_, out) = self
            .projects
            .update_with(&id, |project| {
                authorize_phase(caller, project, phase).into_result()?;
                let out = apply(project)?;
                project.touch();
                Ok::<_, AppError>(out)
            })?
            .ok_or_else(|| AppError::NotFound(PROJECT_NOT_FOUND.to_string()))?;
        Ok(out)
    }
}

impl PhaseSections for Storage {
    fn merge_shallow<S: PhaseSection>(&self, caller: &Caller, project_id: &str, patch: S) -> Result<S, AppError> {
        let phase = section_phase(S::PATH)?;
        let section = self.mutate_phase(caller, project_id, phase, |project| {
            let merged = overlay(S::get(project), &patch)?;
            *S::slot(project) = Some(merged.clone());
            Ok(merged)
        })?;
        tracing::info!(project = project_id, section = S::PATH, caller = %caller.id, "section merged");
        Ok(section)
    }

    fn replace<S: PhaseSection>(&self, caller: &Caller, project_id: &str, value: S) -> Result<S, AppError> {
        let phase = section_phase(S::PATH)?;
        let section = self.mutate_phase(caller, project_id, phase, |project| {
            *S::slot(project) = Some(value.clone());
            Ok(value.clone())
        })?;
        tracing::info!(project = project_id, section = S::PATH, caller = %caller.id, "section replaced");
        Ok(section)
    }

    fn close_project(&self, caller: &Caller, project_id: &str, patch: CloseProjectPatch) -> Result<ClosedProject, AppError> {
        let phase = section_phase(CLOSE_PROJECT_PATH)?;
        let closing = patch.closed.unwrap_or(false);
        // Fixed once so a retried write stamps the same moment.
        let closed_date = patch.closed_date.unwrap_or_else(Utc::now);

        let result = self.mutate_phase(caller, project_id, phase, |project| {
            let section = &mut project.closing.integration.close_project;
            if closing {
                section.closed_date = Some(closed_date);
                project.closed = true;
            } else {
                section.closed_date = None;
                project.closed = false;
            }
            Ok(ClosedProject {
                close_project: project.closing.integration.close_project.clone(),
                closed: project.closed,
            })
        })?;
        tracing::info!(project = project_id, closed = result.closed, caller = %caller.id, "project close state changed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RecordId;
    use crate::models::{local_date, Acs};
    use crate::sections::*;
    use std::sync::Arc;

    struct Fixture {
        storage: Storage,
        project: Project,
        pm: Caller,
    }

    fn fixture() -> Fixture {
        let storage = Storage::temporary().unwrap();
        let pm = Caller { id: RecordId::generate(), admin: false, pm: true };
        let now = Utc::now();
        let project = Project {
            id: RecordId::generate(),
            name: "Terminal".into(),
            pm: pm.id.clone(),
            start_date: local_date(),
            acs: Acs::default(),
            closed: false,
            initiating: InitiatingPhase::default(),
            planning: PlanningPhase::default(),
            closing: ClosingPhase::default(),
            created_at: now,
            updated_at: now,
        };
        storage.projects.put(&project).unwrap();
        Fixture { storage, project, pm }
    }

    fn scope_plan() -> ScopeManagementPlan {
        ScopeManagementPlan {
            project_scope_statement: "statement".into(),
            wbs: "wbs".into(),
            scope_baseline: "baseline".into(),
            project_deliverables: "deliverables".into(),
        }
    }

    fn requirements_plan() -> RequirementsManagementPlan {
        RequirementsManagementPlan {
            requirement_activities: "activities".into(),
            changes_managed_approved: "board".into(),
            requirement_prioritised: "moscow".into(),
            metrics_used: "coverage".into(),
        }
    }

    #[test]
    fn section_phase_comes_from_the_first_segment() {
        assert_eq!(section_phase("planning.cost.estimateCost").unwrap(), Phase::Planning);
        assert!(section_phase("budgeting.cost").is_err());
    }

    #[test]
    fn shallow_merge_keeps_untouched_keys() {
        let f = fixture();
        let id = f.project.id.to_string();
        let first = ProjectCharter {
            title: Some("Terminal 2".into()),
            purpose: Some("Capacity".into()),
            ..Default::default()
        };
        f.storage.merge_shallow(&f.pm, &id, first).unwrap();

        let second = ProjectCharter {
            purpose: Some("Capacity and comfort".into()),
            risks: Some(vec!["weather".into()]),
            ..Default::default()
        };
        let merged = update_phase_section(&f.storage, &f.pm, &id, second).unwrap();

        assert_eq!(merged.title.as_deref(), Some("Terminal 2"));
        assert_eq!(merged.purpose.as_deref(), Some("Capacity and comfort"));
        assert_eq!(merged.risks, Some(vec!["weather".to_string()]));

        let stored = f.storage.projects.get(&f.project.id).unwrap().unwrap();
        assert_eq!(stored.initiating.integration.develop_project_charter, Some(merged));
    }

    #[test]
    fn shallow_merge_is_idempotent() {
        let f = fixture();
        let id = f.project.id.to_string();
        let patch = ProjectCharter {
            title: Some("Terminal 2".into()),
            milestones: Some(vec![Milestone { name: "Design".into(), date: "2026-05-01".into() }]),
            ..Default::default()
        };

        let once = update_phase_section(&f.storage, &f.pm, &id, patch.clone()).unwrap();
        let stored_once = f.storage.projects.get(&f.project.id).unwrap().unwrap();
        let twice = update_phase_section(&f.storage, &f.pm, &id, patch).unwrap();
        let stored_twice = f.storage.projects.get(&f.project.id).unwrap().unwrap();

        assert_eq!(once, twice);
        assert_eq!(
            stored_once.initiating.integration.develop_project_charter,
            stored_twice.initiating.integration.develop_project_charter
        );
    }

    #[test]
    fn replace_drops_fields_missing_from_the_new_value() {
        let f = fixture();
        let id = f.project.id.to_string();
        let full = PlanScopeManagement {
            scope_management_plan: Some(scope_plan()),
            requirements_management_plan: Some(requirements_plan()),
        };
        update_phase_section(&f.storage, &f.pm, &id, full).unwrap();

        let partial = PlanScopeManagement {
            scope_management_plan: Some(ScopeManagementPlan { wbs: "x".into(), ..scope_plan() }),
            requirements_management_plan: None,
        };
        let stored = update_phase_section(&f.storage, &f.pm, &id, partial.clone()).unwrap();
        assert_eq!(stored, partial);

        let project = f.storage.projects.get(&f.project.id).unwrap().unwrap();
        let section = project.planning.scope.plan_scope_management.unwrap();
        assert!(section.requirements_management_plan.is_none());
        assert_eq!(section.scope_management_plan.unwrap().wbs, "x");
    }

    #[test]
    fn phase_membership_is_required_for_outsiders() {
        let f = fixture();
        let id = f.project.id.to_string();
        let outsider = Caller { id: RecordId::generate(), admin: false, pm: true };
        let value = CreateWbs { wbs: vec![] };

        let err = f.storage.replace(&outsider, &id, value.clone()).unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(msg) if msg.contains("planning")));
        let untouched = f.storage.projects.get(&f.project.id).unwrap().unwrap();
        assert!(untouched.planning.scope.create_wbs.is_none());

        // An initiating assignment does not open the planning phase.
        f.storage
            .projects
            .update_with(&f.project.id, |p| {
                p.acs.initiating.push(outsider.id.clone());
                Ok::<_, AppError>(())
            })
            .unwrap();
        assert!(f.storage.replace(&outsider, &id, value.clone()).is_err());

        f.storage
            .projects
            .update_with(&f.project.id, |p| {
                p.acs.planning.push(outsider.id.clone());
                Ok::<_, AppError>(())
            })
            .unwrap();
        assert!(f.storage.replace(&outsider, &id, value).is_ok());
    }

    #[test]
    fn unknown_or_malformed_project_is_not_found() {
        let f = fixture();
        let err = f.storage.replace(&f.pm, "garbage", CreateWbs { wbs: vec![] }).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let missing = RecordId::generate().to_string();
        let err = f.storage.replace(&f.pm, &missing, CreateWbs { wbs: vec![] }).unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == PROJECT_NOT_FOUND));
    }

    #[test]
    fn close_without_date_stamps_now() {
        let f = fixture();
        let id = f.project.id.to_string();
        let before = Utc::now();
        let result = f
            .storage
            .close_project(&f.pm, &id, CloseProjectPatch { closed: Some(true), closed_date: None })
            .unwrap();
        let after = Utc::now();

        assert!(result.closed);
        let stamped = result.close_project.closed_date.unwrap();
        assert!(stamped >= before && stamped <= after);

        let stored = f.storage.projects.get(&f.project.id).unwrap().unwrap();
        assert!(stored.closed);
        assert_eq!(stored.closing.integration.close_project.closed_date, Some(stamped));
    }

    #[test]
    fn close_with_date_keeps_it_and_reopen_clears_it() {
        let f = fixture();
        let id = f.project.id.to_string();
        let date = "2026-03-01T12:00:00Z".parse().unwrap();
        let closed = f
            .storage
            .close_project(&f.pm, &id, CloseProjectPatch { closed: Some(true), closed_date: Some(date) })
            .unwrap();
        assert_eq!(closed.close_project.closed_date, Some(date));

        let reopened = f
            .storage
            .close_project(&f.pm, &id, CloseProjectPatch { closed: Some(false), closed_date: Some(date) })
            .unwrap();
        assert!(!reopened.closed);
        assert!(reopened.close_project.closed_date.is_none());

        let stored = f.storage.projects.get(&f.project.id).unwrap().unwrap();
        assert!(!stored.closed);
        assert!(stored.closing.integration.close_project.closed_date.is_none());
    }

    #[test]
    fn closing_requires_the_closing_phase() {
        let f = fixture();
        let id = f.project.id.to_string();
        let planner = Caller { id: RecordId::generate(), admin: false, pm: false };
        f.storage
            .projects
            .update_with(&f.project.id, |p| {
                p.acs.planning.push(planner.id.clone());
                Ok::<_, AppError>(())
            })
            .unwrap();

        let err = f
            .storage
            .close_project(&planner, &id, CloseProjectPatch { closed: Some(true), closed_date: None })
            .unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(msg) if msg.contains("closing")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_updates_to_different_sections_both_persist() {
        let f = fixture();
        let storage = Arc::new(f.storage);
        let id = f.project.id.to_string();

        let scope = PlanScopeManagement {
            scope_management_plan: Some(scope_plan()),
            requirements_management_plan: None,
        };
        let cost = PlanCostManagement {
            cost_management_plan: CostManagementPlan {
                units: vec!["EUR".into()],
                ..Default::default()
            },
        };

        let mut tasks = Vec::new();
        for round in 0..20 {
            let (s1, s2) = (storage.clone(), storage.clone());
            let (c1, c2) = (f.pm.clone(), f.pm.clone());
            let (id1, id2) = (id.clone(), id.clone());
            let scope = scope.clone();
            let mut cost = cost.clone();
            cost.cost_management_plan.rules = vec![format!("round {round}")];
            tasks.push(tokio::task::spawn_blocking(move || {
                update_phase_section(s1.as_ref(), &c1, &id1, scope).map(|_| ())
            }));
            tasks.push(tokio::task::spawn_blocking(move || {
                update_phase_section(s2.as_ref(), &c2, &id2, cost).map(|_| ())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let project = storage.projects.get(&f.project.id).unwrap().unwrap();
        assert!(project.planning.scope.plan_scope_management.is_some());
        let cost = project.planning.cost.plan_cost_management.unwrap();
        assert_eq!(cost.cost_management_plan.units, vec!["EUR".to_string()]);
    }
}
