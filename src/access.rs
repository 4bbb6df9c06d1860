//! Phase access control.
//!
//! Every rule here is a pure function of the caller and an already loaded
//! project. Callers translate a denial into [`AppError::AccessDenied`] at the
//! point where they need a `Result`.

use crate::error::AppError;
use crate::models::{Caller, Phase, Project};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied(String),
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Access::Granted => Ok(()),
            Access::Denied(reason) => Err(AppError::AccessDenied(reason)),
        }
    }
}

fn grant_if(allowed: bool, reason: impl FnOnce() -> String) -> Access {
    if allowed {
        Access::Granted
    } else {
        Access::Denied(reason())
    }
}

pub fn is_manager(caller: &Caller, project: &Project) -> bool {
    caller.admin || caller.id == project.pm
}

/// Admins, the project's manager, and the users assigned to `phase`.
pub fn authorize_phase(caller: &Caller, project: &Project, phase: Phase) -> Access {
    grant_if(
        is_manager(caller, project) || project.acs.contains(phase, &caller.id),
        || format!("Access denied: Not assigned to {phase} phase"),
    )
}

/// Admins and the project's manager.
pub fn authorize_manager(caller: &Caller, project: &Project) -> Access {
    grant_if(is_manager(caller, project), || {
        "Access denied: You are not the manager of this project".to_string()
    })
}

pub fn require_admin(caller: &Caller) -> Access {
    grant_if(caller.admin, || "Access denied: Admin only".to_string())
}

/// Holders of the project-manager role; admins always qualify.
pub fn require_pm(caller: &Caller) -> Access {
    grant_if(caller.pm || caller.admin, || "You are not a PM!".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RecordId;
    use crate::models::Acs;
    use crate::sections::{ClosingPhase, InitiatingPhase, PlanningPhase};
    use chrono::Utc;

    fn project(pm: &RecordId) -> Project {
        let now = Utc::now();
        Project {
            id: RecordId::generate(),
            name: "Warehouse".into(),
            pm: pm.clone(),
            start_date: "1/1/2026".into(),
            acs: Acs::default(),
            closed: false,
            initiating: InitiatingPhase::default(),
            planning: PlanningPhase::default(),
            closing: ClosingPhase::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn authorize_phase_truth_table() {
        let manager = RecordId::generate();
        for phase in Phase::ALL {
            for admin in [false, true] {
                for is_pm in [false, true] {
                    for member in [false, true] {
                        let caller_id = if is_pm { manager.clone() } else { RecordId::generate() };
                        let mut p = project(&manager);
                        if member {
                            p.acs.members_mut(phase).push(caller_id.clone());
                        }
                        // Membership in every other phase must never count.
                        for other in Phase::ALL.into_iter().filter(|o| *o != phase) {
                            p.acs.members_mut(other).push(caller_id.clone());
                        }
                        let caller = Caller { id: caller_id, admin, pm: false };

                        let expected = admin || is_pm || member;
                        let access = authorize_phase(&caller, &p, phase);
                        assert_eq!(
                            access.is_granted(),
                            expected,
                            "phase={phase} admin={admin} pm={is_pm} member={member}"
                        );
                        if !expected {
                            assert_eq!(
                                access,
                                Access::Denied(format!("Access denied: Not assigned to {phase} phase"))
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn pm_role_flag_alone_does_not_grant_phase_access() {
        let p = project(&RecordId::generate());
        let caller = Caller { id: RecordId::generate(), admin: false, pm: true };
        assert!(!authorize_phase(&caller, &p, Phase::Planning).is_granted());
        assert!(!authorize_manager(&caller, &p).is_granted());
    }

    #[test]
    fn manager_rule_is_admin_or_owner() {
        let owner = RecordId::generate();
        let p = project(&owner);
        let outsider = Caller { id: RecordId::generate(), admin: false, pm: true };
        let admin = Caller { id: RecordId::generate(), admin: true, pm: false };
        let pm = Caller { id: owner, admin: false, pm: true };

        assert!(!authorize_manager(&outsider, &p).is_granted());
        assert!(authorize_manager(&admin, &p).is_granted());
        assert!(authorize_manager(&pm, &p).is_granted());
    }

    #[test]
    fn role_gates() {
        let plain = Caller { id: RecordId::generate(), admin: false, pm: false };
        let pm = Caller { pm: true, ..plain.clone() };
        let admin = Caller { admin: true, ..plain.clone() };

        assert!(!require_admin(&plain).is_granted());
        assert!(!require_admin(&pm).is_granted());
        assert!(require_admin(&admin).is_granted());

        assert!(!require_pm(&plain).is_granted());
        assert!(require_pm(&pm).is_granted());
        assert!(require_pm(&admin).is_granted());
    }

    #[test]
    fn denial_becomes_access_denied_error() {
        let err = Access::Denied("nope".into()).into_result().unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(msg) if msg == "nope"));
    }
}
