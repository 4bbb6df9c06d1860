use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::ids::RecordId;
use crate::sections::{ClosingPhase, InitiatingPhase, PlanningPhase};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub email: String,
    /// bcrypt hash, never leaves the server.
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, rename = "avatarURL")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub pm: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn view(&self) -> UserView {
        UserView::from(self)
    }
}

/// A user as returned by the API: no password hash, no session tokens.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "avatarURL", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub admin: bool,
    pub pm: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
            avatar_url: user.avatar_url.clone(),
            admin: user.admin,
            pm: user.pm,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// The short form of a user embedded where a project references one.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: Option<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub admin: bool,
    pub pm: bool,
    #[serde(rename = "avatarURL", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            admin: user.admin,
            pm: user.pm,
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// Checks a deserialized request body beyond what its types enforce.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Identity of the authenticated caller, threaded explicitly into every
/// service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: RecordId,
    pub admin: bool,
    pub pm: bool,
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            admin: user.admin,
            pm: user.pm,
        }
    }
}

/// Project lifecycle phases.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initiating,
    Planning,
    Executing,
    Monitoring,
    Closing,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Initiating,
        Phase::Planning,
        Phase::Executing,
        Phase::Monitoring,
        Phase::Closing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Initiating => "initiating",
            Phase::Planning => "planning",
            Phase::Executing => "executing",
            Phase::Monitoring => "monitoring",
            Phase::Closing => "closing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase: {s}"))
    }
}

/// Phase assignment lists: the users allowed to act within each phase.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, ToSchema)]
pub struct Acs {
    #[serde(default)]
    pub initiating: Vec<RecordId>,
    #[serde(default)]
    pub planning: Vec<RecordId>,
    #[serde(default)]
    pub executing: Vec<RecordId>,
    #[serde(default)]
    pub monitoring: Vec<RecordId>,
    #[serde(default)]
    pub closing: Vec<RecordId>,
}

impl Acs {
    pub fn members(&self, phase: Phase) -> &[RecordId] {
        match phase {
            Phase::Initiating => &self.initiating,
            Phase::Planning => &self.planning,
            Phase::Executing => &self.executing,
            Phase::Monitoring => &self.monitoring,
            Phase::Closing => &self.closing,
        }
    }

    pub fn members_mut(&mut self, phase: Phase) -> &mut Vec<RecordId> {
        match phase {
            Phase::Initiating => &mut self.initiating,
            Phase::Planning => &mut self.planning,
            Phase::Executing => &mut self.executing,
            Phase::Monitoring => &mut self.monitoring,
            Phase::Closing => &mut self.closing,
        }
    }

    pub fn contains(&self, phase: Phase, user: &RecordId) -> bool {
        self.members(phase).contains(user)
    }
}

/// The aggregate root. Phase sections are embedded and owned exclusively.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: String,
    pub pm: RecordId,
    pub start_date: String,
    #[serde(default)]
    pub acs: Acs,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub initiating: InitiatingPhase,
    #[serde(default)]
    pub planning: PlanningPhase,
    #[serde(default)]
    pub closing: ClosingPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Keeps `closed` and the close section's `closedDate` in step.
    /// An already closed project keeps its original date.
    pub fn set_closed(&mut self, closed: bool, at: DateTime<Utc>) {
        let section = &mut self.closing.integration.close_project;
        if closed {
            section.closed_date.get_or_insert(at);
        } else {
            section.closed_date = None;
        }
        self.closed = closed;
    }

    pub fn summary(&self, pm: Option<&User>) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            closed: self.closed,
            start_date: self.start_date.clone(),
            pm: pm.map(|u| PmRef {
                id: u.id.clone(),
                name: u.name.clone(),
                email: u.email.clone(),
            }),
        }
    }
}

/// Default `startDate`: the server's local date, e.g. `3/7/2026`.
pub fn local_date() -> String {
    chrono::Local::now().format("%-m/%-d/%Y").to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct PmRef {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: Option<String>,
    pub email: String,
}

/// Entry of the project listing.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: String,
    pub closed: bool,
    pub start_date: String,
    pub pm: Option<PmRef>,
}

/// Phase assignment lists with users resolved; dangling ids are dropped.
#[derive(Serialize, Debug, Clone, Default, ToSchema)]
pub struct PopulatedAcs {
    pub initiating: Vec<UserSummary>,
    pub planning: Vec<UserSummary>,
    pub executing: Vec<UserSummary>,
    pub monitoring: Vec<UserSummary>,
    pub closing: Vec<UserSummary>,
}

/// Full project with `pm` and `acs` populated.
#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: String,
    pub pm: Option<UserSummary>,
    pub start_date: String,
    pub acs: PopulatedAcs,
    pub closed: bool,
    pub initiating: InitiatingPhase,
    pub planning: PlanningPhase,
    pub closing: ClosingPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A WBS node. `work` holds the ids of child nodes.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Work {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub work: Vec<RecordId>,
    #[serde(default)]
    pub deliverable: Option<RecordId>,
    pub project: RecordId,
}

/// A work node with its direct references resolved.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct WorkView {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub work: Vec<Work>,
    pub deliverable: Option<Deliverable>,
    pub project: RecordId,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Deliverable {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub project: RecordId,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub work_package: RecordId,
    pub name: String,
    #[serde(default)]
    pub initial_scope_description: String,
    #[serde(default)]
    pub detailed_scope_description: String,
    /// Dependency edges. Cycles are not checked.
    #[serde(default)]
    pub predecessor_activities: Vec<RecordId>,
    #[serde(default)]
    pub resource_requirements: Vec<String>,
    #[serde(default)]
    pub duration: f64,
    pub project: RecordId,
}

/// An activity with its work package and predecessors resolved.
#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub work_package: Option<Work>,
    pub name: String,
    pub initial_scope_description: String,
    pub detailed_scope_description: String,
    pub predecessor_activities: Vec<Activity>,
    pub resource_requirements: Vec<String>,
    pub duration: f64,
    pub project: RecordId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert!("execution".parse::<Phase>().is_err());
    }

    #[test]
    fn user_view_hides_credentials() {
        let now = Utc::now();
        let user = User {
            id: RecordId::generate(),
            email: "a@b.io".into(),
            password: "hash".into(),
            name: Some("Ann".into()),
            phone: None,
            avatar_url: None,
            admin: false,
            pm: true,
            token: Some("t".into()),
            refresh_token: Some("r".into()),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(user.view()).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("token").is_none());
        assert!(json.get("refreshToken").is_none());
        assert_eq!(json["_id"], user.id.to_string());
        assert_eq!(json["pm"], true);
    }

    #[test]
    fn acs_membership_is_per_phase() {
        let user = RecordId::generate();
        let mut acs = Acs::default();
        acs.members_mut(Phase::Planning).push(user.clone());
        assert!(acs.contains(Phase::Planning, &user));
        assert!(!acs.contains(Phase::Initiating, &user));
    }

    #[test]
    fn project_documents_tolerate_missing_sections() {
        let raw = serde_json::json!({
            "_id": "0123456789abcdef01234567",
            "name": "Bridge",
            "pm": "abcdefabcdefabcdefabcdef",
            "startDate": "1/2/2026",
            "createdAt": "2026-01-02T00:00:00Z",
            "updatedAt": "2026-01-02T00:00:00Z"
        });
        let project: Project = serde_json::from_value(raw).unwrap();
        assert!(!project.closed);
        assert!(project.acs.planning.is_empty());
        assert!(project.initiating.integration.develop_project_charter.is_none());
        assert!(project.closing.integration.close_project.closed_date.is_none());
    }
}
