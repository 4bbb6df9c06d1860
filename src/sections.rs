//! Phase sections embedded in a project.
//!
//! Each section type names its dotted path inside the project document and
//! how a caller-supplied value is applied to it. The owning phase is the first
//! path segment.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ids::RecordId;
use crate::models::{Project, Validate};

/// How an incoming value is applied to the stored section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Top-level keys of the patch overwrite the stored ones; the rest survive.
    Shallow,
    /// The patch becomes the whole section.
    Replace,
}

pub trait PhaseSection: Validate + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Dotted location inside the project, e.g. `planning.cost.estimateCost`.
    const PATH: &'static str;
    const POLICY: MergePolicy;

    fn get(project: &Project) -> Option<&Self>;
    fn slot(project: &mut Project) -> &mut Option<Self>;
}

macro_rules! section {
    ($ty:ty, $path:literal, $policy:ident, $($field:ident).+) => {
        impl PhaseSection for $ty {
            const PATH: &'static str = $path;
            const POLICY: MergePolicy = MergePolicy::$policy;

            fn get(project: &Project) -> Option<&Self> {
                project.$($field).+.as_ref()
            }

            fn slot(project: &mut Project) -> &mut Option<Self> {
                &mut project.$($field).+
            }
        }

        impl Validate for $ty {
            fn validate(&self) -> Result<(), String> {
                self.check()
            }
        }
    };
}

pub(crate) fn non_negative(value: f64, field: &str) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("\"{field}\" must be greater than or equal to 0"))
    }
}

pub(crate) fn non_empty(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("\"{field}\" is not allowed to be empty"))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Phase containers
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct InitiatingPhase {
    #[serde(default)]
    pub integration: InitiatingIntegration,
    #[serde(default)]
    pub stakeholder: InitiatingStakeholder,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatingIntegration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub develop_project_charter: Option<ProjectCharter>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatingStakeholder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identify_stakeholders: Option<Stakeholders>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct PlanningPhase {
    #[serde(default)]
    pub scope: PlanningScope,
    #[serde(default)]
    pub schedule: PlanningSchedule,
    #[serde(default)]
    pub cost: PlanningCost,
    #[serde(default)]
    pub resource: PlanningResource,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanningScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_scope_management: Option<PlanScopeManagement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_requirements: Option<CollectRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub define_scope: Option<DefineScope>,
    #[serde(default, rename = "createWBS", skip_serializing_if = "Option::is_none")]
    pub create_wbs: Option<CreateWbs>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanningSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_schedule_management: Option<PlanScheduleManagement>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanningCost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_cost_management: Option<PlanCostManagement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_cost: Option<EstimateCost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub determine_budget: Option<DetermineBudget>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanningResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_resource_management: Option<PlanResourceManagement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_activity_resource: Option<EstimateActivityResource>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct ClosingPhase {
    #[serde(default)]
    pub integration: ClosingIntegration,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClosingIntegration {
    #[serde(default)]
    pub close_project: CloseProject,
}

// ---------------------------------------------------------------------------
// Initiating
// ---------------------------------------------------------------------------

/// Project charter. Every field is optional so a patch may carry any subset.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectCharter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestones: Option<Vec<Milestone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Milestone {
    pub name: String,
    #[serde(default)]
    pub date: String,
}

impl ProjectCharter {
    fn check(&self) -> Result<(), String> {
        for milestone in self.milestones.iter().flatten() {
            non_empty(&milestone.name, "milestones.name")?;
        }
        Ok(())
    }
}

section!(
    ProjectCharter,
    "initiating.integration.developProjectCharter",
    Shallow,
    initiating.integration.develop_project_charter
);

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Stakeholders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<Vec<Stakeholder>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<Vec<Stakeholder>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Stakeholder {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub influence: String,
    #[serde(default)]
    pub interest: String,
}

impl Stakeholders {
    fn check(&self) -> Result<(), String> {
        for s in self.internal.iter().chain(self.external.iter()).flatten() {
            non_empty(&s.name, "stakeholder.name")?;
        }
        Ok(())
    }
}

section!(
    Stakeholders,
    "initiating.stakeholder.identifyStakeholders",
    Shallow,
    initiating.stakeholder.identify_stakeholders
);

// ---------------------------------------------------------------------------
// Planning: scope
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlanScopeManagement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_management_plan: Option<ScopeManagementPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_management_plan: Option<RequirementsManagementPlan>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScopeManagementPlan {
    pub project_scope_statement: String,
    #[serde(rename = "WBS")]
    pub wbs: String,
    pub scope_baseline: String,
    pub project_deliverables: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequirementsManagementPlan {
    pub requirement_activities: String,
    pub changes_managed_approved: String,
    pub requirement_prioritised: String,
    pub metrics_used: String,
}

impl PlanScopeManagement {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

section!(
    PlanScopeManagement,
    "planning.scope.planScopeManagement",
    Replace,
    planning.scope.plan_scope_management
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CollectRequirements {
    pub requirements: Vec<Requirement>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Requirement {
    pub requirement: String,
    pub documentation: String,
}

impl CollectRequirements {
    fn check(&self) -> Result<(), String> {
        for r in &self.requirements {
            non_empty(&r.requirement, "requirements.requirement")?;
        }
        Ok(())
    }
}

section!(
    CollectRequirements,
    "planning.scope.collectRequirements",
    Replace,
    planning.scope.collect_requirements
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DefineScope {
    pub end_product_scope_description: String,
    #[serde(default)]
    pub deliverables: Vec<RecordId>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

impl DefineScope {
    fn check(&self) -> Result<(), String> {
        non_empty(&self.end_product_scope_description, "endProductScopeDescription")
    }
}

section!(
    DefineScope,
    "planning.scope.defineScope",
    Replace,
    planning.scope.define_scope
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateWbs {
    #[serde(rename = "WBS")]
    pub wbs: Vec<RecordId>,
}

impl CreateWbs {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

section!(
    CreateWbs,
    "planning.scope.createWBS",
    Replace,
    planning.scope.create_wbs
);

// ---------------------------------------------------------------------------
// Planning: schedule
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlanScheduleManagement {
    pub schedule_management_plan: ScheduleManagementPlan,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleManagementPlan {
    pub change_of_schedule: String,
    pub level_of_detail: String,
    pub dependencies: String,
    pub units_of_measure: String,
    pub requests_for_changes: String,
}

impl PlanScheduleManagement {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

section!(
    PlanScheduleManagement,
    "planning.schedule.planScheduleManagement",
    Replace,
    planning.schedule.plan_schedule_management
);

// ---------------------------------------------------------------------------
// Planning: cost
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlanCostManagement {
    pub cost_management_plan: CostManagementPlan,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CostManagementPlan {
    #[serde(default)]
    pub units: Vec<String>,
    #[serde(default)]
    pub precision: Vec<String>,
    #[serde(default)]
    pub ranges: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub reporting_formats_frequency: Vec<String>,
}

impl PlanCostManagement {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

section!(
    PlanCostManagement,
    "planning.cost.planCostManagement",
    Replace,
    planning.cost.plan_cost_management
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EstimateCost {
    pub cost_estimates: Vec<CostEstimate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CostEstimate {
    pub activity: RecordId,
    #[serde(default)]
    pub labor: Vec<CostLine>,
    #[serde(default)]
    pub materials: Vec<CostLine>,
    #[serde(default)]
    pub equipment: Vec<CostLine>,
    #[serde(default)]
    pub facilities: Vec<CostLine>,
    #[serde(default)]
    pub subcontractor: Vec<CostLine>,
    #[serde(default)]
    pub travel: Vec<CostLine>,
    #[serde(default)]
    pub reserve: Vec<CostLine>,
    #[serde(default)]
    pub cost_of_activity: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CostLine {
    pub name: String,
    #[serde(default)]
    pub cost: f64,
}

impl CostEstimate {
    fn lines(&self) -> impl Iterator<Item = &CostLine> {
        self.labor
            .iter()
            .chain(&self.materials)
            .chain(&self.equipment)
            .chain(&self.facilities)
            .chain(&self.subcontractor)
            .chain(&self.travel)
            .chain(&self.reserve)
    }
}

impl EstimateCost {
    fn check(&self) -> Result<(), String> {
        for estimate in &self.cost_estimates {
            non_negative(estimate.cost_of_activity, "costOfActivity")?;
            for line in estimate.lines() {
                non_empty(&line.name, "name")?;
                non_negative(line.cost, "cost")?;
            }
        }
        Ok(())
    }
}

section!(
    EstimateCost,
    "planning.cost.estimateCost",
    Replace,
    planning.cost.estimate_cost
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DetermineBudget {
    pub cost_baseline: f64,
    pub project_funding_requirements: Vec<FundingRequirement>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct FundingRequirement {
    pub period: String,
    pub cost: f64,
}

impl DetermineBudget {
    fn check(&self) -> Result<(), String> {
        non_negative(self.cost_baseline, "costBaseline")?;
        for requirement in &self.project_funding_requirements {
            non_empty(&requirement.period, "period")?;
            non_negative(requirement.cost, "cost")?;
        }
        Ok(())
    }
}

section!(
    DetermineBudget,
    "planning.cost.determineBudget",
    Replace,
    planning.cost.determine_budget
);

// ---------------------------------------------------------------------------
// Planning: resource
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlanResourceManagement {
    pub resource_management_plan: ResourceManagementPlan,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ResourceManagementPlan {
    #[serde(default)]
    pub identified: String,
    #[serde(default)]
    pub obtained: String,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub training: String,
    #[serde(default)]
    pub ensured: String,
}

impl PlanResourceManagement {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

section!(
    PlanResourceManagement,
    "planning.resource.planResourceManagement",
    Replace,
    planning.resource.plan_resource_management
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EstimateActivityResource {
    // Older clients send the misspelled key.
    #[serde(alias = "resourceRequireMents")]
    pub resource_requirements: Vec<ResourceRequirement>,
    #[serde(default)]
    pub basis_of_estimates: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceRequirement {
    #[serde(default)]
    pub time_period: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub expected_use: f64,
    #[serde(default)]
    pub units: String,
}

impl EstimateActivityResource {
    fn check(&self) -> Result<(), String> {
        for requirement in &self.resource_requirements {
            non_negative(requirement.expected_use, "expectedUse")?;
        }
        Ok(())
    }
}

section!(
    EstimateActivityResource,
    "planning.resource.estimateActivityResource",
    Replace,
    planning.resource.estimate_activity_resource
);

// ---------------------------------------------------------------------------
// Closing
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloseProject {
    #[serde(default)]
    pub closed_date: Option<DateTime<Utc>>,
}

/// Body of the close workflow. A falsy or missing `closed` reopens the project.
#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CloseProjectPatch {
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub closed_date: Option<DateTime<Utc>>,
}

impl Validate for CloseProjectPatch {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClosedProject {
    pub close_project: CloseProject,
    pub closed: bool,
}

pub const CLOSE_PROJECT_PATH: &str = "closing.integration.closeProject";
