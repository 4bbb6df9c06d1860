//! OpenAPI document served at `/api/openapi.json`, browsable under `/api/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::{activities, deliverables, projects, sections, users, works, Message};
use crate::error::ErrorBody;
use crate::ids::RecordId;
use crate::models;
use crate::sections as section;
use crate::service;

#[derive(OpenApi)]
#[openapi(
    info(title = "pmbook", description = "Project management records: users, projects, phase sections, WBS, deliverables and activities"),
    paths(
        super::health,
        users::add,
        users::register,
        users::login,
        users::logout,
        users::current,
        users::update,
        users::avatar,
        users::refresh,
        users::all,
        users::remove,
        users::edit,
        projects::create,
        projects::all,
        projects::detail,
        projects::update,
        projects::remove,
        sections::develop_project_charter,
        sections::identify_stakeholders,
        sections::plan_scope_management,
        sections::collect_requirements,
        sections::define_scope,
        sections::create_wbs,
        sections::plan_schedule_management,
        sections::plan_cost_management,
        sections::estimate_cost,
        sections::determine_budget,
        sections::plan_resource_management,
        sections::estimate_activity_resource,
        sections::close_project,
        works::create,
        works::list,
        works::update,
        works::remove,
        deliverables::create,
        deliverables::list,
        deliverables::update,
        deliverables::remove,
        activities::create,
        activities::list,
        activities::update,
        activities::remove,
    ),
    components(schemas(
        RecordId,
        ErrorBody,
        Message,
        models::UserView,
        models::UserSummary,
        models::Phase,
        models::Acs,
        models::Project,
        models::PmRef,
        models::ProjectSummary,
        models::PopulatedAcs,
        models::ProjectDetail,
        models::Work,
        models::WorkView,
        models::Deliverable,
        models::Activity,
        models::ActivityView,
        section::InitiatingPhase,
        section::InitiatingIntegration,
        section::InitiatingStakeholder,
        section::PlanningPhase,
        section::PlanningScope,
        section::PlanningSchedule,
        section::PlanningCost,
        section::PlanningResource,
        section::ClosingPhase,
        section::ClosingIntegration,
        section::ProjectCharter,
        section::Milestone,
        section::Stakeholders,
        section::Stakeholder,
        section::PlanScopeManagement,
        section::ScopeManagementPlan,
        section::RequirementsManagementPlan,
        section::CollectRequirements,
        section::Requirement,
        section::DefineScope,
        section::CreateWbs,
        section::PlanScheduleManagement,
        section::ScheduleManagementPlan,
        section::PlanCostManagement,
        section::CostManagementPlan,
        section::EstimateCost,
        section::CostEstimate,
        section::CostLine,
        section::DetermineBudget,
        section::FundingRequirement,
        section::PlanResourceManagement,
        section::ResourceManagementPlan,
        section::EstimateActivityResource,
        section::ResourceRequirement,
        section::CloseProject,
        section::CloseProjectPatch,
        section::ClosedProject,
        service::users::AddUser,
        service::users::RegisterUser,
        service::users::LoginBody,
        service::users::RefreshBody,
        service::users::UpdateUser,
        service::users::Tokens,
        service::projects::AcsPatch,
        service::projects::CreateProject,
        service::projects::UpdateProject,
        service::works::CreateWork,
        service::works::UpdateWork,
        service::deliverables::CreateDeliverable,
        service::deliverables::UpdateDeliverable,
        service::activities::CreateActivity,
        service::activities::UpdateActivity,
        users::UserEnvelope,
        users::UsersEnvelope,
        users::LoginResponse,
        users::DeletedUser,
        projects::DeletedProject,
        works::DeletedWork,
        deliverables::DeletedDeliverable,
        activities::ActivityEnvelope,
        activities::ActivitiesEnvelope,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "users", description = "Accounts and sessions"),
        (name = "projects", description = "Projects and phase assignments"),
        (name = "sections", description = "Phase section documents"),
        (name = "works", description = "Work breakdown structure"),
        (name = "deliverables"),
        (name = "activities"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by protected operations.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_section_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc
            .paths
            .paths
            .contains_key("/api/projects/{id}/planning/cost/estimateCost"));
        assert!(doc.paths.paths.contains_key("/api/works/all/{project_id}"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }

    #[test]
    fn avatar_upload_is_documented_as_multipart() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let body = doc
            .pointer("/paths/~1api~1users~1avatar/patch/requestBody/content/multipart~1form-data")
            .expect("multipart request body");
        assert!(body.get("schema").is_some());
    }
}
