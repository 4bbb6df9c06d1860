//! `PATCH /api/projects/:id/<phase>/<area>/<process>`: one endpoint per
//! phase section. The route mirrors the section's dotted path.

use axum::{
    extract::{Path, State},
    handler::Handler,
    routing::{patch, MethodRouter},
    Extension, Json, Router,
};
use std::sync::Arc;

use super::extract::ValidJson;
use super::AppState;
use crate::error::{AppError, ErrorBody};
use crate::models::Caller;
use crate::phases::{update_phase_section, PhaseSections};
use crate::sections::*;

fn section_route(path: &str) -> String {
    format!("/projects/:id/{}", path.replace('.', "/"))
}

macro_rules! section_endpoint {
    ($handler:ident, $section:ident, $doc_path:tt) => {
        #[utoipa::path(
            patch,
            path = $doc_path,
            tag = "sections",
            params(("id" = String, Path, description = "Project id")),
            request_body = $section,
            responses(
                (status = 200, body = $section),
                (status = 400, body = ErrorBody),
                (status = 403, description = "Not assigned to the section's phase", body = ErrorBody),
                (status = 404, body = ErrorBody),
            ),
            security(("bearer" = []))
        )]
        pub async fn $handler(
            State(state): State<Arc<AppState>>,
            Extension(caller): Extension<Caller>,
            Path(id): Path<String>,
            ValidJson(body): ValidJson<$section>,
        ) -> Result<Json<$section>, AppError> {
            let section = update_phase_section(state.storage.as_ref(), &caller, &id, body)?;
            Ok(Json(section))
        }
    };
}

section_endpoint!(
    develop_project_charter,
    ProjectCharter,
    "/api/projects/{id}/initiating/integration/developProjectCharter"
);
section_endpoint!(
    identify_stakeholders,
    Stakeholders,
    "/api/projects/{id}/initiating/stakeholder/identifyStakeholders"
);
section_endpoint!(
    plan_scope_management,
    PlanScopeManagement,
    "/api/projects/{id}/planning/scope/planScopeManagement"
);
section_endpoint!(
    collect_requirements,
    CollectRequirements,
    "/api/projects/{id}/planning/scope/collectRequirements"
);
section_endpoint!(
    define_scope,
    DefineScope,
    "/api/projects/{id}/planning/scope/defineScope"
);
section_endpoint!(
    create_wbs,
    CreateWbs,
    "/api/projects/{id}/planning/scope/createWBS"
);
section_endpoint!(
    plan_schedule_management,
    PlanScheduleManagement,
    "/api/projects/{id}/planning/schedule/planScheduleManagement"
);
section_endpoint!(
    plan_cost_management,
    PlanCostManagement,
    "/api/projects/{id}/planning/cost/planCostManagement"
);
section_endpoint!(
    estimate_cost,
    EstimateCost,
    "/api/projects/{id}/planning/cost/estimateCost"
);
section_endpoint!(
    determine_budget,
    DetermineBudget,
    "/api/projects/{id}/planning/cost/determineBudget"
);
section_endpoint!(
    plan_resource_management,
    PlanResourceManagement,
    "/api/projects/{id}/planning/resource/planResourceManagement"
);
section_endpoint!(
    estimate_activity_resource,
    EstimateActivityResource,
    "/api/projects/{id}/planning/resource/estimateActivityResource"
);

#[utoipa::path(
    patch,
    path = "/api/projects/{id}/closing/integration/closeProject",
    tag = "sections",
    params(("id" = String, Path, description = "Project id")),
    request_body = CloseProjectPatch,
    responses(
        (status = 200, body = ClosedProject),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn close_project(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<CloseProjectPatch>,
) -> Result<Json<ClosedProject>, AppError> {
    Ok(Json(state.storage.close_project(&caller, &id, body)?))
}

fn section<S, H, T>(router: Router<Arc<AppState>>, handler: H) -> Router<Arc<AppState>>
where
    S: PhaseSection,
    H: Handler<T, Arc<AppState>>,
    T: 'static,
{
    let method: MethodRouter<Arc<AppState>> = patch(handler);
    router.route(&section_route(S::PATH), method)
}

pub fn routes() -> Router<Arc<AppState>> {
    let router = Router::new();
    let router = section::<ProjectCharter, _, _>(router, develop_project_charter);
    let router = section::<Stakeholders, _, _>(router, identify_stakeholders);
    let router = section::<PlanScopeManagement, _, _>(router, plan_scope_management);
    let router = section::<CollectRequirements, _, _>(router, collect_requirements);
    let router = section::<DefineScope, _, _>(router, define_scope);
    let router = section::<CreateWbs, _, _>(router, create_wbs);
    let router = section::<PlanScheduleManagement, _, _>(router, plan_schedule_management);
    let router = section::<PlanCostManagement, _, _>(router, plan_cost_management);
    let router = section::<EstimateCost, _, _>(router, estimate_cost);
    let router = section::<DetermineBudget, _, _>(router, determine_budget);
    let router = section::<PlanResourceManagement, _, _>(router, plan_resource_management);
    let router = section::<EstimateActivityResource, _, _>(router, estimate_activity_resource);
    router.route(&section_route(CLOSE_PROJECT_PATH), patch(close_project))
}
