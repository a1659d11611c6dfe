use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::engine::{MembershipEngine, MembershipError};
use crate::models::*;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Map a membership failure onto a status code.
///
/// Rule violations carry their message to the client. Store failures are
/// logged server-side and answered with a generic message so internal
/// details do not leak.
fn membership_error(e: MembershipError) -> (StatusCode, String) {
    use MembershipError::*;

    let status = match &e {
        InvalidFormat(_) | Format(_) | MissingField(_) | SizeOutOfRange { .. }
        | CreatorNotIncluded(_) => StatusCode::BAD_REQUEST,
        MemberConflict { .. }
        | AlreadyGrouped(_)
        | AlreadyIndividual(_)
        | GroupFull(_)
        | LastMemberProtected(_)
        | NotGrouped(_) => StatusCode::CONFLICT,
        NotFound { .. } => StatusCode::NOT_FOUND,
        Store(_) => {
            tracing::error!("Internal error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };

    tracing::warn!("Rejected request: {}", e);
    (status, e.to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Individuals
// ============================================================

pub async fn list_individuals(
    State(engine): State<MembershipEngine>,
) -> ApiResult<Json<Vec<Individual>>> {
    engine.list_individuals().map(Json).map_err(membership_error)
}

pub async fn register_individual(
    State(engine): State<MembershipEngine>,
    Json(input): Json<RegisterIndividualInput>,
) -> ApiResult<(StatusCode, Json<Individual>)> {
    engine
        .register_individual(input)
        .map(|i| (StatusCode::CREATED, Json(i)))
        .map_err(membership_error)
}

pub async fn withdraw_individual(
    State(engine): State<MembershipEngine>,
    Path(student_id): Path<String>,
) -> ApiResult<StatusCode> {
    engine
        .withdraw_individual(&student_id)
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(membership_error)
}

// ============================================================
// Groups
// ============================================================

pub async fn list_groups(State(engine): State<MembershipEngine>) -> ApiResult<Json<Vec<Group>>> {
    engine.list_groups().map(Json).map_err(membership_error)
}

pub async fn create_group(
    State(engine): State<MembershipEngine>,
    Json(input): Json<CreateGroupInput>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    engine
        .create_group(input)
        .map(|g| (StatusCode::CREATED, Json(g)))
        .map_err(membership_error)
}

pub async fn get_group(
    State(engine): State<MembershipEngine>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Group>> {
    engine
        .find_group(id)
        .map_err(membership_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Group not found".to_string()))
}

pub async fn disband_group(
    State(engine): State<MembershipEngine>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Individual>>> {
    engine.disband_group(id).map(Json).map_err(membership_error)
}

pub async fn add_member(
    State(engine): State<MembershipEngine>,
    Path(id): Path<Uuid>,
    Json(input): Json<AddMemberInput>,
) -> ApiResult<Json<Group>> {
    engine
        .add_member(id, input.individual_id)
        .map(Json)
        .map_err(membership_error)
}

pub async fn remove_member(
    State(engine): State<MembershipEngine>,
    Path((id, student_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<Release>> {
    engine
        .remove_member(id, &student_id)
        .map(Json)
        .map_err(membership_error)
}

// ============================================================
// Students
// ============================================================

pub async fn student_state(
    State(engine): State<MembershipEngine>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<StudentState>> {
    engine
        .student_state(&student_id)
        .map(Json)
        .map_err(membership_error)
}

pub async fn switch_group(
    State(engine): State<MembershipEngine>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Release>> {
    engine
        .switch_group(&student_id)
        .map(Json)
        .map_err(membership_error)
}

// ============================================================
// Views
// ============================================================

pub async fn search(
    State(engine): State<MembershipEngine>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResults>> {
    engine.search(&query.q).map(Json).map_err(membership_error)
}

pub async fn summary(State(engine): State<MembershipEngine>) -> ApiResult<Json<RosterSummary>> {
    engine.summary().map(Json).map_err(membership_error)
}

pub async fn dashboard(State(engine): State<MembershipEngine>) -> ApiResult<Json<Dashboard>> {
    engine.dashboard().map(Json).map_err(membership_error)
}

pub async fn export(State(engine): State<MembershipEngine>) -> ApiResult<Json<Vec<ExportRow>>> {
    engine.export_rows().map(Json).map_err(membership_error)
}
