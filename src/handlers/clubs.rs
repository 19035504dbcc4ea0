use axum::{extract::State, response::Response};
use serde_json::Value;
use uuid::Uuid;

use super::{audit, check_references};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::filter::{FilterField, FilterOp, FilterSet};
use crate::middleware::{created, no_content, ApiJson, ApiQuery, ApiResult, ResourceId};
use crate::models::{ClubInput, ClubView};
use crate::state::AppState;
use crate::validation::{Mode, Validator};

pub const CLUB_FILTERS: FilterSet = FilterSet {
    fields: &[
        FilterField::new("name__iexact", "name", FilterOp::IExact),
        FilterField::new("name__icontains", "name", FilterOp::IContains),
        FilterField::new("name", "name", FilterOp::IExact),
        FilterField::new("created_at", "created_at", FilterOp::Date),
        FilterField::new("created_at__lt", "created_at", FilterOp::Lt),
        FilterField::new("created_at__gt", "created_at", FilterOp::Gt),
    ],
    search_fields: &[],
    ordering_fields: &[],
    paginate: false,
};

/// GET /clubs/
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(params): ApiQuery<Vec<(String, String)>>,
) -> ApiResult<ApiJson<Vec<ClubView>>> {
    let query = CLUB_FILTERS.parse(&params, &state.config.pagination)?;
    Ok(ApiJson(state.store.list_clubs(&query).await?))
}

/// POST /clubs/ - Club plus its initial memberships
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Response> {
    let mut v = Validator::new(&body, Mode::Full)?;
    let input = ClubInput::validate(&mut v);
    let archers = parsed_members(&v, &input);
    check_references(&*state.store, &mut v, input.author.as_value().copied(), &archers).await?;
    v.finish()?;

    let draft = input
        .into_draft(user.user_id)
        .ok_or_else(|| ApiError::internal("validated club is missing required fields"))?;
    let club = state.store.create_club(draft).await?;
    audit(&state, &user, "create", "club", club.club.id);
    Ok(created(club))
}

/// GET /clubs/:id/
pub async fn retrieve(
    State(state): State<AppState>,
    _user: AuthUser,
    ResourceId(id): ResourceId,
) -> ApiResult<ApiJson<ClubView>> {
    Ok(ApiJson(state.store.get_club(id).await?))
}

/// PUT /clubs/:id/
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    ResourceId(id): ResourceId,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<ApiJson<ClubView>> {
    save(state, user, id, body, Mode::Full).await
}

/// PATCH /clubs/:id/
pub async fn partial_update(
    State(state): State<AppState>,
    user: AuthUser,
    ResourceId(id): ResourceId,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<ApiJson<ClubView>> {
    save(state, user, id, body, Mode::Partial).await
}

async fn save(state: AppState, user: AuthUser, id: Uuid, body: Value, mode: Mode) -> ApiResult<ApiJson<ClubView>> {
    state.store.get_club(id).await?;

    let mut v = Validator::new(&body, mode)?;
    let input = ClubInput::validate(&mut v);
    let archers = parsed_members(&v, &input);
    check_references(&*state.store, &mut v, input.author.as_value().copied(), &archers).await?;
    v.finish()?;

    let club = state.store.update_club(id, input.into_patch()).await?;
    audit(&state, &user, "update", "club", id);
    Ok(ApiJson(club))
}

// Item positions only line up with the payload once every item parsed.
fn parsed_members(v: &Validator<'_>, input: &ClubInput) -> Vec<Uuid> {
    match (&input.memberships, v.raw("memberships").and_then(Value::as_array)) {
        (Some(ids), Some(items)) if ids.len() == items.len() => ids.clone(),
        _ => Vec::new(),
    }
}

/// DELETE /clubs/:id/ - Memberships go with the club
pub async fn destroy(
    State(state): State<AppState>,
    user: AuthUser,
    ResourceId(id): ResourceId,
) -> ApiResult<Response> {
    state.store.delete_club(id).await?;
    audit(&state, &user, "delete", "club", id);
    Ok(no_content())
}
