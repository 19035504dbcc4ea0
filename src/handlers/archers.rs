use axum::{
    extract::{OriginalUri, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{audit, check_references, request_url};
use crate::error::ApiError;
use crate::filter::{FilterField, FilterOp, FilterSet, ListQuery, Paginated};
use crate::middleware::{created, no_content, ApiJson, ApiQuery, ApiResult, ResourceId, StaffUser};
use crate::models::{Archer, ArcherInput};
use crate::state::AppState;
use crate::validation::{Mode, Validator};

pub const ARCHER_FILTERS: FilterSet = FilterSet {
    fields: &[
        FilterField::new("last_name__iexact", "last_name", FilterOp::IExact),
        FilterField::new("last_name__icontains", "last_name", FilterOp::IContains),
        FilterField::new("first_name__iexact", "first_name", FilterOp::IExact),
        FilterField::new("first_name__icontains", "first_name", FilterOp::IContains),
        // Bare names are accepted as iexact aliases.
        FilterField::new("last_name", "last_name", FilterOp::IExact),
        FilterField::new("first_name", "first_name", FilterOp::IExact),
    ],
    search_fields: &["first_name", "last_name", "info"],
    ordering_fields: &["first_name", "last_name"],
    paginate: true,
};

/// GET /archers/ - Filtered archer list, paginated when asked for
pub async fn list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    ApiQuery(params): ApiQuery<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let query = ARCHER_FILTERS.parse(&params, &state.config.pagination)?;

    let Some(page) = query.page else {
        let archers = state.store.list_archers(&query, None).await?;
        return Ok(Json(archers).into_response());
    };

    let count = state.store.count_archers(&query).await?;
    let window = page.resolve(count)?;
    let archers = state.store.list_archers(&query, Some(window.slice())).await?;
    let url = request_url(&headers, &uri)?;
    Ok(Json(Paginated::new(&window, &url, archers)).into_response())
}

/// POST /archers/
pub async fn create(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Response> {
    let mut v = Validator::new(&body, Mode::Full)?;
    let input = ArcherInput::validate(&mut v);
    check_references(&*state.store, &mut v, input.author.as_value().copied(), &[]).await?;
    v.finish()?;

    let draft = input
        .into_draft(user.user_id)
        .ok_or_else(|| ApiError::internal("validated archer is missing required fields"))?;
    let archer = state.store.create_archer(draft).await?;
    audit(&state, &user, "create", "archer", archer.id);
    Ok(created(archer))
}

#[derive(Debug, Serialize)]
pub struct ArcherInfo {
    pub archers: Vec<Archer>,
    pub count: usize,
}

/// GET /archers/info/ - Every archer plus the total
pub async fn info(State(state): State<AppState>) -> ApiResult<ApiJson<ArcherInfo>> {
    let archers = state.store.list_archers(&ListQuery::default(), None).await?;
    Ok(ApiJson(ArcherInfo {
        count: archers.len(),
        archers,
    }))
}

/// GET /archers/:id/
pub async fn retrieve(State(state): State<AppState>, ResourceId(id): ResourceId) -> ApiResult<ApiJson<Archer>> {
    Ok(ApiJson(state.store.get_archer(id).await?))
}

/// PUT /archers/:id/ - Full replace
pub async fn update(
    State(state): State<AppState>,
    user: StaffUser,
    ResourceId(id): ResourceId,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<ApiJson<Archer>> {
    save(state, user, id, body, Mode::Full).await
}

/// PATCH /archers/:id/ - Merge supplied fields
pub async fn partial_update(
    State(state): State<AppState>,
    user: StaffUser,
    ResourceId(id): ResourceId,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<ApiJson<Archer>> {
    save(state, user, id, body, Mode::Partial).await
}

async fn save(state: AppState, StaffUser(user): StaffUser, id: Uuid, body: Value, mode: Mode) -> ApiResult<ApiJson<Archer>> {
    state.store.get_archer(id).await?;

    let mut v = Validator::new(&body, mode)?;
    let input = ArcherInput::validate(&mut v);
    check_references(&*state.store, &mut v, input.author.as_value().copied(), &[]).await?;
    v.finish()?;

    let archer = state.store.update_archer(id, input.into_patch()).await?;
    audit(&state, &user, "update", "archer", id);
    Ok(ApiJson(archer))
}

/// DELETE /archers/:id/
pub async fn destroy(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    ResourceId(id): ResourceId,
) -> ApiResult<Response> {
    state.store.delete_archer(id).await?;
    audit(&state, &user, "delete", "archer", id);
    Ok(no_content())
}
