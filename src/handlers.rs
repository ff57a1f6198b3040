// region:    --- Imports
use crate::bidding::{Bid, CreateItemAttrs, Item, PlaceBidCommand};
use crate::error::{AuctionError, ErrorKind};
use crate::query::ItemSummary;
use crate::state::AppState;
use crate::store::SortOrder;
use crate::users::{CreateUserAttrs, User};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

// endregion: --- Imports

/// 조회수 집계용 방문자 헤더
pub const VIEWER_HEADER: &str = "x-viewer-id";

/// 입찰 충돌 시 재시도 횟수
pub const MAX_BID_RETRIES: u32 = 3;

type ApiResult<T> = Result<T, AuctionError>;

// region:    --- Router
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/items", post(handle_create_item))
        .route("/items/:id", get(handle_get_item))
        .route(
            "/items/:id/bids",
            post(handle_place_bid).get(handle_get_bid_history),
        )
        .route(
            "/items/:id/likes",
            post(handle_like_item).delete(handle_unlike_item),
        )
        .route("/rankings/price", get(handle_rank_by_price))
        .route("/rankings/views", get(handle_rank_by_views))
        .route("/rankings/ending-soon", get(handle_ending_soon))
        .route("/search", get(handle_search))
        .route("/users", post(handle_create_user))
        .route("/users/:id", get(handle_get_user))
        .with_state(state)
}
// endregion: --- Router

// region:    --- Error Response
impl IntoResponse for AuctionError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuctionError::ItemNotFound(_) | AuctionError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AuctionError::BidTooLow { .. }
            | AuctionError::AmountOutOfRange { .. }
            | AuctionError::AuctionClosed(_) => StatusCode::BAD_REQUEST,
            AuctionError::UsernameTaken(_) | AuctionError::WriteConflict => StatusCode::CONFLICT,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        };
        if self.kind() == ErrorKind::Transport {
            error!("{:<12} --> 저장소 오류: {:?}", "Handler", self);
        }
        (
            status,
            Json(serde_json::json!({
                "error": self.to_string(),
                "code": self.code(),
            })),
        )
            .into_response()
    }
}
// endregion: --- Error Response

// region:    --- Request Types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    pub user_id: String,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_count")]
    pub count: usize,
    /// asc | desc (기본 desc)
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub term: String,
    #[serde(default = "default_count")]
    pub size: usize,
}

fn default_count() -> usize {
    10
}

fn sort_order(raw: Option<&str>) -> SortOrder {
    match raw {
        Some(order) if order.eq_ignore_ascii_case("asc") => SortOrder::Asc,
        _ => SortOrder::Desc,
    }
}
// endregion: --- Request Types

// region:    --- Item Handlers
/// 상품 등록
pub async fn handle_create_item(
    State(state): State<AppState>,
    Json(attrs): Json<CreateItemAttrs>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    info!("{:<12} --> 상품 등록: {}", "Handler", attrs.name);
    let item = state.items.create_item(attrs).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// 상품 조회 (방문자 헤더가 있으면 조회수 집계)
pub async fn handle_get_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Item>> {
    info!("{:<12} --> 상품 조회 id: {}", "Handler", item_id);
    let viewer = headers.get(VIEWER_HEADER).and_then(|v| v.to_str().ok());
    if let Some(viewer_id) = viewer {
        state.views.record_view(&item_id, viewer_id).await?;
    }
    Ok(Json(state.items.get_item(&item_id).await?))
}

/// 입찰 (접수 시각으로 마감 여부 판단)
pub async fn handle_place_bid(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(req): Json<BidRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let cmd = PlaceBidCommand {
        item_id,
        user_id: req.user_id,
        amount: req.amount,
        created_at: Utc::now(),
    };
    let bid = state.bids.place_bid_with_retry(cmd, MAX_BID_RETRIES).await?;
    Ok(Json(serde_json::json!({
        "message": "입찰이 성공적으로 처리되었습니다.",
        "current_price": bid.amount,
        "bid": bid,
    })))
}

/// 입찰 이력
pub async fn handle_get_bid_history(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<Bid>>> {
    let bids = state
        .bids
        .get_bid_history(&item_id, page.offset, page.count)
        .await?;
    Ok(Json(bids))
}

pub async fn handle_like_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(req): Json<LikeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let changed = state.likes.like_item(&item_id, &req.user_id).await?;
    Ok(Json(serde_json::json!({ "changed": changed })))
}

pub async fn handle_unlike_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(req): Json<LikeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let changed = state.likes.unlike_item(&item_id, &req.user_id).await?;
    Ok(Json(serde_json::json!({ "changed": changed })))
}
// endregion: --- Item Handlers

// region:    --- Query Handlers
pub async fn handle_rank_by_price(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<Item>>> {
    let order = sort_order(page.order.as_deref());
    let ranked = state.rankings.by_price(order, page.offset, page.count).await?;
    let ids: Vec<String> = ranked.into_iter().map(|entry| entry.id).collect();
    Ok(Json(state.items.get_items(&ids).await?))
}

pub async fn handle_rank_by_views(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<Item>>> {
    let order = sort_order(page.order.as_deref());
    let ranked = state.rankings.by_views(order, page.offset, page.count).await?;
    let ids: Vec<String> = ranked.into_iter().map(|entry| entry.id).collect();
    Ok(Json(state.items.get_items(&ids).await?))
}

pub async fn handle_ending_soon(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<Item>>> {
    let ranked = state.rankings.ending_soonest(page.offset, page.count).await?;
    let ids: Vec<String> = ranked.into_iter().map(|entry| entry.id).collect();
    Ok(Json(state.items.get_items(&ids).await?))
}

pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<ItemSummary>>> {
    Ok(Json(state.search.search_items(&params.term, params.size).await?))
}
// endregion: --- Query Handlers

// region:    --- User Handlers
pub async fn handle_create_user(
    State(state): State<AppState>,
    Json(attrs): Json<CreateUserAttrs>,
) -> ApiResult<(StatusCode, Json<User>)> {
    info!("{:<12} --> 사용자 등록: {}", "Handler", attrs.username);
    let user = state.users.create_user(attrs).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn handle_get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.get_user_by_id(&user_id).await?))
}
// endregion: --- User Handlers

// endregion: --- Tests
