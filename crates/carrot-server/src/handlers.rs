use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts, State, rejection::JsonRejection},
    http::{header::AUTHORIZATION, request::Parts},
};
use carrot_auth::AuthError;
use carrot_core::{Identity, SubjectId};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::core::ServiceCore;
use crate::response::{ApiError, ApiResponse};

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<ServiceCore>,
}

impl AppState {
    pub fn new(core: Arc<ServiceCore>) -> Self {
        Self { core }
    }
}

// ---- Authentication ----

/// Identity resolved from the `Authorization` header through the credential
/// cache.
pub struct Authenticated(pub Identity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let raw = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AuthError::malformed_credential("missing Authorization header"))?
            .to_str()
            .map_err(|_| AuthError::malformed_credential("Authorization header is not valid ASCII"))?;

        Ok(Self(state.core.resolve_identity(raw)?))
    }
}

// ---- /api/users ----

pub async fn health(State(state): State<AppState>) -> ApiResponse<Value> {
    let credentials = state.core.cache_stats();
    let dashboard = state.core.dashboard_stats();

    ApiResponse::success(
        "Service is up",
        json!({
            "status": "UP",
            "service": "mini-carrot-user-service",
            "cache_total": credentials.total,
            "cache_active": credentials.active,
            "cache_expired": credentials.expired,
            "cache_hit_rate": credentials.hit_rate(),
            "credentials": credentials,
            "dashboard": dashboard,
            "refreshes_in_flight": state.core.refreshes_in_flight(),
        }),
    )
}

pub async fn profile(Authenticated(identity): Authenticated) -> ApiResponse<Identity> {
    ApiResponse::success("Profile", identity)
}

pub async fn dashboard(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> ApiResponse<Value> {
    let started = Instant::now();
    let snapshot = state.core.get_dashboard(identity.subject_id);

    ApiResponse::success(
        "Dashboard",
        json!({
            "profile": identity,
            "data": snapshot,
            "responseTimeMs": started.elapsed().as_millis() as u64,
        }),
    )
}

/// Returns the cached snapshot if there is one, otherwise answers like
/// [`dashboard`]. A refresh already running for the caller is left to finish.
pub async fn dashboard_refresh(
    state: State<AppState>,
    Authenticated(identity): Authenticated,
) -> ApiResponse<Value> {
    if let Some(snapshot) = state.core.get_cached_dashboard(identity.subject_id) {
        return ApiResponse::success(
            "Dashboard updated",
            json!({
                "profile": identity,
                "data": snapshot,
                "cached": true,
            }),
        );
    }

    dashboard(state, Authenticated(identity)).await
}

pub async fn my_products(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> ApiResponse<Value> {
    let listings = state.core.owned_listings(identity.subject_id).await;

    ApiResponse::success(
        "Registered products",
        json!({
            "count": listings.len(),
            "products": listings,
        }),
    )
}

/// Post-mutation hook: drops every cached verification for the caller.
pub async fn invalidate_credentials(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> ApiResponse<Value> {
    let removed = state.core.invalidate_credential(identity.subject_id);
    ApiResponse::success("Credential cache invalidated", json!({ "removed": removed }))
}

pub async fn invalidate_dashboard(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> ApiResponse<()> {
    state.core.invalidate_dashboard(identity.subject_id);
    ApiResponse::message("Dashboard cache invalidated")
}

// ---- /api/events ----
//
// Called by the product service. These always answer 200: a payload that
// cannot be read is logged and acknowledged.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRegistered {
    pub user_id: SubjectId,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPurchased {
    pub seller_id: SubjectId,
    pub buyer_id: SubjectId,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStatusChanged {
    pub user_id: SubjectId,
    pub product_name: Option<String>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardRefresh {
    pub user_id: SubjectId,
    pub event_type: Option<String>,
}

fn acknowledge<T>(event: &'static str, payload: Result<Json<T>, JsonRejection>) -> Option<T> {
    match payload {
        Ok(Json(payload)) => Some(payload),
        Err(rejection) => {
            tracing::warn!(event, error = %rejection, "Ignoring unreadable event payload");
            None
        }
    }
}

pub async fn product_registered(
    State(state): State<AppState>,
    payload: Result<Json<ProductRegistered>, JsonRejection>,
) -> ApiResponse<()> {
    if let Some(event) = acknowledge("product_registered", payload) {
        tracing::info!(
            subject_id = %event.user_id,
            product_id = ?event.product_id,
            product_name = ?event.product_name,
            "Product registered"
        );
        state.core.invalidate_dashboard(event.user_id);
    }
    ApiResponse::message("Event processed")
}

pub async fn product_purchased(
    State(state): State<AppState>,
    payload: Result<Json<ProductPurchased>, JsonRejection>,
) -> ApiResponse<()> {
    if let Some(event) = acknowledge("product_purchased", payload) {
        tracing::info!(
            seller_id = %event.seller_id,
            buyer_id = %event.buyer_id,
            product_id = ?event.product_id,
            product_name = ?event.product_name,
            price = ?event.price,
            "Product purchased"
        );
        state.core.invalidate_dashboard(event.seller_id);
        state.core.invalidate_dashboard(event.buyer_id);
    }
    ApiResponse::message("Event processed")
}

pub async fn product_status_changed(
    State(state): State<AppState>,
    payload: Result<Json<ProductStatusChanged>, JsonRejection>,
) -> ApiResponse<()> {
    if let Some(event) = acknowledge("product_status_changed", payload) {
        tracing::info!(
            subject_id = %event.user_id,
            product_name = ?event.product_name,
            old_status = ?event.old_status,
            new_status = ?event.new_status,
            "Product status changed"
        );
        state.core.invalidate_dashboard(event.user_id);
    }
    ApiResponse::message("Event processed")
}

pub async fn dashboard_refresh_event(
    State(state): State<AppState>,
    payload: Result<Json<DashboardRefresh>, JsonRejection>,
) -> ApiResponse<()> {
    if let Some(event) = acknowledge("dashboard_refresh", payload) {
        tracing::info!(
            subject_id = %event.user_id,
            event_type = event.event_type.as_deref().unwrap_or("dashboard_update"),
            "Dashboard refresh requested"
        );
        state.core.invalidate_dashboard(event.user_id);
    }
    ApiResponse::message("Event processed")
}
