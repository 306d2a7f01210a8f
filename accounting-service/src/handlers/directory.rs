//! Customers, vendors and expense categories.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{CategoryInput, VendorInput};
use crate::models::AuthUser;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

pub async fn list_customers(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let customers = state.records.list_customers(&user).await?;
    Ok(Json(customers))
}

pub async fn list_vendors(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let vendors = state.records.list_vendors(&user).await?;
    Ok(Json(vendors))
}

pub async fn create_vendor(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<VendorInput>,
) -> Result<impl IntoResponse, AppError> {
    let vendor = state.records.create_vendor(&user, input).await?;
    Ok((StatusCode::CREATED, Json(vendor)))
}

pub async fn delete_vendor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.records.delete_vendor(&user, id).await?;
    Ok(Json(json!({ "id": id, "message": "Vendor deleted successfully" })))
}

/// Categories as a two-level tree.
pub async fn list_categories(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let tree = state.records.category_tree(&user).await?;
    Ok(Json(tree))
}

pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<CategoryInput>,
) -> Result<impl IntoResponse, AppError> {
    let category = state.records.create_category(&user, input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.records.delete_category(&user, id).await?;
    Ok(Json(json!({ "id": id, "message": "Category deleted successfully" })))
}
