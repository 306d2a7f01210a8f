use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{DeleteParams, DeleteRecordResponse, QuoteRequest, RangeParams, SaleInput};
use crate::models::AuthUser;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

pub async fn list_sales(
    State(state): State<AppState>,
    user: AuthUser,
    Query(range): Query<RangeParams>,
) -> Result<impl IntoResponse, AppError> {
    let sales = state.records.list_sales(&user, range.into()).await?;
    Ok(Json(sales))
}

pub async fn create_sale(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<SaleInput>,
) -> Result<impl IntoResponse, AppError> {
    let sale = state.records.create_sale(&user, input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn get_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let sale = state.records.get_sale(&user, id).await?;
    Ok(Json(sale))
}

pub async fn update_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<SaleInput>,
) -> Result<impl IntoResponse, AppError> {
    let sale = state.records.update_sale(&user, id, input).await?;
    Ok(Json(sale))
}

/// Remove the sale's attachments unless asked to keep them, then the sale.
pub async fn delete_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, AppError> {
    let sale = state.records.get_sale(&user, id).await?;

    let orphaned_attachments = if params.keep_attachments {
        Vec::new()
    } else {
        state.attachments.delete_all(&sale.attachment_urls).await
    };

    state.records.delete_sale(&user, id).await?;

    Ok(Json(DeleteRecordResponse {
        id,
        message: "Sale deleted successfully".to_string(),
        orphaned_attachments,
    }))
}

/// Recompute a sale form without saving.
pub async fn quote_sale(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidatedJson(request): ValidatedJson<QuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quote = state.records.quote(request)?;
    Ok(Json(quote))
}
