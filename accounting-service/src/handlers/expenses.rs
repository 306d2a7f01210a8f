use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{DeleteParams, DeleteRecordResponse, ExpenseInput, RangeParams};
use crate::models::AuthUser;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

pub async fn list_expenses(
    State(state): State<AppState>,
    user: AuthUser,
    Query(range): Query<RangeParams>,
) -> Result<impl IntoResponse, AppError> {
    let expenses = state.records.list_expenses(&user, range.into()).await?;
    Ok(Json(expenses))
}

pub async fn create_expense(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<ExpenseInput>,
) -> Result<impl IntoResponse, AppError> {
    let expense = state.records.create_expense(&user, input).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn get_expense(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let expense = state.records.get_expense(&user, id).await?;
    Ok(Json(expense))
}

pub async fn update_expense(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<ExpenseInput>,
) -> Result<impl IntoResponse, AppError> {
    let expense = state.records.update_expense(&user, id, input).await?;
    Ok(Json(expense))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, AppError> {
    let expense = state.records.get_expense(&user, id).await?;

    let orphaned_attachments = if params.keep_attachments {
        Vec::new()
    } else {
        state.attachments.delete_all(&expense.attachment_urls).await
    };

    state.records.delete_expense(&user, id).await?;

    Ok(Json(DeleteRecordResponse {
        id,
        message: "Expense deleted successfully".to_string(),
        orphaned_attachments,
    }))
}
