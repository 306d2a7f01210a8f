use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::ReportParams;
use crate::models::AuthUser;
use crate::services::reports::build_report;
use crate::startup::AppState;

pub async fn get_report(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, AppError> {
    let range = params.range();

    let expenses = state.records.list_expenses(&user, range).await?;
    let sales = state.records.list_sales(&user, range).await?;
    let categories = state.records.list_categories(&user).await?;

    let report = build_report(range, &expenses, &sales, &categories, params.top);

    tracing::info!(
        user_id = %user.user_id,
        sales = report.summary.sale_count,
        expenses = report.summary.expense_count,
        "Report built"
    );

    Ok(Json(report))
}
