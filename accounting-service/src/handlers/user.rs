use axum::{response::IntoResponse, Json};
use serde_json::json;

use crate::models::AuthUser;
use crate::services::Section;

/// The caller's identity and the sections their role may open.
pub async fn get_me(user: AuthUser) -> impl IntoResponse {
    let sections: Vec<&str> = [
        (Section::Sales, "sales"),
        (Section::Customers, "customers"),
        (Section::Expenses, "expenses"),
        (Section::Vendors, "vendors"),
        (Section::Categories, "categories"),
        (Section::Reports, "reports"),
    ]
    .into_iter()
    .filter(|(section, _)| user.role.can_access(*section))
    .map(|(_, name)| name)
    .collect();

    Json(json!({
        "user_id": user.user_id,
        "email": user.email,
        "role": user.role,
        "sections": sections,
    }))
}
