use axum::{extract::State, response::Json};

use crate::{
    errors::ServiceError,
    services::analytics::{AnalyticsSummary, WeeklyRevenuePoint},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/analytics/summary",
    responses(
        (status = 200, description = "KPI snapshot", body = AnalyticsSummary)
    ),
    tag = "Analytics"
)]
pub async fn summary(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsSummary>, ServiceError> {
    let summary = state.services.analytics.summary().await?;
    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/api/analytics/revenue-weekly",
    responses(
        (status = 200, description = "Eight weekly buckets, oldest first", body = [WeeklyRevenuePoint])
    ),
    tag = "Analytics"
)]
pub async fn revenue_weekly(
    State(state): State<AppState>,
) -> Result<Json<Vec<WeeklyRevenuePoint>>, ServiceError> {
    let series = state.services.analytics.weekly_revenue().await?;
    Ok(Json(series))
}
