use crate::{
    entities::lead::{self, Entity as LeadEntity},
    entities::order::{self, Entity as OrderEntity, PaymentStatus},
    errors::ServiceError,
};
use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

/// KPI snapshot over approved orders and captured leads.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_orders: u64,
    pub month_orders: u64,
    pub total_leads: u64,
    pub month_leads: u64,
    pub month_revenue: Decimal,
    pub avg_ticket: Decimal,
}

/// One 7-day bucket of the rolling revenue series.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRevenuePoint {
    /// Start date of the period (YYYY-MM-DD)
    pub period: String,
    pub revenue: Decimal,
    pub orders: u64,
}

/// Read-only aggregate queries. Pure derived views: no mutation, no caching,
/// recomputed on every call.
#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<DatabaseConnection>,
}

impl AnalyticsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// KPI snapshot. The five reads run concurrently and are joined before
    /// responding; each observes storage at a possibly different instant, so
    /// there is no cross-query consistency guarantee.
    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<AnalyticsSummary, ServiceError> {
        let db = &*self.db;
        let approved = PaymentStatus::Approved.to_string();
        let month_start = month_start(Utc::now());

        let (total_orders, month_orders, total_leads, month_leads, month_approved) =
            tokio::try_join!(
                async {
                    OrderEntity::find()
                        .filter(order::Column::PaymentStatus.eq(approved.clone()))
                        .count(db)
                        .await
                        .map_err(ServiceError::DatabaseError)
                },
                async {
                    OrderEntity::find()
                        .filter(order::Column::PaymentStatus.eq(approved.clone()))
                        .filter(order::Column::CreatedAt.gte(month_start))
                        .count(db)
                        .await
                        .map_err(ServiceError::DatabaseError)
                },
                async {
                    LeadEntity::find()
                        .count(db)
                        .await
                        .map_err(ServiceError::DatabaseError)
                },
                async {
                    LeadEntity::find()
                        .filter(lead::Column::CreatedAt.gte(month_start))
                        .count(db)
                        .await
                        .map_err(ServiceError::DatabaseError)
                },
                async {
                    OrderEntity::find()
                        .filter(order::Column::PaymentStatus.eq(approved.clone()))
                        .filter(order::Column::CreatedAt.gte(month_start))
                        .all(db)
                        .await
                        .map_err(ServiceError::DatabaseError)
                },
            )?;

        let month_revenue: Decimal = month_approved.iter().map(|o| o.total).sum();
        let avg_ticket = if month_approved.is_empty() {
            Decimal::ZERO
        } else {
            (month_revenue / Decimal::from(month_approved.len() as u64)).round()
        };

        Ok(AnalyticsSummary {
            total_orders,
            month_orders,
            total_leads,
            month_leads,
            month_revenue,
            avg_ticket,
        })
    }

    /// Eight consecutive 7-day periods ending now, oldest first. One range
    /// query, bucketed in memory.
    #[instrument(skip(self))]
    pub async fn weekly_revenue(&self) -> Result<Vec<WeeklyRevenuePoint>, ServiceError> {
        let now = Utc::now();
        let range_start = now - Duration::weeks(8);
        let approved = PaymentStatus::Approved.to_string();

        let orders = OrderEntity::find()
            .filter(order::Column::PaymentStatus.eq(approved))
            .filter(order::Column::CreatedAt.gte(range_start))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut points = Vec::with_capacity(8);
        for i in 0..8i64 {
            let bucket_start = now - Duration::weeks(8 - i);
            let bucket_end = bucket_start + Duration::weeks(1);

            let bucket: Vec<_> = orders
                .iter()
                .filter(|o| o.created_at >= bucket_start && o.created_at < bucket_end)
                .collect();

            points.push(WeeklyRevenuePoint {
                period: bucket_start.format("%Y-%m-%d").to_string(),
                revenue: bucket.iter().map(|o| o.total).sum(),
                orders: bucket.len() as u64,
            });
        }

        Ok(points)
    }
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_day(1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn month_start_is_first_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 15, 30, 0).unwrap();
        let start = month_start(now);
        assert_eq!(start.day(), 1);
        assert_eq!(start.month(), 8);
        assert_eq!((start.hour(), start.minute(), start.second()), (0, 0, 0));
    }
}
