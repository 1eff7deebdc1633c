use crate::{
    entities::lead::{self, ActiveModel as LeadActiveModel, Entity as LeadEntity, Model as LeadModel},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Tag attached to leads that have placed an order.
pub const BUYER_TAG: &str = "buyer";

/// Named filter over leads used for bulk messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    /// Leads carrying the `buyer` tag
    Buyers,
    /// Leads without the `buyer` tag
    New,
    All,
}

/// Newsletter signup payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub source: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of an upsert: the stored lead plus whether this call created it.
pub struct UpsertOutcome {
    pub lead: LeadResponse,
    pub created: bool,
}

/// Service for lead capture and segmentation.
#[derive(Clone)]
pub struct LeadService {
    db: Arc<DatabaseConnection>,
}

impl LeadService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Upserts a lead keyed by email.
    ///
    /// An existing lead gets its name and tags OVERWRITTEN with the caller's
    /// literal values (no tag-set union, so earlier tags are lost); the
    /// acquisition source from the first touch is kept.
    #[instrument(skip(self), fields(email = %email, source = %source))]
    pub async fn upsert(
        &self,
        name: &str,
        email: &str,
        source: &str,
        tags: &[&str],
    ) -> Result<UpsertOutcome, ServiceError> {
        let existing = LeadEntity::find()
            .filter(lead::Column::Email.eq(email))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if let Some(model) = existing {
            let updated = self.overwrite(model, name, tags).await?;
            return Ok(UpsertOutcome {
                lead: Self::to_response(updated),
                created: false,
            });
        }

        let insert_result = LeadActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            source: Set(source.to_string()),
            tags: Set(json!(tags)),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await;

        match insert_result {
            Ok(model) => {
                info!(lead_id = %model.id, "Lead created");
                Ok(UpsertOutcome {
                    lead: Self::to_response(model),
                    created: true,
                })
            }
            // Lost the insert race to a concurrent upsert for the same email:
            // fall back to the update path, same as if it had existed upfront.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                warn!(email = %email, "Concurrent lead insert detected, updating instead");
                let model = LeadEntity::find()
                    .filter(lead::Column::Email.eq(email))
                    .one(&*self.db)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .ok_or_else(|| {
                        ServiceError::InternalError("lead vanished after duplicate insert".into())
                    })?;
                let updated = self.overwrite(model, name, tags).await?;
                Ok(UpsertOutcome {
                    lead: Self::to_response(updated),
                    created: false,
                })
            }
            Err(e) => Err(ServiceError::DatabaseError(e)),
        }
    }

    async fn overwrite(
        &self,
        model: LeadModel,
        name: &str,
        tags: &[&str],
    ) -> Result<LeadModel, ServiceError> {
        let mut active: LeadActiveModel = model.into();
        active.name = Set(name.to_string());
        active.tags = Set(json!(tags));
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Lists leads, newest first.
    #[instrument(skip(self))]
    pub async fn list_leads(&self) -> Result<Vec<LeadResponse>, ServiceError> {
        let leads = LeadEntity::find()
            .order_by_desc(lead::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(leads.into_iter().map(Self::to_response).collect())
    }

    /// Resolves a segment to its member leads, newest first.
    #[instrument(skip(self))]
    pub async fn segment_leads(&self, segment: Segment) -> Result<Vec<LeadResponse>, ServiceError> {
        let leads = LeadEntity::find()
            .order_by_desc(lead::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let filtered = leads
            .into_iter()
            .filter(|l| match segment {
                Segment::Buyers => l.has_tag(BUYER_TAG),
                Segment::New => !l.has_tag(BUYER_TAG),
                Segment::All => true,
            })
            .map(Self::to_response)
            .collect();

        Ok(filtered)
    }

    fn to_response(model: LeadModel) -> LeadResponse {
        let tags = model.tag_list();
        LeadResponse {
            id: model.id,
            name: model.name,
            email: model.email,
            source: model.source,
            tags,
            created_at: model.created_at,
        }
    }
}
