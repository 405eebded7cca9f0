//! Booking persistence gateway.
//!
//! The gateway persists what it is told and has no opinion on ordering;
//! the orchestrator is responsible for only writing confirmed bookings
//! after a successful provider call.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::catalog::PackageId;
use crate::entities::{booking, customer, payment, BookingStatus, PaymentProviderKind, PaymentStatus};
use crate::errors::ServiceError;
use crate::i18n::Locale;

/// Field set for creating or updating a booking row
#[derive(Debug, Clone)]
pub struct BookingFields {
    pub package_id: PackageId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub booking_date: NaiveDate,
    pub booking_time: String,
    pub status: BookingStatus,
    pub total_amount: Decimal,
    pub people_count: Option<i32>,
    pub notes: Option<String>,
    pub locale: Locale,
}

/// Field set for recording a payment against a booking
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub provider_payment_id: String,
    pub conversation_id: Option<String>,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub provider: PaymentProviderKind,
    pub raw_response: Option<serde_json::Value>,
}

/// Seam between the orchestrator/recovery job and the database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn upsert_customer<'a>(
        &'a self,
        email: &'a str,
        name: &'a str,
        phone: Option<&'a str>,
    ) -> Result<(), ServiceError>;

    async fn create_or_update_booking(
        &self,
        booking_id: Option<Uuid>,
        fields: BookingFields,
    ) -> Result<booking::Model, ServiceError>;

    async fn insert_payment(
        &self,
        booking_id: Uuid,
        payment: NewPayment,
    ) -> Result<payment::Model, ServiceError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<booking::Model>, ServiceError>;

    async fn update_status(
        &self,
        id: Uuid,
        next: BookingStatus,
        notes: Option<String>,
    ) -> Result<booking::Model, ServiceError>;

    /// Drafts eligible for a recovery email: status draft, flag unset,
    /// created inside [window_start, window_end]
    async fn find_abandoned_drafts(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<booking::Model>, ServiceError>;

    /// Whether the customer made any non-draft booking after `after`
    async fn has_later_booking(
        &self,
        email: &str,
        after: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;

    async fn mark_abandoned_email_sent(&self, id: Uuid) -> Result<(), ServiceError>;
}

/// sea-orm implementation of the gateway
#[derive(Clone)]
pub struct BookingGateway {
    db: Arc<DatabaseConnection>,
}

impl BookingGateway {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookingRepository for BookingGateway {
    #[instrument(skip(self, name, phone))]
    async fn upsert_customer<'a>(
        &'a self,
        email: &'a str,
        name: &'a str,
        phone: Option<&'a str>,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let existing = customer::Entity::find_by_id(email.to_string())
            .one(&*self.db)
            .await?;

        match existing {
            Some(found) => {
                let mut active: customer::ActiveModel = found.into();
                active.name = Set(name.to_string());
                active.phone = Set(phone.map(str::to_string));
                active.updated_at = Set(Some(now));
                active.update(&*self.db).await?;
            }
            None => {
                customer::ActiveModel {
                    email: Set(email.to_string()),
                    name: Set(name.to_string()),
                    phone: Set(phone.map(str::to_string)),
                    created_at: Set(now),
                    updated_at: Set(None),
                }
                .insert(&*self.db)
                .await?;
            }
        }

        Ok(())
    }

    #[instrument(skip(self, fields), fields(email = %fields.customer_email))]
    async fn create_or_update_booking(
        &self,
        booking_id: Option<Uuid>,
        fields: BookingFields,
    ) -> Result<booking::Model, ServiceError> {
        let now = Utc::now();

        // Update path: an earlier funnel step already created a draft row
        if let Some(id) = booking_id {
            if let Some(existing) = booking::Entity::find_by_id(id).one(&*self.db).await? {
                let mut active: booking::ActiveModel = existing.into();
                active.package_id = Set(fields.package_id.as_str().to_string());
                active.customer_name = Set(fields.customer_name);
                active.customer_email = Set(fields.customer_email);
                active.customer_phone = Set(fields.customer_phone);
                active.booking_date = Set(fields.booking_date);
                active.booking_time = Set(fields.booking_time);
                active.status = Set(fields.status.as_str().to_string());
                active.total_amount = Set(fields.total_amount);
                active.people_count = Set(fields.people_count);
                active.notes = Set(fields.notes);
                active.locale = Set(fields.locale.as_str().to_string());
                active.updated_at = Set(Some(now));

                let updated = active.update(&*self.db).await?;
                info!(booking_id = %updated.id, status = %updated.status, "booking updated");
                return Ok(updated);
            }
        }

        let id = booking_id.unwrap_or_else(Uuid::new_v4);
        let inserted = booking::ActiveModel {
            id: Set(id),
            package_id: Set(fields.package_id.as_str().to_string()),
            customer_name: Set(fields.customer_name),
            customer_email: Set(fields.customer_email),
            customer_phone: Set(fields.customer_phone),
            booking_date: Set(fields.booking_date),
            booking_time: Set(fields.booking_time),
            status: Set(fields.status.as_str().to_string()),
            total_amount: Set(fields.total_amount),
            people_count: Set(fields.people_count),
            notes: Set(fields.notes),
            locale: Set(fields.locale.as_str().to_string()),
            abandoned_email_sent: Set(false),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await?;

        info!(booking_id = %inserted.id, status = %inserted.status, "booking created");
        Ok(inserted)
    }

    #[instrument(skip(self, payment), fields(provider = %payment.provider))]
    async fn insert_payment(
        &self,
        booking_id: Uuid,
        payment: NewPayment,
    ) -> Result<payment::Model, ServiceError> {
        let inserted = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            booking_id: Set(booking_id),
            provider_payment_id: Set(payment.provider_payment_id),
            conversation_id: Set(payment.conversation_id),
            status: Set(payment.status.as_str().to_string()),
            amount: Set(payment.amount),
            currency: Set(payment.currency),
            provider: Set(payment.provider.as_str().to_string()),
            raw_response: Set(payment.raw_response),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(payment_id = %inserted.id, %booking_id, "payment recorded");
        Ok(inserted)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<booking::Model>, ServiceError> {
        Ok(booking::Entity::find_by_id(id).one(&*self.db).await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        next: BookingStatus,
        notes: Option<String>,
    ) -> Result<booking::Model, ServiceError> {
        let existing = booking::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("booking {id} not found")))?;

        let current = BookingStatus::parse(&existing.status).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "booking {id} carries unknown status {}",
                existing.status
            ))
        })?;

        if current != next && !current.can_transition_to(next) {
            return Err(ServiceError::InvalidStatusTransition {
                from: current.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        let mut active: booking::ActiveModel = existing.into();
        active.status = Set(next.as_str().to_string());
        if let Some(notes) = notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&*self.db).await?;
        info!(booking_id = %id, status = %updated.status, "booking status changed");
        Ok(updated)
    }

    async fn find_abandoned_drafts(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<booking::Model>, ServiceError> {
        Ok(booking::Entity::find()
            .filter(booking::Column::Status.eq(BookingStatus::Draft.as_str()))
            .filter(booking::Column::AbandonedEmailSent.eq(false))
            .filter(booking::Column::CreatedAt.gte(window_start))
            .filter(booking::Column::CreatedAt.lte(window_end))
            .order_by_asc(booking::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    async fn has_later_booking(
        &self,
        email: &str,
        after: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let found = booking::Entity::find()
            .filter(booking::Column::CustomerEmail.eq(email))
            .filter(booking::Column::Status.ne(BookingStatus::Draft.as_str()))
            .filter(booking::Column::CreatedAt.gt(after))
            .one(&*self.db)
            .await?;
        Ok(found.is_some())
    }

    async fn mark_abandoned_email_sent(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = booking::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("booking {id} not found")))?;

        let mut active: booking::ActiveModel = existing.into();
        active.abandoned_email_sent = Set(true);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db).await?;
        Ok(())
    }
}
