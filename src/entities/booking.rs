use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub package_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub booking_date: NaiveDate,
    pub booking_time: String,
    pub status: String,
    pub total_amount: Decimal,
    pub people_count: Option<i32>,
    pub notes: Option<String>,
    pub locale: String,
    pub abandoned_email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Booking lifecycle. Transitions only move forward:
/// draft -> {pending, confirmed, cancelled},
/// pending -> {confirmed, cancelled},
/// confirmed -> {completed, cancelled}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Draft,
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Draft, Confirmed)
                | (Draft, Cancelled)
                | (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        use BookingStatus::*;
        assert!(Draft.can_transition_to(Confirmed));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));

        assert!(!Confirmed.can_transition_to(Draft));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Draft.can_transition_to(Completed));
    }

    #[test]
    fn parse_accepts_both_cancelled_spellings() {
        assert_eq!(
            BookingStatus::parse("canceled"),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(
            BookingStatus::parse("CANCELLED"),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(BookingStatus::parse("unknown"), None);
    }
}
