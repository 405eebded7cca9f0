//! Abandoned-booking recovery sweep.
//!
//! Triggered by an external scheduler. Candidates are draft bookings aged
//! between 4 and 24 hours whose recovery email has not been sent; the
//! sliding window means each draft is visited at most once per run and
//! ages out after a day. Email send and flag update are not transactional:
//! a flag-update failure after a successful send may produce a repeat
//! email on a later run, which is the accepted tradeoff.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::catalog::PackageId;
use crate::entities::booking;
use crate::errors::ServiceError;
use crate::i18n::Locale;
use crate::notifications::{EmailSender, RecoveryEmail};
use crate::services::bookings::BookingRepository;

const MIN_AGE_HOURS: i64 = 4;
const MAX_AGE_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Sent,
    Failed,
    AlreadyConverted,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecoveryOutcome {
    pub id: Uuid,
    pub status: RecoveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RecoveryService {
    repo: Arc<dyn BookingRepository>,
    email: Arc<dyn EmailSender>,
    site_base_url: String,
}

impl RecoveryService {
    pub fn new(
        repo: Arc<dyn BookingRepository>,
        email: Arc<dyn EmailSender>,
        site_base_url: String,
    ) -> Self {
        Self {
            repo,
            email,
            site_base_url,
        }
    }

    /// Processes every candidate draft sequentially and reports a per-draft
    /// outcome. Only the candidate query itself can fail the sweep.
    #[instrument(skip(self))]
    pub async fn run_sweep(&self) -> Result<Vec<RecoveryOutcome>, ServiceError> {
        let now = Utc::now();
        let drafts = self
            .repo
            .find_abandoned_drafts(
                now - Duration::hours(MAX_AGE_HOURS),
                now - Duration::hours(MIN_AGE_HOURS),
            )
            .await?;

        info!(candidates = drafts.len(), "recovery sweep started");

        let mut outcomes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            outcomes.push(self.process_draft(draft).await);
        }

        metrics::counter!("recovery_sweep_runs_total", 1);
        Ok(outcomes)
    }

    async fn process_draft(&self, draft: booking::Model) -> RecoveryOutcome {
        // The customer may have converted through another path after
        // abandoning this draft; a recovery email would only confuse.
        // Matching is by email alone, with no package/date disambiguation.
        match self
            .repo
            .has_later_booking(&draft.customer_email, draft.created_at)
            .await
        {
            Ok(true) => {
                if let Err(err) = self.repo.mark_abandoned_email_sent(draft.id).await {
                    warn!(draft_id = %draft.id, error = %err, "failed to flag converted draft");
                    return RecoveryOutcome {
                        id: draft.id,
                        status: RecoveryStatus::Failed,
                        email_id: None,
                        error: Some(err.to_string()),
                    };
                }
                info!(draft_id = %draft.id, "draft already converted, no email sent");
                return RecoveryOutcome {
                    id: draft.id,
                    status: RecoveryStatus::AlreadyConverted,
                    email_id: None,
                    error: None,
                };
            }
            Ok(false) => {}
            Err(err) => {
                // Leave the flag unset so a later run can retry
                warn!(draft_id = %draft.id, error = %err, "conversion check failed");
                return RecoveryOutcome {
                    id: draft.id,
                    status: RecoveryStatus::Failed,
                    email_id: None,
                    error: Some(err.to_string()),
                };
            }
        }

        let locale = Locale::parse_or_default(&draft.locale);
        let package_id = PackageId::parse(&draft.package_id).unwrap_or(PackageId::Essential);
        let email = RecoveryEmail {
            to: draft.customer_email.clone(),
            customer_name: draft.customer_name.clone(),
            package_id,
            resume_url: format!("{}/checkout?draft={}", self.site_base_url, draft.id),
            locale,
        };

        match self.email.send_recovery(&email).await {
            Ok(email_id) => {
                if let Err(err) = self.repo.mark_abandoned_email_sent(draft.id).await {
                    // At-least-once territory: the send already happened
                    warn!(
                        draft_id = %draft.id,
                        error = %err,
                        "flag update failed after send, draft may be re-emailed"
                    );
                }
                info!(draft_id = %draft.id, %email_id, "recovery email sent");
                metrics::counter!("recovery_emails_sent_total", 1);
                RecoveryOutcome {
                    id: draft.id,
                    status: RecoveryStatus::Sent,
                    email_id: Some(email_id),
                    error: None,
                }
            }
            Err(err) => {
                warn!(draft_id = %draft.id, error = %err, "recovery email failed");
                RecoveryOutcome {
                    id: draft.id,
                    status: RecoveryStatus::Failed,
                    email_id: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{EmailError, MockEmailSender};
    use crate::services::bookings::MockBookingRepository;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn draft(email: &str) -> booking::Model {
        booking::Model {
            id: Uuid::new_v4(),
            package_id: "premium".into(),
            customer_name: "Jane Doe".into(),
            customer_email: email.into(),
            customer_phone: None,
            booking_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            booking_time: "10:00".into(),
            status: "draft".into(),
            total_amount: dec!(250.00),
            people_count: None,
            notes: None,
            locale: "ru".into(),
            abandoned_email_sent: false,
            created_at: Utc::now() - Duration::hours(6),
            updated_at: None,
        }
    }

    fn service(repo: MockBookingRepository, email: MockEmailSender) -> RecoveryService {
        RecoveryService::new(
            Arc::new(repo),
            Arc::new(email),
            "https://studiovista.co".into(),
        )
    }

    #[tokio::test]
    async fn converted_draft_is_flagged_without_an_email() {
        let candidate = draft("jane@example.com");
        let candidate_id = candidate.id;

        let mut repo = MockBookingRepository::new();
        repo.expect_find_abandoned_drafts()
            .returning(move |_, _| Ok(vec![candidate.clone()]));
        repo.expect_has_later_booking().returning(|_, _| Ok(true));
        repo.expect_mark_abandoned_email_sent()
            .times(1)
            .returning(|_| Ok(()));

        // No expectation on the email mock: a send attempt panics the test
        let outcomes = service(repo, MockEmailSender::new()).run_sweep().await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].id, candidate_id);
        assert_eq!(outcomes[0].status, RecoveryStatus::AlreadyConverted);
    }

    #[tokio::test]
    async fn unconverted_draft_gets_localized_email_then_flag() {
        let candidate = draft("ivan@example.com");

        let mut repo = MockBookingRepository::new();
        repo.expect_find_abandoned_drafts()
            .returning(move |_, _| Ok(vec![candidate.clone()]));
        repo.expect_has_later_booking().returning(|_, _| Ok(false));
        repo.expect_mark_abandoned_email_sent()
            .times(1)
            .returning(|_| Ok(()));

        let mut email = MockEmailSender::new();
        email
            .expect_send_recovery()
            .withf(|recovery| {
                recovery.locale == Locale::Ru
                    && recovery.package_id == PackageId::Premium
                    && recovery.resume_url.starts_with("https://studiovista.co/checkout?draft=")
            })
            .times(1)
            .returning(|_| Ok("re_77".to_string()));

        let outcomes = service(repo, email).run_sweep().await.unwrap();
        assert_eq!(outcomes[0].status, RecoveryStatus::Sent);
        assert_eq!(outcomes[0].email_id.as_deref(), Some("re_77"));
    }

    #[tokio::test]
    async fn send_failure_leaves_flag_unset_for_retry() {
        let candidate = draft("jane@example.com");

        let mut repo = MockBookingRepository::new();
        repo.expect_find_abandoned_drafts()
            .returning(move |_, _| Ok(vec![candidate.clone()]));
        repo.expect_has_later_booking().returning(|_, _| Ok(false));
        // mark_abandoned_email_sent must NOT be called

        let mut email = MockEmailSender::new();
        email
            .expect_send_recovery()
            .times(1)
            .returning(|_| Err(EmailError::Transport("smtp down".into())));

        let outcomes = service(repo, email).run_sweep().await.unwrap();
        assert_eq!(outcomes[0].status, RecoveryStatus::Failed);
        assert!(outcomes[0].error.is_some());
    }

    #[tokio::test]
    async fn flag_failure_after_send_still_counts_as_sent() {
        let candidate = draft("jane@example.com");

        let mut repo = MockBookingRepository::new();
        repo.expect_find_abandoned_drafts()
            .returning(move |_, _| Ok(vec![candidate.clone()]));
        repo.expect_has_later_booking().returning(|_, _| Ok(false));
        repo.expect_mark_abandoned_email_sent()
            .times(1)
            .returning(|_| Err(ServiceError::db_error("lock timeout")));

        let mut email = MockEmailSender::new();
        email
            .expect_send_recovery()
            .times(1)
            .returning(|_| Ok("re_88".to_string()));

        let outcomes = service(repo, email).run_sweep().await.unwrap();
        assert_eq!(outcomes[0].status, RecoveryStatus::Sent);
    }

    #[tokio::test]
    async fn empty_window_returns_no_outcomes() {
        let mut repo = MockBookingRepository::new();
        repo.expect_find_abandoned_drafts().returning(|_, _| Ok(vec![]));

        let outcomes = service(repo, MockEmailSender::new()).run_sweep().await.unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn sweep_window_is_four_to_twentyfour_hours() {
        let mut repo = MockBookingRepository::new();
        repo.expect_find_abandoned_drafts()
            .withf(|start, end| {
                let now = Utc::now();
                let min_age = now.signed_duration_since(*end).num_hours();
                let max_age = now.signed_duration_since(*start).num_hours();
                min_age == 4 && max_age == 24
            })
            .times(1)
            .returning(|_, _| Ok(vec![]));

        service(repo, MockEmailSender::new()).run_sweep().await.unwrap();
    }
}
