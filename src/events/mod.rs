//! Post-commit side-effect fan-out.
//!
//! The orchestrator finalizes its result, then emits an event into an mpsc
//! channel. A spawned processor runs each side effect (confirmation email,
//! audience sync, ad conversion) inside its own error boundary: a failing
//! side effect is logged and never changes what the customer already saw.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::PackageId;
use crate::i18n::Locale;
use crate::marketing::{AdConversionClient, AudienceClient};
use crate::notifications::{ConfirmationEmail, EmailSender};

/// Events emitted after the primary transaction outcome is already final
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BookingConfirmed {
        booking_id: Uuid,
        package_id: PackageId,
        customer_name: String,
        customer_email: String,
        booking_date: NaiveDate,
        booking_time: String,
        total_amount: Decimal,
        currency: String,
        locale: Locale,
        /// Client-supplied id letting the ad platform deduplicate against
        /// the browser pixel
        event_id: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// The side-effect targets wired in at startup. Optional integrations stay
/// `None` when unconfigured and are skipped silently.
pub struct SideEffects {
    pub email: Arc<dyn EmailSender>,
    pub audience: Option<AudienceClient>,
    pub ads: Option<AdConversionClient>,
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>, effects: SideEffects) {
    info!("event processor started");
    while let Some(event) = receiver.recv().await {
        handle_event(event, &effects).await;
    }
    info!("event processor stopped");
}

async fn handle_event(event: Event, effects: &SideEffects) {
    match event {
        Event::BookingConfirmed {
            booking_id,
            package_id,
            customer_name,
            customer_email,
            booking_date,
            booking_time,
            total_amount,
            currency,
            locale,
            event_id,
        } => {
            let confirmation = ConfirmationEmail {
                to: customer_email.clone(),
                customer_name: customer_name.clone(),
                package_id,
                booking_date,
                booking_time,
                total_amount,
                currency: currency.clone(),
                locale,
            };

            // Independent tasks, each with its own error boundary; one
            // failing never blocks or cancels the others
            let email_task = async {
                match effects.email.send_confirmation(&confirmation).await {
                    Ok(email_id) => {
                        info!(%booking_id, %email_id, "confirmation email sent");
                    }
                    Err(err) => {
                        error!(%booking_id, error = %err, "confirmation email failed");
                    }
                }
            };

            let audience_task = async {
                if let Some(audience) = &effects.audience {
                    if let Err(err) =
                        audience.sync_contact(&customer_email, &customer_name).await
                    {
                        warn!(%booking_id, error = %err, "audience sync failed");
                    }
                }
            };

            let ads_task = async {
                if let Some(ads) = &effects.ads {
                    if let Err(err) = ads
                        .track_purchase(
                            event_id.as_deref(),
                            &customer_email,
                            total_amount,
                            &currency,
                        )
                        .await
                    {
                        warn!(%booking_id, error = %err, "ad conversion tracking failed");
                    }
                }
            };

            futures::join!(email_task, audience_task, ads_task);
            metrics::counter!("booking_confirmed_side_effects_total", 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{EmailError, MockEmailSender};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn confirmed_event() -> Event {
        Event::BookingConfirmed {
            booking_id: Uuid::new_v4(),
            package_id: PackageId::Essential,
            customer_name: "Jane Doe".into(),
            customer_email: "jane@example.com".into(),
            booking_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            booking_time: "10:00".into(),
            total_amount: dec!(150.00),
            currency: "EUR".into(),
            locale: Locale::En,
            event_id: Some("evt-1".into()),
        }
    }

    #[tokio::test]
    async fn confirmed_booking_sends_confirmation_email() {
        let mut email = MockEmailSender::new();
        email
            .expect_send_confirmation()
            .times(1)
            .returning(|_| Ok("re_1".to_string()));

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(process_events(
            rx,
            SideEffects {
                email: Arc::new(email),
                audience: None,
                ads: None,
            },
        ));

        EventSender::new(tx).send(confirmed_event()).await.unwrap();
        // Dropping the sender ends the processor; a hung processor fails
        // the timeout
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn email_failure_does_not_stop_the_processor() {
        let mut email = MockEmailSender::new();
        email
            .expect_send_confirmation()
            .times(2)
            .returning(|_| Err(EmailError::Transport("boom".into())));

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(process_events(
            rx,
            SideEffects {
                email: Arc::new(email),
                audience: None,
                ads: None,
            },
        ));

        let sender = EventSender::new(tx);
        sender.send(confirmed_event()).await.unwrap();
        sender.send(confirmed_event()).await.unwrap();
        drop(sender);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
