//! Transactional notification dispatch.
//!
//! Email is an external collaborator with a fire-and-forget contract;
//! the engine only depends on the `Notifier` trait. Delivery failures
//! are logged by the caller and never affect ledger state.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// Error returned by a notification sink.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink refused or failed to accept the message.
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Trait for transactional notification delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a single message.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Subject line for subscription status changes, e.g.
/// "Ada Your Subscription Plan Has Been Cancelled".
pub(crate) fn status_changed_subject(name: &str, reason: &str) -> String {
    format!("{name} Your Subscription Plan Has Been {reason}")
}

pub(crate) fn status_changed_body(name: &str, reason: &str) -> String {
    format!("Hi {name}, your subscription plan has been {reason}.")
}

pub(crate) fn renewal_subject(name: &str) -> String {
    format!("{name} Your Subscription Plan Has Been Renewed")
}

pub(crate) fn renewal_body(name: &str) -> String {
    format!("Hi {name}, your subscription plan has been renewed.")
}

pub(crate) const RECEIPT_SUBJECT: &str = "Subscription Payment";

pub(crate) fn receipt_body(name: &str, plan: &str) -> String {
    format!("Hi {name}, your {plan} subscription is now active.")
}

/// A message captured by the in-memory notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<SentMessage>,
    fail_on_send: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail on subsequent send calls.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Returns the number of delivered messages.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Returns all delivered messages.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_send {
            return Err(NotifyError::Rejected("sink unavailable".to_string()));
        }

        state.sent.push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Notifier that writes messages to the structured log.
///
/// Used by the server binary; a real SMTP transport plugs in behind the
/// same trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        tracing::info!(to, subject, "dispatching notification");
        Ok(())
    }
}
