use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Transport;
use crate::contacts::{phone, Contact};
use crate::error::DispatchErrorKind;

pub const DEFAULT_MESSAGE: &str =
    "Emergency message: I may have been in an accident. Please help!";

/// How an escalation reaches people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
    /// Text every registered contact.
    #[default]
    MessageAll,
    /// Call the first contact only.
    DialPrimary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub contact: Contact,
    pub succeeded: bool,
    pub error: Option<DispatchErrorKind>,
}

/// Result of one dispatch attempt across all recipients.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DispatchReport {
    pub outcomes: Vec<DispatchOutcome>,
    /// Set when there was nobody to notify.
    pub no_contacts: bool,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.no_contacts && self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &DispatchOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }
}

#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn Transport>,
    mode: NotifyMode,
}

impl Notifier {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            mode: NotifyMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: NotifyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> NotifyMode {
        self.mode
    }

    /// Notify `contacts` with `message`.
    ///
    /// Every recipient is attempted even if earlier ones fail. In
    /// [`NotifyMode::DialPrimary`] only the first contact is called and
    /// `message` is unused.
    pub async fn dispatch(&self, contacts: &[Contact], message: &str) -> DispatchReport {
        if contacts.is_empty() {
            tracing::warn!("no emergency contacts configured, nothing dispatched");
            return DispatchReport {
                outcomes: Vec::new(),
                no_contacts: true,
            };
        }

        let recipients = match self.mode {
            NotifyMode::MessageAll => contacts,
            NotifyMode::DialPrimary => &contacts[..1],
        };

        let mut outcomes = Vec::with_capacity(recipients.len());
        for contact in recipients {
            let result = self.deliver(contact, message).await;
            if let Err(e) = &result {
                tracing::warn!(contact = %contact, error = %e, "emergency dispatch failed");
            }
            outcomes.push(DispatchOutcome {
                contact: contact.clone(),
                succeeded: result.is_ok(),
                error: result.err(),
            });
        }

        let report = DispatchReport {
            outcomes,
            no_contacts: false,
        };
        tracing::info!(
            mode = ?self.mode,
            delivered = report.delivered(),
            failed = report.failed(),
            "emergency dispatch finished"
        );
        report
    }

    async fn deliver(&self, contact: &Contact, message: &str) -> Result<(), DispatchErrorKind> {
        // Fields are public; a hand-built contact may hold any string.
        if !phone::validate(&contact.phone_number) {
            return Err(DispatchErrorKind::InvalidNumber);
        }
        let number = phone::normalize(&contact.phone_number);
        match self.mode {
            NotifyMode::MessageAll => self.transport.send(&number, message).await,
            NotifyMode::DialPrimary => self.transport.dial(&number).await,
        }
    }
}
