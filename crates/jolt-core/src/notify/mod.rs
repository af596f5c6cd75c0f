//! Emergency notification dispatch.
//!
//! The [`Notifier`] walks every contact and records one [`DispatchOutcome`]
//! each. Transport failures are data, not errors: the batch always completes.

mod notifier;

pub use notifier::{DispatchOutcome, DispatchReport, Notifier, NotifyMode, DEFAULT_MESSAGE};

use async_trait::async_trait;

use crate::error::DispatchErrorKind;

/// Messaging/telephony backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a text message to one number.
    async fn send(&self, number: &str, text: &str) -> Result<(), DispatchErrorKind>;

    /// Place a call to one number.
    async fn dial(&self, number: &str) -> Result<(), DispatchErrorKind>;
}
