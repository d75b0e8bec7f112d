//! # Return Notifications
//!
//! After a settlement the counter can offer the customer a receipt by
//! SMS or Telegram. Delivery is out of process; the ledger only hands
//! the settled rental to a [`Notifier`] and moves on. Delivery failures
//! never fail the settlement.

use tracing::debug;

use crate::api::SettlementView;

/// Requested delivery channels for a return receipt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiptChannels {
    pub sms: bool,
    pub telegram: bool,
}

impl ReceiptChannels {
    pub fn none(&self) -> bool {
        !self.sms && !self.telegram
    }
}

/// Outbound receipt delivery.
pub trait Notifier: Send + Sync {
    /// Called once per settled return, after the settlement committed.
    fn rental_returned(&self, rental_number: &str, settlement: &SettlementView, channels: ReceiptChannels);
}

/// Notifier that drops everything. Default for back offices without a
/// messaging gateway, and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn rental_returned(&self, rental_number: &str, _settlement: &SettlementView, channels: ReceiptChannels) {
        if !channels.none() {
            debug!(
                rental_number = %rental_number,
                sms = channels.sms,
                telegram = channels.telegram,
                "No messaging gateway configured, receipt not sent"
            );
        }
    }
}
