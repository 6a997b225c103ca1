use super::intent::{IntentStatus, PaymentIntent};
use super::money::{Amount, Currency};
use crate::error::{FlowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confirmation artifact for a submitted payment. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub amount: Amount,
    pub currency: Currency,
    pub recipient_display: String,
    pub timestamp: DateTime<Utc>,
    pub reference_id: String,
}

impl Receipt {
    /// Projects a submitted intent into a receipt stamped with `timestamp`.
    pub fn from_intent(intent: &PaymentIntent, timestamp: DateTime<Utc>) -> Result<Self> {
        let reference_id = match (intent.status(), intent.reference_id()) {
            (IntentStatus::Submitted, Some(reference_id)) => reference_id.to_string(),
            _ => {
                return Err(FlowError::InvalidTransition {
                    state: intent.status().name(),
                    action: "build a receipt",
                });
            }
        };
        Ok(Self {
            amount: intent.amount(),
            currency: intent.currency(),
            recipient_display: intent.target().display_value().to_string(),
            timestamp,
            reference_id,
        })
    }

    pub fn formatted_amount(&self) -> String {
        self.amount.format(self.currency)
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%d/%m/%Y %H:%M:%S UTC").to_string()
    }

    /// Labelled rows for the on-screen summary.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Amount", self.formatted_amount()),
            ("To", self.recipient_display.clone()),
            ("Date", self.formatted_timestamp()),
            ("ID", self.reference_id.clone()),
        ]
    }

    /// Plain text suitable for sharing through messaging apps.
    pub fn share_text(&self) -> String {
        let mut text = String::from("PIX receipt\n\n");
        for (label, value) in self.summary() {
            text.push_str(label);
            text.push_str(": ");
            text.push_str(&value);
            text.push('\n');
        }
        text.push_str("\nTransfer completed successfully\n");
        text
    }
}
