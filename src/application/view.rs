//! Pure projection of the flow state into what a front end renders.

use super::flow::FlowState;
use crate::config::FlowConfig;
use crate::domain::money::{Currency, format_money};
use crate::domain::target::EntryMethod;
use crate::error::FlowError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub label: &'static str,
    pub value: String,
}

/// One screen of the flow. Serializes with a `step` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FlowView {
    SelectMethod {
        methods: Vec<EntryMethod>,
    },
    Capturing {
        scanning: bool,
        can_retry: bool,
        error: Option<String>,
    },
    PasteEntry {
        error: Option<String>,
    },
    KeyEntry {
        error: Option<String>,
    },
    ConfirmAmount {
        recipient: String,
        currency: Currency,
        /// Amounts above this ask for step-up.
        step_up_above: String,
        attempts: u32,
        error: Option<String>,
    },
    StepUp {
        amount: String,
        recipient: String,
    },
    Processing {
        amount: String,
        recipient: String,
    },
    Receipt {
        summary: Vec<SummaryRow>,
        share_text: String,
    },
    Cancelled,
}

fn message(error: Option<&FlowError>) -> Option<String> {
    error.map(ToString::to_string)
}

pub fn project(state: &FlowState, config: &FlowConfig) -> FlowView {
    match state {
        FlowState::SelectMethod => FlowView::SelectMethod {
            methods: vec![
                EntryMethod::CapturedCode,
                EntryMethod::PastedCode,
                EntryMethod::TypedKey,
            ],
        },
        FlowState::Capturing(step) => FlowView::Capturing {
            scanning: step.is_scanning(),
            can_retry: step.can_retry(),
            error: message(step.error.as_ref()),
        },
        FlowState::PasteEntry { error } => FlowView::PasteEntry {
            error: message(error.as_ref()),
        },
        FlowState::KeyEntry { error } => FlowView::KeyEntry {
            error: message(error.as_ref()),
        },
        FlowState::ConfirmAmount(step) => FlowView::ConfirmAmount {
            recipient: step.target.display_value().to_string(),
            currency: config.currency,
            step_up_above: format_money(config.step_up_threshold, config.currency),
            attempts: step.intent.as_ref().map_or(0, |intent| intent.attempts()),
            error: message(step.error.as_ref()),
        },
        FlowState::StepUp { intent } => FlowView::StepUp {
            amount: intent.amount().format(intent.currency()),
            recipient: intent.target().display_value().to_string(),
        },
        FlowState::Processing { intent, .. } => FlowView::Processing {
            amount: intent.amount().format(intent.currency()),
            recipient: intent.target().display_value().to_string(),
        },
        FlowState::Receipt { receipt } => FlowView::Receipt {
            summary: receipt
                .summary()
                .into_iter()
                .map(|(label, value)| SummaryRow { label, value })
                .collect(),
            share_text: receipt.share_text(),
        },
        FlowState::Cancelled => FlowView::Cancelled,
    }
}
