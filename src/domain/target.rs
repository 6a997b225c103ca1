use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker appended to display values that were cut short.
pub const ELLIPSIS: &str = "...";

/// How the operator supplied the payment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMethod {
    /// Optical code recognized by the capture session.
    CapturedCode,
    /// Encoded payment string pasted by the operator.
    PastedCode,
    /// Recipient key typed by the operator (tax id, email, phone or random key).
    TypedKey,
}

impl fmt::Display for EntryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryMethod::CapturedCode => "captured code",
            EntryMethod::PastedCode => "pasted code",
            EntryMethod::TypedKey => "typed key",
        };
        f.write_str(label)
    }
}

/// The recipient of a payment, resolved from one of the three entry paths.
///
/// Immutable once created. `raw_value` is what gets submitted and is never
/// altered; `display_value` is a truncated projection for the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTarget {
    method: EntryMethod,
    raw_value: String,
    display_value: String,
}

impl PaymentTarget {
    pub fn method(&self) -> EntryMethod {
        self.method
    }

    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    pub fn display_value(&self) -> &str {
        &self.display_value
    }
}

/// Normalizes operator input into a [`PaymentTarget`].
#[derive(Debug, Clone, Copy)]
pub struct InputResolver {
    display_len: usize,
}

impl InputResolver {
    pub fn new(display_len: usize) -> Self {
        Self { display_len }
    }

    /// Resolves input from the given entry path.
    ///
    /// Input is kept verbatim on every path and rejected with
    /// [`FlowError::EmptyInput`] when blank. Typed keys are not format-checked
    /// here; the gateway decides whether a key exists.
    pub fn resolve(&self, method: EntryMethod, input: &str) -> Result<PaymentTarget> {
        if input.trim().is_empty() {
            return Err(FlowError::EmptyInput);
        }
        let raw_value = input.to_string();
        let display_value = truncate_for_display(&raw_value, self.display_len);
        Ok(PaymentTarget {
            method,
            raw_value,
            display_value,
        })
    }
}

/// Cuts `value` to at most `max_chars` characters, marking the cut.
///
/// Counts characters rather than bytes so multi-byte names are never split.
pub fn truncate_for_display(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        None => value.to_string(),
        Some((byte_idx, _)) => format!("{}{}", &value[..byte_idx], ELLIPSIS),
    }
}
