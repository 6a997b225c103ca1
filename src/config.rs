use crate::domain::money::Currency;
use crate::domain::ports::CaptureConstraints;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// Amounts strictly above this require step-up authentication.
pub const DEFAULT_STEP_UP_THRESHOLD: Decimal = dec!(500);
/// Interval between frame samples while capturing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);
/// Characters of a payment target shown before truncation.
pub const DEFAULT_DISPLAY_LEN: usize = 50;

/// Policy and tuning knobs for one payment flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowConfig {
    pub step_up_threshold: Decimal,
    pub poll_interval: Duration,
    pub display_len: usize,
    pub currency: Currency,
    pub capture: CaptureConstraints,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            step_up_threshold: DEFAULT_STEP_UP_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            display_len: DEFAULT_DISPLAY_LEN,
            currency: Currency::default(),
            capture: CaptureConstraints::default(),
        }
    }
}
