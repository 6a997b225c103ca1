use super::money::{Amount, Balance, Currency};
use super::target::PaymentTarget;
use crate::error::{FlowError, Result};
use std::fmt;
use uuid::Uuid;

/// Client-generated token attached to every submission attempt of one intent,
/// so the gateway can recognize a retried transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    Draft,
    AwaitingStepUp,
    Submitting,
    Submitted,
    Failed,
}

impl IntentStatus {
    pub fn name(&self) -> &'static str {
        match self {
            IntentStatus::Draft => "draft",
            IntentStatus::AwaitingStepUp => "awaiting step-up",
            IntentStatus::Submitting => "submitting",
            IntentStatus::Submitted => "submitted",
            IntentStatus::Failed => "failed",
        }
    }
}

/// The in-flight record of one payment attempt.
///
/// Owned by the flow controller and only mutated through the transition
/// methods below. The reference id is assigned once, when the gateway
/// confirms the transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    target: PaymentTarget,
    amount: Amount,
    currency: Currency,
    status: IntentStatus,
    idempotency_key: IdempotencyKey,
    reference_id: Option<String>,
    attempts: u32,
}

impl PaymentIntent {
    pub fn new(target: PaymentTarget, amount: Amount, currency: Currency) -> Self {
        Self {
            target,
            amount,
            currency,
            status: IntentStatus::Draft,
            idempotency_key: IdempotencyKey::generate(),
            reference_id: None,
            attempts: 0,
        }
    }

    pub fn target(&self) -> &PaymentTarget {
        &self.target
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn status(&self) -> IntentStatus {
        self.status
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        self.idempotency_key
    }

    pub fn reference_id(&self) -> Option<&str> {
        self.reference_id.as_deref()
    }

    /// Number of submission attempts made for this intent.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether this intent pays `amount` to `target`, i.e. a retry of it is
    /// the same logical transfer.
    pub fn is_same_payment(&self, target: &PaymentTarget, amount: Amount) -> bool {
        self.target == *target && self.amount == amount
    }

    /// Marks the intent as waiting on a challenge. Re-entering is allowed so
    /// the operator can re-invoke the challenge.
    pub fn await_step_up(&mut self) -> Result<()> {
        match self.status {
            IntentStatus::Draft | IntentStatus::Failed | IntentStatus::AwaitingStepUp => {
                self.status = IntentStatus::AwaitingStepUp;
                Ok(())
            }
            _ => Err(self.illegal("await step-up")),
        }
    }

    /// Returns an intent whose challenge did not pass to the draft state.
    pub fn step_up_rejected(&mut self) -> Result<()> {
        match self.status {
            IntentStatus::AwaitingStepUp => {
                self.status = IntentStatus::Draft;
                Ok(())
            }
            _ => Err(self.illegal("reject step-up")),
        }
    }

    /// Moves the intent into `Submitting`.
    ///
    /// Refuses a second submission while one is outstanding, and re-checks the
    /// amount against the balance read just before the call.
    pub fn begin_submission(&mut self, available: Balance) -> Result<()> {
        match self.status {
            IntentStatus::Submitting => return Err(FlowError::SubmissionInFlight),
            IntentStatus::Submitted => return Err(self.illegal("submit")),
            IntentStatus::Draft | IntentStatus::AwaitingStepUp | IntentStatus::Failed => {}
        }
        if !available.covers(self.amount) {
            return Err(FlowError::InsufficientBalance);
        }
        self.status = IntentStatus::Submitting;
        self.attempts += 1;
        Ok(())
    }

    pub fn mark_submitted(&mut self, reference_id: String) -> Result<()> {
        if self.status != IntentStatus::Submitting || self.reference_id.is_some() {
            return Err(self.illegal("confirm submission"));
        }
        self.reference_id = Some(reference_id);
        self.status = IntentStatus::Submitted;
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<()> {
        if self.status != IntentStatus::Submitting {
            return Err(self.illegal("fail submission"));
        }
        self.status = IntentStatus::Failed;
        Ok(())
    }

    fn illegal(&self, action: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            state: self.status.name(),
            action,
        }
    }
}
