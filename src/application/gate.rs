use crate::domain::intent::PaymentIntent;
use crate::domain::money::Amount;
use crate::domain::ports::{StepUpAuthenticatorRef, StepUpChallenge, StepUpOutcome};
use crate::error::{FlowError, Result};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Interposes a second factor before high-value submissions.
pub struct StepUpGate {
    threshold: Decimal,
    authenticator: StepUpAuthenticatorRef,
}

impl StepUpGate {
    pub fn new(threshold: Decimal, authenticator: StepUpAuthenticatorRef) -> Self {
        Self {
            threshold,
            authenticator,
        }
    }

    /// Step-up is required iff the amount is strictly above the threshold.
    pub fn requires(&self, amount: Amount) -> bool {
        amount.value() > self.threshold
    }

    /// Presents the challenge for `intent`. Anything other than an explicit
    /// pass is a failure.
    pub async fn challenge(&self, intent: &PaymentIntent) -> Result<()> {
        let challenge = StepUpChallenge {
            amount: intent.amount().format(intent.currency()),
            recipient: intent.target().display_value().to_string(),
        };
        match self.authenticator.challenge(&challenge).await {
            StepUpOutcome::Passed => {
                info!(amount = %challenge.amount, "step-up passed");
                Ok(())
            }
            StepUpOutcome::Failed => {
                warn!(amount = %challenge.amount, "step-up failed");
                Err(FlowError::StepUpFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Currency;
    use crate::domain::ports::StepUpAuthenticator;
    use crate::domain::target::{EntryMethod, InputResolver};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct Recording {
        outcome: StepUpOutcome,
        seen: Mutex<Vec<StepUpChallenge>>,
    }

    #[async_trait]
    impl StepUpAuthenticator for Recording {
        async fn challenge(&self, challenge: &StepUpChallenge) -> StepUpOutcome {
            self.seen.lock().unwrap().push(challenge.clone());
            self.outcome
        }
    }

    fn gate(outcome: StepUpOutcome) -> (StepUpGate, Arc<Recording>) {
        let auth = Arc::new(Recording {
            outcome,
            seen: Mutex::new(Vec::new()),
        });
        (StepUpGate::new(dec!(500), auth.clone()), auth)
    }

    #[test]
    fn test_threshold_is_strict() {
        let (gate, _) = gate(StepUpOutcome::Passed);
        assert!(!gate.requires(Amount::new(dec!(499.99)).unwrap()));
        assert!(!gate.requires(Amount::new(dec!(500)).unwrap()));
        assert!(gate.requires(Amount::new(dec!(500.01)).unwrap()));
    }

    #[tokio::test]
    async fn test_challenge_outcomes() {
        let target = InputResolver::new(50)
            .resolve(EntryMethod::TypedKey, "+5511999999999")
            .unwrap();
        let intent = PaymentIntent::new(target, Amount::new(dec!(600)).unwrap(), Currency::Brl);

        let (passing, auth) = gate(StepUpOutcome::Passed);
        assert_eq!(passing.challenge(&intent).await, Ok(()));
        let seen = auth.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![StepUpChallenge {
                amount: "R$ 600,00".to_string(),
                recipient: "+5511999999999".to_string(),
            }]
        );

        let (failing, _) = gate(StepUpOutcome::Failed);
        assert_eq!(
            failing.challenge(&intent).await,
            Err(FlowError::StepUpFailed)
        );
    }
}
