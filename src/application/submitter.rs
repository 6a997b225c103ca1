use crate::domain::intent::PaymentIntent;
use crate::domain::ports::{
    IdentityStoreRef, PaymentGatewayRef, TransferConfirmation, TransferRequest,
};
use crate::error::{FlowError, GENERIC_SUBMISSION_FAILURE, Result};
use std::fmt;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Performs the single authoritative call that executes a transfer.
///
/// There is no automatic retry: a failed attempt goes back to the operator,
/// and duplicate protection relies on the intent's idempotency key.
pub struct PaymentSubmitter {
    gateway: PaymentGatewayRef,
    identity: IdentityStoreRef,
}

impl PaymentSubmitter {
    pub fn new(gateway: PaymentGatewayRef, identity: IdentityStoreRef) -> Self {
        Self { gateway, identity }
    }

    /// Builds the transfer request for `intent`, resolving the sender from the
    /// session.
    pub async fn prepare(&self, intent: &PaymentIntent) -> Result<TransferRequest> {
        let user_id = self
            .identity
            .current_user_id()
            .await
            .filter(|id| !id.trim().is_empty())
            .ok_or(FlowError::MissingIdentity)?;
        Ok(TransferRequest {
            pix_code: intent.target().raw_value().to_string(),
            amount: intent.amount(),
            user_id,
            idempotency_key: intent.idempotency_key(),
        })
    }

    /// Issues the call on its own task.
    ///
    /// Dropping the returned handle does not abort the call; its result is
    /// simply never looked at.
    pub fn dispatch(&self, request: TransferRequest) -> PendingSubmission {
        let gateway = self.gateway.clone();
        let handle = tokio::spawn(async move {
            info!(
                idempotency_key = %request.idempotency_key,
                amount = %request.amount.value(),
                "submitting transfer"
            );
            match gateway.send(&request).await {
                Ok(confirmation) => {
                    info!(reference_id = %confirmation.reference_id, "transfer accepted");
                    Ok(confirmation)
                }
                Err(err) => {
                    warn!(error = %err, "transfer rejected");
                    Err(FlowError::from(err))
                }
            }
        });
        PendingSubmission { handle }
    }
}

/// A transfer call in flight.
pub struct PendingSubmission {
    handle: JoinHandle<Result<TransferConfirmation>>,
}

impl PendingSubmission {
    /// Waits for the gateway's answer.
    pub async fn wait(&mut self) -> Result<TransferConfirmation> {
        match (&mut self.handle).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "submission task did not complete");
                Err(FlowError::SubmissionFailed(
                    GENERIC_SUBMISSION_FAILURE.to_string(),
                ))
            }
        }
    }
}

impl fmt::Debug for PendingSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubmission")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}
