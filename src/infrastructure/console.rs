use crate::domain::ports::{StepUpAuthenticator, StepUpChallenge, StepUpOutcome};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

/// Step-up confirmation typed by the operator at a terminal.
///
/// Only an explicit `y` or `yes` passes. End of input, read errors and any
/// other answer fail the challenge.
pub struct ConsoleAuthenticator<R = BufReader<Stdin>> {
    input: Mutex<R>,
}

impl ConsoleAuthenticator {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> ConsoleAuthenticator<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }
}

#[async_trait]
impl<R> StepUpAuthenticator for ConsoleAuthenticator<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn challenge(&self, challenge: &StepUpChallenge) -> StepUpOutcome {
        eprint!(
            "Confirm transfer of {} to {} [y/N]: ",
            challenge.amount, challenge.recipient
        );
        let mut answer = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut answer).await {
            Ok(_) if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") => {
                StepUpOutcome::Passed
            }
            Ok(_) => StepUpOutcome::Failed,
            Err(err) => {
                warn!(error = %err, "could not read step-up answer");
                StepUpOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge() -> StepUpChallenge {
        StepUpChallenge {
            amount: "R$ 600,00".to_string(),
            recipient: "test@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_only_explicit_yes_passes() {
        let auth = ConsoleAuthenticator::new(&b"YES\nn\nmaybe\n"[..]);
        assert_eq!(auth.challenge(&challenge()).await, StepUpOutcome::Passed);
        assert_eq!(auth.challenge(&challenge()).await, StepUpOutcome::Failed);
        assert_eq!(auth.challenge(&challenge()).await, StepUpOutcome::Failed);
        // End of input.
        assert_eq!(auth.challenge(&challenge()).await, StepUpOutcome::Failed);
    }
}
