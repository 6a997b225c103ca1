use thiserror::Error;

/// Generic message surfaced when the gateway rejects a transfer without
/// telling us why.
pub const GENERIC_SUBMISSION_FAILURE: &str = "PIX submission failed";

/// Errors produced by the payment initiation flow.
///
/// Every variant is scoped to a single flow and is recoverable by operator
/// retry or cancellation. Errors are stored in the state that surfaced them,
/// hence `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("no capture device is available")]
    DeviceUnavailable,
    #[error("access to the capture device was denied")]
    PermissionDenied,
    #[error("the capture device is in use by another session")]
    DeviceBusy,
    #[error("input is empty")]
    EmptyInput,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("amount exceeds the available balance")]
    InsufficientBalance,
    #[error("step-up authentication failed")]
    StepUpFailed,
    #[error("no signed-in user to submit the payment for")]
    MissingIdentity,
    #[error("{0}")]
    SubmissionFailed(String),
    #[error("a submission for this payment is already in flight")]
    SubmissionInFlight,
    #[error("cannot {action} while in {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
}

impl FlowError {
    /// Whether the operator may retry the step that produced this error.
    ///
    /// A missing device can't be fixed by retrying; the operator has to fall
    /// back to pasting or typing the target.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FlowError::DeviceUnavailable)
    }
}

/// Failures reported by a capture device.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no capture device is available")]
    DeviceUnavailable,
    #[error("access to the capture device was denied")]
    PermissionDenied,
    #[error("the capture device is in use by another session")]
    DeviceBusy,
}

impl From<CaptureError> for FlowError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::DeviceUnavailable => FlowError::DeviceUnavailable,
            CaptureError::PermissionDenied => FlowError::PermissionDenied,
            CaptureError::DeviceBusy => FlowError::DeviceBusy,
        }
    }
}

/// Failures talking to the payment gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway rejected the transfer with status {status}")]
    Rejected { status: u16, message: Option<String> },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unreadable gateway response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for FlowError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => FlowError::SubmissionFailed(message),
            _ => FlowError::SubmissionFailed(GENERIC_SUBMISSION_FAILURE.to_string()),
        }
    }
}

/// Failures writing the receipt journal.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_failure_displays_gateway_message_verbatim() {
        let err = FlowError::SubmissionFailed("insufficient funds upstream".to_string());
        assert_eq!(err.to_string(), "insufficient funds upstream");
    }

    #[test]
    fn test_gateway_message_is_surfaced_when_present() {
        let err: FlowError = GatewayError::Rejected {
            status: 500,
            message: Some("insufficient funds upstream".to_string()),
        }
        .into();
        assert_eq!(
            err,
            FlowError::SubmissionFailed("insufficient funds upstream".to_string())
        );
    }

    #[test]
    fn test_gateway_failure_without_message_is_generic() {
        for gateway_err in [
            GatewayError::Rejected {
                status: 502,
                message: None,
            },
            GatewayError::Transport("connection refused".to_string()),
            GatewayError::InvalidResponse("missing transaction id".to_string()),
        ] {
            assert_eq!(
                FlowError::from(gateway_err),
                FlowError::SubmissionFailed(GENERIC_SUBMISSION_FAILURE.to_string())
            );
        }
    }

    #[test]
    fn test_only_missing_device_is_terminal_for_its_step() {
        assert!(!FlowError::DeviceUnavailable.is_retryable());
        assert!(FlowError::PermissionDenied.is_retryable());
        assert!(FlowError::StepUpFailed.is_retryable());
        assert!(FlowError::SubmissionFailed(GENERIC_SUBMISSION_FAILURE.into()).is_retryable());
    }
}
