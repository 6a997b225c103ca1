use super::intent::IdempotencyKey;
use super::money::{Amount, Balance};
use super::receipt::Receipt;
use crate::error::{CaptureError, GatewayError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Which camera the capture session asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    Rear,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: FacingMode,
    pub ideal: Resolution,
    pub min: Resolution,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Rear,
            ideal: Resolution {
                width: 1280,
                height: 720,
            },
            min: Resolution {
                width: 640,
                height: 480,
            },
        }
    }
}

/// A raster frame in RGBA8 layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Allocates a zeroed frame buffer for `resolution`.
    pub fn blank(resolution: Resolution) -> Self {
        let len = resolution.width as usize * resolution.height as usize * Self::BYTES_PER_PIXEL;
        Self {
            width: resolution.width,
            height: resolution.height,
            pixels: vec![0; len],
        }
    }
}

/// A live video capture device.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn VideoStream>, CaptureError>;
}

/// An acquired video stream. Dropping it without calling `release` leaks the
/// device, so the capture session always releases explicitly.
pub trait VideoStream: Send {
    fn resolution(&self) -> Resolution;

    /// Whether the stream has enough data to read a frame.
    fn is_ready(&self) -> bool;

    /// Copies the current frame into `frame`.
    fn read_frame(&mut self, frame: &mut Frame) -> Result<(), CaptureError>;

    /// Stops every track of the stream. Must be idempotent.
    fn release(&mut self);
}

/// Extracts an embedded payment code from a frame, if one is visible.
#[async_trait]
pub trait Decoder: Send + Sync {
    async fn decode(&self, frame: &Frame) -> Option<String>;
}

/// Body of `POST /pix/send`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub pix_code: String,
    pub amount: Amount,
    pub user_id: String,
    /// Sent as a header rather than in the body.
    #[serde(skip)]
    pub idempotency_key: IdempotencyKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfirmation {
    pub reference_id: String,
    pub message: Option<String>,
}

/// The remote service that executes transfers.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn send(&self, request: &TransferRequest) -> Result<TransferConfirmation, GatewayError>;
}

/// What the operator is asked to approve during step-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepUpChallenge {
    pub amount: String,
    pub recipient: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUpOutcome {
    Passed,
    Failed,
}

/// Second factor presented above the step-up threshold.
#[async_trait]
pub trait StepUpAuthenticator: Send + Sync {
    async fn challenge(&self, challenge: &StepUpChallenge) -> StepUpOutcome;
}

/// Read-only view of the signed-in session.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn current_user_id(&self) -> Option<String>;
}

/// Read-only view of the wallet balance.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn available_balance(&self) -> Balance;
}

/// Collaborators notified when a flow ends.
pub trait FlowObserver: Send + Sync {
    fn on_completed(&self, receipt: &Receipt);
    fn on_cancelled(&self);
}

pub type CaptureDeviceRef = Arc<dyn CaptureDevice>;
pub type DecoderRef = Arc<dyn Decoder>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type StepUpAuthenticatorRef = Arc<dyn StepUpAuthenticator>;
pub type IdentityStoreRef = Arc<dyn IdentityStore>;
pub type BalanceSourceRef = Arc<dyn BalanceSource>;
pub type FlowObserverRef = Arc<dyn FlowObserver>;
