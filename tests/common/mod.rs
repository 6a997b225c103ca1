#![allow(dead_code)]

use async_trait::async_trait;
use pixsend::application::capture::CaptureSlot;
use pixsend::application::flow::{CapturePorts, FlowController, FlowPorts};
use pixsend::config::FlowConfig;
use pixsend::domain::money::Balance;
use pixsend::domain::ports::{
    CaptureConstraints, CaptureDevice, Decoder, FlowObserver, Frame, PaymentGateway, Resolution,
    StepUpAuthenticator, StepUpChallenge, StepUpOutcome, TransferConfirmation, TransferRequest,
    VideoStream,
};
use pixsend::domain::receipt::Receipt;
use pixsend::error::{CaptureError, GatewayError};
use pixsend::infrastructure::in_memory::{InMemorySession, InMemoryWallet};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USER_ID: &str = "u1000000-0000-0000-0000-000000000001";

/// Counters shared by a fake device and the streams it hands out.
#[derive(Default)]
pub struct StreamTracker {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub reads: AtomicUsize,
}

impl StreamTracker {
    /// Streams acquired and not yet released.
    pub fn open_streams(&self) -> usize {
        self.acquired.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

struct FakeStream {
    tracker: Arc<StreamTracker>,
    released: bool,
}

impl VideoStream for FakeStream {
    fn resolution(&self) -> Resolution {
        Resolution {
            width: 8,
            height: 8,
        }
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn read_frame(&mut self, frame: &mut Frame) -> Result<(), CaptureError> {
        self.tracker.reads.fetch_add(1, Ordering::SeqCst);
        frame.pixels.fill(0x7f);
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.tracker.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A camera whose acquire results are scripted; once the script runs out
/// every acquire succeeds.
#[derive(Default)]
pub struct FakeDevice {
    pub tracker: Arc<StreamTracker>,
    script: Mutex<VecDeque<Result<(), CaptureError>>>,
    pub requests: Mutex<Vec<CaptureConstraints>>,
}

impl FakeDevice {
    pub fn scripted(outcomes: impl IntoIterator<Item = Result<(), CaptureError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn VideoStream>, CaptureError> {
        self.requests.lock().unwrap().push(*constraints);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))?;
        self.tracker.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            tracker: Arc::clone(&self.tracker),
            released: false,
        }))
    }
}

/// Recognizes `code` on the `after`-th decode and every decode after it.
pub struct FakeDecoder {
    code: Option<String>,
    after: usize,
    pub decodes: AtomicUsize,
}

impl FakeDecoder {
    pub fn recognizing(code: &str, after: usize) -> Self {
        Self {
            code: Some(code.to_string()),
            after,
            decodes: AtomicUsize::new(0),
        }
    }

    pub fn blind() -> Self {
        Self {
            code: None,
            after: 0,
            decodes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Decoder for FakeDecoder {
    async fn decode(&self, _frame: &Frame) -> Option<String> {
        let n = self.decodes.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.after { self.code.clone() } else { None }
    }
}

/// Records every request; answers from a script, then accepts.
#[derive(Default)]
pub struct RecordingGateway {
    pub requests: Mutex<Vec<TransferRequest>>,
    script: Mutex<VecDeque<Result<TransferConfirmation, GatewayError>>>,
    latency: Option<Duration>,
}

impl RecordingGateway {
    pub fn scripted(
        outcomes: impl IntoIterator<Item = Result<TransferConfirmation, GatewayError>>,
    ) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn slow(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn send(&self, request: &TransferRequest) -> Result<TransferConfirmation, GatewayError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(TransferConfirmation {
                reference_id: format!("tx-{n}"),
                message: Some("PIX enviado com sucesso".to_string()),
            })
        })
    }
}

pub struct FixedAuthenticator {
    outcome: Mutex<StepUpOutcome>,
    pub challenges: Mutex<Vec<StepUpChallenge>>,
}

impl FixedAuthenticator {
    pub fn new(outcome: StepUpOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            challenges: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, outcome: StepUpOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.challenges.lock().unwrap().len()
    }
}

#[async_trait]
impl StepUpAuthenticator for FixedAuthenticator {
    async fn challenge(&self, challenge: &StepUpChallenge) -> StepUpOutcome {
        self.challenges.lock().unwrap().push(challenge.clone());
        *self.outcome.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub completed: Mutex<Vec<Receipt>>,
    pub cancelled: AtomicUsize,
}

impl FlowObserver for RecordingObserver {
    fn on_completed(&self, receipt: &Receipt) {
        self.completed.lock().unwrap().push(receipt.clone());
    }

    fn on_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

/// A flow wired to fakes, with handles on every collaborator.
pub struct Harness {
    pub flow: FlowController,
    pub device: Arc<FakeDevice>,
    pub decoder: Arc<FakeDecoder>,
    pub gateway: Arc<RecordingGateway>,
    pub authenticator: Arc<FixedAuthenticator>,
    pub session: InMemorySession,
    pub wallet: InMemoryWallet,
    pub observer: Arc<RecordingObserver>,
}

pub struct HarnessBuilder {
    balance: Decimal,
    device: FakeDevice,
    decoder: FakeDecoder,
    gateway: RecordingGateway,
    step_up: StepUpOutcome,
    session: InMemorySession,
    config: FlowConfig,
    slot: Option<CaptureSlot>,
}

impl HarnessBuilder {
    pub fn new(balance: Decimal) -> Self {
        Self {
            balance,
            device: FakeDevice::default(),
            decoder: FakeDecoder::blind(),
            gateway: RecordingGateway::default(),
            step_up: StepUpOutcome::Passed,
            session: InMemorySession::signed_in(USER_ID),
            config: FlowConfig::default(),
            slot: None,
        }
    }

    /// Shares `slot` with other flows instead of giving this one its own.
    pub fn slot(mut self, slot: CaptureSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn device(mut self, device: FakeDevice) -> Self {
        self.device = device;
        self
    }

    pub fn decoder(mut self, decoder: FakeDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn gateway(mut self, gateway: RecordingGateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn step_up(mut self, outcome: StepUpOutcome) -> Self {
        self.step_up = outcome;
        self
    }

    pub fn signed_out(mut self) -> Self {
        self.session = InMemorySession::new();
        self
    }

    pub fn build(self) -> Harness {
        let device = Arc::new(self.device);
        let decoder = Arc::new(self.decoder);
        let gateway = Arc::new(self.gateway);
        let authenticator = Arc::new(FixedAuthenticator::new(self.step_up));
        let wallet = InMemoryWallet::new(Balance::new(self.balance));
        let observer = Arc::new(RecordingObserver::default());
        let mut capture = CapturePorts::new(device.clone(), decoder.clone());
        if let Some(slot) = self.slot {
            capture.slot = slot;
        }

        let ports = FlowPorts {
            capture: Some(capture),
            gateway: gateway.clone(),
            authenticator: authenticator.clone(),
            identity: Arc::new(self.session.clone()),
            balance: Arc::new(wallet.clone()),
            observer: Some(observer.clone()),
        };
        Harness {
            flow: FlowController::new(self.config, ports),
            device,
            decoder,
            gateway,
            authenticator,
            session: self.session,
            wallet,
            observer,
        }
    }
}
