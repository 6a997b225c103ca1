//! The payment initiation state machine.
//!
//! ```text
//! SelectMethod -> {Capturing | PasteEntry | KeyEntry} -> ConfirmAmount
//!              -> [StepUp] -> Processing -> Receipt
//! ```
//!
//! `Cancelled` is reachable from every non-terminal state. A failed
//! submission returns to `ConfirmAmount` with the failure attached so the
//! operator can retry. Each state owns its resources: only `Capturing` holds a
//! capture session, and every transition out of it stops the session.

use super::capture::{CaptureEvent, CaptureEvents, CaptureSession, CaptureSlot};
use super::gate::StepUpGate;
use super::submitter::{PaymentSubmitter, PendingSubmission};
use super::view::{FlowView, project};
use crate::config::FlowConfig;
use crate::domain::intent::PaymentIntent;
use crate::domain::money::Amount;
use crate::domain::ports::{
    BalanceSourceRef, CaptureDeviceRef, DecoderRef, FlowObserverRef, IdentityStoreRef,
    PaymentGatewayRef, StepUpAuthenticatorRef,
};
use crate::domain::receipt::Receipt;
use crate::domain::target::{EntryMethod, InputResolver, PaymentTarget};
use crate::error::{FlowError, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Camera and decoder for the capture path, plus the slot that keeps the
/// camera to one session.
#[derive(Clone)]
pub struct CapturePorts {
    pub device: CaptureDeviceRef,
    pub decoder: DecoderRef,
    pub slot: CaptureSlot,
}

impl CapturePorts {
    pub fn new(device: CaptureDeviceRef, decoder: DecoderRef) -> Self {
        Self {
            device,
            decoder,
            slot: CaptureSlot::new(),
        }
    }
}

/// Everything the flow needs from the outside world.
#[derive(Clone)]
pub struct FlowPorts {
    /// `None` on hosts without a camera; capturing then fails with
    /// `DeviceUnavailable`.
    pub capture: Option<CapturePorts>,
    pub gateway: PaymentGatewayRef,
    pub authenticator: StepUpAuthenticatorRef,
    pub identity: IdentityStoreRef,
    pub balance: BalanceSourceRef,
    pub observer: Option<FlowObserverRef>,
}

#[derive(Debug)]
pub struct CaptureStep {
    pub(crate) session: Option<CaptureSession>,
    pub(crate) events: Option<CaptureEvents>,
    pub error: Option<FlowError>,
}

impl CaptureStep {
    pub fn is_scanning(&self) -> bool {
        self.session.as_ref().is_some_and(CaptureSession::is_active)
    }

    /// Whether the operator may try capturing again from here.
    pub fn can_retry(&self) -> bool {
        !self.is_scanning() && self.error.as_ref().is_none_or(FlowError::is_retryable)
    }
}

#[derive(Debug)]
pub struct ConfirmStep {
    pub target: PaymentTarget,
    /// Kept after a failed attempt so a retry of the same payment reuses its
    /// idempotency key.
    pub intent: Option<PaymentIntent>,
    pub error: Option<FlowError>,
}

#[derive(Debug)]
pub enum FlowState {
    SelectMethod,
    Capturing(CaptureStep),
    PasteEntry {
        error: Option<FlowError>,
    },
    KeyEntry {
        error: Option<FlowError>,
    },
    ConfirmAmount(ConfirmStep),
    StepUp {
        intent: PaymentIntent,
    },
    Processing {
        intent: PaymentIntent,
        pending: PendingSubmission,
    },
    Receipt {
        receipt: Receipt,
    },
    Cancelled,
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::SelectMethod => "select method",
            FlowState::Capturing(_) => "capturing",
            FlowState::PasteEntry { .. } => "paste entry",
            FlowState::KeyEntry { .. } => "key entry",
            FlowState::ConfirmAmount(_) => "confirm amount",
            FlowState::StepUp { .. } => "step-up",
            FlowState::Processing { .. } => "processing",
            FlowState::Receipt { .. } => "receipt",
            FlowState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Receipt { .. } | FlowState::Cancelled)
    }

    /// The error surfaced inline by the current state, if any.
    pub fn error(&self) -> Option<&FlowError> {
        match self {
            FlowState::Capturing(step) => step.error.as_ref(),
            FlowState::PasteEntry { error } | FlowState::KeyEntry { error } => error.as_ref(),
            FlowState::ConfirmAmount(step) => step.error.as_ref(),
            _ => None,
        }
    }
}

/// Sequences target entry, amount validation, step-up, submission and the
/// receipt for a single payment.
///
/// Every operation is legal only in specific states and answers
/// `InvalidTransition` elsewhere. Errors produced by a state are both stored
/// in that state, for display, and returned.
pub struct FlowController {
    state: FlowState,
    config: FlowConfig,
    resolver: InputResolver,
    gate: StepUpGate,
    submitter: PaymentSubmitter,
    ports: FlowPorts,
}

impl FlowController {
    pub fn new(config: FlowConfig, ports: FlowPorts) -> Self {
        let resolver = InputResolver::new(config.display_len);
        let gate = StepUpGate::new(config.step_up_threshold, ports.authenticator.clone());
        let submitter = PaymentSubmitter::new(ports.gateway.clone(), ports.identity.clone());
        Self {
            state: FlowState::SelectMethod,
            config,
            resolver,
            gate,
            submitter,
            ports,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn view(&self) -> FlowView {
        project(&self.state, &self.config)
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match &self.state {
            FlowState::Receipt { receipt } => Some(receipt),
            _ => None,
        }
    }

    /// Enters the entry state for `method`.
    ///
    /// Legal from `SelectMethod` and from any entry state, so the operator can
    /// fall back from capturing to typing. An active capture is stopped first.
    pub async fn choose_method(&mut self, method: EntryMethod) -> Result<()> {
        if !matches!(
            self.state,
            FlowState::SelectMethod
                | FlowState::Capturing(_)
                | FlowState::PasteEntry { .. }
                | FlowState::KeyEntry { .. }
        ) {
            return Err(self.illegal("choose an entry method"));
        }
        match method {
            EntryMethod::CapturedCode => {
                if let FlowState::Capturing(step) = &self.state
                    && let Some(err) = step.error.as_ref().filter(|err| !err.is_retryable())
                {
                    return Err(err.clone());
                }
                self.release_capture();
                self.start_capture().await
            }
            EntryMethod::PastedCode => {
                self.transition(FlowState::PasteEntry { error: None });
                Ok(())
            }
            EntryMethod::TypedKey => {
                self.transition(FlowState::KeyEntry { error: None });
                Ok(())
            }
        }
    }

    /// Restarts capture after a retryable failure such as a refused
    /// permission or a device held by another session. `DeviceUnavailable` is
    /// final: pick another entry method.
    pub async fn retry_capture(&mut self) -> Result<()> {
        let FlowState::Capturing(step) = &self.state else {
            return Err(self.illegal("retry capture"));
        };
        if step.is_scanning() {
            return Err(self.illegal("retry capture"));
        }
        if let Some(err) = step.error.as_ref().filter(|err| !err.is_retryable()) {
            return Err(err.clone());
        }
        self.release_capture();
        self.start_capture().await
    }

    async fn start_capture(&mut self) -> Result<()> {
        let started = match &self.ports.capture {
            None => Err(FlowError::DeviceUnavailable),
            Some(capture) => CaptureSession::start(
                capture.device.as_ref(),
                capture.decoder.clone(),
                &capture.slot,
                self.config.capture,
                self.config.poll_interval,
            )
            .await
            .map_err(FlowError::from),
        };

        let (step, outcome) = match started {
            Ok((session, events)) => (
                CaptureStep {
                    session: Some(session),
                    events: Some(events),
                    error: None,
                },
                Ok(()),
            ),
            Err(err) => {
                warn!(error = %err, "could not start capture");
                (
                    CaptureStep {
                        session: None,
                        events: None,
                        error: Some(err.clone()),
                    },
                    Err(err),
                )
            }
        };
        if matches!(self.state, FlowState::Capturing(_)) {
            self.state = FlowState::Capturing(step);
        } else {
            self.transition(FlowState::Capturing(step));
        }
        outcome
    }

    /// Waits for the capture session to report, then resolves the recognized
    /// code into a target.
    pub async fn next_capture_event(&mut self) -> Result<()> {
        let FlowState::Capturing(CaptureStep {
            events: Some(events),
            ..
        }) = &mut self.state
        else {
            return Err(self.illegal("wait for a captured code"));
        };

        match events.recv().await {
            Some(CaptureEvent::Recognized(code)) => {
                self.enter_confirm(EntryMethod::CapturedCode, &code)
            }
            Some(CaptureEvent::Failed(err)) => Err(self.fail_capture(err.into())),
            None => Err(self.fail_capture(FlowError::DeviceUnavailable)),
        }
    }

    /// Submits the text typed or pasted in the current entry state.
    pub fn submit_entry(&mut self, input: &str) -> Result<()> {
        let method = match self.state {
            FlowState::PasteEntry { .. } => EntryMethod::PastedCode,
            FlowState::KeyEntry { .. } => EntryMethod::TypedKey,
            _ => return Err(self.illegal("submit an entry")),
        };
        self.enter_confirm(method, input)
    }

    fn enter_confirm(&mut self, method: EntryMethod, input: &str) -> Result<()> {
        match self.resolver.resolve(method, input) {
            Ok(target) => {
                info!(method = %method, target = %target.display_value(), "target resolved");
                self.transition(FlowState::ConfirmAmount(ConfirmStep {
                    target,
                    intent: None,
                    error: None,
                }));
                Ok(())
            }
            Err(err) => {
                match &mut self.state {
                    FlowState::PasteEntry { error } | FlowState::KeyEntry { error } => {
                        *error = Some(err.clone());
                    }
                    FlowState::Capturing(step) => step.error = Some(err.clone()),
                    _ => {}
                }
                Err(err)
            }
        }
    }

    /// Validates the amount against a fresh balance and moves on to step-up,
    /// or straight to submission when the amount is at or below the
    /// threshold.
    pub async fn confirm_amount(&mut self, input: &str) -> Result<()> {
        if !matches!(self.state, FlowState::ConfirmAmount(_)) {
            return Err(self.illegal("confirm an amount"));
        }
        let amount = match self.validate_amount(input).await {
            Ok(amount) => amount,
            Err(err) => {
                debug!(error = %err, "amount rejected");
                if let FlowState::ConfirmAmount(step) = &mut self.state {
                    step.error = Some(err.clone());
                }
                return Err(err);
            }
        };

        let step = match self.take_state() {
            FlowState::ConfirmAmount(step) => step,
            other => {
                self.state = other;
                return Err(self.illegal("confirm an amount"));
            }
        };
        let mut intent = match step.intent {
            Some(previous) if previous.is_same_payment(&step.target, amount) => previous,
            _ => PaymentIntent::new(step.target, amount, self.config.currency),
        };

        if self.gate.requires(amount) {
            if let Err(err) = intent.await_step_up() {
                return Err(self.back_to_confirm(intent, err));
            }
            self.transition(FlowState::StepUp { intent });
            Ok(())
        } else {
            self.submit(intent).await
        }
    }

    async fn validate_amount(&self, input: &str) -> Result<Amount> {
        let amount = Amount::parse(input, self.config.currency)?;
        let available = self.ports.balance.available_balance().await;
        if !available.covers(amount) {
            return Err(FlowError::InsufficientBalance);
        }
        Ok(amount)
    }

    /// Presents the step-up challenge. A pass submits the payment; anything
    /// else returns to `ConfirmAmount` with `StepUpFailed` and nothing sent.
    pub async fn complete_step_up(&mut self) -> Result<()> {
        let outcome = match &self.state {
            FlowState::StepUp { intent } => self.gate.challenge(intent).await,
            _ => return Err(self.illegal("complete step-up")),
        };
        let mut intent = match self.take_state() {
            FlowState::StepUp { intent } => intent,
            other => {
                self.state = other;
                return Err(self.illegal("complete step-up"));
            }
        };
        match outcome {
            Ok(()) => self.submit(intent).await,
            Err(err) => {
                let err = intent.step_up_rejected().err().unwrap_or(err);
                Err(self.back_to_confirm(intent, err))
            }
        }
    }

    /// Resolves the sender and re-reads the balance before the intent counts
    /// an attempt, so a refusal here leaves its status and attempts untouched.
    async fn submit(&mut self, mut intent: PaymentIntent) -> Result<()> {
        let request = match self.submitter.prepare(&intent).await {
            Ok(request) => request,
            Err(err) => return Err(self.back_to_confirm(intent, err)),
        };
        let available = self.ports.balance.available_balance().await;
        if let Err(err) = intent.begin_submission(available) {
            return Err(self.back_to_confirm(intent, err));
        }
        let pending = self.submitter.dispatch(request);
        self.transition(FlowState::Processing { intent, pending });
        Ok(())
    }

    /// Waits for the in-flight submission and moves to `Receipt`, or back to
    /// `ConfirmAmount` with the failure attached.
    pub async fn await_outcome(&mut self) -> Result<()> {
        let FlowState::Processing { pending, .. } = &mut self.state else {
            return Err(self.illegal("await the submission"));
        };
        let outcome = pending.wait().await;
        let mut intent = match self.take_state() {
            FlowState::Processing { intent, .. } => intent,
            other => {
                self.state = other;
                return Err(self.illegal("await the submission"));
            }
        };

        let confirmed = match outcome {
            Ok(confirmation) => intent
                .mark_submitted(confirmation.reference_id)
                .and_then(|()| Receipt::from_intent(&intent, Utc::now())),
            Err(err) => Err(intent.mark_failed().err().unwrap_or(err)),
        };
        match confirmed {
            Ok(receipt) => {
                info!(reference_id = %receipt.reference_id, "payment completed");
                if let Some(observer) = &self.ports.observer {
                    observer.on_completed(&receipt);
                }
                self.transition(FlowState::Receipt { receipt });
                Ok(())
            }
            Err(err) => Err(self.back_to_confirm(intent, err)),
        }
    }

    /// Steps back one screen.
    ///
    /// Entry states and `ConfirmAmount` return to `SelectMethod`. `StepUp`
    /// discards the intent and returns to `ConfirmAmount`.
    pub fn back(&mut self) -> Result<()> {
        match &self.state {
            FlowState::Capturing(_)
            | FlowState::PasteEntry { .. }
            | FlowState::KeyEntry { .. }
            | FlowState::ConfirmAmount(_) => {
                self.transition(FlowState::SelectMethod);
                Ok(())
            }
            FlowState::StepUp { intent } => {
                let target = intent.target().clone();
                self.transition(FlowState::ConfirmAmount(ConfirmStep {
                    target,
                    intent: None,
                    error: None,
                }));
                Ok(())
            }
            _ => Err(self.illegal("go back")),
        }
    }

    /// Abandons the flow.
    ///
    /// Any capture is stopped before this returns. An in-flight submission
    /// cannot be recalled; it keeps running and its result is ignored.
    pub fn cancel(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.illegal("cancel"));
        }
        if matches!(self.state, FlowState::Processing { .. }) {
            warn!("cancelled with a submission in flight; its result will be ignored");
        }
        self.transition(FlowState::Cancelled);
        if let Some(observer) = &self.ports.observer {
            observer.on_cancelled();
        }
        Ok(())
    }

    fn fail_capture(&mut self, err: FlowError) -> FlowError {
        self.release_capture();
        if let FlowState::Capturing(step) = &mut self.state {
            step.error = Some(err.clone());
        }
        err
    }

    fn release_capture(&mut self) {
        if let FlowState::Capturing(step) = &mut self.state {
            if let Some(mut session) = step.session.take() {
                session.stop();
            }
            step.events = None;
        }
    }

    fn back_to_confirm(&mut self, intent: PaymentIntent, err: FlowError) -> FlowError {
        warn!(error = %err, attempts = intent.attempts(), "payment returned to confirmation");
        self.transition(FlowState::ConfirmAmount(ConfirmStep {
            target: intent.target().clone(),
            intent: Some(intent),
            error: Some(err.clone()),
        }));
        err
    }

    /// Moves the state out for a consuming transition. The placeholder never
    /// outlives the calling operation.
    fn take_state(&mut self) -> FlowState {
        std::mem::replace(&mut self.state, FlowState::SelectMethod)
    }

    fn transition(&mut self, next: FlowState) {
        self.release_capture();
        let from = self.state.name();
        self.state = next;
        info!(from, to = self.state.name(), "flow transition");
    }

    fn illegal(&self, action: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            state: self.state.name(),
            action,
        }
    }
}
