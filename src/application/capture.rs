//! Live capture of optical payment codes.
//!
//! A [`CaptureSession`] owns an acquired video stream and a repeating timer
//! that samples frames and hands them to the decoder. The session reports
//! through a channel of [`CaptureEvent`]s: at most one recognized code per
//! session, and nothing at all once it has been stopped.

use super::timer::{RepeatingTimer, TimerControl};
use crate::domain::ports::{
    CaptureConstraints, CaptureDevice, DecoderRef, FacingMode, Frame, VideoStream,
};
use crate::error::CaptureError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A payment code was recognized. The session has already stopped.
    Recognized(String),
    /// The stream failed mid-session. The session has already stopped.
    Failed(CaptureError),
}

pub type CaptureEvents = mpsc::UnboundedReceiver<CaptureEvent>;

/// Token guarding the capture device: at most one session holds it.
///
/// Share one slot across every flow that may capture.
#[derive(Debug, Clone, Default)]
pub struct CaptureSlot {
    held: Arc<AtomicBool>,
}

impl CaptureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    fn try_claim(&self) -> Option<SlotClaim> {
        self.held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SlotClaim {
                held: Arc::clone(&self.held),
            })
    }
}

struct SlotClaim {
    held: Arc<AtomicBool>,
}

impl Drop for SlotClaim {
    fn drop(&mut self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

struct SessionInner {
    stream: Option<Box<dyn VideoStream>>,
    frame: Option<Frame>,
    events: Option<mpsc::UnboundedSender<CaptureEvent>>,
    claim: Option<SlotClaim>,
}

type Shared = Arc<Mutex<SessionInner>>;

fn lock(shared: &Shared) -> MutexGuard<'_, SessionInner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the device and closes the event channel, reporting `event` first
/// if given. Returns false if the session had already shut down.
///
/// The check, the release and the report happen under one lock, so a report
/// can never follow a stop.
fn shut_down(shared: &Shared, event: Option<CaptureEvent>) -> bool {
    let mut inner = lock(shared);
    let Some(mut stream) = inner.stream.take() else {
        return false;
    };
    stream.release();
    inner.frame = None;
    inner.claim = None;
    if let (Some(events), Some(event)) = (inner.events.take(), event) {
        let _ = events.send(event);
    }
    true
}

/// An active capture of the device.
pub struct CaptureSession {
    shared: Shared,
    timer: Option<RepeatingTimer>,
}

impl CaptureSession {
    /// Acquires the device and starts sampling frames every `poll_interval`.
    ///
    /// The rear camera is preferred; if it can't be had, any camera is tried
    /// once before giving up. A refused permission is never retried.
    pub async fn start(
        device: &dyn CaptureDevice,
        decoder: DecoderRef,
        slot: &CaptureSlot,
        constraints: CaptureConstraints,
        poll_interval: Duration,
    ) -> Result<(Self, CaptureEvents), CaptureError> {
        let Some(claim) = slot.try_claim() else {
            warn!("capture device is held by another session");
            return Err(CaptureError::DeviceBusy);
        };

        let stream = match device.acquire(&constraints).await {
            Err(CaptureError::DeviceUnavailable) if constraints.facing == FacingMode::Rear => {
                debug!("rear camera unavailable, trying any camera");
                let fallback = CaptureConstraints {
                    facing: FacingMode::Any,
                    ..constraints
                };
                device.acquire(&fallback).await
            }
            other => other,
        }?;

        let frame = Frame::blank(stream.resolution());
        let (tx, rx) = mpsc::unbounded_channel();
        let shared: Shared = Arc::new(Mutex::new(SessionInner {
            stream: Some(stream),
            frame: Some(frame),
            events: Some(tx),
            claim: Some(claim),
        }));

        let tick_shared = Arc::clone(&shared);
        let timer = RepeatingTimer::start(poll_interval, move || {
            let shared = Arc::clone(&tick_shared);
            let decoder = Arc::clone(&decoder);
            async move { poll_once(&shared, decoder).await }
        });

        info!(interval_ms = poll_interval.as_millis() as u64, "capture session started");
        Ok((
            Self {
                shared,
                timer: Some(timer),
            },
            rx,
        ))
    }

    pub fn is_active(&self) -> bool {
        lock(&self.shared).stream.is_some()
    }

    /// Cancels the timer and releases the device. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
        if shut_down(&self.shared, None) {
            info!("capture session stopped");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("active", &self.is_active())
            .finish()
    }
}

async fn poll_once(shared: &Shared, decoder: DecoderRef) -> TimerControl {
    let read = {
        let mut guard = lock(shared);
        let inner = &mut *guard;
        let Some(stream) = inner.stream.as_mut() else {
            return TimerControl::Stop;
        };
        if !stream.is_ready() {
            return TimerControl::Continue;
        }
        let Some(mut frame) = inner.frame.take() else {
            return TimerControl::Continue;
        };
        match stream.read_frame(&mut frame) {
            Ok(()) => Ok(frame),
            Err(err) => {
                inner.frame = Some(frame);
                Err(err)
            }
        }
    };
    let frame = match read {
        Ok(frame) => frame,
        Err(err) => return fail(shared, err),
    };

    let decoded = decoder.decode(&frame).await;

    {
        let mut inner = lock(shared);
        if inner.stream.is_none() {
            return TimerControl::Stop;
        }
        inner.frame = Some(frame);
    }

    match decoded {
        Some(code) if !code.trim().is_empty() => {
            if shut_down(shared, Some(CaptureEvent::Recognized(code))) {
                info!("payment code recognized");
            }
            TimerControl::Stop
        }
        _ => TimerControl::Continue,
    }
}

fn fail(shared: &Shared, err: CaptureError) -> TimerControl {
    if shut_down(shared, Some(CaptureEvent::Failed(err))) {
        warn!(error = %err, "capture stream failed");
    }
    TimerControl::Stop
}
