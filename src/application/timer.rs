use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What a tick asks of its timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerControl {
    Continue,
    Stop,
}

/// A repeating timer driving an async tick on the runtime.
///
/// The timer is owned by whoever started it and is cancelled when dropped.
/// The first tick fires immediately.
#[derive(Debug)]
pub struct RepeatingTimer {
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTimer {
    pub fn start<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TimerControl> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tick().await == TimerControl::Stop {
                    break;
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let timer = RepeatingTimer::start(Duration::from_millis(300), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    TimerControl::Stop
                } else {
                    TimerControl::Continue
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_further_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut timer = RepeatingTimer::start(Duration::from_millis(300), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TimerControl::Continue
            }
        });

        tokio::time::sleep(Duration::from_millis(650)).await;
        timer.cancel();
        let seen = ticks.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let timer = RepeatingTimer::start(Duration::from_millis(300), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TimerControl::Continue
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(timer);
        let seen = ticks.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }
}
