//! Cadence sources for the [`TransmissionScheduler`](super::TransmissionScheduler).
//!
//! A [`TriggerSource`] decides when the next image is sent. The scheduler
//! never polls a trigger while a send is in progress, so whatever the trigger
//! would have produced during a send either waits (manual) or is dropped
//! (timed).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tracing::debug;

use super::SchedulerState;

/// Produces the instants at which the scheduler sends an image.
#[async_trait]
pub trait TriggerSource: Send {
    /// State the scheduler reports while driven by this trigger.
    fn mode(&self) -> SchedulerState;

    /// Wait for the next send. Returns `false` once the trigger is exhausted.
    ///
    /// Implementations must be cancellation-safe.
    async fn next(&mut self) -> bool;
}

/// Create a trigger fired by user action and the handle that fires it.
///
/// # Examples
///
/// ```
/// use stillframe::scheduler::manual;
///
/// let (_trigger, handle) = manual();
/// assert!(handle.trigger());
/// assert!(!handle.trigger(), "one trigger already pending");
/// ```
#[must_use]
pub fn manual() -> (ManualTrigger, TriggerHandle) {
    let (tx, rx) = mpsc::channel(1);
    (ManualTrigger { rx }, TriggerHandle { tx })
}

/// Trigger that fires once per [`TriggerHandle::trigger`] call.
#[derive(Debug)]
pub struct ManualTrigger {
    rx: mpsc::Receiver<()>,
}

/// Cloneable handle used to request a manual send.
#[derive(Clone, Debug)]
pub struct TriggerHandle {
    tx: mpsc::Sender<()>,
}

impl TriggerHandle {
    /// Request a send.
    ///
    /// Returns `false` when a request is already pending or the scheduler has
    /// stopped; the request is then dropped.
    #[must_use = "a dropped request is reported through the return value"]
    pub fn trigger(&self) -> bool { self.tx.try_send(()).is_ok() }
}

#[async_trait]
impl TriggerSource for ManualTrigger {
    fn mode(&self) -> SchedulerState { SchedulerState::Manual }

    async fn next(&mut self) -> bool { self.rx.recv().await.is_some() }
}

/// Alternating active and sleeping phases for timed mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyCycle {
    /// How long ticks fire before the trigger sleeps.
    pub active: Duration,
    /// How long the trigger sleeps before the next active phase.
    pub sleep: Duration,
}

/// Periodic trigger.
///
/// Ticks that fall due while a send is in progress are skipped rather than
/// queued. The first tick fires immediately.
#[derive(Debug)]
pub struct IntervalTrigger {
    interval: Interval,
    duty: Option<DutyCycle>,
    active_until: Option<Instant>,
    started: bool,
}

impl IntervalTrigger {
    /// Fire every `period`, optionally gated by a duty cycle.
    ///
    /// A zero `period` is raised to one millisecond.
    #[must_use]
    pub fn new(period: Duration, duty: Option<DutyCycle>) -> Self {
        let mut interval = time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            duty,
            active_until: None,
            started: false,
        }
    }

    async fn wait_for_active_phase(&mut self, now: Instant) {
        let Some(duty) = self.duty else { return };
        let until = *self.active_until.get_or_insert(now + duty.active);
        if now < until {
            return;
        }
        debug!(sleep = ?duty.sleep, "duty cycle sleeping");
        time::sleep(duty.sleep).await;
        self.interval.reset_immediately();
        self.active_until = Some(Instant::now() + duty.active);
    }
}

#[async_trait]
impl TriggerSource for IntervalTrigger {
    fn mode(&self) -> SchedulerState { SchedulerState::Timed }

    async fn next(&mut self) -> bool {
        let resumed = Instant::now();
        self.wait_for_active_phase(resumed).await;
        loop {
            let due = self.interval.tick().await;
            if !self.started || due >= resumed {
                self.started = true;
                return true;
            }
            debug!(late_by = ?resumed.saturating_duration_since(due), "tick skipped during send");
        }
    }
}

/// Trigger that fires again as soon as the previous send finishes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContinuousTrigger;

#[async_trait]
impl TriggerSource for ContinuousTrigger {
    fn mode(&self) -> SchedulerState { SchedulerState::Continuous }

    async fn next(&mut self) -> bool {
        tokio::task::yield_now().await;
        true
    }
}
