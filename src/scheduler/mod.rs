//! Sender-side transmission scheduler.
//!
//! [`TransmissionScheduler`] turns trigger events into image sends. Each
//! trigger pulls one image from an [`ImageSource`], encodes it, and writes the
//! whole session over a fresh connection before the next trigger is awaited,
//! so sessions never interleave. The scheduler's state is published on a
//! [`watch`] channel:
//!
//! ```text
//! Idle ──run──▶ Manual | Timed | Continuous ──shutdown/exhausted──▶ Stopping ──▶ Idle
//! ```

pub mod error;
pub mod link;
pub mod source;
pub mod trigger;

pub use error::{SchedulerError, SendError, SourceError};
use leaky_bucket::RateLimiter;
pub use link::{Connector, SendOutcome, TcpConnector, send_session};
pub use source::{DirectorySource, FileSource, ImageSource, SourceImage, StaticSource};
use tokio::{
    select,
    sync::watch,
    time::{self, Duration},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
pub use trigger::{
    ContinuousTrigger,
    DutyCycle,
    IntervalTrigger,
    ManualTrigger,
    TriggerHandle,
    TriggerSource,
    manual,
};

use crate::{
    config::SenderConfig,
    encoder::FrameEncoder,
    metrics,
    session::TransmitterId,
    transport::Handshake,
};

/// Observable scheduler state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not running.
    #[default]
    Idle,
    /// Waiting for manual triggers.
    Manual,
    /// Sending on a timer.
    Timed,
    /// Sending back to back.
    Continuous,
    /// Winding down after shutdown, trigger close or source exhaustion.
    Stopping,
}

/// Counters reported when [`TransmissionScheduler::run`] returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    /// Triggers that started a send.
    pub triggers: usize,
    /// Images written completely.
    pub sent: usize,
    /// Sends that failed.
    pub failed: usize,
    /// Sends interrupted by shutdown.
    pub cancelled: usize,
    /// Frames written across all sends.
    pub frames: usize,
    /// Whether the image source ran dry.
    pub exhausted: bool,
}

enum Step {
    Sent(usize),
    Cancelled,
    Exhausted,
}

/// Drives image sends from a trigger.
pub struct TransmissionScheduler<S, C> {
    transmitter: TransmitterId,
    config: SenderConfig,
    encoder: FrameEncoder,
    source: S,
    connector: C,
    limiter: Option<RateLimiter>,
    state: watch::Sender<SchedulerState>,
}

impl<S, C> TransmissionScheduler<S, C>
where
    S: ImageSource,
    C: Connector,
{
    /// Create a scheduler sending images from `source` through `connector`.
    #[must_use]
    pub fn new(transmitter: TransmitterId, config: SenderConfig, source: S, connector: C) -> Self {
        let limiter = config.frames_per_second.map(|fps| {
            let r = usize::try_from(fps.get()).unwrap_or(usize::MAX);
            RateLimiter::builder()
                .initial(r)
                .refill(r)
                .interval(Duration::from_secs(1))
                .max(r)
                .build()
        });
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            transmitter,
            encoder: FrameEncoder::new(config.chunk_size, config.grid_policy),
            config,
            source,
            connector,
            limiter,
            state,
        }
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> { self.state.subscribe() }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SchedulerState { *self.state.borrow() }

    /// Send images whenever `trigger` fires until `shutdown` is cancelled,
    /// the trigger closes, or the source is exhausted.
    ///
    /// A send in progress when `shutdown` fires stops before its next frame.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::TooManyFailures`] when
    /// `max_consecutive_failures` is configured and reached.
    pub async fn run<T>(
        &mut self,
        mut trigger: T,
        shutdown: CancellationToken,
    ) -> Result<SchedulerSummary, SchedulerError>
    where
        T: TriggerSource,
    {
        let mode = trigger.mode();
        self.state.send_replace(mode);
        info!(transmitter = %self.transmitter, ?mode, "scheduler started");

        let mut summary = SchedulerSummary::default();
        let mut failures = 0_u32;
        let result = loop {
            let fired = select! {
                biased;
                () = shutdown.cancelled() => false,
                fired = trigger.next() => fired,
            };
            if !fired {
                break Ok(());
            }

            summary.triggers += 1;
            match self.send_next(&shutdown).await {
                Ok(Step::Sent(frames)) => {
                    summary.sent += 1;
                    summary.frames += frames;
                    failures = 0;
                }
                Ok(Step::Cancelled) => {
                    summary.cancelled += 1;
                    break Ok(());
                }
                Ok(Step::Exhausted) => {
                    summary.exhausted = true;
                    break Ok(());
                }
                Err(err) => {
                    summary.failed += 1;
                    failures = failures.saturating_add(1);
                    metrics::inc_send_failures();
                    warn!(transmitter = %self.transmitter, error = %err, "send failed");
                    if self
                        .config
                        .max_consecutive_failures
                        .is_some_and(|max| failures >= max.get())
                    {
                        break Err(SchedulerError::TooManyFailures {
                            count: failures,
                            last: err,
                        });
                    }
                }
            }
        };

        self.state.send_replace(SchedulerState::Stopping);
        info!(transmitter = %self.transmitter, ?summary, "scheduler stopped");
        self.state.send_replace(SchedulerState::Idle);
        result.map(|()| summary)
    }

    /// Pull one image and send it, regardless of any trigger.
    ///
    /// Returns `Ok(None)` when the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if any step of the send fails.
    pub async fn send_once(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<SendOutcome>, SendError> {
        let Some(image) = self.source.next_image().await? else {
            return Ok(None);
        };
        let (name, bytes) = image.into_parts();
        let sequence = self.encoder.encode(bytes)?;
        let handshake = Handshake::new(
            self.transmitter.clone(),
            &name,
            sequence.params(),
            sequence.grid(),
        )?;

        let stream = time::timeout(self.config.connect_timeout, self.connector.connect())
            .await
            .map_err(|_| SendError::ConnectTimeout)?
            .map_err(SendError::Connect)?;
        let outcome = send_session(
            stream,
            &handshake,
            sequence,
            self.limiter.as_ref(),
            cancel,
        )
        .await?;
        info!(
            transmitter = %self.transmitter,
            image = handshake.image_name(),
            ?outcome,
            "image send finished"
        );
        Ok(Some(outcome))
    }

    async fn send_next(&mut self, cancel: &CancellationToken) -> Result<Step, SendError> {
        Ok(match self.send_once(cancel).await? {
            None => Step::Exhausted,
            Some(SendOutcome::Sent { frames }) => Step::Sent(frames),
            Some(SendOutcome::Cancelled { .. }) => Step::Cancelled,
        })
    }
}

impl<S, C> std::fmt::Debug for TransmissionScheduler<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmissionScheduler")
            .field("transmitter", &self.transmitter)
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
