//! Tests for triggers, sources, and the scheduler loop.

use std::{
    io,
    num::NonZeroU32,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use rstest::{fixture, rstest};
use tokio::{
    io::{AsyncReadExt, AsyncWrite, DuplexStream},
    sync::mpsc,
    time::{self, Duration, Instant},
};
use tokio_util::{codec::Decoder, sync::CancellationToken};
use tracing_test::traced_test;

use super::{
    Connector,
    ContinuousTrigger,
    DirectorySource,
    DutyCycle,
    FileSource,
    ImageSource,
    IntervalTrigger,
    SchedulerError,
    SchedulerState,
    SendOutcome,
    SourceImage,
    StaticSource,
    TransmissionScheduler,
    manual,
    send_session,
};
use crate::{
    config::SenderConfig,
    encoder::FrameEncoder,
    frame::Frame,
    session::TransmitterId,
    transport::{FrameCodec, HANDSHAKE_LEN, Handshake},
};

/// Connector backed by in-memory pipes that records when each connect starts.
#[derive(Clone)]
struct RecordingConnector {
    connects: Arc<Mutex<Vec<Instant>>>,
    delay: Duration,
    refuse: bool,
    received: mpsc::UnboundedSender<Vec<u8>>,
}

impl RecordingConnector {
    fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                connects: Arc::default(),
                delay,
                refuse: false,
                received: tx,
            },
            rx,
        )
    }

    fn refusing() -> Self {
        let (mut connector, _) = Self::new(Duration::ZERO);
        connector.refuse = true;
        connector
    }

    fn connect_offsets(&self, start: Instant) -> Vec<Duration> {
        self.connects
            .lock()
            .expect("connect log")
            .iter()
            .map(|t| t.duration_since(start))
            .collect()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    type Stream = DuplexStream;

    async fn connect(&self) -> io::Result<DuplexStream> {
        self.connects.lock().expect("connect log").push(Instant::now());
        if self.refuse {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        time::sleep(self.delay).await;
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let tx = self.received.clone();
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = server.read_to_end(&mut buf).await;
            let _ = tx.send(buf);
        });
        Ok(client)
    }
}

fn split_session(bytes: &[u8]) -> (Handshake, Vec<Frame>) {
    let handshake = Handshake::decode(&bytes[..HANDSHAKE_LEN]).expect("handshake");
    let mut codec = FrameCodec::new(handshake.params());
    let mut rest = BytesMut::from(&bytes[HANDSHAKE_LEN..]);
    let mut frames = Vec::new();
    while let Some(frame) = codec.decode_eof(&mut rest).expect("frame") {
        frames.push(frame);
    }
    (handshake, frames)
}

fn image(name: &str, len: usize) -> SourceImage {
    SourceImage::new(
        name,
        (0..len)
            .map(|i| u8::try_from(i % 256).expect("fits"))
            .collect::<Vec<_>>(),
    )
}

#[fixture]
fn transmitter() -> TransmitterId { TransmitterId::new("TX1").expect("id") }

#[rstest]
#[tokio::test(start_paused = true)]
async fn timed_mode_skips_ticks_that_fall_during_a_send(transmitter: TransmitterId) {
    let (connector, _rx) = RecordingConnector::new(Duration::from_millis(2500));
    let probe = connector.clone();
    let start = Instant::now();
    let mut scheduler = TransmissionScheduler::new(
        transmitter,
        SenderConfig::default(),
        StaticSource::cycling([image("a.jpg", 250)]),
        connector,
    );
    let trigger = IntervalTrigger::new(Duration::from_secs(1), None);
    let shutdown = CancellationToken::new();

    let run = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { scheduler.run(trigger, shutdown).await }
    });
    time::sleep(Duration::from_secs(7)).await;
    shutdown.cancel();
    let summary = run.await.expect("join").expect("run");

    assert_eq!(
        probe.connect_offsets(start),
        vec![
            Duration::ZERO,
            Duration::from_secs(3),
            Duration::from_secs(6)
        ]
    );
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.cancelled, 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn duty_cycle_sleeps_between_active_phases(transmitter: TransmitterId) {
    let (connector, _rx) = RecordingConnector::new(Duration::ZERO);
    let probe = connector.clone();
    let start = Instant::now();
    let mut scheduler = TransmissionScheduler::new(
        transmitter,
        SenderConfig::default(),
        StaticSource::cycling([image("a.jpg", 90)]),
        connector,
    );
    let duty = DutyCycle {
        active: Duration::from_secs(2),
        sleep: Duration::from_secs(10),
    };
    let trigger = IntervalTrigger::new(Duration::from_secs(1), Some(duty));
    let shutdown = CancellationToken::new();

    let run = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { scheduler.run(trigger, shutdown).await }
    });
    time::sleep(Duration::from_millis(13_500)).await;
    shutdown.cancel();
    run.await.expect("join").expect("run");

    let secs: Vec<u64> = probe
        .connect_offsets(start)
        .iter()
        .map(Duration::as_secs)
        .collect();
    assert_eq!(secs, vec![0, 1, 2, 12, 13]);
}

#[test]
fn manual_trigger_reports_pending_requests() {
    let (trigger, handle) = manual();
    assert!(handle.trigger());
    assert!(!handle.trigger(), "second request while one is pending");
    drop(trigger);
    assert!(!handle.trigger(), "scheduler gone");
}

#[rstest]
#[tokio::test]
async fn manual_mode_sends_one_image_per_trigger(transmitter: TransmitterId) {
    let (connector, mut received) = RecordingConnector::new(Duration::ZERO);
    let mut scheduler = TransmissionScheduler::new(
        transmitter.clone(),
        SenderConfig::default(),
        StaticSource::new([image("one.jpg", 250), image("two.jpg", 10)]),
        connector,
    );
    let states = scheduler.subscribe();
    let (trigger, handle) = manual();
    let run = tokio::spawn(async move {
        scheduler
            .run(trigger, CancellationToken::new())
            .await
            .map(|summary| (summary, scheduler.state()))
    });

    assert!(handle.trigger());
    let (hs, frames) = split_session(&received.recv().await.expect("first image"));
    assert_eq!(hs.transmitter(), &transmitter);
    assert_eq!(hs.image_name(), "one.jpg");
    assert_eq!(frames.len(), 3);
    assert_eq!(*states.borrow(), SchedulerState::Manual);

    assert!(handle.trigger());
    let (hs, frames) = split_session(&received.recv().await.expect("second image"));
    assert_eq!(hs.image_name(), "two.jpg");
    assert_eq!(frames.len(), 1);

    assert!(handle.trigger());
    let (summary, state) = run.await.expect("join").expect("run");
    assert!(summary.exhausted);
    assert_eq!(summary.sent, 2);
    assert_eq!(state, SchedulerState::Idle);
}

#[rstest]
#[tokio::test]
async fn continuous_mode_runs_until_shutdown(transmitter: TransmitterId) {
    let (connector, mut received) = RecordingConnector::new(Duration::ZERO);
    let mut scheduler = TransmissionScheduler::new(
        transmitter,
        SenderConfig::default(),
        StaticSource::cycling([image("loop.jpg", 180)]),
        connector,
    );
    let shutdown = CancellationToken::new();
    let run = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { scheduler.run(ContinuousTrigger, shutdown).await }
    });

    for _ in 0..3 {
        let (_, frames) = split_session(&received.recv().await.expect("image"));
        assert_eq!(frames.len(), 2);
    }
    shutdown.cancel();
    let summary = run.await.expect("join").expect("run");
    assert!(summary.sent >= 3);
    assert!(!summary.exhausted);
}

#[rstest]
#[tokio::test]
async fn consecutive_failures_stop_the_scheduler(transmitter: TransmitterId) {
    let config = SenderConfig::default().with_max_consecutive_failures(NonZeroU32::new(2));
    let mut scheduler = TransmissionScheduler::new(
        transmitter,
        config,
        StaticSource::cycling([image("x.jpg", 100)]),
        RecordingConnector::refusing(),
    );
    let err = scheduler
        .run(ContinuousTrigger, CancellationToken::new())
        .await
        .expect_err("too many failures");
    assert!(matches!(
        err,
        SchedulerError::TooManyFailures { count: 2, .. }
    ));
}

#[rstest]
#[tokio::test]
async fn cancelled_send_stops_before_the_next_frame(transmitter: TransmitterId) {
    let sequence = FrameEncoder::default()
        .encode(Bytes::from(vec![3_u8; 270]))
        .expect("encode");
    let handshake = Handshake::new(transmitter, "c.jpg", sequence.params(), sequence.grid())
        .expect("handshake");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let (client, mut server) = tokio::io::duplex(4096);
    let outcome = send_session(client, &handshake, sequence, None, &cancel)
        .await
        .expect("send");
    assert_eq!(outcome, SendOutcome::Cancelled { sent: 0, total: 3 });

    let mut buf = Vec::new();
    server.read_to_end(&mut buf).await.expect("read");
    assert_eq!(buf.len(), HANDSHAKE_LEN);
}

/// Accepts every write but refuses to close.
struct UnclosableWriter(Vec<u8>);

impl AsyncWrite for UnclosableWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone")))
    }
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn cancelled_send_logs_a_failed_close(transmitter: TransmitterId) {
    let sequence = FrameEncoder::default()
        .encode(Bytes::from(vec![5_u8; 180]))
        .expect("encode");
    let handshake = Handshake::new(transmitter, "d.jpg", sequence.params(), sequence.grid())
        .expect("handshake");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = send_session(UnclosableWriter(Vec::new()), &handshake, sequence, None, &cancel)
        .await
        .expect("cancellation is not a send failure");
    assert_eq!(outcome, SendOutcome::Cancelled { sent: 0, total: 2 });
    assert!(logs_contain("closing cancelled send failed"));
    assert!(logs_contain("peer gone"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn frame_rate_limit_paces_writes(transmitter: TransmitterId) {
    let (connector, mut received) = RecordingConnector::new(Duration::ZERO);
    let config = SenderConfig::default().with_frames_per_second(NonZeroU32::new(10));
    let mut scheduler = TransmissionScheduler::new(
        transmitter,
        config,
        StaticSource::new([image("big.jpg", 30 * 90)]),
        connector,
    );
    let start = Instant::now();
    let outcome = scheduler
        .send_once(&CancellationToken::new())
        .await
        .expect("send")
        .expect("image available");

    assert_eq!(outcome, SendOutcome::Sent { frames: 30 });
    assert!(start.elapsed() >= Duration::from_secs(2));
    let (_, frames) = split_session(&received.recv().await.expect("image"));
    assert_eq!(frames.len(), 30);
}

#[tokio::test]
async fn directory_source_sends_files_in_name_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("b.jpg"), b"second").expect("write b");
    std::fs::write(dir.path().join("a.jpg"), b"first").expect("write a");
    std::fs::create_dir(dir.path().join("nested")).expect("mkdir");

    let mut source = DirectorySource::new(dir.path());
    let first = source.next_image().await.expect("read").expect("a");
    let second = source.next_image().await.expect("read").expect("b");
    assert_eq!((first.name(), first.bytes().as_ref()), ("a.jpg", &b"first"[..]));
    assert_eq!(second.name(), "b.jpg");
    assert!(source.next_image().await.expect("read").is_none());
}

#[tokio::test]
async fn file_source_rereads_and_numbers_each_send() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("live.jpg");
    std::fs::write(&path, b"v1").expect("write");

    let mut source = FileSource::new(&path).expect("source");
    let first = source.next_image().await.expect("read").expect("image");
    std::fs::write(&path, b"v2").expect("rewrite");
    let second = source.next_image().await.expect("read").expect("image");

    assert_eq!(first.name(), "live_0001.jpg");
    assert_eq!(second.name(), "live_0002.jpg");
    assert_eq!(second.bytes().as_ref(), b"v2");
}

#[tokio::test]
async fn missing_file_is_a_source_error() {
    let mut source = FileSource::new("/nonexistent/stillframe/live.jpg").expect("source");
    assert!(source.next_image().await.is_err());
}
