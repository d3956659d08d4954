//! Senders driven by the scheduler against real and captured receivers.

use std::{net::TcpListener as StdTcpListener, path::Path, sync::Arc};

use rstest::rstest;
use stillframe::{
    config::{ReceiverConfig, SenderConfig},
    frame::FrameIndex,
    receiver::{DirectorySink, Receiver},
    scheduler::{
        ContinuousTrigger,
        DirectorySource,
        SourceImage,
        StaticSource,
        TcpConnector,
        TransmissionScheduler,
        manual,
    },
    session::{FinalizeReason, SessionRegistry},
};
use stillframe_testing::{CapturingConnector, parse_session, sample_image, transmitter};
use tokio::{
    sync::oneshot,
    time::{Duration, sleep, timeout},
};
use tokio_util::sync::CancellationToken;

mod common;
use common::{RunningReceiver, TestResult, unused_listener};

#[rstest]
#[tokio::test]
async fn manual_sends_reach_a_tcp_receiver(unused_listener: StdTcpListener) -> TestResult {
    let mut receiver = RunningReceiver::start(unused_listener, ReceiverConfig::default()).await?;
    let images = [sample_image(1_000), sample_image(45)];
    let source = StaticSource::new([
        SourceImage::new("one.jpg", images[0].clone()),
        SourceImage::new("two.jpg", images[1].clone()),
    ]);
    let mut scheduler = TransmissionScheduler::new(
        transmitter("CAM-1"),
        SenderConfig::default(),
        source,
        TcpConnector::new(receiver.addr),
    );
    let (trigger, handle) = manual();
    let run = tokio::spawn(async move { scheduler.run(trigger, CancellationToken::new()).await });

    for (expected_name, expected) in ["one.jpg", "two.jpg"].into_iter().zip(&images) {
        assert!(handle.trigger());
        let image = receiver.next_image().await?;
        assert_eq!(image.image_name(), expected_name);
        assert_eq!(image.reason(), FinalizeReason::Complete);
        assert_eq!(image.buffer(), &expected[..]);
        assert_eq!(image.params().chunk_size().get(), 90);
    }
    drop(handle);

    let summary = run.await??;
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.frames, 12 + 1);
    assert!(!summary.exhausted);
    receiver.stop().await
}

#[tokio::test]
async fn continuous_mode_sends_frames_in_index_order() -> TestResult {
    let (connector, mut sessions) = CapturingConnector::new();
    let source = StaticSource::new((0..3).map(|i| {
        SourceImage::new(format!("burst_{i}.jpg"), sample_image(200 + i * 100))
    }));
    let mut scheduler =
        TransmissionScheduler::new(transmitter("CAM-2"), SenderConfig::default(), source, connector);

    let summary = scheduler
        .run(ContinuousTrigger, CancellationToken::new())
        .await?;
    assert!(summary.exhausted);
    assert_eq!(summary.sent, 3);

    let mut captured = Vec::new();
    for _ in 0..3 {
        let bytes = timeout(Duration::from_secs(1), sessions.recv())
            .await?
            .ok_or("connector closed")?;
        captured.push(parse_session(&bytes));
    }
    captured.sort_by(|(a, _), (b, _)| a.image_name().cmp(b.image_name()));

    for (i, (handshake, frames)) in captured.iter().enumerate() {
        assert_eq!(handshake.image_name(), format!("burst_{i}.jpg"));
        assert_eq!(handshake.params().total_len(), 200 + i * 100);
        let indices: Vec<FrameIndex> = frames.iter().map(|f| f.index()).collect();
        let expected: Vec<FrameIndex> = (0..handshake.params().total_frames())
            .map(FrameIndex::new)
            .collect();
        assert_eq!(indices, expected);
    }
    Ok(())
}

async fn wait_for_file(path: &Path, expected: &[u8]) -> TestResult {
    timeout(Duration::from_secs(5), async {
        loop {
            if tokio::fs::read(path).await.is_ok_and(|bytes| bytes == expected) {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

#[rstest]
#[tokio::test]
async fn directory_round_trip_writes_images_to_disk(unused_listener: StdTcpListener) -> TestResult {
    let outbox = tempfile::tempdir()?;
    let inbox = tempfile::tempdir()?;
    let first = sample_image(333);
    let second = sample_image(91);
    tokio::fs::write(outbox.path().join("a.jpg"), &first).await?;
    tokio::fs::write(outbox.path().join("b.jpg"), &second).await?;

    let config = ReceiverConfig::default();
    let registry = Arc::new(SessionRegistry::new(config.placeholder));
    let (ready_tx, ready_rx) = oneshot::channel();
    let receiver = Receiver::new(config, registry, DirectorySink::new(inbox.path()))
        .ready_signal(ready_tx)
        .bind_existing_listener(unused_listener)?;
    let addr = receiver.local_addr().ok_or("receiver has no address")?;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        receiver
            .run_with_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });
    ready_rx.await?;

    let mut scheduler = TransmissionScheduler::new(
        transmitter("CAM-3"),
        SenderConfig::default(),
        DirectorySource::new(outbox.path()),
        TcpConnector::new(addr),
    );
    let summary = scheduler
        .run(ContinuousTrigger, CancellationToken::new())
        .await?;
    assert_eq!(summary.sent, 2);

    let images = inbox.path().join("CAM-3").join("images");
    wait_for_file(&images.join("a.jpg"), &first).await?;
    wait_for_file(&images.join("b.jpg"), &second).await?;

    let _ = stop_tx.send(());
    server.await??;
    Ok(())
}
