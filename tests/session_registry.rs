//! Tests for the `SessionRegistry` under concurrent use.

use std::{sync::Arc, thread};

use bytes::Bytes;
use rstest::{fixture, rstest};
use stillframe::{
    config::PlaceholderFill,
    encoder::FrameSequence,
    session::{FinalizeReason, SessionRegistry},
};
use stillframe_testing::{sample_image, transmitter, wire::encode_100};

mod common;
use common::TestResult;

#[fixture]
fn registry() -> Arc<SessionRegistry> { Arc::new(SessionRegistry::new(PlaceholderFill::default())) }

fn feed(registry: &SessionRegistry, id: &str, sequence: &FrameSequence) -> Vec<u8> {
    let id = transmitter(id);
    let handle = registry
        .get_or_create(&id, sequence.params(), sequence.grid(), "img.jpg")
        .expect("session opens");
    let mut finished = None;
    for frame in sequence.frames().iter().rev() {
        if let Some(image) = registry.accept(&handle, frame.clone()).expect("frame accepted") {
            finished = Some(image);
        }
    }
    finished.expect("last frame completes the session").buffer().to_vec()
}

/// Each transmitter's frames land only in its own session.
#[rstest]
fn concurrent_transmitters_reassemble_independently(registry: Arc<SessionRegistry>) -> TestResult {
    let workers: Vec<_> = (0..8_usize)
        .map(|n| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let image = sample_image(500 + n * 37);
                let sequence = encode_100(&image);
                let buffer = feed(&registry, &format!("TX{n}"), &sequence);
                (image, buffer)
            })
        })
        .collect();

    for worker in workers {
        let (image, buffer) = worker.join().map_err(|_| "worker panicked")?;
        assert_eq!(buffer, image.to_vec());
    }
    assert!(registry.is_empty());
    Ok(())
}

/// Overlapping transfers from one transmitter never share slots.
#[rstest]
fn same_transmitter_transfers_stay_separate(registry: Arc<SessionRegistry>) -> TestResult {
    let id = transmitter("SHARED");
    let images: Vec<Bytes> = [0xAA_u8, 0xBB]
        .into_iter()
        .map(|byte| Bytes::from(vec![byte; 400]))
        .collect();
    let handles: Vec<_> = images
        .iter()
        .zip(["a.jpg", "b.jpg"])
        .map(|(image, name)| {
            let sequence = encode_100(image);
            let handle = registry.begin(&id, sequence.params(), sequence.grid(), name);
            (handle, sequence)
        })
        .collect();

    let workers: Vec<_> = handles
        .into_iter()
        .map(|(handle, sequence)| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                sequence
                    .frames()
                    .iter()
                    .filter_map(|frame| {
                        registry
                            .accept(&handle, frame.clone())
                            .expect("frame accepted")
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for (worker, (image, name)) in workers.into_iter().zip(images.iter().zip(["a.jpg", "b.jpg"])) {
        let finished = worker.join().map_err(|_| "worker panicked")?;
        let [done] = finished.as_slice() else {
            panic!("each transfer completes exactly once");
        };
        assert_eq!(done.image_name(), name);
        assert_eq!(done.reason(), FinalizeReason::Complete);
        assert_eq!(done.buffer(), &image[..]);
    }
    assert!(registry.is_empty());
    Ok(())
}
