//! End-to-end tests of the session lifecycle and the steady-state
//! render/transfer loop, driven through the public `SessionSpec` interface
//! with a scripted channel, a fake offscreen target, and a recording
//! renderer.

mod common;

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use common::channel::ScriptedChannel;
use common::loader::StubLoader;
use common::renderer::RecordingRenderer;
use common::target::{expected_ops, FakeTarget, TargetOp};
use common::{network_bootstrap_script, numbered_matrix, test_bricks, test_volume};
use renderslave_rs::bootstrap::BootstrapError;
use renderslave_rs::config::{FrameFailurePolicy, SessionConfiguration};
use renderslave_rs::messages::WireMessage;
use renderslave_rs::session::{SessionSpec, SessionStartError};
use renderslave_rs::target::Viewport;
use renderslave_rs::types::{brick::Brick, volume::VolumeDataset};

fn abort_after(n: u32) -> FrameFailurePolicy {
    FrameFailurePolicy::AbortAfter(NonZeroU32::new(n).unwrap())
}

fn quiet_config(viewport: Viewport) -> SessionConfiguration {
    SessionConfiguration::builder()
        .viewport(viewport)
        .log_events(false)
        .build()
}

/// Everything a test needs to observe a running session.
struct Harness {
    sent_images: Arc<Mutex<Vec<renderslave_rs::types::image::ImagePayload>>>,
    send_attempts: Arc<AtomicU32>,
    ops: Arc<Mutex<Vec<TargetOp>>>,
    target_creations: Arc<AtomicU32>,
    renders: Arc<AtomicU32>,
    transforms: Arc<Mutex<Vec<renderslave_rs::types::transforms::ViewTransformPair>>>,
    remote_mode: Arc<std::sync::atomic::AtomicBool>,
    factory_volume: Arc<Mutex<Option<VolumeDataset>>>,
    factory_bricks: Arc<Mutex<Option<Vec<Brick>>>>,
}

fn start_session(
    channel: ScriptedChannel,
    loader: StubLoader,
    configuration: SessionConfiguration,
) -> (Result<renderslave_rs::session::Session, SessionStartError>, Harness) {
    let target = FakeTarget::new(configuration.scaled_viewport(), 0xAB);
    let renderer = RecordingRenderer::new();

    let harness = Harness {
        sent_images: channel.sent_images(),
        send_attempts: channel.send_attempts(),
        ops: target.ops(),
        target_creations: Arc::new(AtomicU32::new(0)),
        renders: renderer.renders(),
        transforms: renderer.transforms(),
        remote_mode: renderer.remote_mode(),
        factory_volume: Arc::new(Mutex::new(None)),
        factory_bricks: Arc::new(Mutex::new(None)),
    };

    let expected_viewport = configuration.scaled_viewport();
    let creations = harness.target_creations.clone();
    let factory_volume = harness.factory_volume.clone();
    let factory_bricks = harness.factory_bricks.clone();

    let result = SessionSpec::builder()
        .channel(channel)
        .loader(loader)
        .target(move |viewport| {
            creations.fetch_add(1, Ordering::SeqCst);
            assert_eq!(viewport, expected_viewport);
            Ok(target)
        })
        .renderer(move |volume, bricks| {
            *factory_volume.lock().unwrap() = Some(volume.as_ref().clone());
            *factory_bricks.lock().unwrap() = Some(bricks);
            renderer
        })
        .configuration(configuration)
        .build()
        .start();

    (result, harness)
}

#[test]
fn ten_complete_pairs_produce_ten_frames() {
    common::logging::setup_logger(log::LevelFilter::Warn);

    let mut script = network_bootstrap_script();
    for n in 0..20 {
        script.push(Ok(WireMessage::Matrix(numbered_matrix(n))));
    }
    let mut configuration = quiet_config(Viewport::with_size(4, 3));
    configuration.receive_failure_policy = abort_after(1);

    let (result, harness) = start_session(
        ScriptedChannel::new(script),
        StubLoader::succeeding(),
        configuration,
    );
    result.unwrap().join();

    // Exactly one render and one transmit per pair, in order.
    assert_eq!(harness.renders.load(Ordering::SeqCst), 10);
    let sent = harness.sent_images.lock().unwrap();
    assert_eq!(sent.len(), 10);
    for image in sent.iter() {
        // Declared dimensions always match the capture-time viewport, and
        // the payload is exactly width * height * 4 bytes.
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 3);
        assert_eq!(image.pixels().len(), 4 * 3 * 4);
    }

    // Matrices were paired in arrival order: (0,1), (2,3), ...
    let transforms = harness.transforms.lock().unwrap();
    assert_eq!(transforms.len(), 10);
    for (i, pair) in transforms.iter().enumerate() {
        assert_eq!(pair.projection, numbered_matrix(2 * i as u32));
        assert_eq!(pair.modelview, numbered_matrix(2 * i as u32 + 1));
    }

    // The target went through the full matched sequence once per frame.
    assert_eq!(*harness.ops.lock().unwrap(), expected_ops(10));
    assert_eq!(harness.target_creations.load(Ordering::SeqCst), 1);

    // The renderer was flipped to remote mode and got the bootstrap data.
    assert!(harness.remote_mode.load(Ordering::SeqCst));
    assert_eq!(
        harness.factory_volume.lock().unwrap().as_ref(),
        Some(&test_volume())
    );
    assert_eq!(
        harness.factory_bricks.lock().unwrap().as_ref(),
        Some(&test_bricks())
    );
}

#[test]
fn dropped_projection_skips_one_cycle() {
    let mut script = network_bootstrap_script();
    for n in 0..8 {
        script.push(Ok(WireMessage::Matrix(numbered_matrix(n))));
    }
    // The 5th cycle's projection receive fails.
    script.push(Err(ScriptedChannel::transport_error()));
    for n in 100..104 {
        script.push(Ok(WireMessage::Matrix(numbered_matrix(n))));
    }
    let mut configuration = quiet_config(Viewport::with_size(4, 3));
    configuration.receive_failure_policy = abort_after(2);

    let (result, harness) = start_session(
        ScriptedChannel::new(script),
        StubLoader::succeeding(),
        configuration,
    );
    result.unwrap().join();

    // 4 frames before the drop, none for the dropped cycle, 2 after.
    assert_eq!(harness.renders.load(Ordering::SeqCst), 6);
    assert_eq!(harness.sent_images.lock().unwrap().len(), 6);

    let transforms = harness.transforms.lock().unwrap();
    assert_eq!(transforms[4].projection, numbered_matrix(100));
    assert_eq!(transforms[4].modelview, numbered_matrix(101));
    assert_eq!(transforms[5].projection, numbered_matrix(102));
    assert_eq!(transforms[5].modelview, numbered_matrix(103));
}

#[test]
fn half_a_pair_renders_nothing() {
    let mut script = network_bootstrap_script();
    script.push(Ok(WireMessage::Matrix(numbered_matrix(0))));
    script.push(Err(ScriptedChannel::transport_error()));
    let mut configuration = quiet_config(Viewport::with_size(4, 3));
    configuration.receive_failure_policy = abort_after(1);

    let (result, harness) = start_session(
        ScriptedChannel::new(script),
        StubLoader::succeeding(),
        configuration,
    );
    result.unwrap().join();

    assert_eq!(harness.renders.load(Ordering::SeqCst), 0);
    assert_eq!(harness.sent_images.lock().unwrap().len(), 0);
    // Only the one-time preparation touched the target.
    assert_eq!(*harness.ops.lock().unwrap(), expected_ops(0));
}

#[test]
fn failed_bootstrap_creates_no_target() {
    let script = vec![
        Ok(WireMessage::LoadFromFile(true)),
        Ok(WireMessage::FilePath("missing.vol".to_string())),
    ];

    let (result, harness) = start_session(
        ScriptedChannel::new(script),
        StubLoader::failing(),
        quiet_config(Viewport::with_size(4, 3)),
    );

    match result {
        Err(SessionStartError::Bootstrap(BootstrapError::FileIo { path, .. })) => {
            assert_eq!(path, "missing.vol")
        }
        Err(other) => panic!("expected FileIo bootstrap failure, got {other:?}"),
        Ok(_) => panic!("expected bootstrap failure, got a running session"),
    }
    assert_eq!(harness.target_creations.load(Ordering::SeqCst), 0);
    assert!(harness.ops.lock().unwrap().is_empty());
    assert_eq!(harness.renders.load(Ordering::SeqCst), 0);
}

#[test]
fn transmit_failure_ends_the_session_by_default() {
    let mut script = network_bootstrap_script();
    for n in 0..4 {
        script.push(Ok(WireMessage::Matrix(numbered_matrix(n))));
    }
    let channel = ScriptedChannel::new(script)
        .fail_sends(vec![ScriptedChannel::transport_error()]);

    let (result, harness) = start_session(
        channel,
        StubLoader::succeeding(),
        quiet_config(Viewport::with_size(4, 3)),
    );
    result.unwrap().join();

    // One render, one failed transmit, then the loop gave up: the second
    // pair was never read.
    assert_eq!(harness.renders.load(Ordering::SeqCst), 1);
    assert_eq!(harness.send_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(harness.sent_images.lock().unwrap().len(), 0);
    // The target was still unbound on the failure path.
    assert_eq!(*harness.ops.lock().unwrap(), expected_ops(1));
}

#[test]
fn shutdown_signal_stops_an_idle_loop() {
    // No transforms ever arrive; the default policy skips indefinitely, so
    // only the session handle can stop the loop.
    let (result, harness) = start_session(
        ScriptedChannel::new(network_bootstrap_script()),
        StubLoader::succeeding(),
        quiet_config(Viewport::with_size(4, 3)),
    );
    let session = result.unwrap();

    thread::sleep(Duration::from_millis(20));
    // Dropping the handle signals the loop and joins it.
    drop(session);

    assert_eq!(harness.renders.load(Ordering::SeqCst), 0);
}

#[test]
fn target_scale_shrinks_the_offscreen_viewport() {
    let mut script = network_bootstrap_script();
    script.push(Ok(WireMessage::Matrix(numbered_matrix(0))));
    script.push(Ok(WireMessage::Matrix(numbered_matrix(1))));
    let configuration = SessionConfiguration::builder()
        .viewport(Viewport::with_size(8, 6))
        .target_scale(0.5)
        .receive_failure_policy(abort_after(1))
        .log_events(false)
        .build();

    let (result, harness) = start_session(
        ScriptedChannel::new(script),
        StubLoader::succeeding(),
        configuration,
    );
    result.unwrap().join();

    let sent = harness.sent_images.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].width(), 4);
    assert_eq!(sent[0].height(), 3);
    assert_eq!(sent[0].pixels().len(), 4 * 3 * 4);
}

#[test]
fn handlers_fire_for_every_transmitted_frame() {
    let mut script = network_bootstrap_script();
    for n in 0..4 {
        script.push(Ok(WireMessage::Matrix(numbered_matrix(n))));
    }
    let mut configuration = quiet_config(Viewport::with_size(4, 3));
    configuration.receive_failure_policy = abort_after(1);

    let channel = ScriptedChannel::new(script);
    let target = FakeTarget::new(configuration.scaled_viewport(), 0xCD);
    let renderer = RecordingRenderer::new();

    let transmit_events = Arc::new(AtomicU32::new(0));
    let end_events = Arc::new(AtomicU32::new(0));

    let session = SessionSpec::builder()
        .channel(channel)
        .loader(StubLoader::succeeding())
        .target(move |_| Ok(target))
        .renderer(move |_, _| renderer)
        .configuration(configuration)
        .on_transmit_image({
            let transmit_events = transmit_events.clone();
            move |event| {
                assert_eq!(event.image_bytes, 4 * 3 * 4);
                transmit_events.fetch_add(1, Ordering::SeqCst);
            }
        })
        .on_end_session({
            let end_events = end_events.clone();
            move |_| {
                end_events.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build()
        .start()
        .unwrap();

    // join() waits for the loop, then drains the event bus before stopping
    // it, so every published event has fired by the time it returns.
    session.join();

    assert_eq!(transmit_events.load(Ordering::SeqCst), 2);
    assert_eq!(end_events.load(Ordering::SeqCst), 1);
}
