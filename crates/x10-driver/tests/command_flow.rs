//! End-to-end command transactions against the emulated bridge.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use x10_core::constants::{CLOCK_HEADER, MAX_POLL_ROUNDS, MAX_SEND_ATTEMPTS};
use x10_core::{CommandCode, Error, HouseCode};
use x10_driver::{ProtocolEngine, Transport};
use x10_emulator::{BridgeEmulator, EmulatorError, EmulatorEvent, Fault};

type EmulatorTask = JoinHandle<Result<Vec<EmulatorEvent>, EmulatorError>>;

/// Engine over an in-memory pipe with the emulator on the far end.
/// Timeouts are tightened so provoked failures resolve quickly.
fn start_bridge(faults: Vec<Fault>) -> (ProtocolEngine, EmulatorTask) {
    let (transport, mut handle) =
        Transport::mock_with_timeouts(Duration::from_millis(100), Duration::from_millis(100));
    let stream = handle.take_stream().expect("fresh mock handle");
    let emulator = tokio::spawn(BridgeEmulator::new(stream).script_faults(faults).run());
    let engine = ProtocolEngine::new(transport, HouseCode::A);
    (engine, emulator)
}

async fn finish(engine: ProtocolEngine, emulator: EmulatorTask) -> Vec<EmulatorEvent> {
    engine.close().await;
    drop(engine);
    emulator.await.expect("emulator task").expect("emulator ran clean")
}

fn frames(events: &[EmulatorEvent]) -> Vec<[u8; 2]> {
    events
        .iter()
        .filter_map(|event| match event {
            EmulatorEvent::FrameReceived(frame) => Some(*frame),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_command_delivers_address_then_function() {
    let (engine, emulator) = start_bridge(Vec::new());
    engine
        .send_command(HouseCode::A, 1, CommandCode::On, None)
        .await
        .unwrap();

    let events = finish(engine, emulator).await;
    assert_eq!(
        events,
        vec![
            EmulatorEvent::FrameReceived([0x04, 0x66]),
            EmulatorEvent::HostAcknowledged,
            EmulatorEvent::FrameReceived([0x06, 0x62]),
            EmulatorEvent::HostAcknowledged,
        ]
    );
}

#[tokio::test]
async fn test_dim_amount_scales_into_function_header() {
    let (engine, emulator) = start_bridge(Vec::new());
    engine
        .send_command(HouseCode::E, 5, CommandCode::Dim, Some(100))
        .await
        .unwrap();

    let events = finish(engine, emulator).await;
    assert_eq!(frames(&events), vec![[0x04, 0x11], [0xB6, 0x14]]);
}

#[tokio::test]
async fn test_dim_defaults_to_half_step() {
    let (engine, emulator) = start_bridge(Vec::new());
    engine
        .send_command(HouseCode::A, 1, CommandCode::Bright, None)
        .await
        .unwrap();

    let events = finish(engine, emulator).await;
    // scale(50) = 11, packed above the function header bits
    assert_eq!(frames(&events), vec![[0x04, 0x66], [0x5E, 0x65]]);
}

#[tokio::test]
async fn test_invalid_arguments_touch_nothing() {
    let (engine, emulator) = start_bridge(Vec::new());

    for (unit, dim) in [(0, None), (17, None), (1, Some(0)), (1, Some(101))] {
        let err = engine
            .send_command(HouseCode::A, unit, CommandCode::Dim, dim)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "unit {unit} dim {dim:?}");
    }

    let events = finish(engine, emulator).await;
    assert!(events.is_empty(), "wire must stay untouched: {events:?}");
}

#[tokio::test]
async fn test_retry_succeeds_after_corrupt_echoes() {
    let (engine, emulator) = start_bridge(vec![Fault::WrongChecksum, Fault::WrongChecksum]);
    engine
        .send_command(HouseCode::A, 1, CommandCode::On, None)
        .await
        .unwrap();

    let events = finish(engine, emulator).await;
    // Two failed attempts resend the address frame before the clean run
    assert_eq!(
        frames(&events),
        vec![[0x04, 0x66], [0x04, 0x66], [0x04, 0x66], [0x06, 0x62]]
    );
}

#[tokio::test]
async fn test_gives_up_after_attempt_cap() {
    let faults = vec![Fault::WrongChecksum; MAX_SEND_ATTEMPTS as usize];
    let (engine, emulator) = start_bridge(faults);

    let err = engine
        .send_command(HouseCode::A, 1, CommandCode::On, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CommandDelivery { attempts } if attempts == MAX_SEND_ATTEMPTS));

    let events = finish(engine, emulator).await;
    let sent = frames(&events);
    assert_eq!(sent.len(), MAX_SEND_ATTEMPTS as usize);
    assert!(sent.iter().all(|frame| frame[0] == 0x04), "only address frames: {sent:?}");
}

#[tokio::test]
async fn test_power_failure_pushes_clock_then_retries() {
    let (engine, emulator) = start_bridge(vec![Fault::PowerFailure]);
    engine
        .send_command(HouseCode::A, 1, CommandCode::On, None)
        .await
        .unwrap();

    let events = finish(engine, emulator).await;
    let clock_frames: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            EmulatorEvent::ClockSet(frame) => Some(*frame),
            _ => None,
        })
        .collect();
    assert_eq!(clock_frames.len(), 1, "exactly one clock push: {events:?}");
    assert_eq!(clock_frames[0][0], CLOCK_HEADER);
    // Monitored house rides in the last byte
    assert_eq!(clock_frames[0][6], HouseCode::A.wire_nibble() << 4);

    // The interrupted transaction still delivered on the retry
    assert_eq!(
        frames(&events),
        vec![[0x04, 0x66], [0x04, 0x66], [0x06, 0x62]]
    );
}

#[tokio::test]
async fn test_silent_bridge_times_out_then_recovers() {
    let (engine, emulator) = start_bridge(vec![Fault::Silent]);
    engine
        .send_command(HouseCode::A, 1, CommandCode::On, None)
        .await
        .unwrap();

    let events = finish(engine, emulator).await;
    assert!(events.contains(&EmulatorEvent::FaultInjected(Fault::Silent)));
    assert_eq!(
        frames(&events),
        vec![[0x04, 0x66], [0x04, 0x66], [0x06, 0x62]]
    );
}

#[tokio::test]
async fn test_endless_polling_is_fatal() {
    let (engine, emulator) = start_bridge(vec![Fault::PollForever]);

    let err = engine
        .send_command(HouseCode::A, 1, CommandCode::On, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PollDrainExceeded { rounds } if rounds == MAX_POLL_ROUNDS));

    let events = finish(engine, emulator).await;
    // Fatal: no retry, one frame on the wire, the drain capped
    assert_eq!(frames(&events).len(), 1);
    let polls = events
        .iter()
        .filter(|event| **event == EmulatorEvent::PollAcknowledged)
        .count();
    assert_eq!(polls, MAX_POLL_ROUNDS as usize);
}

#[tokio::test]
async fn test_peer_hangup_aborts_without_retry() {
    let (transport, mut handle) =
        Transport::mock_with_timeouts(Duration::from_millis(100), Duration::from_millis(100));
    drop(handle.take_stream());
    let engine = ProtocolEngine::new(transport, HouseCode::A);

    let err = engine
        .send_command(HouseCode::A, 1, CommandCode::On, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)), "got {err:?}");
}

#[tokio::test]
async fn test_concurrent_senders_do_not_interleave() {
    let (engine, emulator) = start_bridge(Vec::new());
    let engine = Arc::new(engine);

    let first = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .send_command(HouseCode::A, 1, CommandCode::On, None)
                .await
        }
    });
    let second = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .send_command(HouseCode::B, 2, CommandCode::Off, None)
                .await
        }
    });
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    engine.close().await;
    drop(engine);
    let events = emulator.await.unwrap().unwrap();

    // Whatever the task order, each transaction lands as an unbroken
    // address/function pair for a single house
    let sent = frames(&events);
    assert_eq!(sent.len(), 4);
    for pair in sent.chunks(2) {
        assert_eq!(pair[0][0], 0x04, "pair starts with an address: {sent:?}");
        assert_eq!(
            pair[0][1] >> 4,
            pair[1][1] >> 4,
            "house must match within a transaction: {sent:?}"
        );
    }
    let houses: Vec<u8> = sent.chunks(2).map(|pair| pair[0][1] >> 4).collect();
    let mut sorted = houses.clone();
    sorted.sort_unstable();
    assert_eq!(
        sorted,
        vec![HouseCode::A.wire_nibble(), HouseCode::B.wire_nibble()]
    );
}
