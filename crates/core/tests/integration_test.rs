//! Integration tests for the full dlink-sim pipeline.
//!
//! These tests verify end-to-end behavior: payload -> encode -> stuff ->
//! channel access -> virtual port -> assembler -> destuff -> parse ->
//! injector, across fragmented transports and contended media.

use dlink_sim_core::{
    access::{AccessConfig, ByteCounter, ChannelAccess},
    assembler::FrameAssembler,
    crc::compute_checksum,
    framing::{Frame, FrameFormat},
    injector::{BitFlip, ErrorInjector, InjectorConfig},
    random::{RandomSource, ScriptedRandom, SeededRandom},
    session::{Session, SessionConfig},
    stuffing::{destuff, stuff_body, stuff_frame, ESCAPE, ESCAPE_MASK},
    transport::{
        available_pairs, select_pairs, ByteChannel, LineSettings, NullModem, PortOpener, PortPair,
    },
};
use std::time::Duration;

fn pairs() -> [PortPair; 2] {
    [PortPair::new("COM1", "COM2"), PortPair::new("COM3", "COM4")]
}

fn modem() -> NullModem {
    NullModem::new(2).with_poll_interval(Duration::from_millis(5))
}

/// Encode "A" with N = 2 from address 1 and check every field on the wire.
#[test]
fn test_encode_scenario() {
    let format = FrameFormat::new(2).unwrap();
    let frame = Frame::encode(b"A", 1, &format);

    assert_eq!(frame.data, vec![b'A', 0x00]);
    assert_eq!(frame.fcs, compute_checksum(&[b'A', 0x00]));

    let wire = stuff_frame(&frame, &format);
    assert_eq!(&wire[..2], &format.flag);

    // Body bytes are either plain or escaped reserved bytes
    let mut body = wire[2..].iter();
    while let Some(&b) = body.next() {
        if b == ESCAPE {
            let escaped = *body.next().unwrap() ^ ESCAPE_MASK;
            assert!(escaped == b'$' || escaped == format.flag_suffix() || escaped == ESCAPE);
        } else {
            assert!(b != b'$' && b != format.flag_suffix());
        }
    }

    assert_eq!(destuff(&wire), frame.to_bytes());
}

/// Round-trip law over a spread of pseudo-random byte strings.
#[test]
fn test_stuffing_round_trip_random_inputs() {
    let format = FrameFormat::new(2).unwrap();
    let mut rng = SeededRandom::new(31337);

    for _ in 0..500 {
        let len = rng.int_range(64);
        let input: Vec<u8> = (0..len).map(|_| rng.int_range(256) as u8).collect();

        assert_eq!(destuff(&stuff_body(&input, &format)), input);
    }
}

/// Assembler output does not depend on how reads are fragmented.
#[test]
fn test_assembler_random_fragmentation() {
    let format = FrameFormat::new(2).unwrap();
    let mut rng = SeededRandom::new(77);

    let mut stream = Vec::new();
    for i in 0..40u8 {
        let payload = [i.wrapping_mul(37), b"$}b"[i as usize % 3]];
        stream.extend(stuff_frame(&Frame::encode(&payload, 1, &format), &format));
    }

    let expected = FrameAssembler::new(format).push(&stream);
    assert_eq!(expected.len(), 40);

    for _ in 0..20 {
        let mut assembler = FrameAssembler::new(format);
        let mut frames = Vec::new();
        let mut rest = &stream[..];

        while !rest.is_empty() {
            let take = 1 + rng.int_range(rest.len().min(9));
            let (chunk, tail) = rest.split_at(take);
            frames.extend(assembler.push(chunk));
            rest = tail;
        }

        assert_eq!(frames, expected);
    }

    for raw in &expected {
        let frame = Frame::parse(&destuff(raw), &format).unwrap();
        assert!(frame.fcs_valid());
    }
}

/// Scripted injector: certain corruption of bit 0 in byte 0.
#[test]
fn test_injector_scenario() {
    let config = InjectorConfig {
        corruption_probability: 1.0,
    };
    let mut injector = ErrorInjector::new(config, ScriptedRandom::new([0.5], [0, 0]));

    let mut data = vec![b'A', 0x00];
    let before = compute_checksum(&data);
    let outcome = injector.inject(&mut data);

    assert_eq!(outcome.flip, Some(BitFlip { byte_index: 0, bit: 0 }));
    assert_eq!(data[0], b'A' ^ 1);
    assert_eq!(outcome.original_fcs, before);
    assert_eq!(outcome.current_fcs, compute_checksum(&data));
    assert_eq!(outcome.detected(), before != compute_checksum(&data));
}

/// Channel access over a real virtual port: ideal medium sends once.
#[test]
fn test_access_ideal_over_null_modem() {
    let modem = modem();
    let settings = LineSettings::default();
    let mut tx = modem.open("COM1", &settings).unwrap();
    let mut rx = modem.open("COM2", &settings).unwrap();

    let mut access = ChannelAccess::new(AccessConfig::ideal(), SeededRandom::new(1));
    let counter = ByteCounter::new();

    let report = access.transmit(tx.as_mut(), b"$b\x01\x00Z\x00", &counter).unwrap();
    assert_eq!(report.attempts, 1);
    assert!(!report.collision);
    assert_eq!(report.waited, Duration::ZERO);

    let mut buf = [0u8; 32];
    assert_eq!(rx.read(&mut buf).unwrap(), 6);
    assert_eq!(rx.read(&mut buf).unwrap(), 0);
}

/// Channel access with certain collision: one jam, one retry, two copies on the wire.
#[test]
fn test_access_collision_over_null_modem() {
    let modem = modem();
    let settings = LineSettings::default();
    let mut tx = modem.open("COM1", &settings).unwrap();
    let mut rx = modem.open("COM2", &settings).unwrap();

    let config = AccessConfig {
        collision_probability: 1.0,
        ..AccessConfig::ideal()
    };
    let mut access = ChannelAccess::new(config, SeededRandom::new(1));
    let counter = ByteCounter::new();

    let report = access.transmit(tx.as_mut(), b"abc", &counter).unwrap();
    assert!(report.collision);
    assert_eq!(report.attempts, 2);
    assert_eq!(counter.total(), 6);

    let mut buf = [0u8; 32];
    assert_eq!(rx.read(&mut buf).unwrap(), 3);
    assert_eq!(rx.read(&mut buf).unwrap(), 3);
    assert_eq!(rx.read(&mut buf).unwrap(), 0);
}

/// Full session over virtual ports with collisions on every send.
#[test]
fn test_session_with_collisions() {
    let modem = modem();
    let config = SessionConfig {
        format: FrameFormat::new(2).unwrap(),
        access: AccessConfig {
            collision_probability: 1.0,
            ..AccessConfig::ideal()
        },
        ..SessionConfig::ideal(11)
    };
    let mut session = Session::start(&modem, pairs(), config).unwrap();

    let reports = session.send_line("$}");
    assert_eq!(reports.len(), 2);

    for report in &reports {
        assert!(report.collision());
        assert_eq!(report.bytes_sent_total, 2 * report.wire.len() as u64);
        assert_eq!(report.received.len(), 2);
        for received in &report.received {
            assert_eq!(received.frame.data, b"$}".to_vec());
            assert!(received.fcs_valid);
        }
    }

    let metrics = session.shutdown();
    assert_eq!(metrics.collisions, 2);
    assert_eq!(metrics.frames_received, 4);
    assert_eq!(metrics.frames_malformed, 0);
}

/// Deterministic session: the same seed gives the same reports.
#[test]
fn test_session_seeded_reproducible() {
    let run = |seed: u64| {
        let modem = modem();
        let config = SessionConfig {
            access: AccessConfig {
                busy_probability: 0.3,
                collision_probability: 0.5,
                max_sense_attempts: 1000,
                ..AccessConfig::ideal()
            },
            injector: InjectorConfig {
                corruption_probability: 0.5,
            },
            ..SessionConfig::ideal(seed)
        };
        let session = Session::start(&modem, pairs(), config).unwrap();

        let lines = ["one", "two", "three", "four", "five"].map(String::from);
        let mut outcomes = Vec::new();
        session.run(lines, |r| {
            outcomes.push((
                r.pair,
                r.collision(),
                r.bytes_sent_total,
                r.received.iter().map(|f| f.injection).collect::<Vec<_>>(),
            ))
        });
        outcomes
    };

    assert_eq!(run(2024), run(2024));
}

/// Scripted random sources drive the whole session.
#[test]
fn test_session_scripted_sources() {
    let modem = modem();
    let config = SessionConfig {
        access: AccessConfig {
            collision_probability: 0.5,
            ..AccessConfig::ideal()
        },
        injector: InjectorConfig {
            corruption_probability: 0.5,
        },
        ..SessionConfig::ideal(0)
    };

    // Pair 1: free, collision; both received copies corrupted at bit 7.
    // Pair 2: free, no collision; no corruption.
    let mut session = Session::start_with_random(&modem, pairs(), config, |pair| {
        let (access, injector): (Box<dyn RandomSource>, Box<dyn RandomSource>) = if pair == 1 {
            (
                Box::new(ScriptedRandom::new([0.9, 0.1], [])),
                Box::new(ScriptedRandom::new([0.1, 0.1], [0, 7, 0, 7])),
            )
        } else {
            (
                Box::new(ScriptedRandom::new([0.9, 0.9], [])),
                Box::new(ScriptedRandom::new([0.9], [])),
            )
        };
        (access, injector)
    })
    .unwrap();

    let reports = session.send_line("Q");

    assert!(reports[0].collision());
    assert_eq!(reports[0].received.len(), 2);
    for received in &reports[0].received {
        assert_eq!(received.injection.flip, Some(BitFlip { byte_index: 0, bit: 7 }));
        assert_eq!(received.frame.data, vec![b'Q' ^ 0x80]);
        assert!(received.injection.detected());
    }

    assert!(!reports[1].collision());
    assert_eq!(reports[1].received.len(), 1);
    assert!(!reports[1].received[0].injection.corrupted());

    session.shutdown();
}

/// Port pairing feeds straight into a session.
#[test]
fn test_pairs_from_modem_names() {
    let modem = NullModem::new(3).with_poll_interval(Duration::from_millis(5));
    let discovered = available_pairs(&modem.port_names());
    assert_eq!(discovered.len(), 3);

    let selected = select_pairs(&discovered, 3, 1).unwrap();
    assert_eq!(selected[0], PortPair::new("COM5", "COM6"));

    let mut session = Session::start(&modem, selected, SessionConfig::ideal(9)).unwrap();
    let reports = session.send_line("x");
    assert_eq!(reports[0].sent.source, 5);
    assert_eq!(reports[1].sent.source, 1);
    assert_eq!(reports[0].received.len(), 1);
    session.shutdown();
}
