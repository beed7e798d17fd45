//! Session orchestration over two channel pairs.
//!
//! A session owns two channel pairs. Each pair has a transmit channel, a
//! receive task, a byte counter, and its own channel-access and
//! error-injection state. Input lines are handled strictly one at a time:
//! pair 1 is sent, counted and reported before pair 2 starts, and line N+1
//! is not touched before line N is done.
//!
//! # Receive Tasks
//!
//! One thread per pair reads the receive channel, feeds a private
//! [`FrameAssembler`] and pushes every assembled (still stuffed) frame onto a
//! bounded queue. The send path drains that queue after each transmission,
//! then destuffs, parses and runs the error injector on the frames.
//!
//! ```text
//!  line ──► encode ──► stuff ──► ChannelAccess ──► tx channel
//!                                                      │
//!  report ◄── injector ◄── parse ◄── destuff ◄── queue ◄── assembler ◄── rx task
//! ```

use crate::access::{AccessConfig, ByteCounter, ChannelAccess, TransmitReport};
use crate::assembler::{AssemblerStats, FrameAssembler};
use crate::error::{ConfigError, Error, Result};
use crate::framing::{Frame, FrameFormat};
use crate::injector::{ErrorInjector, InjectionOutcome, InjectorConfig};
use crate::metrics::Metrics;
use crate::random::{RandomSource, SeededRandom};
use crate::stuffing::{destuff, stuff_frame};
use crate::transport::{ByteChannel, LineSettings, PortOpener, PortPair};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Input line that ends the session.
pub const EXIT_COMMAND: &str = "exit";

/// Size of a single receive-channel read.
const READ_BUFFER_SIZE: usize = 128;

/// Complete configuration for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Frame layout shared by both pairs
    pub format: FrameFormat,

    /// Baud rate and parity for every port
    pub line: LineSettings,

    /// Contention model
    pub access: AccessConfig,

    /// Bit-error model
    pub injector: InjectorConfig,

    /// Seed for every random draw in the session
    pub seed: u64,

    /// How long to wait for each expected frame on the receive side
    pub receive_timeout_ms: u64,

    /// Capacity of each receive task's frame queue
    pub queue_capacity: usize,
}

impl SessionConfig {
    /// No contention, no errors.
    pub fn ideal(seed: u64) -> Self {
        Self {
            format: FrameFormat::default(),
            line: LineSettings::default(),
            access: AccessConfig::ideal(),
            injector: InjectorConfig::disabled(),
            seed,
            receive_timeout_ms: 1000,
            queue_capacity: 32,
        }
    }

    /// Moderate contention and error injection.
    pub fn default_with_seed(seed: u64) -> Self {
        Self {
            access: AccessConfig::default(),
            injector: InjectorConfig::default(),
            ..Self::ideal(seed)
        }
    }

    /// Check every nested setting.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        FrameFormat::new(self.format.data_len)?;
        LineSettings::new(self.line.baud, self.line.parity)?;
        self.access.validate()?;
        self.injector.validate()?;
        Ok(())
    }
}

/// A frame as seen by the receive side of a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Bytes as assembled from the wire
    pub stuffed: Vec<u8>,

    /// Bytes after destuffing
    pub destuffed: Vec<u8>,

    /// FCS carried by the received frame
    pub received_fcs: u8,

    /// Whether the carried FCS matched the data on arrival
    pub fcs_valid: bool,

    /// Parsed frame after injection; its `fcs` is recomputed over the
    /// (possibly corrupted) data
    pub frame: Frame,

    /// What the injector did
    pub injection: InjectionOutcome,
}

/// Everything worth reporting about one pair for one input line.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// 1-based pair number
    pub pair: usize,

    /// Ports of the pair
    pub ports: PortPair,

    /// Configured baud rate
    pub baud: u32,

    /// Counter snapshot after this send
    pub bytes_sent_total: u64,

    /// Frame handed to the sender
    pub sent: Frame,

    /// Stuffed bytes handed to the channel
    pub wire: Vec<u8>,

    /// Channel access outcome, if the channel was acquired
    pub transmit: Option<TransmitReport>,

    /// Why the send was abandoned, if it was
    pub error: Option<String>,

    /// Frames collected from the receive task
    pub received: Vec<ReceivedFrame>,
}

impl CycleReport {
    /// Whether a collision was declared on this send.
    pub fn collision(&self) -> bool {
        self.transmit.as_ref().map_or(false, |t| t.collision)
    }
}

/// One transmit/receive channel pair and its private state.
struct ChannelPair {
    index: usize,
    ports: PortPair,
    source: u8,
    transmitter: Box<dyn ByteChannel>,
    counter: Arc<ByteCounter>,
    frames: Receiver<Vec<u8>>,
    receive_task: JoinHandle<AssemblerStats>,
    access: ChannelAccess<Box<dyn RandomSource>>,
    injector: ErrorInjector<Box<dyn RandomSource>>,
}

/// A running two-pair session.
pub struct Session {
    config: SessionConfig,
    pairs: Vec<ChannelPair>,
    stop: Arc<AtomicBool>,
    metrics: Metrics,
}

impl Session {
    /// Open both pairs and start their receive tasks.
    ///
    /// Random streams for each pair are forked from `config.seed`.
    ///
    /// # Errors
    /// - `Error::Config` for invalid settings
    /// - Any error from `opener` while opening a port
    pub fn start(opener: &dyn PortOpener, pairs: [PortPair; 2], config: SessionConfig) -> Result<Self> {
        let mut root = SeededRandom::new(config.seed);
        Self::start_with_random(opener, pairs, config, |_| {
            let access: Box<dyn RandomSource> = Box::new(root.fork());
            let injector: Box<dyn RandomSource> = Box::new(root.fork());
            (access, injector)
        })
    }

    /// Like [`Session::start`], with caller-supplied random sources.
    ///
    /// `random` is called once per pair (with the 1-based pair number) and
    /// returns the sources for channel access and error injection.
    pub fn start_with_random<F>(
        opener: &dyn PortOpener,
        pairs: [PortPair; 2],
        config: SessionConfig,
        mut random: F,
    ) -> Result<Self>
    where
        F: FnMut(usize) -> (Box<dyn RandomSource>, Box<dyn RandomSource>),
    {
        config.validate()?;

        // Built up front so an early return stops tasks already spawned
        let mut session = Self {
            config,
            pairs: Vec::with_capacity(pairs.len()),
            stop: Arc::new(AtomicBool::new(false)),
            metrics: Metrics::new(),
        };

        for (i, ports) in pairs.into_iter().enumerate() {
            let index = i + 1;
            let transmitter = opener.open(&ports.transmit, &config.line)?;
            let receiver = opener.open(&ports.receive, &config.line)?;

            let (queue_tx, queue_rx) = mpsc::sync_channel(config.queue_capacity.max(1));
            let receive_task = spawn_receive_task(
                index,
                receiver,
                FrameAssembler::new(config.format),
                queue_tx,
                Arc::clone(&session.stop),
            )?;

            let (access_rng, injector_rng) = random(index);
            log::info!("pair {} ready: {}", index, ports);

            session.pairs.push(ChannelPair {
                index,
                source: ports.source_address(index as u8),
                ports,
                transmitter,
                counter: Arc::new(ByteCounter::new()),
                frames: queue_rx,
                receive_task,
                access: ChannelAccess::new(config.access, access_rng),
                injector: ErrorInjector::new(config.injector, injector_rng),
            });
        }

        Ok(session)
    }

    /// Send one payload on both pairs, pair 1 first.
    ///
    /// Empty lines produce no reports.
    pub fn send_line(&mut self, line: &str) -> Vec<CycleReport> {
        if line.is_empty() {
            return Vec::new();
        }
        self.metrics.lines_processed += 1;

        let mut reports = Vec::with_capacity(self.pairs.len());
        for i in 0..self.pairs.len() {
            reports.push(self.cycle(i, line.as_bytes()));
        }
        reports
    }

    /// Process lines until `exit` or end of input, then shut down.
    ///
    /// Every report is handed to `sink` as soon as it is complete.
    pub fn run<I, F>(mut self, lines: I, mut sink: F) -> Metrics
    where
        I: IntoIterator<Item = String>,
        F: FnMut(&CycleReport),
    {
        for line in lines {
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if line.trim() == EXIT_COMMAND {
                log::info!("exit requested");
                break;
            }
            for report in self.send_line(line) {
                sink(&report);
            }
        }

        self.shutdown()
    }

    /// Cumulative bytes sent on a pair (1-based), if it exists.
    pub fn bytes_sent(&self, pair: usize) -> Option<u64> {
        self.pairs
            .iter()
            .find(|p| p.index == pair)
            .map(|p| p.counter.total())
    }

    /// Metrics so far.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Stop receive tasks, release every channel and return final metrics.
    pub fn shutdown(mut self) -> Metrics {
        self.stop.store(true, Ordering::SeqCst);

        for pair in self.pairs.drain(..) {
            let ChannelPair {
                index,
                mut transmitter,
                frames,
                receive_task,
                ..
            } = pair;

            if let Err(e) = transmitter.close() {
                log::warn!("pair {}: closing transmitter failed: {}", index, e);
            }
            drop(frames);

            match receive_task.join() {
                Ok(stats) => log::debug!(
                    "pair {} receive task done: {} frames, {} idle bytes discarded",
                    index,
                    stats.frames_completed,
                    stats.bytes_discarded
                ),
                Err(_) => log::warn!("pair {} receive task panicked", index),
            }
        }

        self.metrics.complete();
        self.metrics.clone()
    }

    fn cycle(&mut self, i: usize, payload: &[u8]) -> CycleReport {
        let format = self.config.format;
        let timeout = Duration::from_millis(self.config.receive_timeout_ms);
        let pair = &mut self.pairs[i];
        let metrics = &mut self.metrics;

        // Frames from an earlier cycle that outlived its receive timeout
        loop {
            match pair.frames.try_recv() {
                Ok(stale) => {
                    log::warn!("pair {}: discarding late frame of {} bytes", pair.index, stale.len());
                    metrics.frames_late += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let sent = Frame::encode(payload, pair.source, &format);
        let wire = stuff_frame(&sent, &format);

        let mut report = CycleReport {
            pair: pair.index,
            ports: pair.ports.clone(),
            baud: self.config.line.baud,
            bytes_sent_total: 0,
            sent,
            wire,
            transmit: None,
            error: None,
            received: Vec::new(),
        };

        match pair.access.transmit(pair.transmitter.as_mut(), &report.wire, &pair.counter) {
            Ok(transmit) => {
                metrics.record_transmit(&transmit);
                report.transmit = Some(transmit);
            }
            Err(e) => {
                log::warn!("pair {}: send abandoned: {}", pair.index, e);
                metrics.access_failures += 1;
                report.error = Some(e.to_string());
            }
        }
        report.bytes_sent_total = pair.counter.total();

        // Malformed frames (line noise, cut-short fragments) don't count
        // towards the copies this send put on the wire
        let mut outstanding = report.transmit.as_ref().map_or(0, |t| t.writes_ok);

        while outstanding > 0 {
            match pair.frames.recv_timeout(timeout) {
                Ok(raw) => {
                    if accept_frame(pair, raw, &format, metrics, &mut report) {
                        outstanding -= 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!("pair {}: no frame within {:?}", pair.index, timeout);
                    metrics.receive_timeouts += 1;
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("pair {}: receive task stopped", pair.index);
                    break;
                }
            }
        }

        // Anything else already queued (resynchronised fragments)
        while let Ok(raw) = pair.frames.try_recv() {
            accept_frame(pair, raw, &format, metrics, &mut report);
        }

        report
    }
}

/// Receive one assembled frame into `report`; false if it was malformed.
fn accept_frame(
    pair: &mut ChannelPair,
    raw: Vec<u8>,
    format: &FrameFormat,
    metrics: &mut Metrics,
    report: &mut CycleReport,
) -> bool {
    match receive_frame(raw, format, &mut pair.injector) {
        Ok(received) => {
            metrics.record_received(received.fcs_valid, &received.injection);
            report.received.push(received);
            true
        }
        Err(e) => {
            log::warn!("pair {}: discarding malformed frame: {}", pair.index, e);
            metrics.frames_malformed += 1;
            false
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Detached receive tasks notice this on their next poll
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Destuff, parse and run the injector on one assembled frame.
fn receive_frame<R: RandomSource>(
    stuffed: Vec<u8>,
    format: &FrameFormat,
    injector: &mut ErrorInjector<R>,
) -> Result<ReceivedFrame> {
    let destuffed = destuff(&stuffed);
    let mut frame = Frame::parse(&destuffed, format)?;

    let received_fcs = frame.fcs;
    let fcs_valid = frame.fcs_valid();

    let injection = injector.inject(&mut frame.data);
    frame.fcs = injection.current_fcs;

    Ok(ReceivedFrame {
        stuffed,
        destuffed,
        received_fcs,
        fcs_valid,
        frame,
        injection,
    })
}

fn spawn_receive_task(
    index: usize,
    mut channel: Box<dyn ByteChannel>,
    mut assembler: FrameAssembler,
    queue: SyncSender<Vec<u8>>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<AssemblerStats>> {
    thread::Builder::new()
        .name(format!("rx-pair-{}", index))
        .spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];

            'read: while !stop.load(Ordering::SeqCst) {
                match channel.read(&mut buf) {
                    Ok(0) => continue,
                    Ok(n) => {
                        for frame in assembler.push(&buf[..n]) {
                            if queue.send(frame).is_err() {
                                break 'read;
                            }
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        log::info!("pair {}: receive channel closed", index);
                        break;
                    }
                    Err(e) => {
                        log::warn!("pair {}: read error: {}", index, e);
                        thread::sleep(Duration::from_millis(10));
                    }
                }
            }

            if let Some(partial) = assembler.flush() {
                log::debug!("pair {}: dropping partial frame of {} bytes", index, partial.len());
            }
            if let Err(e) = channel.close() {
                log::warn!("pair {}: closing receiver failed: {}", index, e);
            }

            assembler.stats()
        })
        .map_err(|e| Error::Channel(format!("failed to spawn receive task: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;
    use crate::transport::NullModem;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Instant;

    fn pairs() -> [PortPair; 2] {
        [PortPair::new("COM1", "COM2"), PortPair::new("COM3", "COM4")]
    }

    fn modem() -> NullModem {
        NullModem::new(2).with_poll_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_send_line_both_pairs_in_order() {
        let modem = modem();
        let mut session = Session::start(&modem, pairs(), SessionConfig::ideal(1)).unwrap();

        let reports = session.send_line("A");

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].pair, 1);
        assert_eq!(reports[1].pair, 2);
        assert_eq!(reports[0].sent.source, 1);
        assert_eq!(reports[1].sent.source, 3);

        for report in &reports {
            assert!(!report.collision());
            assert_eq!(report.bytes_sent_total, report.wire.len() as u64);
            assert_eq!(report.received.len(), 1);

            let received = &report.received[0];
            assert_eq!(received.stuffed, report.wire);
            assert_eq!(received.frame, report.sent);
            assert!(received.fcs_valid);
            assert!(!received.injection.detected());
        }

        let metrics = session.shutdown();
        assert_eq!(metrics.lines_processed, 1);
        assert_eq!(metrics.frames_sent, 2);
        assert_eq!(metrics.frames_received, 2);
    }

    #[test]
    fn test_counters_accumulate() {
        let modem = modem();
        let mut session = Session::start(&modem, pairs(), SessionConfig::ideal(2)).unwrap();

        let mut expected = 0u64;
        for line in ["a", "b", "c"] {
            let reports = session.send_line(line);
            expected += reports[0].wire.len() as u64;
            assert_eq!(reports[0].bytes_sent_total, expected);
        }

        assert_eq!(session.bytes_sent(1), Some(expected));
        assert_eq!(session.bytes_sent(3), None);
        session.shutdown();
    }

    #[test]
    fn test_empty_line_ignored() {
        let modem = modem();
        let mut session = Session::start(&modem, pairs(), SessionConfig::ideal(3)).unwrap();

        assert!(session.send_line("").is_empty());
        assert_eq!(session.bytes_sent(1), Some(0));
        assert_eq!(session.shutdown().lines_processed, 0);
    }

    #[test]
    fn test_scripted_injection_reported() {
        let modem = modem();
        let config = SessionConfig {
            injector: InjectorConfig {
                corruption_probability: 1.0,
            },
            ..SessionConfig::ideal(4)
        };

        let mut session = Session::start_with_random(&modem, pairs(), config, |_| {
            let access: Box<dyn RandomSource> = Box::new(ScriptedRandom::default());
            let injector: Box<dyn RandomSource> = Box::new(ScriptedRandom::new([0.0], [0, 0]));
            (access, injector)
        })
        .unwrap();

        let reports = session.send_line("A");
        for report in &reports {
            let received = &report.received[0];
            assert!(received.fcs_valid);
            assert_eq!(received.frame.data, vec![b'A' ^ 0x01]);
            assert_eq!(received.received_fcs, report.sent.fcs);
            assert_eq!(received.frame.fcs, received.injection.current_fcs);
            assert!(received.injection.detected());
        }

        let metrics = session.shutdown();
        assert_eq!(metrics.corruptions_injected, 2);
        assert_eq!(metrics.corruptions_detected, 2);
    }

    #[test]
    fn test_run_stops_at_exit() {
        let modem = modem();
        let session = Session::start(&modem, pairs(), SessionConfig::ideal(5)).unwrap();

        let lines = ["hi", "", "there", "exit", "ignored"].map(String::from);
        let mut seen = Vec::new();
        let metrics = session.run(lines, |r| seen.push((r.pair, r.sent.data.clone())));

        assert_eq!(
            seen,
            vec![(1, b"h".to_vec()), (2, b"h".to_vec()), (1, b"t".to_vec()), (2, b"t".to_vec())]
        );
        assert_eq!(metrics.lines_processed, 2);
        assert!(metrics.end_time.is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let modem = modem();
        let config = SessionConfig {
            access: AccessConfig {
                collision_probability: 2.0,
                ..AccessConfig::ideal()
            },
            ..SessionConfig::ideal(6)
        };

        assert!(matches!(
            Session::start(&modem, pairs(), config),
            Err(Error::Config(ConfigError::InvalidProbability { .. }))
        ));
    }

    #[test]
    fn test_unknown_port_rejected() {
        let modem = modem();
        let bad = [PortPair::new("COM1", "COM2"), PortPair::new("COM9", "COM10")];

        assert!(Session::start(&modem, bad, SessionConfig::ideal(7)).is_err());
    }

    /// Null modem whose transmitters put queued noise on the line ahead of
    /// their next write.
    struct NoisyLine {
        modem: NullModem,
        noise: Arc<Mutex<Vec<u8>>>,
    }

    struct NoisyChannel {
        inner: Box<dyn ByteChannel>,
        noise: Arc<Mutex<Vec<u8>>>,
    }

    impl PortOpener for NoisyLine {
        fn open(&self, name: &str, settings: &LineSettings) -> Result<Box<dyn ByteChannel>> {
            Ok(Box::new(NoisyChannel {
                inner: self.modem.open(name, settings)?,
                noise: Arc::clone(&self.noise),
            }))
        }

        fn port_names(&self) -> Vec<String> {
            self.modem.port_names()
        }
    }

    impl ByteChannel for NoisyChannel {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            let noise = std::mem::take(&mut *self.noise.lock().unwrap());
            if !noise.is_empty() {
                self.inner.write(&noise)?;
            }
            self.inner.write(bytes)
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }

        fn close(&mut self) -> io::Result<()> {
            self.inner.close()
        }
    }

    #[test]
    fn test_malformed_frames_skipped() {
        let noise = Arc::new(Mutex::new(Vec::new()));
        let line = NoisyLine {
            modem: modem(),
            noise: Arc::clone(&noise),
        };
        let mut session = Session::start(&line, pairs(), SessionConfig::ideal(8)).unwrap();

        // A frame cut short by the next flag, then one with a foreign flag
        *noise.lock().unwrap() = b"$b\x01".to_vec();
        let reports = session.send_line("A");
        assert_eq!(reports[0].received.len(), 1);
        assert_eq!(reports[0].received[0].frame.data, b"A".to_vec());
        assert_eq!(session.metrics().frames_malformed, 1);

        *noise.lock().unwrap() = b"$z\x01\x00Q\x00".to_vec();
        let reports = session.send_line("B");
        assert_eq!(reports[0].received.len(), 1);
        assert_eq!(reports[0].received[0].frame.data, b"B".to_vec());
        assert_eq!(reports[1].received.len(), 1);

        let reports = session.send_line("C");
        assert_eq!(reports[0].received[0].frame.data, b"C".to_vec());

        let metrics = session.shutdown();
        assert_eq!(metrics.frames_malformed, 2);
        assert_eq!(metrics.frames_received, 6);
        assert_eq!(metrics.receive_timeouts, 0);
    }

    type Wire = Arc<Mutex<VecDeque<(Instant, Vec<u8>)>>>;

    /// Point-to-point lines where the first write on `COM1` is delivered
    /// only after `lag`.
    struct LaggyLines {
        wires: Mutex<HashMap<u8, Wire>>,
        lag: Duration,
    }

    struct LaggyEnd {
        wire: Wire,
        lag: Option<Duration>,
    }

    impl PortOpener for LaggyLines {
        fn open(&self, name: &str, _settings: &LineSettings) -> Result<Box<dyn ByteChannel>> {
            let key = match name {
                "COM1" | "COM2" => 1,
                _ => 2,
            };
            let wire = Arc::clone(self.wires.lock().unwrap().entry(key).or_default());
            let lag = (name == "COM1").then_some(self.lag);
            Ok(Box::new(LaggyEnd { wire, lag }))
        }

        fn port_names(&self) -> Vec<String> {
            ["COM1", "COM2", "COM3", "COM4"].map(String::from).to_vec()
        }
    }

    impl ByteChannel for LaggyEnd {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            let due = Instant::now() + self.lag.take().unwrap_or_default();
            self.wire.lock().unwrap().push_back((due, bytes.to_vec()));
            Ok(bytes.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut wire = self.wire.lock().unwrap();
            match wire.front() {
                Some((due, _)) if *due <= Instant::now() => {
                    let (_, bytes) = wire.pop_front().unwrap();
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                _ => {
                    drop(wire);
                    thread::sleep(Duration::from_millis(2));
                    Ok(0)
                }
            }
        }
    }

    #[test]
    fn test_late_frame_not_reported_on_next_line() {
        let lines = LaggyLines {
            wires: Mutex::new(HashMap::new()),
            lag: Duration::from_millis(150),
        };
        let config = SessionConfig {
            receive_timeout_ms: 50,
            ..SessionConfig::ideal(9)
        };
        let mut session = Session::start(&lines, pairs(), config).unwrap();

        let reports = session.send_line("A");
        assert!(reports[0].received.is_empty());
        assert_eq!(reports[1].received.len(), 1);
        assert_eq!(session.metrics().receive_timeouts, 1);

        // Let the lagging frame reach the receive queue
        thread::sleep(Duration::from_millis(300));

        let reports = session.send_line("B");
        assert_eq!(reports[0].received.len(), 1);
        assert_eq!(reports[0].received[0].frame.data, b"B".to_vec());

        let metrics = session.shutdown();
        assert_eq!(metrics.frames_late, 1);
        assert_eq!(metrics.receive_timeouts, 1);
    }
}

