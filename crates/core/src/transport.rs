//! Byte channel contract, line settings, port pairing and virtual ports.
//!
//! Sessions never touch device handles directly. They see a [`ByteChannel`]
//! that can write and poll-read bytes, obtained from a [`PortOpener`] by
//! port name. [`NullModem`] is an in-memory opener whose ports are
//! cross-wired in pairs (`COM1 <-> COM2`, `COM3 <-> COM4`, ...), which is
//! what the application runs on by default and what the tests use; the
//! hardware opener lives in [`crate::serial`].

use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A duplex byte channel.
pub trait ByteChannel: Send {
    /// Write all of `bytes`; returns the number written.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Read into `buf`. `Ok(0)` means nothing is available yet.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the channel. Further reads on the peer end eventually fail.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens byte channels by port name.
pub trait PortOpener {
    /// Open `name` with the given line settings.
    fn open(&self, name: &str, settings: &LineSettings) -> Result<Box<dyn ByteChannel>>;

    /// Port names present on this host.
    fn port_names(&self) -> Vec<String>;
}

/// Parity setting of a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl FromStr for Parity {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "even" | "e" => Ok(Parity::Even),
            "odd" | "o" => Ok(Parity::Odd),
            _ => Err(ConfigError::InvalidParity(s.to_string())),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parity::None => "None",
            Parity::Even => "Even",
            Parity::Odd => "Odd",
        };
        f.write_str(name)
    }
}

/// Baud rate and parity for every port in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud: u32,
    pub parity: Parity,
}

impl LineSettings {
    /// # Errors
    /// `ConfigError::InvalidBaud` if `baud` is zero.
    pub fn new(baud: u32, parity: Parity) -> std::result::Result<Self, ConfigError> {
        if baud == 0 {
            return Err(ConfigError::InvalidBaud);
        }
        Ok(Self { baud, parity })
    }
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            baud: 9600,
            parity: Parity::None,
        }
    }
}

/// A transmit port and the port that receives what it sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortPair {
    pub transmit: String,
    pub receive: String,
}

impl PortPair {
    pub fn new(transmit: impl Into<String>, receive: impl Into<String>) -> Self {
        Self {
            transmit: transmit.into(),
            receive: receive.into(),
        }
    }

    /// Source address for frames sent on this pair: the transmit port number,
    /// or `fallback` when the name carries none.
    pub fn source_address(&self, fallback: u8) -> u8 {
        port_number(&self.transmit)
            .and_then(|n| u8::try_from(n).ok())
            .unwrap_or(fallback)
    }
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.transmit, self.receive)
    }
}

/// Pair every odd-numbered port with the next one of the same family.
///
/// `COM1` pairs with `COM2` and `/dev/ttyS3` with `/dev/ttyS4`. Pairs are
/// ordered by family, then port number; names without a trailing number are
/// ignored.
pub fn available_pairs(names: &[String]) -> Vec<PortPair> {
    let mut ports: Vec<(&str, u32)> = names.iter().filter_map(|n| split_port_name(n)).collect();
    ports.sort_unstable();
    ports.dedup();

    ports
        .iter()
        .filter(|&&(family, n)| n % 2 == 1 && ports.binary_search(&(family, n + 1)).is_ok())
        .map(|&(family, n)| PortPair::new(format!("{}{}", family, n), format!("{}{}", family, n + 1)))
        .collect()
}

/// Pick two distinct pairs by 1-based choice.
///
/// # Errors
/// - `ConfigError::NotEnoughPairs` with fewer than two pairs available
/// - `ConfigError::PairOutOfRange` for a choice outside `1..=pairs.len()`
/// - `ConfigError::DuplicatePair` if both choices are equal
pub fn select_pairs(
    pairs: &[PortPair],
    first: usize,
    second: usize,
) -> std::result::Result<[PortPair; 2], ConfigError> {
    if pairs.len() < 2 {
        return Err(ConfigError::NotEnoughPairs {
            required: 2,
            found: pairs.len(),
        });
    }

    for choice in [first, second] {
        if choice == 0 || choice > pairs.len() {
            return Err(ConfigError::PairOutOfRange {
                choice,
                available: pairs.len(),
            });
        }
    }

    if first == second {
        return Err(ConfigError::DuplicatePair(first));
    }

    Ok([pairs[first - 1].clone(), pairs[second - 1].clone()])
}

/// Split `name` into its family prefix and trailing port number.
fn split_port_name(name: &str) -> Option<(&str, u32)> {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let (family, number) = name.split_at(name.len() - digits);
    Some((family, number.parse().ok()?))
}

fn port_number(name: &str) -> Option<u32> {
    split_port_name(name).map(|(_, n)| n)
}

/// Largest virtual pair count; keeps every port number a valid source address.
pub const MAX_VIRTUAL_PAIRS: usize = 127;

/// Link sender shared between the port table and the open writer.
type Link = Arc<Mutex<Option<Sender<Vec<u8>>>>>;

/// Table entry for one virtual port.
#[derive(Default)]
struct PortSlot {
    open: bool,

    /// Sender into this port's inbox, parked here until the peer opens
    unclaimed: Option<Sender<Vec<u8>>>,

    /// Where this port's writes go; empty while the peer is not open
    outbound: Link,
}

type PortTable = Arc<Mutex<HashMap<String, PortSlot>>>;

/// In-memory opener with cross-wired port pairs.
///
/// Bytes written on `COM(2i-1)` arrive on `COM(2i)` and vice versa. A port
/// can be held open by one handle at a time.
///
/// The only sender into a port's inbox lives in its peer's open handle, so:
/// - writing while the peer is not open fails with `NotConnected`
/// - once the peer closes, reads drain what was sent and then fail with
///   `BrokenPipe`
/// - closing a port discards anything still unread
///
/// A link broken this way stays broken until both ends have been reopened.
pub struct NullModem {
    ports: PortTable,
    names: Vec<String>,
    poll_interval: Duration,
}

impl NullModem {
    /// Create `pair_count` cross-wired pairs (`2 * pair_count` ports).
    ///
    /// The count is capped at [`MAX_VIRTUAL_PAIRS`].
    pub fn new(pair_count: usize) -> Self {
        let port_count = pair_count.min(MAX_VIRTUAL_PAIRS) * 2;
        let names: Vec<String> = (1..=port_count).map(|i| format!("COM{}", i)).collect();
        let ports = names.iter().map(|name| (name.clone(), PortSlot::default())).collect();

        Self {
            ports: Arc::new(Mutex::new(ports)),
            names,
            poll_interval: Duration::from_millis(20),
        }
    }

    /// How long a read waits before reporting "nothing yet".
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn peer_of(name: &str) -> Option<String> {
        let (family, n) = split_port_name(name)?;
        let peer = if n % 2 == 1 { n + 1 } else { n.checked_sub(1)? };
        Some(format!("{}{}", family, peer))
    }
}

fn no_such_port(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such port {}", name))
}

fn lock_link(link: &Link) -> io::Result<std::sync::MutexGuard<'_, Option<Sender<Vec<u8>>>>> {
    link.lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "port link poisoned"))
}

impl PortOpener for NullModem {
    fn open(&self, name: &str, settings: &LineSettings) -> Result<Box<dyn ByteChannel>> {
        let mut ports = self
            .ports
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "port table poisoned"))?;

        let peer = Self::peer_of(name)
            .filter(|peer| ports.contains_key(peer))
            .ok_or_else(|| no_such_port(name))?;

        if ports.get(name).ok_or_else(|| no_such_port(name))?.open {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, format!("port {} already open", name)).into());
        }

        let (sender, inbox) = mpsc::channel();

        // Cross-wire with the peer if it is already open, otherwise park our
        // inbox sender for it
        let (peer_inbox, parked) = match ports.get_mut(&peer) {
            Some(peer_slot) if peer_slot.open => {
                *lock_link(&peer_slot.outbound)? = Some(sender);
                (peer_slot.unclaimed.take(), None)
            }
            _ => (None, Some(sender)),
        };

        let slot = ports.get_mut(name).ok_or_else(|| no_such_port(name))?;
        slot.open = true;
        slot.unclaimed = parked;
        *lock_link(&slot.outbound)? = peer_inbox;
        let outbound = Arc::clone(&slot.outbound);

        log::debug!("opened {} at {} baud, parity {}", name, settings.baud, settings.parity);

        Ok(Box::new(VirtualPort {
            name: name.to_string(),
            peer,
            outbound,
            inbox: Some(inbox),
            pending: Vec::new(),
            poll_interval: self.poll_interval,
            ports: Arc::clone(&self.ports),
        }))
    }

    fn port_names(&self) -> Vec<String> {
        self.names.clone()
    }
}

/// One open end of a [`NullModem`] pair.
struct VirtualPort {
    name: String,
    peer: String,
    outbound: Link,
    inbox: Option<Receiver<Vec<u8>>>,
    pending: Vec<u8>,
    poll_interval: Duration,
    ports: PortTable,
}

impl VirtualPort {
    fn drain_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }
}

impl ByteChannel for VirtualPort {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if self.inbox.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }

        let outbound = lock_link(&self.outbound)?;
        let peer = outbound.as_ref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, format!("peer port {} not open", self.peer))
        })?;

        peer.send(bytes.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer port gone"))?;

        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.pending.is_empty() {
            return Ok(self.drain_pending(buf));
        }

        let inbox = self
            .inbox
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))?;

        match inbox.recv_timeout(self.poll_interval) {
            Ok(bytes) => {
                self.pending = bytes;
                Ok(self.drain_pending(buf))
            }
            Err(RecvTimeoutError::Timeout) => Ok(0),
            Err(RecvTimeoutError::Disconnected) => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer port closed"))
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(inbox) = self.inbox.take() else {
            return Ok(());
        };

        let mut ports = self
            .ports
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "port table poisoned"))?;

        // Dropping our outbound sender disconnects the peer's reader
        if let Some(slot) = ports.get_mut(&self.name) {
            slot.open = false;
            slot.unclaimed = None;
            lock_link(&slot.outbound)?.take();
        }
        if let Some(peer_slot) = ports.get_mut(&self.peer) {
            lock_link(&peer_slot.outbound)?.take();
        }

        let discarded: usize = inbox.try_iter().map(|bytes| bytes.len()).sum::<usize>() + self.pending.len();
        self.pending.clear();
        if discarded > 0 {
            log::debug!("closed {} with {} unread bytes", self.name, discarded);
        }

        Ok(())
    }
}

impl Drop for VirtualPort {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
