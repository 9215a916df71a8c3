//! Shared test harness: deterministic network-fault wrappers around the
//! crate's own `DatagramPort` trait, plus a purely in-memory port for
//! scripting one-sided receive-path behavior without any real sockets.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use reliable_udp::{DatagramPort, Error, UdpPort};

/// Hands out distinct loopback addresses so parallel test functions within
/// one binary don't collide on a bound port. Each integration test binary
/// gets its own counter (this module is `include!`-style duplicated per
/// test crate), so different *files* still need disjoint starting ranges.
pub fn next_addr(base_port: u16) -> SocketAddr {
    static COUNTERS: Mutex<Option<AtomicU16>> = Mutex::new(None);
    let mut guard = COUNTERS.lock().unwrap();
    let counter = guard.get_or_insert_with(|| AtomicU16::new(base_port));
    let port = counter.fetch_add(1, Ordering::Relaxed);
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Wraps a real `UdpPort` but drops the *first* transmission of every
/// even-numbered `seq`, forwarding every later transmission (retransmits)
/// normally. Mirrors spec scenario 3 verbatim.
pub struct DropFirstEvenSeqPort {
    inner: UdpPort,
    dropped_once: Mutex<HashSet<u64>>,
}

impl DropFirstEvenSeqPort {
    pub fn connect(local: SocketAddr, remote: SocketAddr) -> Result<Self, Error> {
        Ok(DropFirstEvenSeqPort {
            inner: UdpPort::connect(local, remote)?,
            dropped_once: Mutex::new(HashSet::new()),
        })
    }
}

impl DatagramPort for DropFirstEvenSeqPort {
    fn send(&self, buf: &[u8]) -> Result<usize, Error> {
        if buf.len() >= 8 {
            let seq = u64::from_be_bytes(buf[0..8].try_into().unwrap());
            if seq % 2 == 0 {
                let mut dropped_once = self.dropped_once.lock().unwrap();
                if dropped_once.insert(seq) {
                    return Ok(buf.len());
                }
            }
        }

        self.inner.send(buf)
    }

    fn recv(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<Option<usize>, Error> {
        self.inner.recv(buf, timeout)
    }

    fn close(&self) -> Result<(), Error> {
        self.inner.close()
    }
}

/// Wraps a real `UdpPort` and, with fixed probability, swaps the send order
/// of each datagram with the one immediately before it. Mirrors spec
/// scenario 4. The pending half of a swapped pair is flushed by the next
/// call, or by `close`; in practice the sender's own retransmission cadence
/// keeps new sends arriving well inside the retry-cap window, so the final
/// datagram of a transfer never waits past one ACK timeout.
pub struct SwapAdjacentPort {
    inner: UdpPort,
    rng: Mutex<StdRng>,
    swap_probability: f64,
    held: Mutex<Option<Vec<u8>>>,
}

impl SwapAdjacentPort {
    pub fn connect(
        local: SocketAddr,
        remote: SocketAddr,
        seed: u64,
        swap_probability: f64,
    ) -> Result<Self, Error> {
        Ok(SwapAdjacentPort {
            inner: UdpPort::connect(local, remote)?,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            swap_probability,
            held: Mutex::new(None),
        })
    }
}

impl DatagramPort for SwapAdjacentPort {
    fn send(&self, buf: &[u8]) -> Result<usize, Error> {
        let mut held = self.held.lock().unwrap();

        match held.take() {
            None => {
                *held = Some(buf.to_vec());
            }
            Some(previous) => {
                let swap = self.rng.lock().unwrap().gen_bool(self.swap_probability);
                if swap {
                    self.inner.send(buf)?;
                    self.inner.send(&previous)?;
                } else {
                    self.inner.send(&previous)?;
                    self.inner.send(buf)?;
                }
            }
        }

        Ok(buf.len())
    }

    fn recv(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<Option<usize>, Error> {
        self.inner.recv(buf, timeout)
    }

    fn close(&self) -> Result<(), Error> {
        if let Some(last) = self.held.lock().unwrap().take() {
            self.inner.send(&last)?;
        }
        self.inner.close()
    }
}

/// A purely in-memory, single-threaded `DatagramPort` for scripting what a
/// peer sends without any real network or second thread involved. `send`
/// just records what would have gone out; `recv` drains a pre-loaded queue
/// of "incoming" datagrams and never blocks (a timeout, including `None`,
/// is treated as "return whatever is queued, or nothing").
#[derive(Default)]
struct ScriptedPortState {
    incoming: Mutex<VecDeque<Vec<u8>>>,
    sent: Mutex<Vec<Vec<u8>>>,
}

/// A purely in-memory, single-threaded `DatagramPort` for scripting what a
/// peer sends without any real network or second thread involved. Cheaply
/// `Clone`-able (shares state through an `Arc`) so a test can keep a handle
/// for inspection after the original is moved into an `Endpoint`.
#[derive(Clone, Default)]
pub struct ScriptedPort {
    state: std::sync::Arc<ScriptedPortState>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        ScriptedPort::default()
    }

    pub fn push_incoming(&self, datagram: Vec<u8>) {
        self.state.incoming.lock().unwrap().push_back(datagram);
    }

    pub fn sent_datagrams(&self) -> Vec<Vec<u8>> {
        self.state.sent.lock().unwrap().clone()
    }
}

impl DatagramPort for ScriptedPort {
    fn send(&self, buf: &[u8]) -> Result<usize, Error> {
        self.state.sent.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }

    fn recv(&self, buf: &mut [u8], _timeout: Option<Duration>) -> Result<Option<usize>, Error> {
        let Some(datagram) = self.state.incoming.lock().unwrap().pop_front() else {
            return Ok(None);
        };

        let n = datagram.len().min(buf.len());
        buf[..n].copy_from_slice(&datagram[..n]);
        Ok(Some(n))
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}
