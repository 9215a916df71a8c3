use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;

use log::{debug, trace, warn};

use crate::config::Config;
use crate::port::{DatagramPort, UdpPort};
use crate::segment::Segment;
use crate::Error;

#[derive(Debug)]
struct InFlight {
    // Stamped once at first emission. Retransmits resend it unchanged and only
    // restamp sent_at; a fresher ack rides along on the next segment or pure ACK.
    ack: u64,
    payload: Vec<u8>,
    sent_at: Instant,
}

enum PollOutcome {
    TimedOut,
    Received,
}

pub struct Endpoint<P: DatagramPort = UdpPort> {
    port: P,
    config: Config,

    sent_bytes: u64,
    confirmed_bytes: u64,
    received_bytes: u64,

    send_window: BTreeMap<u64, InFlight>,
    recv_window: BTreeMap<u64, Vec<u8>>,
    recv_buffer: VecDeque<u8>,

    closed: bool,
}

impl Endpoint<UdpPort> {
    pub fn connect(local: SocketAddr, remote: SocketAddr) -> Result<Self, Error> {
        Endpoint::with_port(UdpPort::connect(local, remote)?, Config::default())
    }
}

impl<P: DatagramPort> Endpoint<P> {
    pub fn with_port(port: P, config: Config) -> Self {
        Endpoint {
            port,
            config,
            sent_bytes: 0,
            confirmed_bytes: 0,
            received_bytes: 0,
            send_window: BTreeMap::new(),
            recv_window: BTreeMap::new(),
            recv_buffer: VecDeque::new(),
            closed: false,
        }
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    pub fn confirmed_bytes(&self) -> u64 {
        self.confirmed_bytes
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.closed = true;
        self.port.close()
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed {
            Err(Error::PortClosed)
        } else {
            Ok(())
        }
    }

    // Returns once every byte handed to the port has been confirmed, or once
    // the retry cap is hit; on the latter path the count handed off may exceed
    // the confirmed count and the caller is expected to resubmit the remainder.
    pub fn submit(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.ensure_open()?;

        if data.is_empty() {
            return Ok(0);
        }

        let mut remaining = data;
        let mut handed = 0usize;
        let mut attempts = 0u32;

        while (!remaining.is_empty() || self.confirmed_bytes < self.sent_bytes)
            && attempts < self.config.retry_cap
        {
            let window_locked =
                self.sent_bytes - self.confirmed_bytes > self.config.window_size;

            if !window_locked && !remaining.is_empty() {
                let take = remaining.len().min(self.config.max_segment_size);
                let segment = Segment::new(
                    self.sent_bytes,
                    self.received_bytes,
                    remaining[..take].to_vec(),
                );

                let sent_len = self.emit(segment)?;
                remaining = &remaining[sent_len..];
                handed += sent_len;

                // Opportunistic non-blocking poll: without this the window can
                // fill before the send loop ever sees the ACKs that unlock it.
                self.poll_once(Some(std::time::Duration::ZERO))?;
            } else {
                match self.poll_once(Some(self.config.ack_timeout))? {
                    PollOutcome::Received => attempts = 0,
                    PollOutcome::TimedOut => attempts += 1,
                }
            }

            self.retransmit_oldest()?;
        }

        if attempts >= self.config.retry_cap {
            warn!(
                "submit: peer unresponsive after {} consecutive ACK timeouts, {handed} bytes handed off unconfirmed",
                self.config.retry_cap
            );
        }

        Ok(handed)
    }

    pub fn consume(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        self.ensure_open()?;

        if n == 0 {
            return Ok(Vec::new());
        }

        while self.recv_buffer.len() < n {
            self.poll_once(None)?;
        }

        Ok(self.recv_buffer.drain(..n).collect())
    }

    // seq == sent_bytes is a fresh emission and advances sent_bytes; seq < sent_bytes
    // is a retransmission and never advances it; seq > sent_bytes is a bug, not a
    // network condition — it means a segment was built against stale state.
    fn emit(&mut self, mut segment: Segment) -> Result<usize, Error> {
        let seq = segment.seq;
        let requested = segment.payload.len();

        let wire_bytes = self.port.send(&segment.encode())?;
        let sent_len = wire_bytes.saturating_sub(crate::segment::HEADER_LEN).min(requested);

        if seq == self.sent_bytes {
            self.sent_bytes += sent_len as u64;
        } else if seq > self.sent_bytes {
            return Err(Error::InvariantViolation(
                "emit: segment seq is ahead of sent_bytes",
            ));
        }

        trace!("emit: seq={seq} ack={} len={sent_len}", segment.ack);

        if sent_len > 0 {
            // A short datagram send truncates the payload actually in flight;
            // the dropped remainder is recovered by the oldest-segment
            // retransmit path because sent_bytes never advanced past it.
            segment.payload.truncate(sent_len);
            self.send_window.insert(
                seq,
                InFlight {
                    ack: segment.ack,
                    payload: segment.payload,
                    sent_at: Instant::now(),
                },
            );
        }

        Ok(sent_len)
    }

    fn poll_once(&mut self, timeout: Option<std::time::Duration>) -> Result<PollOutcome, Error> {
        let mut buf = vec![0u8; self.config.max_segment_size + crate::segment::HEADER_LEN];

        let received = match self.port.recv(&mut buf, timeout)? {
            Some(n) => n,
            None => return Ok(PollOutcome::TimedOut),
        };

        let segment = match Segment::decode(&buf[..received]) {
            Ok(segment) => segment,
            Err(_) => {
                // Dropped silently, but still counts as Received, not a timeout.
                warn!("dropping malformed segment ({received} bytes, header is 16)");
                return Ok(PollOutcome::Received);
            }
        };

        trace!("recv: seq={} ack={} len={}", segment.seq, segment.ack, segment.payload.len());

        if segment.ack > self.confirmed_bytes {
            self.confirmed_bytes = segment.ack;
            self.sweep_send_window();
        }

        if !segment.payload.is_empty() {
            self.recv_window.insert(segment.seq, segment.payload);
            self.sweep_recv_window()?;
        }

        Ok(PollOutcome::Received)
    }

    fn sweep_send_window(&mut self) {
        while let Some((&seq, _)) = self.send_window.iter().next() {
            if seq < self.confirmed_bytes {
                self.send_window.remove(&seq);
            } else {
                break;
            }
        }
    }

    fn sweep_recv_window(&mut self) -> Result<(), Error> {
        let mut popped_any = false;

        loop {
            let Some((&seq, _)) = self.recv_window.iter().next() else {
                break;
            };

            if seq < self.received_bytes {
                self.recv_window.remove(&seq);
                popped_any = true;
            } else if seq == self.received_bytes {
                let payload = self.recv_window.remove(&seq).unwrap();
                self.received_bytes += payload.len() as u64;
                self.recv_buffer.extend(payload);
                popped_any = true;
            } else {
                break;
            }
        }

        if popped_any {
            // Fires even for a stale duplicate that advanced nothing — harmless, wasteful.
            let ack = Segment::pure_ack(self.sent_bytes, self.received_bytes);
            self.emit(ack)?;
        }

        Ok(())
    }

    fn retransmit_oldest(&mut self) -> Result<(), Error> {
        let Some((&seq, inflight)) = self.send_window.iter().next() else {
            return Ok(());
        };

        if inflight.sent_at.elapsed() <= self.config.ack_timeout {
            return Ok(());
        }

        debug!("retransmit: seq={seq} age={:?}", inflight.sent_at.elapsed());

        let segment = Segment::new(seq, inflight.ack, inflight.payload.clone());
        self.emit(segment)?;

        Ok(())
    }
}
