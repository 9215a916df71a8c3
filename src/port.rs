use std::net::{SocketAddr, UdpSocket};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags};

use crate::Error;

pub trait DatagramPort {
    fn send(&self, buf: &[u8]) -> Result<usize, Error>;

    // Ok(None) is a timed-out poll, not an error. timeout: None blocks indefinitely.
    fn recv(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<Option<usize>, Error>;

    fn close(&self) -> Result<(), Error>;
}

pub struct UdpPort {
    socket: UdpSocket,
    closed: AtomicBool,
}

impl UdpPort {
    pub fn connect(local: SocketAddr, remote: SocketAddr) -> Result<Self, Error> {
        let socket = UdpSocket::bind(local)?;
        socket.connect(remote)?;
        Ok(UdpPort {
            socket,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::PortClosed)
        } else {
            Ok(())
        }
    }
}

impl DatagramPort for UdpPort {
    fn send(&self, buf: &[u8]) -> Result<usize, Error> {
        self.ensure_open()?;
        Ok(self.socket.send(buf)?)
    }

    fn recv(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<Option<usize>, Error> {
        self.ensure_open()?;

        // set_read_timeout rejects Duration::ZERO; poll doesn't, and the send
        // loop's opportunistic post-emit check needs exactly a zero timeout.
        let poll_timeout = match timeout {
            Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
            None => -1,
        };

        let mut fds = [PollFd::new(self.socket.as_raw_fd(), PollFlags::POLLIN)];
        let ready = poll(&mut fds, poll_timeout)
            .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;

        if ready == 0 {
            return Ok(None);
        }

        Ok(Some(self.socket.recv(buf)?))
    }

    fn close(&self) -> Result<(), Error> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
