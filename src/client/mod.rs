//! Blocking-call clients driven by a readiness waiter.
//!
//! [`ClientSocket`] owns the target, the socket and the waiter; [`TcpClient`]
//! and [`UdpClient`] build their connect and I/O state machines on top of it.
//! Every failure except a UDP send closes the socket, so the next call starts
//! from scratch.

mod tcp;
mod udp;

pub use self::tcp::TcpClient;
pub use self::udp::UdpClient;

use std::os::fd::AsRawFd;
use log::{debug, warn};
use crate::addr::{Address, is_ipv6_host};
use crate::config::ClientConfig;
use crate::error::{ClientError, os_errno};
use crate::poll::{Event, Interest, Poller};
use crate::socket::{Family, Socket};

/// Size of each read done by the looping receives.
pub(crate) const RECV_CHUNK: usize = 8196;

/// Target, socket and readiness waiter shared by both clients.
///
/// The waiter is created by the first [`ClientSocket::init`] and reused
/// afterwards; the socket lives from the first I/O call until a failure or
/// an explicit [`ClientSocket::close`].
#[derive(Debug)]
pub struct ClientSocket {
	ip: String,
	port: u16,
	timeout_ms: i32,
	ipv6: bool,
	config: ClientConfig,
	socket: Option<Socket>,
	poller: Option<Poller>,
}

impl Default for ClientSocket {
	fn default() -> Self {
		Self::new()
	}
}

impl ClientSocket {
	pub fn new() -> Self {
		Self::with_config(ClientConfig::default())
	}

	pub fn with_config(config: ClientConfig) -> Self {
		Self {
			ip: String::new(),
			port: 0,
			timeout_ms: 0,
			ipv6: false,
			config,
			socket: None,
			poller: None,
		}
	}

	/// Points the client at a new target.
	///
	/// Any open socket is closed. Port 0 selects Unix domain addressing with
	/// `ip` as the socket path. Nothing is connected until the first I/O call.
	pub fn init(&mut self, ip: &str, port: u16, timeout_ms: i32) -> Result<(), ClientError> {
		self.poller()?;
		self.close();
		self.ip = ip.to_string();
		self.port = port;
		self.timeout_ms = timeout_ms;
		self.ipv6 = port != 0 && is_ipv6_host(ip);
		Ok(())
	}

	/// Closes the socket if one is open. The waiter is kept for reuse.
	pub fn close(&mut self) {
		let Some(socket) = self.socket.take() else {
			return;
		};
		if let Some(poller) = self.poller.as_mut() {
			let _ = poller.delete(socket.as_raw_fd());
		}
		debug!("closed fd {} to {}", socket.as_raw_fd(), self.peer());
	}

	pub fn ip(&self) -> &str {
		&self.ip
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// Per-wait timeout; negative waits forever.
	pub fn timeout_ms(&self) -> i32 {
		self.timeout_ms
	}

	pub fn is_ipv6(&self) -> bool {
		self.ipv6
	}

	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	pub fn is_open(&self) -> bool {
		self.socket.is_some()
	}

	/// Human readable target for log lines.
	pub(crate) fn peer(&self) -> String {
		if self.port == 0 {
			format!("unix:{}", self.ip)
		} else if self.ipv6 {
			format!("[{}]:{}", self.ip, self.port)
		} else {
			format!("{}:{}", self.ip, self.port)
		}
	}

	pub(crate) fn family(&self) -> Family {
		Family::for_target(self.port, self.ipv6)
	}

	pub(crate) fn target(&self) -> Result<Address, ClientError> {
		Address::resolve(&self.ip, self.port, self.ipv6).map_err(ClientError::socket)
	}

	pub(crate) fn socket(&self) -> Option<&Socket> {
		self.socket.as_ref()
	}

	/// Takes ownership of a freshly created socket and registers it.
	pub(crate) fn attach(&mut self, socket: Socket, interest: Interest) -> Result<(), ClientError> {
		let fd = socket.as_raw_fd();
		debug!("created fd {fd} ({:?}, {:?}) for {}", socket.family(), socket.kind(), self.peer());
		self.socket = Some(socket);
		let registered = self.poller()?.add(fd, interest);
		if let Err(e) = registered {
			return Err(self.fail(ClientError::socket(e)));
		}
		Ok(())
	}

	/// Closes the socket and hands `err` back for returning.
	pub(crate) fn fail(&mut self, err: ClientError) -> ClientError {
		warn!("{} failed: {err}", self.peer());
		self.close();
		err
	}

	/// Waits for the registered socket and returns the number of ready events.
	///
	/// A failed wait or an expired deadline closes the socket.
	pub(crate) fn wait(&mut self) -> Result<usize, ClientError> {
		let timeout_ms = self.timeout_ms;
		let ready = self.poller()?.wait(timeout_ms);
		match ready {
			Ok(0) => Err(self.fail(ClientError::Timeout { timeout_ms })),
			Ok(n) => Ok(n),
			Err(e) => Err(self.fail(ClientError::Select { errno: os_errno(&e) })),
		}
	}

	/// The `index`-th event of the last wait.
	pub(crate) fn event(&self, index: usize) -> Option<Event> {
		self.poller.as_ref().and_then(|poller| poller.get(index))
	}

	/// Re-arms the socket for read interest and waits until it is readable.
	///
	/// An error event without pending data means the peer went away and
	/// yields [`ClientError::Close`].
	pub(crate) fn wait_readable(&mut self) -> Result<(), ClientError> {
		let Some(fd) = self.socket.as_ref().map(AsRawFd::as_raw_fd) else {
			return Err(ClientError::Close);
		};
		let rearmed = self.poller()?.modify(fd, Interest::READ);
		if let Err(e) = rearmed {
			return Err(self.fail(ClientError::Select { errno: os_errno(&e) }));
		}

		self.wait()?;
		match self.event(0) {
			Some(ev) if ev.is_readable() => Ok(()),
			Some(ev) if ev.is_error() => Err(self.fail(ClientError::Close)),
			_ => Err(self.fail(ClientError::Select { errno: 0 })),
		}
	}

	fn poller(&mut self) -> Result<&mut Poller, ClientError> {
		let poller = match self.poller.take() {
			Some(poller) => poller,
			None => Poller::new(self.config.poll_capacity, false).map_err(ClientError::socket)?,
		};
		Ok(self.poller.insert(poller))
	}
}

impl Drop for ClientSocket {
	fn drop(&mut self) {
		self.close();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn init_tracks_target_and_family() {
		let mut base = ClientSocket::new();
		base.init("::1", 8080, 250).unwrap();
		assert!(base.is_ipv6());
		assert_eq!(base.family(), Family::Inet6);
		assert_eq!(base.peer(), "[::1]:8080");

		base.init("/tmp/a:b.sock", 0, 250).unwrap();
		assert!(!base.is_ipv6());
		assert_eq!(base.family(), Family::Local);
		assert_eq!(base.timeout_ms(), 250);
		assert!(!base.is_open());
	}

	#[test]
	fn close_is_idempotent() {
		let mut base = ClientSocket::new();
		base.init("127.0.0.1", 1, 10).unwrap();
		base.close();
		base.close();
		assert!(!base.is_open());
	}

	#[test]
	fn wait_readable_without_socket_reports_close() {
		let mut base = ClientSocket::new();
		base.init("127.0.0.1", 1, 10).unwrap();
		assert!(matches!(base.wait_readable(), Err(ClientError::Close)));
	}
}
