//! Client socket configuration.
//!
//! Applied once per socket, right after creation and before connect.
//! The defaults reproduce the classic client setup: Nagle off, keep-alive on,
//! and an abortive close so the client never lingers in CLOSE_WAIT.

use crate::socket::{
	Socket,
	set_tcp_nodelay, set_keepalive, set_linger,
	set_recv_buffer_size, set_send_buffer_size,
};
#[cfg(any(target_os = "linux", target_os = "android"))]
use crate::socket::{set_keepalive_idle, set_keepalive_interval, set_keepalive_count};

/// Capacity hint for each client's readiness waiter.
pub const DEFAULT_POLL_CAPACITY: usize = 10;

/// Buffer size configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferConfig {
	pub recv: Option<usize>,
	pub send: Option<usize>,
}

impl BufferConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn recv(mut self, size: usize) -> Self {
		self.recv = Some(size);
		self
	}

	pub fn send(mut self, size: usize) -> Self {
		self.send = Some(size);
		self
	}

	pub fn both(mut self, size: usize) -> Self {
		self.recv = Some(size);
		self.send = Some(size);
		self
	}

	pub(crate) fn apply(&self, socket: &Socket) -> std::io::Result<()> {
		if let Some(size) = self.recv {
			set_recv_buffer_size(socket, size)?;
		}
		if let Some(size) = self.send {
			set_send_buffer_size(socket, size)?;
		}
		Ok(())
	}
}

/// Keep-alive timing. `None` fields keep the kernel default.
///
/// The timing knobs are only honoured on Linux and Android.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepaliveConfig {
	pub idle_secs: Option<u32>,
	pub interval_secs: Option<u32>,
	pub count: Option<u32>,
}

impl KeepaliveConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn idle(mut self, secs: u32) -> Self {
		self.idle_secs = Some(secs);
		self
	}

	pub fn interval(mut self, secs: u32) -> Self {
		self.interval_secs = Some(secs);
		self
	}

	pub fn count(mut self, count: u32) -> Self {
		self.count = Some(count);
		self
	}

	fn apply(&self, socket: &Socket) -> std::io::Result<()> {
		set_keepalive(socket, true)?;
		#[cfg(any(target_os = "linux", target_os = "android"))]
		{
			if let Some(secs) = self.idle_secs {
				set_keepalive_idle(socket, secs)?;
			}
			if let Some(secs) = self.interval_secs {
				set_keepalive_interval(socket, secs)?;
			}
			if let Some(count) = self.count {
				set_keepalive_count(socket, count)?;
			}
		}
		Ok(())
	}
}

/// Options for TCP over IP. Unix domain stream sockets skip them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpConfig {
	pub nodelay: bool,
	pub keepalive: Option<KeepaliveConfig>,
	/// Outer `None` leaves SO_LINGER untouched.
	pub linger: Option<Option<u32>>,
}

impl Default for TcpConfig {
	fn default() -> Self {
		Self {
			nodelay: true,
			keepalive: Some(KeepaliveConfig::default()),
			linger: Some(Some(0)),
		}
	}
}

impl TcpConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn nodelay(mut self, enable: bool) -> Self {
		self.nodelay = enable;
		self
	}

	pub fn keepalive(mut self, config: Option<KeepaliveConfig>) -> Self {
		self.keepalive = config;
		self
	}

	pub fn linger(mut self, seconds: Option<Option<u32>>) -> Self {
		self.linger = seconds;
		self
	}

	pub(crate) fn apply(&self, socket: &Socket) -> std::io::Result<()> {
		if let Some(linger) = self.linger {
			set_linger(socket, linger)?;
		}
		if let Some(config) = self.keepalive {
			config.apply(socket)?;
		}
		if self.nodelay {
			set_tcp_nodelay(socket, true)?;
		}
		Ok(())
	}
}

/// Everything a client needs besides its target.
///
/// # Example
/// ```
/// use tarslane::{ClientConfig, TcpConfig, BufferConfig, TcpClient};
///
/// let config = ClientConfig::new()
///     .tcp(TcpConfig::new().linger(None))
///     .buffers(BufferConfig::new().both(64 * 1024));
/// let mut client = TcpClient::with_config(config);
/// client.init("127.0.0.1", 8080, 1000).unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
	pub tcp: TcpConfig,
	pub buffers: BufferConfig,
	pub poll_capacity: usize,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			tcp: TcpConfig::default(),
			buffers: BufferConfig::default(),
			poll_capacity: DEFAULT_POLL_CAPACITY,
		}
	}
}

impl ClientConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn tcp(mut self, config: TcpConfig) -> Self {
		self.tcp = config;
		self
	}

	pub fn buffers(mut self, config: BufferConfig) -> Self {
		self.buffers = config;
		self
	}

	pub fn poll_capacity(mut self, capacity: usize) -> Self {
		self.poll_capacity = capacity;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_classic_client_setup() {
		let config = ClientConfig::default();
		assert!(config.tcp.nodelay);
		assert!(config.tcp.keepalive.is_some());
		assert_eq!(config.tcp.linger, Some(Some(0)));
		assert_eq!(config.buffers, BufferConfig::default());
		assert_eq!(config.poll_capacity, DEFAULT_POLL_CAPACITY);
	}

	#[test]
	fn builders_chain() {
		let config = ClientConfig::new()
			.tcp(TcpConfig::new().nodelay(false).keepalive(Some(KeepaliveConfig::new().idle(30).count(3))))
			.buffers(BufferConfig::new().recv(4096))
			.poll_capacity(4);
		assert!(!config.tcp.nodelay);
		assert_eq!(config.tcp.keepalive.unwrap().idle_secs, Some(30));
		assert_eq!(config.tcp.keepalive.unwrap().count, Some(3));
		assert_eq!(config.buffers.recv, Some(4096));
		assert_eq!(config.buffers.send, None);
		assert_eq!(config.poll_capacity, 4);
	}
}
