use log::debug;
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{ClientError, is_connect_failure, os_errno};
use crate::poll::Interest;
use crate::socket::{ConnectStatus, Family, Kind, Socket};
use super::{ClientSocket, RECV_CHUNK};

/// Line terminator used by [`TcpClient::send_recv_line`].
const LINE_SEPARATOR: &[u8] = b"\r\n";

/// Stream client with a connect timeout and framed receives.
///
/// Connection happens lazily on the first I/O call and is kept until a
/// failure or [`TcpClient::close`]. Every wait is bounded by the timeout
/// given to [`TcpClient::init`]; the looping receives apply it per wait, not
/// to the whole call.
///
/// Bytes read past a separator by [`TcpClient::recv_by_sep`] are kept and
/// handed out first by the next receive.
///
/// # Example
/// ```no_run
/// use tarslane::TcpClient;
///
/// let mut client = TcpClient::new();
/// client.init("127.0.0.1", 8080, 3000)?;
/// let reply = client.send_recv_line(b"PING\r\n")?;
/// assert!(reply.ends_with(b"\r\n"));
/// # Ok::<(), tarslane::ClientError>(())
/// ```
#[derive(Debug, Default)]
pub struct TcpClient {
	base: ClientSocket,
	pending: Vec<u8>,
}

impl TcpClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_config(config: ClientConfig) -> Self {
		Self {
			base: ClientSocket::with_config(config),
			pending: Vec::new(),
		}
	}

	/// A client aimed at the host, port and timeout of `endpoint`.
	pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self, ClientError> {
		let mut client = Self::new();
		client.init(endpoint.host(), endpoint.port(), endpoint.timeout_ms())?;
		Ok(client)
	}

	/// See [`ClientSocket::init`].
	pub fn init(&mut self, ip: &str, port: u16, timeout_ms: i32) -> Result<(), ClientError> {
		self.pending.clear();
		self.base.init(ip, port, timeout_ms)
	}

	pub fn close(&mut self) {
		self.pending.clear();
		self.base.close();
	}

	/// Connects now instead of on the first I/O call.
	pub fn connect(&mut self) -> Result<(), ClientError> {
		self.ensure_connected()
	}

	pub fn is_connected(&self) -> bool {
		self.base.is_open()
	}

	/// Sends `data` with a single blocking send and returns the byte count
	/// the kernel accepted.
	pub fn send(&mut self, data: &[u8]) -> Result<usize, ClientError> {
		self.ensure_connected()?;
		let sent = self.stream()?.send(data);
		sent.map_err(|e| self.base.fail(ClientError::Send { errno: os_errno(&e) }))
	}

	/// One receive into `buf`; may return fewer bytes than `buf` holds.
	pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, ClientError> {
		self.ensure_connected()?;
		if !self.pending.is_empty() {
			return Ok(self.take_pending(buf));
		}
		if buf.is_empty() {
			return Ok(0);
		}

		match self.read_ready(buf)? {
			0 => Err(self.base.fail(ClientError::Close)),
			n => Ok(n),
		}
	}

	/// Receives until `sep` shows up and returns everything up to and
	/// including it.
	pub fn recv_by_sep(&mut self, sep: &[u8]) -> Result<Vec<u8>, ClientError> {
		if sep.is_empty() {
			let mut buf = vec![0; RECV_CHUNK];
			let n = self.recv(&mut buf)?;
			buf.truncate(n);
			return Ok(buf);
		}

		self.ensure_connected()?;
		let mut scanned = 0;
		let mut chunk = vec![0; RECV_CHUNK];
		loop {
			if let Some(pos) = find(&self.pending[scanned..], sep) {
				let end = scanned + pos + sep.len();
				let rest = self.pending.split_off(end);
				return Ok(std::mem::replace(&mut self.pending, rest));
			}
			scanned = self.pending.len().saturating_sub(sep.len() - 1);

			self.base.wait_readable()?;
			let read = self.stream()?.recv(&mut chunk);
			match read {
				Ok(0) => return Err(self.base.fail(ClientError::Close)),
				Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
				Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
				Err(e) => return Err(self.base.fail(ClientError::Recv { errno: os_errno(&e) })),
			}
		}
	}

	/// Receives until the peer closes and returns everything read.
	///
	/// The socket is closed afterwards.
	pub fn recv_all(&mut self) -> Result<Vec<u8>, ClientError> {
		self.ensure_connected()?;
		let mut data = std::mem::take(&mut self.pending);
		let mut chunk = vec![0; RECV_CHUNK];
		loop {
			match self.read_ready(&mut chunk)? {
				0 => {
					debug!("{} closed after {} bytes", self.base.peer(), data.len());
					self.base.close();
					return Ok(data);
				}
				n => data.extend_from_slice(&chunk[..n]),
			}
		}
	}

	/// Fills `buf` completely.
	///
	/// The peer closing first is [`ClientError::Close`].
	pub fn recv_length(&mut self, buf: &mut [u8]) -> Result<(), ClientError> {
		self.ensure_connected()?;
		let mut filled = self.take_pending(buf);
		while filled < buf.len() {
			match self.read_ready(&mut buf[filled..])? {
				0 => return Err(self.base.fail(ClientError::Close)),
				n => filled += n,
			}
		}
		Ok(())
	}

	pub fn send_recv(&mut self, data: &[u8], buf: &mut [u8]) -> Result<usize, ClientError> {
		self.send(data)?;
		self.recv(buf)
	}

	pub fn send_recv_by_sep(&mut self, data: &[u8], sep: &[u8]) -> Result<Vec<u8>, ClientError> {
		self.send(data)?;
		self.recv_by_sep(sep)
	}

	/// [`TcpClient::send_recv_by_sep`] with a CRLF separator.
	pub fn send_recv_line(&mut self, data: &[u8]) -> Result<Vec<u8>, ClientError> {
		self.send_recv_by_sep(data, LINE_SEPARATOR)
	}

	pub fn send_recv_all(&mut self, data: &[u8]) -> Result<Vec<u8>, ClientError> {
		self.send(data)?;
		self.recv_all()
	}

	/// Connects if no socket is open.
	///
	/// The socket is created non-blocking, connected under the timeout and
	/// switched back to blocking once `SO_ERROR` confirms the handshake.
	fn ensure_connected(&mut self) -> Result<(), ClientError> {
		if self.base.is_open() {
			return Ok(());
		}
		self.pending.clear();

		let family = self.base.family();
		let socket = match Socket::new(family, Kind::Stream) {
			Ok(socket) => socket,
			Err(e) => return Err(self.base.fail(ClientError::socket(e))),
		};
		if let Err(e) = prepare(&socket, family, self.base.config()) {
			return Err(self.base.fail(ClientError::socket(e)));
		}
		self.base.attach(socket, Interest::READ | Interest::WRITE)?;

		let target = match self.base.target() {
			Ok(target) => target,
			Err(e) => return Err(self.base.fail(e)),
		};
		let started = self.stream()?.connect(&target);
		match started {
			Ok(ConnectStatus::Connected | ConnectStatus::InProgress) => {}
			Err(e) if is_connect_failure(&e) => {
				let err = ClientError::Connect { errno: os_errno(&e), addr: self.base.peer() };
				return Err(self.base.fail(err));
			}
			Err(e) => return Err(self.base.fail(ClientError::socket(e))),
		}

		let ready = self.base.wait()?;
		for index in 0..ready {
			let Some(ev) = self.base.event(index) else {
				continue;
			};
			if ev.is_error() {
				let errno = match self.stream()?.take_error() {
					Ok(Some(e)) => e.raw_os_error().unwrap_or(0),
					_ => 0,
				};
				let err = ClientError::Connect { errno, addr: self.base.peer() };
				return Err(self.base.fail(err));
			}
			if ev.is_writable() {
				let errno = match self.stream()?.take_error() {
					Ok(None) => continue,
					Ok(Some(e)) => e.raw_os_error().unwrap_or(0),
					Err(e) => os_errno(&e),
				};
				let err = ClientError::Connect { errno, addr: self.base.peer() };
				return Err(self.base.fail(err));
			}
		}

		let blocking = self.stream()?.set_nonblocking(false);
		if let Err(e) = blocking {
			return Err(self.base.fail(ClientError::socket(e)));
		}
		debug!("connected to {}", self.base.peer());
		Ok(())
	}

	fn stream(&self) -> Result<&Socket, ClientError> {
		self.base.socket().ok_or(ClientError::Close)
	}

	/// Waits for readability, then does one receive. `Ok(0)` is the peer closing.
	fn read_ready(&mut self, buf: &mut [u8]) -> Result<usize, ClientError> {
		self.base.wait_readable()?;
		let read = self.stream()?.recv(buf);
		read.map_err(|e| self.base.fail(ClientError::Recv { errno: os_errno(&e) }))
	}

	fn take_pending(&mut self, buf: &mut [u8]) -> usize {
		let n = self.pending.len().min(buf.len());
		buf[..n].copy_from_slice(&self.pending[..n]);
		self.pending.drain(..n);
		n
	}
}

impl std::ops::Deref for TcpClient {
	type Target = ClientSocket;

	fn deref(&self) -> &ClientSocket {
		&self.base
	}
}

fn prepare(socket: &Socket, family: Family, config: &ClientConfig) -> std::io::Result<()> {
	socket.set_nonblocking(true)?;
	if family.is_ip() {
		config.tcp.apply(socket)?;
	}
	config.buffers.apply(socket)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack.windows(needle.len()).position(|window| window == needle)
}
