use log::{debug, warn};
use crate::addr::{Address, UnixAddr, is_ipv6_host};
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{ClientError, is_connect_failure, os_errno};
use crate::poll::Interest;
use crate::socket::{Kind, Socket, set_reuse_addr};
#[cfg(target_os = "linux")]
use crate::socket::Family;
use super::ClientSocket;

/// Datagram client.
///
/// The socket is connected to the target so that plain sends need no
/// address; replies are read with a single bounded wait. A failed send keeps
/// the socket open, every other failure closes it.
#[derive(Debug, Default)]
pub struct UdpClient {
	base: ClientSocket,
	local: Option<(String, u16)>,
}

impl UdpClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_config(config: ClientConfig) -> Self {
		Self {
			base: ClientSocket::with_config(config),
			local: None,
		}
	}

	/// A client aimed at the host, port and timeout of `endpoint`.
	pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self, ClientError> {
		let mut client = Self::new();
		client.init(endpoint.host(), endpoint.port(), endpoint.timeout_ms())?;
		Ok(client)
	}

	/// See [`ClientSocket::init`]. A local address set earlier is kept.
	pub fn init(&mut self, ip: &str, port: u16, timeout_ms: i32) -> Result<(), ClientError> {
		self.base.init(ip, port, timeout_ms)
	}

	pub fn close(&mut self) {
		self.base.close();
	}

	/// Binds future sockets to `ip:port` (with `SO_REUSEADDR`) before they
	/// connect. Port 0 binds to the Unix socket path `ip`.
	///
	/// Closes the current socket so the next call picks the address up.
	pub fn set_local_addr(&mut self, ip: &str, port: u16) {
		self.local = Some((ip.to_string(), port));
		self.base.close();
	}

	/// Opens and connects the socket now instead of on the first I/O call.
	pub fn connect(&mut self) -> Result<(), ClientError> {
		self.ensure_connected()
	}

	/// The address the open socket is bound to.
	pub fn local_addr(&self) -> Option<Address> {
		self.base.socket().and_then(|socket| socket.local_addr().ok())
	}

	/// Sends one datagram.
	pub fn send(&mut self, data: &[u8]) -> Result<usize, ClientError> {
		self.ensure_connected()?;
		let sent = self.datagram()?.send(data);
		sent.map_err(|e| {
			let err = ClientError::Send { errno: os_errno(&e) };
			warn!("{} failed: {err}", self.base.peer());
			err
		})
	}

	/// Receives one datagram into `buf`.
	pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, ClientError> {
		self.recv_from(buf).map(|(n, _)| n)
	}

	/// Receives one datagram into `buf` and reports who sent it.
	pub fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, Address), ClientError> {
		self.ensure_connected()?;
		self.base.wait_readable()?;

		let read = self.datagram()?.recv_from(buf);
		match read {
			Ok((n, from)) => Ok((n, from.unwrap_or_else(|| Address::Unix(UnixAddr::unnamed())))),
			Err(e) => Err(self.base.fail(ClientError::Recv { errno: os_errno(&e) })),
		}
	}

	pub fn send_recv(&mut self, data: &[u8], buf: &mut [u8]) -> Result<usize, ClientError> {
		self.send(data)?;
		self.recv(buf)
	}

	pub fn send_recv_from(&mut self, data: &[u8], buf: &mut [u8]) -> Result<(usize, Address), ClientError> {
		self.send(data)?;
		self.recv_from(buf)
	}

	fn ensure_connected(&mut self) -> Result<(), ClientError> {
		if self.base.is_open() {
			return Ok(());
		}

		let family = self.base.family();
		let socket = match Socket::new(family, Kind::Datagram) {
			Ok(socket) => socket,
			Err(e) => return Err(self.base.fail(ClientError::socket(e))),
		};
		if let Err(e) = self.prepare(&socket) {
			return Err(self.base.fail(ClientError::socket(e)));
		}
		self.base.attach(socket, Interest::READ)?;

		let target = match self.base.target() {
			Ok(target) => target,
			Err(e) => return Err(self.base.fail(e)),
		};
		let connected = self.datagram()?.connect(&target);
		match connected {
			Ok(_) => {}
			Err(e) if is_connect_failure(&e) => {
				let err = ClientError::Connect { errno: os_errno(&e), addr: self.base.peer() };
				return Err(self.base.fail(err));
			}
			Err(e) => return Err(self.base.fail(ClientError::socket(e))),
		}

		// an unbound unix datagram socket cannot be replied to
		#[cfg(target_os = "linux")]
		if family == Family::Local && self.local.is_none() {
			let bound = self.datagram()?.bind(&Address::Unix(UnixAddr::unnamed()));
			if let Err(e) = bound {
				return Err(self.base.fail(ClientError::socket(e)));
			}
		}

		debug!("datagram socket ready for {}", self.base.peer());
		Ok(())
	}

	fn prepare(&self, socket: &Socket) -> std::io::Result<()> {
		self.base.config().buffers.apply(socket)?;
		if let Some((ip, port)) = &self.local {
			let local = Address::resolve(ip, *port, *port != 0 && is_ipv6_host(ip))?;
			set_reuse_addr(socket, true)?;
			socket.bind(&local)?;
		}
		Ok(())
	}

	fn datagram(&self) -> Result<&Socket, ClientError> {
		self.base.socket().ok_or(ClientError::Close)
	}
}

impl std::ops::Deref for UdpClient {
	type Target = ClientSocket;

	fn deref(&self) -> &ClientSocket {
		&self.base
	}
}
