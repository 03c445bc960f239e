use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use crate::addr::{Address, ToSockAddr};
use crate::error::{SocketError, IoError, errno};
use super::{Family, Kind};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

/// Outcome of a `connect()` that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
	/// Completed synchronously (loopback, Unix domain, datagram sockets).
	Connected,
	/// Non-blocking connect started; completion shows up as write readiness.
	InProgress,
}

/// An owned client socket whose family and type are picked at runtime.
///
/// Dropping it closes the descriptor, which also removes it from any
/// readiness waiter it was registered with.
#[derive(Debug)]
pub struct Socket {
	fd: OwnedFd,
	family: Family,
	kind: Kind,
}

impl Socket {
	/// Creates a new socket.
	///
	/// The descriptor is close-on-exec. On Apple targets `SO_NOSIGPIPE` is set
	/// so a send to a reset peer reports `EPIPE` instead of raising SIGPIPE.
	pub fn new(family: Family, kind: Kind) -> std::io::Result<Self> {
		#[cfg(any(target_os = "linux", target_os = "android"))]
		let ty = kind.raw() | libc::SOCK_CLOEXEC;
		#[cfg(not(any(target_os = "linux", target_os = "android")))]
		let ty = kind.raw();

		let fd = unsafe { libc::socket(family.raw(), ty, 0) };
		if fd == -1 {
			return Err(SocketError::Create { errno: errno() }.into());
		}
		let socket = Self {
			fd: unsafe { OwnedFd::from_raw_fd(fd) },
			family,
			kind,
		};

		#[cfg(not(any(target_os = "linux", target_os = "android")))]
		socket.set_cloexec()?;
		#[cfg(any(target_os = "macos", target_os = "ios"))]
		socket.set_flag(libc::SOL_SOCKET, libc::SO_NOSIGPIPE, "SO_NOSIGPIPE")?;

		Ok(socket)
	}

	pub fn family(&self) -> Family {
		self.family
	}

	pub fn kind(&self) -> Kind {
		self.kind
	}

	/// Sets or clears `O_NONBLOCK`.
	///
	/// The client connects non-blocking and flips back to blocking once the
	/// handshake is confirmed.
	pub fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
		let flags = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_GETFL) };
		if flags == -1 {
			return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" }.into());
		}

		let new_flags = if nonblocking {
			flags | libc::O_NONBLOCK
		} else {
			flags & !libc::O_NONBLOCK
		};

		let result = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_SETFL, new_flags) };
		if result == -1 {
			return Err(SocketError::SetOption { errno: errno(), option: "O_NONBLOCK" }.into());
		}
		Ok(())
	}

	/// Starts (or, for blocking and datagram sockets, performs) a connect.
	///
	/// `EINPROGRESS` is not an error here; it yields [`ConnectStatus::InProgress`].
	pub fn connect(&self, addr: &Address) -> std::io::Result<ConnectStatus> {
		let result = addr.with_raw(|ptr, len| unsafe {
			libc::connect(self.as_raw_fd(), ptr, len)
		});

		match result {
			Some(0) => Ok(ConnectStatus::Connected),
			Some(_) => {
				let e = errno();
				if e == libc::EINPROGRESS {
					Ok(ConnectStatus::InProgress)
				} else {
					Err(SocketError::Connect { errno: e, addr: addr.to_string() }.into())
				}
			}
			None => Err(SocketError::InvalidAddress { reason: "address too long" }.into()),
		}
	}

	/// Binds the socket to a local address.
	///
	/// Binding a Unix socket to the unnamed address asks Linux to autobind
	/// it to a fresh abstract name.
	pub fn bind(&self, addr: &Address) -> std::io::Result<()> {
		let result = addr.with_raw(|ptr, len| unsafe {
			libc::bind(self.as_raw_fd(), ptr, len)
		});

		match result {
			Some(-1) => Err(SocketError::Bind { errno: errno(), addr: addr.to_string() }.into()),
			Some(_) => Ok(()),
			None => Err(SocketError::InvalidAddress { reason: "address too long" }.into()),
		}
	}

	/// Reads and clears the pending socket error (`SO_ERROR`).
	///
	/// `None` means the asynchronous connect succeeded. Reading clears the
	/// error, so only call once per readiness report.
	pub fn take_error(&self) -> std::io::Result<Option<std::io::Error>> {
		let mut error: libc::c_int = 0;
		let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

		let result = unsafe {
			libc::getsockopt(
				self.as_raw_fd(),
				libc::SOL_SOCKET,
				libc::SO_ERROR,
				&mut error as *mut _ as *mut libc::c_void,
				&mut len,
			)
		};

		if result == -1 {
			return Err(SocketError::GetOption { errno: errno(), option: "SO_ERROR" }.into());
		}

		if error == 0 {
			Ok(None)
		} else {
			Ok(Some(std::io::Error::from_raw_os_error(error)))
		}
	}

	/// One `send()` of the whole buffer; may report fewer bytes than given.
	pub fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
		let n = unsafe {
			libc::send(
				self.as_raw_fd(),
				buf.as_ptr() as *const libc::c_void,
				buf.len(),
				SEND_FLAGS,
			)
		};

		if n == -1 {
			Err(IoError::Write { errno: errno() }.into())
		} else {
			Ok(n as usize)
		}
	}

	/// One `recv()`. `Ok(0)` on a stream socket means the peer closed.
	pub fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
		let n = unsafe {
			libc::recv(
				self.as_raw_fd(),
				buf.as_mut_ptr() as *mut libc::c_void,
				buf.len(),
				0,
			)
		};

		if n == -1 {
			Err(IoError::Read { errno: errno() }.into())
		} else {
			Ok(n as usize)
		}
	}

	/// One `recvfrom()`, returning the sender when the kernel reported one.
	pub fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, Option<Address>)> {
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

		let n = unsafe {
			libc::recvfrom(
				self.as_raw_fd(),
				buf.as_mut_ptr() as *mut libc::c_void,
				buf.len(),
				0,
				&mut storage as *mut _ as *mut libc::sockaddr,
				&mut len,
			)
		};

		if n == -1 {
			return Err(IoError::Read { errno: errno() }.into());
		}

		let addr = unsafe { Address::from_storage(&storage, len) };
		Ok((n as usize, addr))
	}

	/// Returns the local address of this socket.
	pub fn local_addr(&self) -> std::io::Result<Address> {
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

		let result = unsafe {
			libc::getsockname(
				self.as_raw_fd(),
				&mut storage as *mut _ as *mut libc::sockaddr,
				&mut len,
			)
		};

		if result == -1 {
			return Err(SocketError::GetOption { errno: errno(), option: "SO_SOCKNAME" }.into());
		}

		unsafe { Address::from_storage(&storage, len) }
			.ok_or_else(|| SocketError::InvalidAddress { reason: "invalid address" }.into())
	}

	#[cfg(not(any(target_os = "linux", target_os = "android")))]
	fn set_cloexec(&self) -> std::io::Result<()> {
		let result = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
		if result == -1 {
			return Err(SocketError::SetOption { errno: errno(), option: "FD_CLOEXEC" }.into());
		}
		Ok(())
	}

	#[cfg(any(target_os = "macos", target_os = "ios"))]
	fn set_flag(&self, level: libc::c_int, name: libc::c_int, option: &'static str) -> std::io::Result<()> {
		let val: libc::c_int = 1;
		let result = unsafe {
			libc::setsockopt(
				self.as_raw_fd(),
				level,
				name,
				&val as *const _ as *const libc::c_void,
				std::mem::size_of::<libc::c_int>() as libc::socklen_t,
			)
		};
		if result == -1 {
			return Err(SocketError::SetOption { errno: errno(), option }.into());
		}
		Ok(())
	}
}

impl AsRawFd for Socket {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl AsFd for Socket {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.fd.as_fd()
	}
}
