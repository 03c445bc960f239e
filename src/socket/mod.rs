mod raw;
mod options;

pub use self::raw::{Socket, ConnectStatus};
pub use self::options::{set_reuse_addr, set_tcp_nodelay, set_linger,
						set_recv_buffer_size, set_send_buffer_size, set_keepalive};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::options::{set_keepalive_count, set_keepalive_idle, set_keepalive_interval};

/// Address family a client socket is created with.
///
/// - `Inet` / `Inet6`: TCP or UDP over IP
/// - `Local`: Unix domain, chosen when the target port is 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
	Inet,
	Inet6,
	Local,
}

impl Family {
	/// Family implied by a client target.
	pub fn for_target(port: u16, ipv6: bool) -> Self {
		match (port, ipv6) {
			(0, _) => Family::Local,
			(_, true) => Family::Inet6,
			(_, false) => Family::Inet,
		}
	}

	/// Returns the libc constant for this address family.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Family::Inet => libc::AF_INET,
			Family::Inet6 => libc::AF_INET6,
			Family::Local => libc::AF_UNIX,
		}
	}

	pub fn is_ip(self) -> bool {
		self != Family::Local
	}
}

/// Socket type.
///
/// - `Stream`: byte stream (TCP, Unix stream)
/// - `Datagram`: packets (UDP, Unix datagram)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
	Stream,
	Datagram,
}

impl Kind {
	/// Returns the libc constant for this socket type.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Kind::Stream => libc::SOCK_STREAM,
			Kind::Datagram => libc::SOCK_DGRAM,
		}
	}
}
