//! Address families and related types.
//!
//! A client picks its family at runtime from the target it was given:
//! - port 0 selects a Unix domain address, the host being the path
//! - otherwise the host is an IPv4 or IPv6 literal, or a name to resolve

mod ipv4;
mod ipv6;
mod unix;
pub use self::ipv4::SocketAddrV4;
pub use self::ipv6::SocketAddrV6;
pub use self::unix::UnixAddr;

use std::net::ToSocketAddrs;
use crate::error::SocketError;
use crate::socket::Family;

/// Trait for address types that can be converted to raw sockaddr for syscalls.
pub trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	/// Returns None if the address is invalid (e.g., path too long for Unix).
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}

/// Trait for address types that can be created from raw sockaddr.
pub trait FromSockAddr: Sized {
	/// Creates address from raw sockaddr storage.
	///
	/// # Safety
	/// `addr` must point to at least `len` readable bytes of the correct family.
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self>;
}

impl FromSockAddr for SocketAddrV4 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in) };
		Some(Self::from_raw(raw))
	}
}

impl FromSockAddr for SocketAddrV6 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in6) };
		Some(Self::from_raw(raw))
	}
}

impl FromSockAddr for UnixAddr {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if (len as usize) > std::mem::size_of::<libc::sockaddr_un>() {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_un) };
		Some(Self::from_raw(raw, len))
	}
}

/// A socket address of whichever family the target selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
	V4(SocketAddrV4),
	V6(SocketAddrV6),
	Unix(UnixAddr),
}

impl Address {
	/// Turns a client target into a concrete address.
	///
	/// Port 0 means `host` is a Unix socket path. Literal IPs are used as-is;
	/// names go through the system resolver, preferring the family `ipv6` asks for.
	pub fn resolve(host: &str, port: u16, ipv6: bool) -> std::io::Result<Self> {
		if port == 0 {
			return Ok(Address::Unix(UnixAddr::new(host)));
		}

		let literal = host.trim_start_matches('[').trim_end_matches(']');
		if let Ok(ip) = literal.parse::<std::net::IpAddr>() {
			return Ok(std::net::SocketAddr::new(ip, port).into());
		}

		let candidates: Vec<std::net::SocketAddr> = (host, port)
			.to_socket_addrs()
			.map_err(|_| SocketError::Resolve { host: host.to_string() })?
			.collect();

		candidates
			.iter()
			.find(|addr| addr.is_ipv6() == ipv6)
			.or_else(|| candidates.first())
			.map(|addr| Address::from(*addr))
			.ok_or_else(|| SocketError::Resolve { host: host.to_string() }.into())
	}

	/// Address family to create a socket with.
	pub fn family(&self) -> Family {
		match self {
			Address::V4(_) => Family::Inet,
			Address::V6(_) => Family::Inet6,
			Address::Unix(_) => Family::Local,
		}
	}

	/// The host part as text: dotted quad, IPv6 literal, or socket path.
	pub fn ip_string(&self) -> String {
		match self {
			Address::V4(addr) => std::net::Ipv4Addr::from(addr.ip()).to_string(),
			Address::V6(addr) => std::net::Ipv6Addr::from(addr.ip()).to_string(),
			Address::Unix(addr) => addr.to_string(),
		}
	}

	/// Port number, 0 for Unix domain addresses.
	pub fn port(&self) -> u16 {
		match self {
			Address::V4(addr) => addr.port(),
			Address::V6(addr) => addr.port(),
			Address::Unix(_) => 0,
		}
	}

	/// Decodes whatever the kernel wrote into `storage`.
	///
	/// # Safety
	/// `storage` must have been filled by a syscall that reported `len`.
	pub(crate) unsafe fn from_storage(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Option<Self> {
		let ptr = storage as *const _ as *const libc::sockaddr;
		if (len as usize) < std::mem::size_of::<libc::sa_family_t>() {
			return None;
		}
		unsafe {
			match storage.ss_family as libc::c_int {
				libc::AF_INET => SocketAddrV4::from_sockaddr(ptr, len).map(Address::V4),
				libc::AF_INET6 => SocketAddrV6::from_sockaddr(ptr, len).map(Address::V6),
				libc::AF_UNIX => UnixAddr::from_sockaddr(ptr, len).map(Address::Unix),
				_ => None,
			}
		}
	}
}

impl From<std::net::SocketAddr> for Address {
	fn from(addr: std::net::SocketAddr) -> Self {
		match addr {
			std::net::SocketAddr::V4(v4) => Address::V4(v4.into()),
			std::net::SocketAddr::V6(v6) => Address::V6(v6.into()),
		}
	}
}

impl std::fmt::Display for Address {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Address::V4(addr) => std::fmt::Display::fmt(addr, f),
			Address::V6(addr) => std::fmt::Display::fmt(addr, f),
			Address::Unix(addr) => std::fmt::Display::fmt(addr, f),
		}
	}
}

impl ToSockAddr for Address {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		match self {
			Address::V4(addr) => addr.with_raw(f),
			Address::V6(addr) => addr.with_raw(f),
			Address::Unix(addr) => addr.with_raw(f),
		}
	}
}

/// Whether a host string names an IPv6 address. Any colon counts.
pub fn is_ipv6_host(host: &str) -> bool {
	host.contains(':')
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn literal_hosts_skip_the_resolver() {
		let v4 = Address::resolve("127.0.0.1", 8080, false).unwrap();
		assert_eq!(v4, Address::V4(SocketAddrV4::new([127, 0, 0, 1], 8080)));
		assert_eq!(v4.family(), Family::Inet);
		assert_eq!(v4.to_string(), "127.0.0.1:8080");

		let v6 = Address::resolve("::1", 53, true).unwrap();
		assert_eq!(v6.family(), Family::Inet6);
		assert_eq!(v6.ip_string(), "::1");
		assert_eq!(v6.port(), 53);
	}

	#[test]
	fn port_zero_means_unix_path() {
		let addr = Address::resolve("/tmp/lane.sock", 0, false).unwrap();
		assert_eq!(addr, Address::Unix(UnixAddr::new("/tmp/lane.sock")));
		assert_eq!(addr.family(), Family::Local);
		assert_eq!(addr.port(), 0);
	}

	#[test]
	fn ipv6_detection_follows_colons() {
		assert!(is_ipv6_host("::1"));
		assert!(is_ipv6_host("fe80::1"));
		assert!(!is_ipv6_host("127.0.0.1"));
		assert!(!is_ipv6_host("example.com"));
	}

	#[test]
	fn storage_decodes_by_family() {
		let addr = Address::V4(SocketAddrV4::new([10, 1, 2, 3], 9000));
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let len = addr
			.with_raw(|ptr, len| {
				unsafe {
					std::ptr::copy_nonoverlapping(
						ptr as *const u8,
						&mut storage as *mut _ as *mut u8,
						len as usize,
					);
				}
				len
			})
			.unwrap();
		assert_eq!(unsafe { Address::from_storage(&storage, len) }, Some(addr));
	}
}
