use std::os::fd::AsRawFd;
use crate::error::{SocketError, errno};

fn set_int_option<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	val: libc::c_int,
	option: &'static str,
) -> std::io::Result<()> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option }.into())
	} else {
		Ok(())
	}
}

/// Sets SO_REUSEADDR on a socket.
///
/// Lets a datagram client re-bind a fixed local port right after a
/// previous socket on it was closed.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> std::io::Result<()> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, enable as libc::c_int, "SO_REUSEADDR")
}

/// Sets TCP_NODELAY on a socket.
///
/// Disables Nagle's algorithm, so request frames go out immediately.
pub fn set_tcp_nodelay<S: AsRawFd>(socket: &S, enable: bool) -> std::io::Result<()> {
	set_int_option(socket, libc::IPPROTO_TCP, libc::TCP_NODELAY, enable as libc::c_int, "TCP_NODELAY")
}

/// Sets receive buffer size (SO_RCVBUF).
///
/// Kernel typically doubles this value internally.
pub fn set_recv_buffer_size<S: AsRawFd>(socket: &S, size: usize) -> std::io::Result<()> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_RCVBUF, size as libc::c_int, "SO_RCVBUF")
}

/// Sets send buffer size (SO_SNDBUF).
pub fn set_send_buffer_size<S: AsRawFd>(socket: &S, size: usize) -> std::io::Result<()> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_SNDBUF, size as libc::c_int, "SO_SNDBUF")
}

/// Enables TCP keep-alive (SO_KEEPALIVE).
///
/// The kernel probes idle connections to detect dead peers.
pub fn set_keepalive<S: AsRawFd>(socket: &S, enable: bool) -> std::io::Result<()> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, enable as libc::c_int, "SO_KEEPALIVE")
}

/// Sets TCP keep-alive idle time (TCP_KEEPIDLE).
///
/// Seconds of idle time before the first probe. Requires SO_KEEPALIVE.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn set_keepalive_idle<S: AsRawFd>(socket: &S, seconds: u32) -> std::io::Result<()> {
	set_int_option(socket, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, seconds as libc::c_int, "TCP_KEEPIDLE")
}

/// Sets TCP keep-alive probe interval (TCP_KEEPINTVL).
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn set_keepalive_interval<S: AsRawFd>(socket: &S, seconds: u32) -> std::io::Result<()> {
	set_int_option(socket, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, seconds as libc::c_int, "TCP_KEEPINTVL")
}

/// Sets TCP keep-alive probe count (TCP_KEEPCNT).
///
/// Total detection time = KEEPIDLE + (KEEPINTVL × KEEPCNT).
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn set_keepalive_count<S: AsRawFd>(socket: &S, count: u32) -> std::io::Result<()> {
	set_int_option(socket, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, count as libc::c_int, "TCP_KEEPCNT")
}

/// Sets socket linger behavior (SO_LINGER).
///
/// - `None`: close returns immediately, kernel flushes in the background
/// - `Some(0)`: close sends RST and skips TIME_WAIT/CLOSE_WAIT
/// - `Some(n)`: close blocks up to n seconds for unsent data
pub fn set_linger<S: AsRawFd>(socket: &S, linger: Option<u32>) -> std::io::Result<()> {
	let val = match linger {
		None => libc::linger { l_onoff: 0, l_linger: 0 },
		Some(seconds) => libc::linger {
			l_onoff: 1,
			l_linger: seconds as libc::c_int,
		},
	};
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			libc::SOL_SOCKET,
			libc::SO_LINGER,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::linger>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option: "SO_LINGER" }.into())
	} else {
		Ok(())
	}
}
