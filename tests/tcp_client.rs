//! TcpClient against loopback and Unix domain peers running on threads.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixListener;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use rstest::rstest;
use tarslane::{ClientConfig, ClientError, Endpoint, TcpClient, TcpConfig, BufferConfig};

fn serve<F>(handler: F) -> (u16, JoinHandle<()>)
where
	F: FnOnce(TcpStream) + Send + 'static,
{
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let port = listener.local_addr().unwrap().port();
	let handle = thread::spawn(move || {
		let (conn, _) = listener.accept().unwrap();
		handler(conn);
	});
	(port, handle)
}

fn echo<S: Read + Write>(mut conn: S) {
	let mut buf = [0u8; 1024];
	loop {
		match conn.read(&mut buf) {
			Ok(0) | Err(_) => return,
			Ok(n) => {
				if conn.write_all(&buf[..n]).is_err() {
					return;
				}
			}
		}
	}
}

fn drain(mut conn: TcpStream) {
	let mut buf = [0u8; 64];
	while let Ok(n) = conn.read(&mut buf) {
		if n == 0 {
			break;
		}
	}
}

fn pause() {
	thread::sleep(Duration::from_millis(50));
}

#[rstest]
fn send_recv_echoes() {
	let (port, peer) = serve(echo);
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 2000).unwrap();

	let mut buf = [0u8; 16];
	let n = client.send_recv(b"hello", &mut buf).unwrap();
	assert_eq!(&buf[..n], b"hello");
	assert!(client.is_connected());
	assert_eq!(client.port(), port);

	client.close();
	assert!(!client.is_connected());
	peer.join().unwrap();
}

#[rstest]
fn recv_by_sep_keeps_the_remainder_for_the_next_call() {
	let (port, peer) = serve(|mut conn| {
		conn.write_all(b"abc\r\nde").unwrap();
		pause();
		conn.write_all(b"f\r\n").unwrap();
		drain(conn);
	});
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 2000).unwrap();

	assert_eq!(client.recv_by_sep(b"\r\n").unwrap(), b"abc\r\n");
	assert_eq!(client.recv_by_sep(b"\r\n").unwrap(), b"def\r\n");

	client.close();
	peer.join().unwrap();
}

#[rstest]
fn recv_by_sep_splits_one_write_into_messages() {
	let (port, peer) = serve(|mut conn| {
		conn.write_all(b"one||two||three").unwrap();
		drain(conn);
	});
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 2000).unwrap();

	assert_eq!(client.recv_by_sep(b"||").unwrap(), b"one||");
	assert_eq!(client.recv_by_sep(b"||").unwrap(), b"two||");

	let mut rest = [0u8; 5];
	client.recv_length(&mut rest).unwrap();
	assert_eq!(&rest, b"three");

	client.close();
	peer.join().unwrap();
}

#[rstest]
fn recv_by_sep_reports_peer_close() {
	let (port, peer) = serve(|mut conn| {
		conn.write_all(b"no terminator").unwrap();
	});
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 2000).unwrap();

	let err = client.recv_by_sep(b"\n").unwrap_err();
	assert!(matches!(err, ClientError::Close));
	assert!(!client.is_connected());
	peer.join().unwrap();
}

#[rstest]
fn send_recv_line_uses_crlf() {
	let (port, peer) = serve(|mut conn| {
		let mut buf = [0u8; 6];
		conn.read_exact(&mut buf).unwrap();
		assert_eq!(&buf, b"PING\r\n");
		conn.write_all(b"+PONG\r\n").unwrap();
		drain(conn);
	});
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 2000).unwrap();

	assert_eq!(client.send_recv_line(b"PING\r\n").unwrap(), b"+PONG\r\n");
	client.close();
	peer.join().unwrap();
}

#[rstest]
fn recv_length_assembles_several_writes() {
	let (port, peer) = serve(|mut conn| {
		for part in [&b"01"[..], b"234", b"567"] {
			conn.write_all(part).unwrap();
			pause();
		}
		drain(conn);
	});
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 2000).unwrap();

	let mut buf = [0u8; 8];
	client.recv_length(&mut buf).unwrap();
	assert_eq!(&buf, b"01234567");

	client.close();
	peer.join().unwrap();
}

#[rstest]
fn recv_length_fails_when_peer_closes_early() {
	let (port, peer) = serve(|mut conn| {
		conn.write_all(b"abc").unwrap();
	});
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 2000).unwrap();

	let mut buf = [0u8; 8];
	let err = client.recv_length(&mut buf).unwrap_err();
	assert_eq!(err.code(), -5);
	assert!(!client.is_connected());
	peer.join().unwrap();
}

#[rstest]
fn send_recv_all_reads_until_close() {
	let (port, peer) = serve(|mut conn| {
		let mut request = [0u8; 3];
		conn.read_exact(&mut request).unwrap();
		conn.write_all(b"first ").unwrap();
		pause();
		conn.write_all(b"second").unwrap();
	});
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 2000).unwrap();

	assert_eq!(client.send_recv_all(b"GET").unwrap(), b"first second");
	assert!(!client.is_connected());
	peer.join().unwrap();
}

#[rstest]
fn recv_times_out_and_closes() {
	let (port, peer) = serve(drain);
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 100).unwrap();

	let mut buf = [0u8; 4];
	let err = client.recv(&mut buf).unwrap_err();
	assert!(matches!(err, ClientError::Timeout { timeout_ms: 100 }));
	assert_eq!(err.code(), -3);
	assert!(!client.is_connected());
	peer.join().unwrap();
}

#[rstest]
fn refused_connect_is_a_connect_error() {
	let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 1000).unwrap();

	let err = client.send(b"x").unwrap_err();
	assert_eq!(err.code(), -6);
	assert!(!client.is_connected());
}

#[cfg(target_os = "linux")]
#[rstest]
fn full_backlog_gives_up_within_the_timeout() {
	// backlog 0 queues a single pending connection, later handshakes are dropped
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	assert_eq!(unsafe { libc::listen(listener.as_raw_fd(), 0) }, 0);
	let port = listener.local_addr().unwrap().port();
	let _queued = TcpStream::connect(("127.0.0.1", port)).unwrap();

	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 100).unwrap();
	let started = Instant::now();
	let err = client.connect().unwrap_err();
	assert!(matches!(err, ClientError::Timeout { timeout_ms: 100 }), "{err}");
	assert_eq!(err.code(), -3);
	assert!(started.elapsed() < Duration::from_secs(1));
	assert!(!client.is_connected());

	let (port, peer) = serve(echo);
	client.init("127.0.0.1", port, 2000).unwrap();
	let mut buf = [0u8; 2];
	assert_eq!(client.send_recv(b"ok", &mut buf).unwrap(), 2);
	client.close();
	peer.join().unwrap();
}

#[rstest]
fn send_after_peer_reset_is_a_send_error() {
	let (port, peer) = serve(|conn| {
		// zero linger turns the close into a reset
		let linger = libc::linger { l_onoff: 1, l_linger: 0 };
		let rc = unsafe {
			libc::setsockopt(
				conn.as_raw_fd(),
				libc::SOL_SOCKET,
				libc::SO_LINGER,
				&linger as *const libc::linger as *const libc::c_void,
				std::mem::size_of::<libc::linger>() as libc::socklen_t,
			)
		};
		assert_eq!(rc, 0);
	});

	let mut client = TcpClient::new();
	client.init("127.0.0.1", port, 1000).unwrap();
	client.connect().unwrap();
	peer.join().unwrap();
	pause();

	let err = client.send(b"x").unwrap_err();
	assert!(matches!(err, ClientError::Send { .. }), "{err}");
	assert_eq!(err.code(), -1);
	assert!(!client.is_connected());
}

#[rstest]
fn unresolvable_host_is_a_socket_error() {
	let mut client = TcpClient::new();
	client.init("no-such-host.invalid", 80, 100).unwrap();
	let err = client.send(b"x").unwrap_err();
	assert_eq!(err.code(), -7);
}

#[rstest]
fn unix_domain_stream_echoes() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("echo.sock");
	let listener = UnixListener::bind(&path).unwrap();
	let peer = thread::spawn(move || {
		let (conn, _) = listener.accept().unwrap();
		echo(conn);
	});

	let mut client = TcpClient::new();
	client.init(path.to_str().unwrap(), 0, 2000).unwrap();
	assert!(!client.is_ipv6());

	let reply = client.send_recv_by_sep(b"line one\nline two\n", b"\n").unwrap();
	assert_eq!(reply, b"line one\n");
	assert_eq!(client.recv_by_sep(b"\n").unwrap(), b"line two\n");

	client.close();
	peer.join().unwrap();
}

#[rstest]
fn configured_client_from_endpoint() {
	let (port, peer) = serve(echo);
	let endpoint: Endpoint = format!("tcp -h 127.0.0.1 -p {port} -t 2000").parse().unwrap();

	let config = ClientConfig::new()
		.tcp(TcpConfig::new().nodelay(false).linger(None))
		.buffers(BufferConfig::new().both(32 * 1024));
	let mut client = TcpClient::with_config(config);
	client.init(endpoint.host(), endpoint.port(), endpoint.timeout_ms()).unwrap();
	assert!(!client.config().tcp.nodelay);

	let mut buf = [0u8; 3];
	assert_eq!(client.send_recv(b"cfg", &mut buf).unwrap(), 3);
	client.close();
	peer.join().unwrap();

	let other = TcpClient::from_endpoint(&endpoint).unwrap();
	assert_eq!(other.timeout_ms(), 2000);
	assert_eq!(other.ip(), "127.0.0.1");
}
