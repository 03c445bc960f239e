//! UdpClient against std sockets and against another UdpClient.

use std::net::UdpSocket;
use std::thread;
use rstest::rstest;
use tarslane::{Address, ClientError, UdpClient};

fn free_port() -> u16 {
	UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

#[rstest]
fn round_trip_with_std_peer() {
	let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
	let port = peer.local_addr().unwrap().port();
	let server = thread::spawn(move || {
		let mut buf = [0u8; 64];
		let (n, from) = peer.recv_from(&mut buf).unwrap();
		buf[..n].reverse();
		peer.send_to(&buf[..n], from).unwrap();
	});

	let mut client = UdpClient::new();
	client.init("127.0.0.1", port, 2000).unwrap();
	let mut buf = [0u8; 64];
	let (n, from) = client.send_recv_from(b"stressed", &mut buf).unwrap();
	assert_eq!(&buf[..n], b"desserts");
	assert_eq!(from.ip_string(), "127.0.0.1");
	assert_eq!(from.port(), port);

	server.join().unwrap();
}

#[rstest]
fn two_clients_address_each_other() {
	let (port_a, port_b) = {
		let a = UdpSocket::bind("127.0.0.1:0").unwrap();
		let b = UdpSocket::bind("127.0.0.1:0").unwrap();
		(a.local_addr().unwrap().port(), b.local_addr().unwrap().port())
	};

	let mut a = UdpClient::new();
	a.set_local_addr("127.0.0.1", port_a);
	a.init("127.0.0.1", port_b, 2000).unwrap();
	let mut b = UdpClient::new();
	b.set_local_addr("127.0.0.1", port_b);
	b.init("127.0.0.1", port_a, 2000).unwrap();
	a.connect().unwrap();
	b.connect().unwrap();

	assert_eq!(a.send(b"\x00tars\xff").unwrap(), 6);
	let mut buf = [0u8; 16];
	let (n, from) = b.recv_from(&mut buf).unwrap();
	assert_eq!(&buf[..n], b"\x00tars\xff");
	assert_eq!(from.port(), port_a);
	assert_eq!(Some(from), a.local_addr());

	b.send(b"ack").unwrap();
	assert_eq!(a.recv(&mut buf).unwrap(), 3);
	assert_eq!(&buf[..3], b"ack");
}

#[rstest]
fn silent_peer_times_out_and_closes() {
	let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
	let mut client = UdpClient::new();
	client.init("127.0.0.1", peer.local_addr().unwrap().port(), 100).unwrap();

	let mut buf = [0u8; 8];
	let err = client.send_recv(b"anyone?", &mut buf).unwrap_err();
	assert!(matches!(err, ClientError::Timeout { timeout_ms: 100 }));
	assert!(!client.is_open());
}

#[rstest]
fn receive_fault_closes_the_socket() {
	let mut client = UdpClient::new();
	client.init("127.0.0.1", free_port(), 500).unwrap();
	client.send(b"nobody home").unwrap();

	// the port-unreachable reply fails recvfrom, or is reported as an error event
	let mut buf = [0u8; 8];
	let err = client.recv(&mut buf).unwrap_err();
	assert!(matches!(err, ClientError::Recv { .. } | ClientError::Close), "{err}");
	assert!([-4, -5].contains(&err.code()), "{err}");
	assert!(!client.is_open());
}

#[cfg(target_os = "linux")]
#[rstest]
fn unix_datagram_round_trip() {
	use std::os::unix::ffi::OsStrExt;
	use std::os::unix::net::UnixDatagram;

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("dgram.sock");
	let peer = UnixDatagram::bind(&path).unwrap();
	let server = thread::spawn(move || {
		let mut buf = [0u8; 64];
		let (n, from) = peer.recv_from(&mut buf).unwrap();
		peer.send_to_addr(&buf[..n], &from).unwrap();
	});

	let mut client = UdpClient::new();
	client.init(path.to_str().unwrap(), 0, 2000).unwrap();
	let mut buf = [0u8; 64];
	let (n, from) = client.send_recv_from(b"over unix", &mut buf).unwrap();
	assert_eq!(&buf[..n], b"over unix");
	match from {
		Address::Unix(addr) => assert_eq!(addr.path(), path.as_os_str().as_bytes()),
		other => panic!("unexpected sender {other}"),
	}

	server.join().unwrap();
}
