//! Blocking TCP and UDP clients over raw sockets and a readiness waiter,
//! plus the textual endpoint descriptors used to address them.

pub mod socket;
pub mod poll;
mod addr;
mod config;
mod endpoint;
mod client;
mod error;

pub use self::error::{ClientError, IoError, ParseError, SocketError, SUCCESS, errno};
pub use self::addr::{Address, SocketAddrV4, SocketAddrV6, UnixAddr, is_ipv6_host};
pub use self::socket::{Socket, Family, Kind, ConnectStatus};
pub use self::poll::{Poller, Interest, Event};
pub use self::config::{ClientConfig, TcpConfig, BufferConfig, KeepaliveConfig, DEFAULT_POLL_CAPACITY};
pub use self::endpoint::{Endpoint, Transport, AuthMode, split_endpoints, ANY_ADDRESS, DEFAULT_TIMEOUT_MS};
pub use self::client::{ClientSocket, TcpClient, UdpClient};
