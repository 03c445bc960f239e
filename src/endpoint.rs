//! Endpoint descriptors.
//!
//! An endpoint is written as `<tcp|ssl|udp>` followed by `-X value` flags:
//!
//! ```text
//! tcp -h 10.0.0.5 -p 10010 -t 60000 -g 1 -q 0 -w 50 -v 1 -e 0
//! ```
//!
//! Several endpoints may be glued together with `:`, see [`split_endpoints`].

use std::str::FromStr;
use crate::addr::is_ipv6_host;
use crate::error::ParseError;

/// Host value meaning "all local interfaces".
pub const ANY_ADDRESS: &str = "0.0.0.0";

/// Default per-wait timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: i32 = 3000;

const DELIMITERS: &[char] = &[' ', '\t', '\n', '\r'];

/// Transport named by the first token of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transport {
	#[default]
	Tcp,
	Udp,
	Ssl,
}

impl Transport {
	pub fn as_str(self) -> &'static str {
		match self {
			Transport::Tcp => "tcp",
			Transport::Udp => "udp",
			Transport::Ssl => "ssl",
		}
	}

	/// Exact, case-sensitive keyword match.
	fn from_keyword(word: &str) -> Option<Self> {
		match word {
			"tcp" => Some(Transport::Tcp),
			"udp" => Some(Transport::Udp),
			"ssl" => Some(Transport::Ssl),
			_ => None,
		}
	}

	/// TCP and SSL both ride on a stream socket.
	pub fn is_stream(self) -> bool {
		self != Transport::Udp
	}
}

impl std::fmt::Display for Transport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Authentication mode (`-e`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthMode {
	#[default]
	None,
	Local,
}

impl AuthMode {
	pub fn from_code(code: i32) -> Option<Self> {
		match code {
			0 => Some(AuthMode::None),
			1 => Some(AuthMode::Local),
			_ => None,
		}
	}

	pub fn code(self) -> i32 {
		match self {
			AuthMode::None => 0,
			AuthMode::Local => 1,
		}
	}
}

/// A validated endpoint description.
///
/// Built with [`Endpoint::init`] or [`Endpoint::parse`]; both keep the weight
/// normalised and the IPv6 flag in step with the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
	host: String,
	port: u16,
	timeout_ms: i32,
	transport: Transport,
	group: i32,
	qos: i32,
	weight: i32,
	weight_mode: u32,
	auth: AuthMode,
	ipv6: bool,
}

impl Default for Endpoint {
	fn default() -> Self {
		Self {
			host: ANY_ADDRESS.to_string(),
			port: 0,
			timeout_ms: DEFAULT_TIMEOUT_MS,
			transport: Transport::Tcp,
			group: 0,
			qos: 0,
			weight: -1,
			weight_mode: 0,
			auth: AuthMode::None,
			ipv6: false,
		}
	}
}

impl Endpoint {
	/// An endpoint with default metadata.
	pub fn new(host: &str, port: u16, timeout_ms: i32, transport: Transport) -> Self {
		let mut ep = Self::default();
		ep.init(host, port, timeout_ms, transport, 0, 0, -1, 0, AuthMode::None);
		ep
	}

	/// Assigns every field. Only the weight is normalised; host and port
	/// are taken as given.
	#[allow(clippy::too_many_arguments)]
	pub fn init(
		&mut self,
		host: &str,
		port: u16,
		timeout_ms: i32,
		transport: Transport,
		group: i32,
		qos: i32,
		weight: i32,
		weight_mode: u32,
		auth: AuthMode,
	) {
		self.host = host.to_string();
		self.port = port;
		self.timeout_ms = timeout_ms;
		self.transport = transport;
		self.group = group;
		self.qos = qos;
		self.weight = weight;
		self.weight_mode = weight_mode;
		self.auth = auth;
		self.normalize_weight();
		self.ipv6 = is_ipv6_host(&self.host);
	}

	/// Replaces this endpoint with the one described by `text`.
	///
	/// Group, qos, weight, weight mode and auth reset to their defaults before
	/// the flags are read; host, port and timeout keep their current values
	/// unless a flag sets them. On error `self` is left untouched.
	pub fn parse(&mut self, text: &str) -> Result<(), ParseError> {
		let mut tokens = text.split(DELIMITERS).filter(|t| !t.is_empty()).peekable();

		let Some(keyword) = tokens.next() else {
			return Err(ParseError::new("empty descriptor", text));
		};
		let Some(transport) = Transport::from_keyword(keyword) else {
			return Err(ParseError::new("expected tcp, udp or ssl", text));
		};

		let mut ep = Endpoint {
			transport,
			group: 0,
			qos: 0,
			weight: -1,
			weight_mode: 0,
			auth: AuthMode::None,
			..self.clone()
		};

		while let Some(option) = tokens.next() {
			let flag = match option.as_bytes() {
				[b'-', flag] => *flag,
				_ => return Err(ParseError::new("malformed flag", text)),
			};
			let argument = match tokens.peek() {
				Some(next) if !next.starts_with('-') => tokens.next().unwrap_or_default(),
				_ => "",
			};

			match flag {
				b'h' => {
					if argument.is_empty() {
						return Err(ParseError::new("-h needs a host", text));
					}
					ep.host = argument.to_string();
				}
				b'p' => {
					ep.port = argument
						.parse::<u16>()
						.map_err(|_| ParseError::new("-p needs a port in 0..65535", text))?;
				}
				b't' => ep.timeout_ms = parse_int(argument, "-t needs an integer", text)?,
				b'g' => ep.group = parse_int(argument, "-g needs an integer", text)?,
				b'q' => ep.qos = parse_int(argument, "-q needs an integer", text)?,
				b'w' => ep.weight = parse_int(argument, "-w needs an integer", text)?,
				b'v' => {
					ep.weight_mode = argument
						.parse::<u32>()
						.map_err(|_| ParseError::new("-v needs an unsigned integer", text))?;
				}
				b'e' => {
					ep.auth = parse_int(argument, "-e needs 0 or 1", text)
						.ok()
						.and_then(AuthMode::from_code)
						.ok_or_else(|| ParseError::new("-e needs 0 or 1", text))?;
				}
				// unknown flags are tolerated so newer descriptors still parse
				_ => {}
			}
		}

		ep.normalize_weight();
		if ep.host.is_empty() {
			return Err(ParseError::new("host must not be empty", text));
		}
		if ep.host == "*" {
			ep.host = ANY_ADDRESS.to_string();
		}
		ep.ipv6 = is_ipv6_host(&ep.host);

		*self = ep;
		Ok(())
	}

	fn normalize_weight(&mut self) {
		if self.weight_mode == 0 {
			self.weight = -1;
		} else {
			if self.weight == -1 {
				self.weight = 100;
			}
			self.weight = self.weight.min(100);
		}
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	/// Port 0 selects Unix domain addressing with `host` as the path.
	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn timeout_ms(&self) -> i32 {
		self.timeout_ms
	}

	pub fn transport(&self) -> Transport {
		self.transport
	}

	pub fn is_tcp(&self) -> bool {
		self.transport.is_stream()
	}

	pub fn is_ssl(&self) -> bool {
		self.transport == Transport::Ssl
	}

	pub fn is_udp(&self) -> bool {
		self.transport == Transport::Udp
	}

	pub fn group(&self) -> i32 {
		self.group
	}

	pub fn qos(&self) -> i32 {
		self.qos
	}

	/// Routing weight, -1 when weighting is off.
	pub fn weight(&self) -> i32 {
		self.weight
	}

	pub fn weight_mode(&self) -> u32 {
		self.weight_mode
	}

	pub fn auth(&self) -> AuthMode {
		self.auth
	}

	pub fn is_ipv6(&self) -> bool {
		self.ipv6
	}

	pub fn is_unix_local(&self) -> bool {
		self.port == 0
	}
}

fn parse_int(argument: &str, reason: &'static str, text: &str) -> Result<i32, ParseError> {
	argument.parse::<i32>().map_err(|_| ParseError::new(reason, text))
}

impl FromStr for Endpoint {
	type Err = ParseError;

	/// Parses from a blank endpoint, so a descriptor without `-h` is rejected.
	fn from_str(text: &str) -> Result<Self, Self::Err> {
		let mut ep = Endpoint { host: String::new(), ..Endpoint::default() };
		ep.parse(text)?;
		Ok(ep)
	}
}

/// Canonical text form.
///
/// Parses back to an equal endpoint as long as timeout, group and qos are
/// non-negative and the host is neither empty nor `*`. A value starting with
/// `-` reads as the next flag, and `*` parses as [`ANY_ADDRESS`].
impl std::fmt::Display for Endpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} -h {} -p {} -t {}", self.transport, self.host, self.port, self.timeout_ms)?;
		if self.group != 0 {
			write!(f, " -g {}", self.group)?;
		}
		if self.qos != 0 {
			write!(f, " -q {}", self.qos)?;
		}
		if self.weight_mode != 0 {
			write!(f, " -w {} -v {}", self.weight, self.weight_mode)?;
		}
		if self.auth != AuthMode::None {
			write!(f, " -e {}", self.auth.code())?;
		}
		Ok(())
	}
}

/// Splits a string of endpoints glued together with `:`.
///
/// A colon only ends a descriptor when the next non-space text starts with
/// `tcp`, `udp` or `ssl` (any case), so colons inside IPv6 hosts stay put.
/// Segments are trimmed and empty ones dropped.
pub fn split_endpoints(text: &str) -> Vec<String> {
	let bytes = text.as_bytes();
	let mut segments = Vec::new();
	let mut start = 0;
	let mut pos = 0;

	while pos < bytes.len() {
		if bytes[pos] == b':' {
			let mut next = pos + 1;
			while next < bytes.len() && bytes[next] == b' ' {
				next += 1;
			}
			if starts_with_transport(&bytes[next..]) {
				push_segment(&mut segments, &text[start..pos]);
				start = next;
				pos = next;
				continue;
			}
		}
		pos += 1;
	}

	let tail = text[start..].trim();
	push_segment(&mut segments, tail.strip_suffix(':').unwrap_or(tail));
	segments
}

fn starts_with_transport(bytes: &[u8]) -> bool {
	bytes.len() >= 3
		&& ["tcp", "udp", "ssl"]
			.iter()
			.any(|keyword| bytes[..3].eq_ignore_ascii_case(keyword.as_bytes()))
}

fn push_segment(segments: &mut Vec<String>, segment: &str) {
	let segment = segment.trim();
	if !segment.is_empty() {
		segments.push(segment.to_string());
	}
}
