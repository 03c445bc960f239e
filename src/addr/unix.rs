use crate::addr::ToSockAddr;

/// Unix domain socket address (file path, abstract name, or unnamed).
///
/// Selected when an endpoint has port 0; the host string is then the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixAddr {
	path: Vec<u8>,
	/// True if this is an abstract socket (Linux-only, no filesystem entry).
	is_abstract: bool,
}

impl UnixAddr {
	/// Creates a new Unix address from a filesystem path.
	pub fn new<P: AsRef<[u8]>>(path: P) -> Self {
		Self {
			path: path.as_ref().to_vec(),
			is_abstract: false,
		}
	}

	/// Creates an abstract socket address (Linux-only).
	pub fn abstract_socket<P: AsRef<[u8]>>(name: P) -> Self {
		Self {
			path: name.as_ref().to_vec(),
			is_abstract: true,
		}
	}

	/// The address of a socket that was never bound.
	pub fn unnamed() -> Self {
		Self {
			path: Vec::new(),
			is_abstract: false,
		}
	}

	pub fn is_abstract(&self) -> bool {
		self.is_abstract
	}

	pub fn is_unnamed(&self) -> bool {
		self.path.is_empty() && !self.is_abstract
	}

	pub fn path(&self) -> &[u8] {
		&self.path
	}

	fn path_offset() -> usize {
		std::mem::offset_of!(libc::sockaddr_un, sun_path)
	}

	/// Converts to the raw sockaddr_un plus the length the kernel expects.
	///
	/// `None` when the path does not fit in `sun_path`.
	pub(crate) fn to_raw(&self) -> Option<(libc::sockaddr_un, libc::socklen_t)> {
		let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
		addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

		if self.is_abstract {
			// sun_path[0] stays 0, the name follows without a terminator
			if self.path.len() + 1 > addr.sun_path.len() {
				return None;
			}
			for (i, &byte) in self.path.iter().enumerate() {
				addr.sun_path[i + 1] = byte as libc::c_char;
			}
			let len = Self::path_offset() + 1 + self.path.len();
			Some((addr, len as libc::socklen_t))
		} else if self.path.is_empty() {
			Some((addr, std::mem::size_of::<libc::sa_family_t>() as libc::socklen_t))
		} else {
			// Filesystem path: null-terminated
			if self.path.len() >= addr.sun_path.len() {
				return None;
			}
			for (i, &byte) in self.path.iter().enumerate() {
				addr.sun_path[i] = byte as libc::c_char;
			}
			let len = Self::path_offset() + self.path.len() + 1;
			Some((addr, len as libc::socklen_t))
		}
	}

	/// Creates from raw sockaddr_un, honouring the length returned by the kernel.
	pub(crate) fn from_raw(raw: &libc::sockaddr_un, len: libc::socklen_t) -> Self {
		let len = len as usize;
		let offset = Self::path_offset();
		if len <= offset {
			return Self::unnamed();
		}
		let used = (len - offset).min(raw.sun_path.len());
		let bytes: Vec<u8> = raw.sun_path[..used].iter().map(|&c| c as u8).collect();

		if bytes.first() == Some(&0) {
			Self::abstract_socket(&bytes[1..])
		} else {
			let end = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
			Self::new(&bytes[..end])
		}
	}
}

impl std::fmt::Display for UnixAddr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.is_abstract {
			write!(f, "@{}", String::from_utf8_lossy(&self.path))
		} else if self.path.is_empty() {
			f.write_str("(unnamed)")
		} else {
			f.write_str(&String::from_utf8_lossy(&self.path))
		}
	}
}

impl ToSockAddr for UnixAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let (raw, len) = self.to_raw()?;
		let ptr = &raw as *const _ as *const libc::sockaddr;
		Some(f(ptr, len))
	}
}
