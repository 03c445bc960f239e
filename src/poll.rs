//! Readiness waiter.
//!
//! A small owned poller that reports which registered descriptors are
//! readable, writable or in error. Linux and Android use epoll; other unix
//! targets fall back to `poll(2)`. The client state machine only talks to
//! [`Poller`], so both backends drive it the same way.

use std::os::fd::RawFd;
#[cfg(any(target_os = "linux", target_os = "android"))]
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use crate::error::{SocketError, errno};

/// Readiness a descriptor is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(u8);

impl Interest {
	pub const READ: Interest = Interest(0b01);
	pub const WRITE: Interest = Interest(0b10);

	pub fn is_readable(self) -> bool {
		self.0 & Self::READ.0 != 0
	}

	pub fn is_writable(self) -> bool {
		self.0 & Self::WRITE.0 != 0
	}
}

impl std::ops::BitOr for Interest {
	type Output = Interest;

	fn bitor(self, rhs: Interest) -> Interest {
		Interest(self.0 | rhs.0)
	}
}

/// One ready descriptor as reported by [`Poller::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
	fd: RawFd,
	readable: bool,
	writable: bool,
	error: bool,
}

impl Event {
	pub fn fd(&self) -> RawFd {
		self.fd
	}

	pub fn is_readable(&self) -> bool {
		self.readable
	}

	pub fn is_writable(&self) -> bool {
		self.writable
	}

	/// Error or hang-up on the descriptor.
	pub fn is_error(&self) -> bool {
		self.error
	}
}

/// Owned readiness waiter.
///
/// Level-triggered unless created with `edge_triggered`; the `poll(2)`
/// backend is always level-triggered.
pub struct Poller {
	#[cfg(any(target_os = "linux", target_os = "android"))]
	epfd: OwnedFd,
	#[cfg(any(target_os = "linux", target_os = "android"))]
	events: Vec<libc::epoll_event>,
	#[cfg(not(any(target_os = "linux", target_os = "android")))]
	fds: Vec<libc::pollfd>,
	edge_triggered: bool,
	ready: Vec<Event>,
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl Poller {
	/// Creates a poller reporting at most `capacity` events per wait.
	pub fn new(capacity: usize, edge_triggered: bool) -> std::io::Result<Self> {
		let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
		if fd == -1 {
			return Err(SocketError::Poller { errno: errno(), call: "epoll_create1" }.into());
		}
		let capacity = capacity.max(1);
		Ok(Self {
			epfd: unsafe { OwnedFd::from_raw_fd(fd) },
			events: vec![libc::epoll_event { events: 0, u64: 0 }; capacity],
			edge_triggered,
			ready: Vec::with_capacity(capacity),
		})
	}

	/// Registers `fd`. Re-registering a known descriptor replaces its interest.
	pub fn add(&mut self, fd: RawFd, interest: Interest) -> std::io::Result<()> {
		match self.ctl(libc::EPOLL_CTL_ADD, fd, interest) {
			Err(e) if e.raw_os_error() == Some(libc::EEXIST) => self.ctl(libc::EPOLL_CTL_MOD, fd, interest),
			other => other,
		}
	}

	/// Changes the interest of a registered descriptor.
	pub fn modify(&mut self, fd: RawFd, interest: Interest) -> std::io::Result<()> {
		self.ctl(libc::EPOLL_CTL_MOD, fd, interest)
	}

	/// Stops watching `fd`.
	pub fn delete(&mut self, fd: RawFd) -> std::io::Result<()> {
		let result = unsafe {
			libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())
		};
		if result == -1 {
			return Err(std::io::Error::last_os_error());
		}
		Ok(())
	}

	/// Waits up to `timeout_ms` (negative: forever) and returns the number of
	/// ready descriptors; `0` means the deadline passed.
	pub fn wait(&mut self, timeout_ms: i32) -> std::io::Result<usize> {
		self.ready.clear();
		let n = unsafe {
			libc::epoll_wait(
				self.epfd.as_raw_fd(),
				self.events.as_mut_ptr(),
				self.events.len() as libc::c_int,
				timeout_ms,
			)
		};
		if n == -1 {
			return Err(SocketError::Poller { errno: errno(), call: "epoll_wait" }.into());
		}

		for ev in &self.events[..n as usize] {
			let flags = ev.events;
			let token = ev.u64;
			self.ready.push(Event {
				fd: token as RawFd,
				readable: flags & libc::EPOLLIN as u32 != 0,
				writable: flags & libc::EPOLLOUT as u32 != 0,
				error: flags & (libc::EPOLLERR | libc::EPOLLHUP) as u32 != 0,
			});
		}
		Ok(self.ready.len())
	}

	fn ctl(&mut self, op: libc::c_int, fd: RawFd, interest: Interest) -> std::io::Result<()> {
		let mut mask = 0u32;
		if interest.is_readable() {
			mask |= libc::EPOLLIN as u32;
		}
		if interest.is_writable() {
			mask |= libc::EPOLLOUT as u32;
		}
		if self.edge_triggered {
			mask |= libc::EPOLLET as u32;
		}

		let mut ev = libc::epoll_event { events: mask, u64: fd as u64 };
		let result = unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), op, fd, &mut ev) };
		if result == -1 {
			// keep the raw errno visible so `add` can spot EEXIST
			return Err(std::io::Error::last_os_error());
		}
		Ok(())
	}
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
impl Poller {
	/// Creates a poller. `capacity` only pre-sizes the registration table.
	pub fn new(capacity: usize, edge_triggered: bool) -> std::io::Result<Self> {
		Ok(Self {
			fds: Vec::with_capacity(capacity),
			edge_triggered,
			ready: Vec::with_capacity(capacity),
		})
	}

	/// Registers `fd`. Re-registering a known descriptor replaces its interest.
	pub fn add(&mut self, fd: RawFd, interest: Interest) -> std::io::Result<()> {
		let events = Self::mask(interest);
		match self.fds.iter_mut().find(|p| p.fd == fd) {
			Some(entry) => entry.events = events,
			None => self.fds.push(libc::pollfd { fd, events, revents: 0 }),
		}
		Ok(())
	}

	/// Changes the interest of a registered descriptor.
	pub fn modify(&mut self, fd: RawFd, interest: Interest) -> std::io::Result<()> {
		match self.fds.iter_mut().find(|p| p.fd == fd) {
			Some(entry) => {
				entry.events = Self::mask(interest);
				Ok(())
			}
			None => Err(std::io::Error::from_raw_os_error(libc::ENOENT)),
		}
	}

	/// Stops watching `fd`.
	pub fn delete(&mut self, fd: RawFd) -> std::io::Result<()> {
		let before = self.fds.len();
		self.fds.retain(|p| p.fd != fd);
		if self.fds.len() == before {
			return Err(std::io::Error::from_raw_os_error(libc::ENOENT));
		}
		Ok(())
	}

	/// Waits up to `timeout_ms` (negative: forever) and returns the number of
	/// ready descriptors; `0` means the deadline passed.
	pub fn wait(&mut self, timeout_ms: i32) -> std::io::Result<usize> {
		self.ready.clear();
		let n = unsafe {
			libc::poll(self.fds.as_mut_ptr(), self.fds.len() as libc::nfds_t, timeout_ms)
		};
		if n == -1 {
			return Err(SocketError::Poller { errno: errno(), call: "poll" }.into());
		}

		for p in self.fds.iter().filter(|p| p.revents != 0) {
			self.ready.push(Event {
				fd: p.fd,
				readable: p.revents & libc::POLLIN != 0,
				writable: p.revents & libc::POLLOUT != 0,
				error: p.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0,
			});
		}
		Ok(self.ready.len())
	}

	fn mask(interest: Interest) -> libc::c_short {
		let mut events = 0;
		if interest.is_readable() {
			events |= libc::POLLIN;
		}
		if interest.is_writable() {
			events |= libc::POLLOUT;
		}
		events
	}
}

impl Poller {
	/// The `index`-th event of the last [`Poller::wait`].
	pub fn get(&self, index: usize) -> Option<Event> {
		self.ready.get(index).copied()
	}

	/// Events of the last [`Poller::wait`].
	pub fn events(&self) -> &[Event] {
		&self.ready
	}

	pub fn is_edge_triggered(&self) -> bool {
		self.edge_triggered
	}
}

impl std::fmt::Debug for Poller {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Poller")
			.field("edge_triggered", &self.edge_triggered)
			.field("ready", &self.ready)
			.finish()
	}
}
