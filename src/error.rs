/// Socket creation/configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket() failed: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    #[error("bind({addr}) failed: {}", errno_to_str(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("connect({addr}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("setsockopt({option}) failed: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", errno_to_str(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("{call}() failed: {}", errno_to_str(*.errno))]
    Poller { errno: i32, call: &'static str },

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },

    #[error("cannot resolve host {host:?}")]
    Resolve { host: String },
}

impl SocketError {
    /// The errno captured when the call failed, `0` for non-syscall faults.
    pub fn errno(&self) -> i32 {
        match self {
            SocketError::Create { errno } => *errno,
            SocketError::Bind { errno, .. } => *errno,
            SocketError::Connect { errno, .. } => *errno,
            SocketError::SetOption { errno, .. } => *errno,
            SocketError::GetOption { errno, .. } => *errno,
            SocketError::Poller { errno, .. } => *errno,
            SocketError::InvalidAddress { .. } => libc::EINVAL,
            SocketError::Resolve { .. } => 0,
        }
    }
}

/// I/O operation errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("recv() failed: {}", errno_to_str(*.errno))]
    Read { errno: i32 },

    #[error("send() failed: {}", errno_to_str(*.errno))]
    Write { errno: i32 },
}

impl IoError {
    pub fn errno(&self) -> i32 {
        match self {
            IoError::Read { errno } | IoError::Write { errno } => *errno,
        }
    }
}

/// Outcome of a client operation that did not succeed.
///
/// Every variant maps onto one integer result code through [`ClientError::code`].
/// Apart from a UDP send failure, the client has already closed its socket
/// by the time one of these is returned; the next call reconnects.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("send() failed: {}", errno_to_str(*.errno))]
    Send { errno: i32 },

    #[error("readiness wait failed: {}", errno_to_str(*.errno))]
    Select { errno: i32 },

    #[error("no readiness event within {timeout_ms}ms")]
    Timeout { timeout_ms: i32 },

    #[error("recv() failed: {}", errno_to_str(*.errno))]
    Recv { errno: i32 },

    #[error("connection closed by peer")]
    Close,

    #[error("connect({addr}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("socket setup failed: {source}")]
    Socket {
        #[source]
        source: std::io::Error,
    },
}

/// Result code reported for a successful operation.
pub const SUCCESS: i32 = 0;

impl ClientError {
    /// Integer result code of this failure.
    pub fn code(&self) -> i32 {
        match self {
            ClientError::Send { .. } => -1,
            ClientError::Select { .. } => -2,
            ClientError::Timeout { .. } => -3,
            ClientError::Recv { .. } => -4,
            ClientError::Close => -5,
            ClientError::Connect { .. } => -6,
            ClientError::Socket { .. } => -7,
        }
    }

    pub(crate) fn socket(source: std::io::Error) -> Self {
        ClientError::Socket { source }
    }
}

/// Malformed endpoint description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("endpoint parse error ({reason}): {input:?}")]
pub struct ParseError {
    pub reason: &'static str,
    pub input: String,
}

impl ParseError {
    pub(crate) fn new(reason: &'static str, input: &str) -> Self {
        Self { reason, input: input.to_string() }
    }

    /// Integer result code of a parse failure.
    pub fn code(&self) -> i32 {
        -8
    }
}

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Pulls the errno back out of an error produced by this crate's syscall wrappers.
pub(crate) fn os_errno(err: &std::io::Error) -> i32 {
    if let Some(code) = err.raw_os_error() {
        return code;
    }
    let Some(inner) = err.get_ref() else {
        return 0;
    };
    if let Some(e) = inner.downcast_ref::<SocketError>() {
        e.errno()
    } else if let Some(e) = inner.downcast_ref::<IoError>() {
        e.errno()
    } else {
        0
    }
}

/// True when `err` is a refused or failed `connect()`, as opposed to a setup fault.
pub(crate) fn is_connect_failure(err: &std::io::Error) -> bool {
    matches!(
        err.get_ref().and_then(|inner| inner.downcast_ref::<SocketError>()),
        Some(SocketError::Connect { .. })
    )
}

/// Converts errno to human-readable string.
fn errno_to_str(errno: i32) -> String {
    match errno {
        0 => "no error code".into(),
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EHOSTUNREACH => "host unreachable".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOENT => "no such file or directory".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        _ => format!("errno {}", errno),
    }
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        e if e == libc::EWOULDBLOCK => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOENT => std::io::ErrorKind::NotFound,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        let kind = match &err {
            SocketError::Resolve { .. } => std::io::ErrorKind::NotFound,
            other => errno_to_kind(other.errno()),
        };
        std::io::Error::new(kind, err)
    }
}

impl From<IoError> for std::io::Error {
    fn from(err: IoError) -> Self {
        std::io::Error::new(errno_to_kind(err.errno()), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_are_distinct() {
        let errors = [
            ClientError::Send { errno: libc::EPIPE },
            ClientError::Select { errno: libc::EINTR },
            ClientError::Timeout { timeout_ms: 100 },
            ClientError::Recv { errno: libc::ECONNRESET },
            ClientError::Close,
            ClientError::Connect { errno: libc::ECONNREFUSED, addr: "127.0.0.1:1".into() },
            ClientError::socket(std::io::ErrorKind::Other.into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(ClientError::code).collect();
        codes.push(SUCCESS);
        codes.push(ParseError::new("x", "y").code());
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 9);
    }

    #[test]
    fn errno_survives_io_error_conversion() {
        let err: std::io::Error = IoError::Read { errno: libc::EAGAIN }.into();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
        assert_eq!(os_errno(&err), libc::EAGAIN);

        let err: std::io::Error = SocketError::Connect {
            errno: libc::ECONNREFUSED,
            addr: "127.0.0.1:9".into(),
        }
        .into();
        assert!(is_connect_failure(&err));
        assert_eq!(os_errno(&err), libc::ECONNREFUSED);
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
    }

    #[test]
    fn display_names_the_failure() {
        let err = ClientError::Connect { errno: libc::ECONNREFUSED, addr: "10.0.0.1:80".into() };
        assert_eq!(err.to_string(), "connect(10.0.0.1:80) failed: connection refused");
        assert_eq!(ClientError::Timeout { timeout_ms: 250 }.to_string(), "no readiness event within 250ms");
    }
}
