use std::{error::Error, fmt, io};

pub type GenericError = Box<dyn Error + Send + Sync + 'static>;

pub type PingResult<T> = std::result::Result<T, GenericError>;

#[derive(Debug)]
pub enum ProbeError {
    Resolution { host: String, message: String },
    TransportOpen(io::Error),
    Encode(String),
    Send(io::Error),
    Receive(io::Error),
    Timeout,
    MalformedPacket(String),
    UnexpectedReplyType(u8),
    InvalidConfig(String),
}

impl ProbeError {
    /// Fatal errors end the process; every other kind is a lost probe.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProbeError::Resolution { .. } | ProbeError::TransportOpen(_) | ProbeError::InvalidConfig(_)
        )
    }

    pub(crate) fn from_receive(error: io::Error) -> Self {
        // A socket timeout surfaces as EAGAIN on Linux and as TimedOut elsewhere.
        match error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ProbeError::Timeout,
            _ => ProbeError::Receive(error),
        }
    }

    pub(crate) fn from_send(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ProbeError::Timeout,
            _ => ProbeError::Send(error),
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ProbeError::Resolution { host, message } => {
                write!(f, "could not resolve {host}")?;
                if !message.is_empty() {
                    write!(f, ": {message}")?;
                }
                Ok(())
            }
            ProbeError::TransportOpen(e) => write!(f, "could not open raw ICMP socket: {e}"),
            ProbeError::Encode(message) => write!(f, "could not encode echo request: {message}"),
            ProbeError::Send(e) => write!(f, "send failed: {e}"),
            ProbeError::Receive(e) => write!(f, "receive failed: {e}"),
            ProbeError::Timeout => write!(f, "probe deadline expired"),
            ProbeError::MalformedPacket(message) => write!(f, "malformed ICMP packet: {message}"),
            ProbeError::UnexpectedReplyType(icmp_type) => {
                write!(f, "expected echo reply, got ICMP type {icmp_type}")
            }
            ProbeError::InvalidConfig(message) => write!(f, "invalid probe configuration: {message}"),
        }
    }
}

impl Error for ProbeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProbeError::TransportOpen(e) | ProbeError::Send(e) | ProbeError::Receive(e) => Some(e),
            _ => None,
        }
    }
}
