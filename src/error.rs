//! Error taxonomy for the printer session core.
//!
//! Mirrors the sum-type shape of a production terminal emulator's error
//! tree: a top-level enum with one variant per concern, each concern
//! implementing `Display`/`Error` on its own, and `From` conversions so
//! `?` works across module boundaries.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for the printer session core.
#[derive(Debug)]
pub enum Tn3270Error {
    /// TELNET framing/option violation. Closes the connection.
    Telnet(TelnetError),
    /// TLS handshake failure. Closes the connection.
    Tls(TlsError),
    /// Unexpected or malformed 3270/SCS data.
    ProtocolViolation(ProtocolViolation),
    /// Printer sink I/O failure.
    PrinterFailure(PrinterFailure),
    /// Socket read/write error; terminates the session loop.
    Transient(io::Error),
    /// Configuration impossible to satisfy; the process exits.
    Fatal(FatalError),
}

/// TELNET-layer protocol errors.
#[derive(Debug)]
pub enum TelnetError {
    /// Sub-option accumulator exceeded its bound.
    SubOptionOverflow { option: u8, size: usize, max: usize },
    /// A byte sequence outside the FSM's defined alphabet.
    MalformedSequence { state: &'static str, byte: u8 },
    /// The host never completed TN3270E device-type negotiation.
    DeviceTypeRejected { reason: u8 },
    /// FUNCTIONS negotiation diverged (host replied IS with a superset).
    FunctionsDiverged,
    /// A sub-negotiation referenced an option never DO'd/WILL'd.
    UnnegotiatedOption { option: u8 },
}

/// TLS handshake errors.
#[derive(Debug)]
pub enum TlsError {
    HandshakeFailed { message: String },
    NoProvider,
}

/// Reason a 3270/SCS command or structured field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    BadCmd,
    BadAddr,
    BadSf,
}

/// Printer sink I/O failure.
#[derive(Debug)]
pub enum PrinterFailure {
    JobFailed { status: i32 },
    SinkBroken { reason: String },
}

/// Unrecoverable configuration or negotiation failure.
#[derive(Debug)]
pub enum FatalError {
    LuExhausted { reason: u8 },
    AssocRefused,
    InvalidOption { option: String, reason: String },
}

impl fmt::Display for Tn3270Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tn3270Error::Telnet(e) => write!(f, "telnet error: {e}"),
            Tn3270Error::Tls(e) => write!(f, "TLS error: {e}"),
            Tn3270Error::ProtocolViolation(e) => write!(f, "protocol violation: {e}"),
            Tn3270Error::PrinterFailure(e) => write!(f, "printer failure: {e}"),
            Tn3270Error::Transient(e) => write!(f, "transient I/O error: {e}"),
            Tn3270Error::Fatal(e) => write!(f, "fatal error: {e}"),
        }
    }
}

impl fmt::Display for TelnetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelnetError::SubOptionOverflow { option, size, max } => write!(
                f,
                "sub-option buffer overflow for option {option}: {size} bytes exceeds max {max}"
            ),
            TelnetError::MalformedSequence { state, byte } => {
                write!(f, "malformed TELNET sequence in state {state}: byte 0x{byte:02X}")
            }
            TelnetError::DeviceTypeRejected { reason } => {
                write!(f, "DEVICE-TYPE rejected, reason 0x{reason:02X}")
            }
            TelnetError::FunctionsDiverged => {
                write!(f, "TN3270E FUNCTIONS negotiation diverged, abandoning TN3270E")
            }
            TelnetError::UnnegotiatedOption { option } => {
                write!(f, "sub-negotiation for unnegotiated option {option}")
            }
        }
    }
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsError::HandshakeFailed { message } => write!(f, "handshake failed: {message}"),
            TlsError::NoProvider => write!(f, "no TLS provider available"),
        }
    }
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolViolation::BadCmd => write!(f, "BAD_CMD"),
            ProtocolViolation::BadAddr => write!(f, "BAD_ADDR"),
            ProtocolViolation::BadSf => write!(f, "BAD_SF"),
        }
    }
}

impl fmt::Display for PrinterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrinterFailure::JobFailed { status } => write!(f, "print job exited with status {status}"),
            PrinterFailure::SinkBroken { reason } => write!(f, "sink broken: {reason}"),
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::LuExhausted { reason } => {
                write!(f, "Cannot connect to specified LU: reason 0x{reason:02X}")
            }
            FatalError::AssocRefused => write!(f, "host refused TN3270E for required association"),
            FatalError::InvalidOption { option, reason } => {
                write!(f, "invalid option '{option}': {reason}")
            }
        }
    }
}

impl StdError for Tn3270Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Tn3270Error::Telnet(e) => Some(e),
            Tn3270Error::Tls(e) => Some(e),
            Tn3270Error::ProtocolViolation(e) => Some(e),
            Tn3270Error::PrinterFailure(e) => Some(e),
            Tn3270Error::Transient(e) => Some(e),
            Tn3270Error::Fatal(e) => Some(e),
        }
    }
}

impl StdError for TelnetError {}
impl StdError for TlsError {}
impl StdError for ProtocolViolation {}
impl StdError for PrinterFailure {}
impl StdError for FatalError {}

impl From<TelnetError> for Tn3270Error {
    fn from(e: TelnetError) -> Self {
        Tn3270Error::Telnet(e)
    }
}
impl From<TlsError> for Tn3270Error {
    fn from(e: TlsError) -> Self {
        Tn3270Error::Tls(e)
    }
}
impl From<ProtocolViolation> for Tn3270Error {
    fn from(e: ProtocolViolation) -> Self {
        Tn3270Error::ProtocolViolation(e)
    }
}
impl From<PrinterFailure> for Tn3270Error {
    fn from(e: PrinterFailure) -> Self {
        Tn3270Error::PrinterFailure(e)
    }
}
impl From<FatalError> for Tn3270Error {
    fn from(e: FatalError) -> Self {
        Tn3270Error::Fatal(e)
    }
}
impl From<io::Error> for Tn3270Error {
    fn from(e: io::Error) -> Self {
        Tn3270Error::Transient(e)
    }
}

pub type Tn3270Result<T> = Result<T, Tn3270Error>;

/// Status returned by the command interpreters up to `TelnetFsm`, per
/// §4.2's `{OKAY_NO_OUTPUT, OKAY_OUTPUT, BAD_CMD, BAD_ADDR, FAILED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsStatus {
    OkayNoOutput,
    OkayOutput,
    BadCmd,
    BadAddr,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_are_non_empty() {
        let e: Tn3270Error = TelnetError::FunctionsDiverged.into();
        assert!(!e.to_string().is_empty());
    }

    #[test]
    fn io_error_converts_to_transient() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let e: Tn3270Error = io_err.into();
        assert!(matches!(e, Tn3270Error::Transient(_)));
    }
}
