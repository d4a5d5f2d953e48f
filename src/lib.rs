pub mod config;
pub mod error;

/// Character-set translation between EBCDIC code pages and Unicode.
pub mod charset;

/// 3270 data stream: commands, orders, the page buffer, and structured
/// fields (Query Reply synthesis).
pub mod tn3270;

/// SNA Character Stream interpretation for SCS print jobs.
pub mod scs;

/// TELNET option negotiation and TN3270E record framing.
pub mod telnet;

/// Printer sink abstraction over a spawned local process or spooler.
pub mod printer;

/// LU candidate selection for DEVICE-TYPE negotiation.
pub mod lu;

/// Outer reconnect loop: address resolution, TLS, keepalive, flush timing.
pub mod supervisor;

/// Single log sink with error-message dedup.
pub mod trace;

/// Process-wide shutdown flag set from SIGTERM/SIGINT handlers.
pub mod signal;
