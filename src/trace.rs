//! Single log sink (§9 "consolidate into a single log sink"). Grounded in
//! `original_source/Common/pr3287/trace.c`'s `trace_ds`/`vctrace` pair
//! (one data-stream trace channel, one "this one line to the user"
//! channel) and `pr3287.c`'s around-line-354 duplicate-message
//! suppression, cast onto `log`/`env_logger` instead of a raw `FILE*`.

use std::sync::Mutex;

static LAST_ERROR: Mutex<Option<String>> = Mutex::new(None);

/// Install the process-wide logger. Call once at startup, before any
/// other module logs.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Emit one concise error line, suppressing an immediate repeat of the
/// same message (§9: "to avoid log flooding on tight reconnect loops").
pub fn error_once(message: impl Into<String>) {
    let message = message.into();
    let mut last = LAST_ERROR.lock().unwrap();
    if last.as_deref() == Some(message.as_str()) {
        return;
    }
    log::error!("{message}");
    *last = Some(message);
}

/// Low-volume data-stream trace, enabled via `RUST_LOG=trace`.
pub fn ds(message: impl std::fmt::Display) {
    log::trace!("{message}");
}

/// Dump the resolved options record at startup, enabled via
/// `RUST_LOG=debug`.
pub fn options(opts: &crate::config::Options) {
    match serde_json::to_string(opts) {
        Ok(json) => log::debug!("options: {json}"),
        Err(e) => log::debug!("options: <unserializable: {e}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_error_is_suppressed() {
        *LAST_ERROR.lock().unwrap() = None;
        error_once("connection refused");
        error_once("connection refused");
        assert_eq!(LAST_ERROR.lock().unwrap().as_deref(), Some("connection refused"));
    }

    #[test]
    fn distinct_error_resets_suppression() {
        *LAST_ERROR.lock().unwrap() = None;
        error_once("a");
        error_once("b");
        assert_eq!(LAST_ERROR.lock().unwrap().as_deref(), Some("b"));
    }
}
