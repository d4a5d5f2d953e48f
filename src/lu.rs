//! `LuSelector` (§3): the ordered LU candidate list consulted by
//! `TelnetFsm` during TTYPE and TN3270E DEVICE-TYPE negotiation.

/// Whether the connect string named an `assoc` partner (mandatory,
/// non-retryable) or an ordered list of `CONNECT` candidates.
#[derive(Debug, Clone)]
pub enum LuMode {
    Connect,
    Associate(String),
}

/// Ordered candidate list with a `try_lu` pointer advanced on each
/// DEVICE-TYPE REJECT, per the Open Question decision recorded in
/// DESIGN.md: REJECT never retries the LU it was rejected for, whatever
/// the reason byte says.
#[derive(Debug, Clone)]
pub struct LuSelector {
    candidates: Vec<String>,
    try_lu: usize,
    mode: LuModeTag,
    assoc: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LuModeTag {
    Connect,
    Associate,
}

impl LuSelector {
    pub fn connect(candidates: Vec<String>) -> Self {
        LuSelector { candidates, try_lu: 0, mode: LuModeTag::Connect, assoc: None }
    }

    pub fn associate(assoc: impl Into<String>) -> Self {
        LuSelector { candidates: Vec::new(), try_lu: 0, mode: LuModeTag::Associate, assoc: Some(assoc.into()) }
    }

    pub fn mode(&self) -> LuMode {
        match self.mode {
            LuModeTag::Connect => LuMode::Connect,
            LuModeTag::Associate => LuMode::Associate(self.assoc.clone().unwrap_or_default()),
        }
    }

    /// The LU to put in the TTYPE `@lu` suffix: omitted entirely in
    /// assoc mode, since the host confirms via DEVICE-TYPE IS instead.
    pub fn current_for_ttype(&self) -> Option<&str> {
        match self.mode {
            LuModeTag::Associate => None,
            LuModeTag::Connect => self.current(),
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.candidates.get(self.try_lu).map(String::as_str)
    }

    /// Advance past the rejected LU. Returns `false` (and the caller
    /// should fail the connection) when the candidate list is exhausted
    /// or association was mandatory.
    pub fn advance_on_reject(&mut self) -> bool {
        if self.mode == LuModeTag::Associate {
            return false;
        }
        self.try_lu += 1;
        self.try_lu < self.candidates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_through_candidates_and_fails_when_exhausted() {
        let mut lu = LuSelector::connect(vec!["LU1".into(), "LU2".into(), "LU3".into()]);
        assert_eq!(lu.current(), Some("LU1"));
        assert!(lu.advance_on_reject());
        assert_eq!(lu.current(), Some("LU2"));
        assert!(lu.advance_on_reject());
        assert_eq!(lu.current(), Some("LU3"));
        assert!(!lu.advance_on_reject());
    }

    #[test]
    fn associate_mode_never_retries() {
        let mut lu = LuSelector::associate("POOL1");
        assert_eq!(lu.current_for_ttype(), None);
        assert!(!lu.advance_on_reject());
    }

    #[test]
    fn connect_mode_with_no_candidates_omits_ttype_suffix() {
        let lu = LuSelector::connect(Vec::new());
        assert_eq!(lu.current_for_ttype(), None);
    }
}
