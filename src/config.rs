//! Immutable `Options` record built once from CLI flags at startup, per
//! §4.7/§6. Adapted from `SessionConfig`'s typed-accessor style, frozen
//! into a plain struct instead of a live property map — this core has no
//! in-session reconfiguration.

use std::time::Duration;

use serde::Serialize;

use crate::error::{FatalError, Tn3270Error};
use crate::scs::ScsOptions;
use crate::tn3270::page::RenderOptions;

/// IPv4/IPv6 preference for host resolution (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AddressFamily {
    #[default]
    Any,
    V4Only,
    V6Only,
}

#[derive(Debug, Clone, Serialize)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub address_family: AddressFamily,

    pub emflush: bool,
    pub ffskip: bool,
    pub ffthru: bool,
    pub ffeoj: bool,
    pub crlf: bool,
    pub crthru: bool,
    pub blanklines: bool,
    pub skipcc: bool,
    pub mpp: usize,

    pub ignoreeoj: bool,
    pub eojtimeout: Duration,
    pub reconnect: bool,
    pub syncport: Option<u16>,

    pub assoc: Option<String>,
    pub lus: Vec<String>,
    pub xtable: Option<String>,
    pub trnpre: Option<String>,
    pub trnpost: Option<String>,
    pub printer: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            host: String::new(),
            port: 23,
            tls: false,
            address_family: AddressFamily::Any,
            emflush: false,
            ffskip: false,
            ffthru: false,
            ffeoj: false,
            crlf: false,
            crthru: false,
            blanklines: false,
            skipcc: false,
            mpp: 132,
            ignoreeoj: false,
            eojtimeout: Duration::from_secs(0),
            reconnect: false,
            syncport: None,
            assoc: None,
            lus: Vec::new(),
            xtable: None,
            trnpre: None,
            trnpost: None,
            printer: None,
        }
    }
}

impl Options {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            mpp: self.mpp,
            skipcc: self.skipcc,
            ffskip: self.ffskip,
            blanklines: self.blanklines,
            crlf: self.crlf,
        }
    }

    pub fn scs_options(&self) -> ScsOptions {
        ScsOptions { crlf: self.crlf, ffskip: self.ffskip, ffthru: self.ffthru }
    }

    /// Parse CLI flags per §6. `host[:port]` (or `LU@host`/`assoc,@host`
    /// connect-string forms handled by the caller before this) is the
    /// sole positional argument; everything else is a `-flag[=value]`.
    pub fn from_args(args: &[String]) -> Result<Options, Tn3270Error> {
        let mut opts = Options::default();
        let mut positional = None;

        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            let (flag, inline_value) = match arg.split_once('=') {
                Some((f, v)) => (f, Some(v.to_string())),
                None => (arg.as_str(), None),
            };
            let mut next_value = || -> Result<String, Tn3270Error> {
                if let Some(v) = &inline_value {
                    return Ok(v.clone());
                }
                iter.next().cloned().ok_or_else(|| {
                    Tn3270Error::Fatal(FatalError::InvalidOption {
                        option: flag.to_string(),
                        reason: "missing value".into(),
                    })
                })
            };
            match flag {
                "-emflush" => opts.emflush = true,
                "-noemflush" => opts.emflush = false,
                "-ffskip" => opts.ffskip = true,
                "-ffthru" => opts.ffthru = true,
                "-ffeoj" => opts.ffeoj = true,
                "-crlf" => opts.crlf = true,
                "-nocrlf" => opts.crlf = false,
                "-crthru" => opts.crthru = true,
                "-blanklines" => opts.blanklines = true,
                "-skipcc" => opts.skipcc = true,
                "-mpp" => opts.mpp = parse_usize(flag, &next_value()?)?,
                "-ignoreeoj" => opts.ignoreeoj = true,
                "-eojtimeout" => opts.eojtimeout = Duration::from_secs(parse_u64(flag, &next_value()?)?),
                "-assoc" => opts.assoc = Some(next_value()?),
                "-reconnect" => opts.reconnect = true,
                "-syncport" => opts.syncport = Some(parse_usize(flag, &next_value()?)? as u16),
                "-xtable" => opts.xtable = Some(next_value()?),
                "-trnpre" => opts.trnpre = Some(next_value()?),
                "-trnpost" => opts.trnpost = Some(next_value()?),
                "-printer" => opts.printer = Some(next_value()?),
                "-4" => opts.address_family = AddressFamily::V4Only,
                "-6" => opts.address_family = AddressFamily::V6Only,
                _ if flag.starts_with('-') => {
                    return Err(Tn3270Error::Fatal(FatalError::InvalidOption {
                        option: flag.to_string(),
                        reason: "unrecognized flag".into(),
                    }));
                }
                _ => positional = Some(arg.clone()),
            }
        }

        let spec = positional.ok_or_else(|| {
            Tn3270Error::Fatal(FatalError::InvalidOption { option: "host".into(), reason: "missing connect string".into() })
        })?;
        parse_connect_string(&spec, &mut opts)?;
        Ok(opts)
    }
}

/// Parse the `[L:][LU1,LU2,...[@]]host[:port]` connect string, per §3's
/// `LuSelector` data model: a comma-separated candidate list, or a bare
/// `@`-prefixed single name meaning mandatory association (handled by
/// `-assoc` instead, so a bare `@host` here just means "no LU"). A
/// leading `L:` (in either order with the LU prefix) requests TLS.
fn parse_connect_string(spec: &str, opts: &mut Options) -> Result<(), Tn3270Error> {
    let mut spec = spec;
    if let Some(rest) = spec.strip_prefix("L:") {
        opts.tls = true;
        spec = rest;
    }
    let (lu_part, host_part) = match spec.rsplit_once('@') {
        Some((lu, host)) => {
            if let Some(rest) = lu.strip_prefix("L:") {
                opts.tls = true;
                (Some(rest), host)
            } else {
                (Some(lu), host)
            }
        }
        None => (None, spec),
    };
    if let Some(lu) = lu_part {
        if !lu.is_empty() {
            opts.lus = lu.split(',').map(str::to_string).collect();
        }
    }
    match host_part.rsplit_once(':') {
        Some((host, port)) => {
            opts.host = host.to_string();
            opts.port = parse_usize("port", port)? as u16;
        }
        None => opts.host = host_part.to_string(),
    }
    Ok(())
}

fn parse_usize(flag: &str, value: &str) -> Result<usize, Tn3270Error> {
    value.parse().map_err(|_| {
        Tn3270Error::Fatal(FatalError::InvalidOption { option: flag.to_string(), reason: format!("not a number: {value}") })
    })
}

fn parse_u64(flag: &str, value: &str) -> Result<u64, Tn3270Error> {
    value.parse().map_err(|_| {
        Tn3270Error::Fatal(FatalError::InvalidOption { option: flag.to_string(), reason: format!("not a number: {value}") })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_host_and_port() {
        let opts = Options::from_args(&args(&["mainframe.example.com:992"])).unwrap();
        assert_eq!(opts.host, "mainframe.example.com");
        assert_eq!(opts.port, 992);
    }

    #[test]
    fn parses_lu_candidate_list() {
        let opts = Options::from_args(&args(&["LU1,LU2,LU3@mainframe.example.com"])).unwrap();
        assert_eq!(opts.host, "mainframe.example.com");
        assert_eq!(opts.lus, vec!["LU1", "LU2", "LU3"]);
    }

    #[test]
    fn leading_l_prefix_requests_tls() {
        let opts = Options::from_args(&args(&["L:mainframe.example.com"])).unwrap();
        assert!(opts.tls);
        assert_eq!(opts.host, "mainframe.example.com");

        let opts = Options::from_args(&args(&["L:LU1@mainframe.example.com"])).unwrap();
        assert!(opts.tls);
        assert_eq!(opts.lus, vec!["LU1"]);
    }

    #[test]
    fn parses_flags_and_eojtimeout() {
        let opts = Options::from_args(&args(&["-eojtimeout", "5", "-reconnect", "host"])).unwrap();
        assert_eq!(opts.eojtimeout, Duration::from_secs(5));
        assert!(opts.reconnect);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(Options::from_args(&args(&["-bogus", "host"])).is_err());
    }

    #[test]
    fn rejects_missing_host() {
        assert!(Options::from_args(&args(&["-reconnect"])).is_err());
    }
}
