//! End-to-end scenario tests against literal byte sequences (§8 S1-S6).

use pr3270::charset::CharSet;
use pr3270::lu::LuSelector;
use pr3270::printer::PrinterSink;
use pr3270::scs::{ScsInterpreter, ScsOptions};
use pr3270::telnet::{DataType, TelnetFsm, NEG_COMMAND_REJECT};
use pr3270::tn3270::ds::{DsInterpreter, DsOptions};

#[derive(Default)]
struct SinkBuf {
    data: Vec<u8>,
}

impl PrinterSink for SinkBuf {
    fn write(&mut self, byte: u8) -> std::io::Result<()> {
        self.data.push(byte);
        Ok(())
    }
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.data.extend_from_slice(bytes);
        Ok(())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
    fn end_of_job(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

const IAC: u8 = 255;
const SB: u8 = 250;
const SE: u8 = 240;
const WILL: u8 = 251;
const DO: u8 = 253;

// S1: TELNET option negotiation to TN3270E 3270 mode.
#[test]
fn s1_negotiates_tn3270e_device_type_and_functions() {
    let mut fsm = TelnetFsm::new("IBM-3287-1", LuSelector::connect(Vec::new()), false);
    let mut out = Vec::new();

    fsm.feed(&[IAC, DO, 40], &mut out).unwrap(); // DO TN3270E
    assert_eq!(out, vec![IAC, WILL, 40]);

    out.clear();
    fsm.feed(&[IAC, SB, 40, 8, 2, IAC, SE], &mut out).unwrap(); // SEND DEVICE-TYPE
    assert_eq!(&out[..5], &[IAC, SB, 40, 2, 7]); // DEVICE-TYPE REQUEST
    assert!(out.windows(10).any(|w| w == b"IBM-3287-1"));

    out.clear();
    fsm.feed(
        &[&[IAC, SB, 40, 2, 4][..], b"IBM-3287-1 LU1", &[IAC, SE][..]].concat(),
        &mut out,
    )
    .unwrap();
    assert_eq!(fsm.device_type.as_deref(), Some("IBM-3287-1"));
    assert_eq!(&out[..5], &[IAC, SB, 40, 3, 7]); // FUNCTIONS REQUEST
}

// S2: 3270 Erase-Write + single character, flushed on PRINT-EOJ.
#[test]
fn s2_erase_write_renders_on_eoj() {
    let mut ds = DsInterpreter::new(24, 80);
    let mut sink = SinkBuf::default();
    let opts = DsOptions::default();

    let payload = vec![0xF5, 0xC3, 0x11, 0x40, 0x40, 0xC8, 0xC9]; // EW, WCC, SBA(1,1), "HI"
    ds.process(&payload, &mut sink, &opts).unwrap();
    assert!(sink.data.is_empty(), "unformatted mode defers output until EOJ");

    ds.flush_job(&mut sink, &opts).unwrap();
    assert_eq!(sink.data, b"HI\n");
}

// S3: SCS formfeed skip produces no output when there was no prior data.
#[test]
fn s3_scs_formfeed_skip_emits_nothing() {
    let mut scs = ScsInterpreter::new(false);
    let mut sink = SinkBuf::default();
    let opts = ScsOptions { crlf: false, ffskip: true, ffthru: false };

    scs.process(&[0x0C], &mut sink, CharSet::Cp037, None, opts).unwrap();
    assert!(sink.data.is_empty());
}

// S4: TN3270E negative response on an undefined command byte.
#[test]
fn s4_bad_command_yields_negative_response() {
    let mut ds = DsInterpreter::new(24, 80);
    let mut sink = SinkBuf::default();
    let opts = DsOptions::default();

    let status = ds.process(&[0xFE], &mut sink, &opts).unwrap();
    assert_eq!(status, pr3270::error::DsStatus::BadCmd);

    let mut fsm = TelnetFsm::new("IBM-3287-1", LuSelector::connect(Vec::new()), false);
    let resp = fsm.respond_negative(0x0042, NEG_COMMAND_REJECT);
    // untyped (no TN3270E header negotiated): just payload + IAC EOR
    assert_eq!(resp, vec![0x00, 0x42, 0x01, 0x00, IAC, 239]);
    let _ = DataType::Response;
}

// S6: LU fallback through an exhausted candidate list ends fatally.
#[test]
fn s6_lu_fallback_exhausts_and_fails() {
    let mut lu = LuSelector::connect(vec!["LU1".into(), "LU2".into(), "LU3".into()]);
    assert_eq!(lu.current(), Some("LU1"));
    assert!(lu.advance_on_reject());
    assert_eq!(lu.current(), Some("LU2"));
    assert!(lu.advance_on_reject());
    assert_eq!(lu.current(), Some("LU3"));
    assert!(!lu.advance_on_reject(), "third rejection should exhaust the candidate list");
}
