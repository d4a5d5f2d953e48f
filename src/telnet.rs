//! `TelnetFsm` (§4.1): byte-level TELNET state machine — option
//! negotiation, TN3270E sub-negotiation, EOR-bounded record assembly, and
//! TN3270E header framing. Grounded in
//! `original_source/Common/pr3287/telnet.c`'s negotiation state machine,
//! cast in the enum/state-machine idiom of `src/telnet_negotiation.rs`'s
//! `TelnetOption`/`TelnetCommand`/`NegotiationState`.

use crate::error::{TelnetError, Tn3270Error};
use crate::lu::LuSelector;
use std::collections::HashSet;
use std::io::Write;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;
const EOR_CMD: u8 = 239;

const OPT_BINARY: u8 = 0;
const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;
const OPT_TM: u8 = 6;
const OPT_TTYPE: u8 = 24;
const OPT_EOR: u8 = 25;
const OPT_STARTTLS: u8 = 46;
const OPT_TN3270E: u8 = 40;

const TTYPE_IS: u8 = 0;
const TTYPE_SEND: u8 = 1;

// TN3270E sub-negotiation op-codes (RFC 2355), confirmed against
// `telnet.c`'s `e_*` helper macros.
const TN3270E_ASSOCIATE: u8 = 0;
const TN3270E_CONNECT: u8 = 1;
const TN3270E_DEVICE_TYPE: u8 = 2;
const TN3270E_FUNCTIONS: u8 = 3;
const TN3270E_IS: u8 = 4;
const TN3270E_REASON: u8 = 5;
const TN3270E_REJECT: u8 = 6;
const TN3270E_REQUEST: u8 = 7;
const TN3270E_SEND: u8 = 8;

/// TN3270E data-type byte (header offset 0), per RFC 2355.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Tn3270Data,
    ScsData,
    Response,
    BindImage,
    Unbind,
    NvtData,
    Request,
    SscpLuData,
    PrintEoj,
}

impl DataType {
    fn to_u8(self) -> u8 {
        match self {
            DataType::Tn3270Data => 0,
            DataType::ScsData => 1,
            DataType::Response => 2,
            DataType::BindImage => 3,
            DataType::Unbind => 4,
            DataType::NvtData => 5,
            DataType::Request => 6,
            DataType::SscpLuData => 7,
            DataType::PrintEoj => 8,
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(DataType::Tn3270Data),
            1 => Some(DataType::ScsData),
            2 => Some(DataType::Response),
            3 => Some(DataType::BindImage),
            4 => Some(DataType::Unbind),
            5 => Some(DataType::NvtData),
            6 => Some(DataType::Request),
            7 => Some(DataType::SscpLuData),
            8 => Some(DataType::PrintEoj),
            _ => None,
        }
    }
}

const RQF_ERR_COND_CLEARED: u8 = 1;
const RSF_POSITIVE_RESPONSE: u8 = 0;
const RSF_NEGATIVE_RESPONSE: u8 = 1;

// Header RESPONSE-FLAG values (offset 2 of the TN3270E header), per RFC
// 2355 — distinct from the POSITIVE/NEGATIVE-RESPONSE byte carried inside
// a RESPONSE record's own payload above.
const RESPONSE_FLAG_NO_RESPONSE: u8 = 0;
const RESPONSE_FLAG_ERROR_RESPONSE: u8 = 1;
const RESPONSE_FLAG_ALWAYS_RESPONSE: u8 = 2;

pub const NEG_COMMAND_REJECT: u8 = 0x00;
pub const NEG_INTERVENTION_REQUIRED: u8 = 0x01;
pub const NEG_OPERATION_CHECK: u8 = 0x02;
pub const NEG_COMPONENT_DISCONNECTED: u8 = 0x03;
const POS_DEVICE_END: u8 = 0x00;

// TN3270E FUNCTIONS bits (§4), distinct from the sub-negotiation op-codes
// above — these are the values exchanged inside a FUNCTIONS REQUEST/IS.
const FN_BIND_IMAGE: u8 = 0;
const FN_DATA_STREAM_CTL: u8 = 1;
const FN_RESPONSES: u8 = 2;
const FN_SCS_CTL_CODES: u8 = 3;
const FN_SYSREQ: u8 = 4;

/// One completed inbound record, classified by its TN3270E header (or
/// untyped, when TN3270E submode never negotiated).
pub struct Record {
    pub data_type: Option<DataType>,
    pub seq: Option<u16>,
    pub response_flag: Option<u8>,
    pub payload: Vec<u8>,
}

impl Record {
    /// True when this record's header response_flag asked for a reply
    /// (ALWAYS or ERROR), per RFC 2355.
    pub fn wants_response(&self) -> bool {
        matches!(
            self.response_flag,
            Some(RESPONSE_FLAG_ALWAYS_RESPONSE) | Some(RESPONSE_FLAG_ERROR_RESPONSE)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteState {
    Data,
    Iac,
    Will,
    Wont,
    Do,
    Dont,
    SbOption,
    SbData,
    SbIac,
}

/// Which options are currently active, per the negotiation policy of
/// §4.1. TM is deliberately excluded from persistent state.
#[derive(Debug, Default)]
struct ActiveOptions {
    binary: bool,
    eor: bool,
    ttype: bool,
    sga: bool,
    tn3270e: bool,
    echo: bool,
}

pub struct TelnetFsm {
    state: ByteState,
    record_buf: Vec<u8>,
    sb_buf: Vec<u8>,
    sb_option: u8,
    options: ActiveOptions,
    tls_available: bool,
    pub refused_tls: bool,
    pub starttls_pending: bool,
    termtype: String,
    lu: LuSelector,
    pub connected_lu: Option<String>,
    pub device_type: Option<String>,
    desired_functions: HashSet<u8>,
    negotiated_functions: Option<HashSet<u8>>,
    tn3270e_abandoned: bool,
    send_seq: u16,
}

impl TelnetFsm {
    pub fn new(termtype: impl Into<String>, lu: LuSelector, tls_available: bool) -> Self {
        let mut desired_functions = HashSet::new();
        desired_functions.insert(FN_BIND_IMAGE);
        desired_functions.insert(FN_DATA_STREAM_CTL);
        desired_functions.insert(FN_RESPONSES);
        desired_functions.insert(FN_SCS_CTL_CODES);
        desired_functions.insert(FN_SYSREQ);
        TelnetFsm {
            state: ByteState::Data,
            record_buf: Vec::new(),
            sb_buf: Vec::new(),
            sb_option: 0,
            options: ActiveOptions::default(),
            tls_available,
            refused_tls: false,
            starttls_pending: false,
            termtype: termtype.into(),
            lu,
            connected_lu: None,
            device_type: None,
            desired_functions,
            negotiated_functions: None,
            tn3270e_abandoned: false,
            send_seq: 0,
        }
    }

    pub fn is_tn3270e_active(&self) -> bool {
        self.options.tn3270e && !self.tn3270e_abandoned
    }

    /// Whether RESPONSES was one of the functions actually negotiated
    /// (present in both the REQUEST and the final IS set), per §4 — both
    /// I4 (when to answer an inbound record) and I5 (when the transmit
    /// sequence number advances) gate on this.
    pub fn responses_negotiated(&self) -> bool {
        self.negotiated_functions
            .as_ref()
            .is_some_and(|f| f.contains(&FN_RESPONSES))
    }

    /// Drive the FSM over `bytes`, writing any negotiation replies to
    /// `sink`. Returns the records completed by an `IAC EOR` within this
    /// call (a call may complete zero, one, or several records).
    pub fn feed(&mut self, bytes: &[u8], sink: &mut dyn Write) -> Result<Vec<Record>, Tn3270Error> {
        let mut records = Vec::new();
        for &b in bytes {
            match self.state {
                ByteState::Data => {
                    if b == IAC {
                        self.state = ByteState::Iac;
                    } else {
                        self.record_buf.push(b);
                    }
                }
                ByteState::Iac => match b {
                    IAC => {
                        self.record_buf.push(IAC);
                        self.state = ByteState::Data;
                    }
                    WILL => self.state = ByteState::Will,
                    WONT => self.state = ByteState::Wont,
                    DO => self.state = ByteState::Do,
                    DONT => self.state = ByteState::Dont,
                    SB => {
                        self.sb_buf.clear();
                        self.state = ByteState::SbOption;
                    }
                    EOR_CMD => {
                        let payload = std::mem::take(&mut self.record_buf);
                        records.push(self.classify_record(payload)?);
                        self.state = ByteState::Data;
                    }
                    _ => {
                        // Unknown IAC command: logged and ignored.
                        self.state = ByteState::Data;
                    }
                },
                ByteState::Will => {
                    self.handle_will(b, sink)?;
                    self.state = ByteState::Data;
                }
                ByteState::Wont => {
                    self.state = ByteState::Data;
                }
                ByteState::Do => {
                    self.handle_do(b, sink)?;
                    self.state = ByteState::Data;
                }
                ByteState::Dont => {
                    self.state = ByteState::Data;
                }
                ByteState::SbOption => {
                    self.sb_option = b;
                    self.state = ByteState::SbData;
                }
                ByteState::SbData => {
                    if b == IAC {
                        self.state = ByteState::SbIac;
                    } else {
                        if self.sb_buf.len() >= 4096 {
                            return Err(Tn3270Error::Telnet(TelnetError::SubOptionOverflow {
                                option: self.sb_option,
                                size: self.sb_buf.len(),
                                max: 4096,
                            }));
                        }
                        self.sb_buf.push(b);
                    }
                }
                ByteState::SbIac => {
                    if b == SE {
                        let option = self.sb_option;
                        let body = std::mem::take(&mut self.sb_buf);
                        self.handle_subnegotiation(option, &body, sink)?;
                        self.state = ByteState::Data;
                    } else if b == IAC {
                        self.sb_buf.push(IAC);
                        self.state = ByteState::SbData;
                    } else {
                        // Malformed: bail back to data state.
                        self.state = ByteState::Data;
                    }
                }
            }
        }
        Ok(records)
    }

    fn classify_record(&self, payload: Vec<u8>) -> Result<Record, Tn3270Error> {
        if !self.is_tn3270e_active() {
            return Ok(Record { data_type: None, seq: None, response_flag: None, payload });
        }
        if payload.len() < 5 {
            return Err(Tn3270Error::Telnet(TelnetError::MalformedSequence {
                state: "tn3270e-header",
                byte: payload.first().copied().unwrap_or(0),
            }));
        }
        let data_type = DataType::from_u8(payload[0]);
        let response_flag = payload[2];
        let seq = u16::from_be_bytes([payload[3], payload[4]]);
        Ok(Record {
            data_type,
            seq: Some(seq),
            response_flag: Some(response_flag),
            payload: payload[5..].to_vec(),
        })
    }

    fn handle_will(&mut self, option: u8, sink: &mut dyn Write) -> Result<(), Tn3270Error> {
        match option {
            OPT_SGA | OPT_BINARY | OPT_EOR | OPT_TTYPE | OPT_ECHO | OPT_TN3270E => {
                self.accept_peer_will(option);
                send_command(sink, DO, option)?;
                if option == OPT_EOR && !self.options.eor {
                    self.options.eor = true;
                    send_command(sink, WILL, OPT_EOR)?;
                }
            }
            _ => send_command(sink, DONT, option)?,
        }
        Ok(())
    }

    fn accept_peer_will(&mut self, option: u8) {
        match option {
            OPT_SGA => self.options.sga = true,
            OPT_BINARY => self.options.binary = true,
            OPT_EOR => self.options.eor = true,
            OPT_TTYPE => self.options.ttype = true,
            OPT_ECHO => self.options.echo = true,
            OPT_TN3270E => self.options.tn3270e = true,
            _ => {}
        }
    }

    fn handle_do(&mut self, option: u8, sink: &mut dyn Write) -> Result<(), Tn3270Error> {
        match option {
            OPT_BINARY | OPT_EOR | OPT_TTYPE | OPT_SGA | OPT_TN3270E => {
                self.accept_peer_will(option);
                send_command(sink, WILL, option)?;
            }
            OPT_TM => {
                send_command(sink, WILL, option)?;
            }
            OPT_STARTTLS => {
                if self.tls_available {
                    send_command(sink, WILL, option)?;
                } else {
                    self.refused_tls = true;
                    send_command(sink, WONT, option)?;
                }
            }
            _ => send_command(sink, WONT, option)?,
        }
        Ok(())
    }

    fn handle_subnegotiation(&mut self, option: u8, body: &[u8], sink: &mut dyn Write) -> Result<(), Tn3270Error> {
        match option {
            OPT_TTYPE => self.handle_ttype_sub(body, sink),
            OPT_TN3270E => self.handle_tn3270e_sub(body, sink),
            OPT_STARTTLS => {
                if body.first() == Some(&0) {
                    // FOLLOWS: caller (supervisor) performs the actual
                    // handshake and then calls `resume_after_tls`.
                    self.starttls_pending = true;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn handle_ttype_sub(&mut self, body: &[u8], sink: &mut dyn Write) -> Result<(), Tn3270Error> {
        if body.first() != Some(&TTYPE_SEND) {
            return Ok(());
        }
        let mut reply = vec![IAC, SB, OPT_TTYPE, TTYPE_IS];
        reply.extend_from_slice(self.termtype.as_bytes());
        if let Some(lu) = self.lu.current_for_ttype() {
            reply.push(b'@');
            reply.extend_from_slice(lu.as_bytes());
        }
        reply.extend_from_slice(&[IAC, SE]);
        sink.write_all(&reply).map_err(Tn3270Error::from)
    }

    fn handle_tn3270e_sub(&mut self, body: &[u8], sink: &mut dyn Write) -> Result<(), Tn3270Error> {
        let Some(&op) = body.first() else { return Ok(()) };
        match op {
            TN3270E_SEND => {
                if body.get(1) == Some(&TN3270E_DEVICE_TYPE) {
                    self.send_device_type_request(sink)?;
                }
            }
            TN3270E_DEVICE_TYPE => self.handle_device_type(&body[1..], sink)?,
            TN3270E_FUNCTIONS => self.handle_functions(&body[1..], sink)?,
            _ => {}
        }
        Ok(())
    }

    fn send_device_type_request(&mut self, sink: &mut dyn Write) -> Result<(), Tn3270Error> {
        let mut msg = vec![IAC, SB, OPT_TN3270E, TN3270E_DEVICE_TYPE, TN3270E_REQUEST];
        msg.extend_from_slice(self.termtype.as_bytes());
        match self.lu.mode() {
            crate::lu::LuMode::Associate(assoc) => {
                msg.extend_from_slice(b"ASSOCIATE ");
                msg.extend_from_slice(assoc.as_bytes());
            }
            crate::lu::LuMode::Connect => {
                if let Some(lu) = self.lu.current() {
                    msg.extend_from_slice(b"CONNECT ");
                    msg.extend_from_slice(lu.as_bytes());
                }
            }
        }
        msg.extend_from_slice(&[IAC, SE]);
        sink.write_all(&msg).map_err(Tn3270Error::from)
    }

    fn handle_device_type(&mut self, body: &[u8], sink: &mut dyn Write) -> Result<(), Tn3270Error> {
        let Some(&sub) = body.first() else { return Ok(()) };
        match sub {
            TN3270E_IS => {
                let rest = String::from_utf8_lossy(&body[1..]).to_string();
                let mut parts = rest.splitn(2, ' ');
                self.device_type = parts.next().map(str::to_string);
                self.connected_lu = parts.next().map(str::to_string);
                let mut msg = vec![IAC, SB, OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST];
                msg.extend(self.desired_functions.iter().copied());
                msg.extend_from_slice(&[IAC, SE]);
                sink.write_all(&msg).map_err(Tn3270Error::from)
            }
            TN3270E_REJECT => {
                let reason = body.get(2).copied().unwrap_or(0);
                if self.lu.advance_on_reject() {
                    self.send_device_type_request(sink)
                } else {
                    Err(Tn3270Error::Fatal(crate::error::FatalError::LuExhausted { reason }))
                }
            }
            _ => Ok(()),
        }
    }

    fn handle_functions(&mut self, body: &[u8], sink: &mut dyn Write) -> Result<(), Tn3270Error> {
        let Some(&sub) = body.first() else { return Ok(()) };
        match sub {
            TN3270E_REQUEST => {
                let host_set: HashSet<u8> = body[1..].iter().copied().collect();
                if host_set.is_subset(&self.desired_functions) {
                    self.negotiated_functions = Some(host_set.clone());
                    let mut msg = vec![IAC, SB, OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_IS];
                    msg.extend(host_set.into_iter());
                    msg.extend_from_slice(&[IAC, SE]);
                    sink.write_all(&msg).map_err(Tn3270Error::from)
                } else {
                    let intersect: HashSet<u8> =
                        host_set.intersection(&self.desired_functions).copied().collect();
                    let mut msg = vec![IAC, SB, OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST];
                    msg.extend(intersect.into_iter());
                    msg.extend_from_slice(&[IAC, SE]);
                    sink.write_all(&msg).map_err(Tn3270Error::from)
                }
            }
            TN3270E_IS => {
                let host_set: HashSet<u8> = body[1..].iter().copied().collect();
                if host_set.is_superset(&self.desired_functions) && host_set != self.desired_functions {
                    self.tn3270e_abandoned = true;
                    send_command(sink, WONT, OPT_TN3270E)
                } else {
                    self.negotiated_functions = Some(host_set);
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Resume DATA-state framing after a completed STARTTLS handshake,
    /// performed by the caller holding the actual socket.
    pub fn resume_after_tls(&mut self) {
        self.starttls_pending = false;
    }

    /// `send_record(payload, data_type, response_flag)` (§4.1): wrap with
    /// the TN3270E header when in submode, IAC-quote, terminate with
    /// `IAC EOR`, and write to `sink`.
    pub fn send_record(
        &mut self,
        payload: &[u8],
        data_type: DataType,
        response_flag: u8,
    ) -> Vec<u8> {
        let mut framed = Vec::with_capacity(payload.len() + 8);
        if self.is_tn3270e_active() {
            framed.push(data_type.to_u8());
            framed.push(0); // request_flag
            framed.push(response_flag);
            framed.extend_from_slice(&self.next_send_seq().to_be_bytes());
        }
        framed.extend_from_slice(payload);

        let mut out = Vec::with_capacity(framed.len() + 4);
        for &b in &framed {
            out.push(b);
            if b == IAC {
                out.push(IAC);
            }
        }
        out.push(IAC);
        out.push(EOR_CMD);
        out
    }

    pub fn respond_positive(&mut self, seq: u16) -> Vec<u8> {
        let body = vec![RSF_POSITIVE_RESPONSE, POS_DEVICE_END];
        self.send_response(seq, &body)
    }

    pub fn respond_negative(&mut self, seq: u16, reason: u8) -> Vec<u8> {
        let body = vec![RSF_NEGATIVE_RESPONSE, reason];
        self.send_response(seq, &body)
    }

    fn send_response(&mut self, seq: u16, flag_and_reason: &[u8]) -> Vec<u8> {
        let mut payload = seq.to_be_bytes().to_vec();
        payload.extend_from_slice(flag_and_reason);
        self.send_record(&payload, DataType::Response, RESPONSE_FLAG_NO_RESPONSE)
    }

    /// `send_error_cleared()`: a REQUEST frame with
    /// `request_flag=ERR-COND-CLEARED` and the next transmit sequence.
    pub fn send_error_cleared(&mut self) -> Vec<u8> {
        let mut framed = vec![DataType::Request.to_u8(), RQF_ERR_COND_CLEARED, 0];
        framed.extend_from_slice(&self.next_send_seq().to_be_bytes());
        let mut out = Vec::with_capacity(framed.len() + 4);
        for &b in &framed {
            out.push(b);
            if b == IAC {
                out.push(IAC);
            }
        }
        out.push(IAC);
        out.push(EOR_CMD);
        out
    }

    /// The sequence number to stamp into the next outbound TN3270E
    /// header. Only advances once RESPONSES has been negotiated (I5);
    /// otherwise every record carries seq 0.
    fn next_send_seq(&mut self) -> u16 {
        if self.responses_negotiated() {
            let seq = self.send_seq;
            self.send_seq = self.send_seq.wrapping_add(1);
            seq
        } else {
            0
        }
    }
}

fn send_command(sink: &mut dyn Write, command: u8, option: u8) -> Result<(), Tn3270Error> {
    sink.write_all(&[IAC, command, option]).map_err(Tn3270Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lu::LuSelector;

    fn fsm() -> TelnetFsm {
        TelnetFsm::new("IBM-3287-1", LuSelector::connect(vec!["LU1".into()]), false)
    }

    #[test]
    fn will_eor_is_accepted_and_reciprocated() {
        let mut f = fsm();
        let mut out = Vec::new();
        f.feed(&[IAC, WILL, OPT_EOR], &mut out).unwrap();
        assert!(f.options.eor);
        assert_eq!(out, vec![IAC, DO, OPT_EOR, IAC, WILL, OPT_EOR]);
    }

    #[test]
    fn unsupported_do_is_refused() {
        let mut f = fsm();
        let mut out = Vec::new();
        f.feed(&[IAC, DO, 99], &mut out).unwrap();
        assert_eq!(out, vec![IAC, WONT, 99]);
    }

    #[test]
    fn iac_eor_completes_a_record() {
        let mut f = fsm();
        let mut out = Vec::new();
        let records = f.feed(&[b'h', b'i', IAC, EOR_CMD], &mut out).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, b"hi");
    }

    #[test]
    fn doubled_iac_in_data_is_unescaped() {
        let mut f = fsm();
        let mut out = Vec::new();
        let records = f.feed(&[0xC8, IAC, IAC, 0xC9, IAC, EOR_CMD], &mut out).unwrap();
        assert_eq!(records[0].payload, vec![0xC8, IAC, 0xC9]);
    }

    proptest::proptest! {
        // P1: decode(encode(p)) == p for any finite payload.
        #[test]
        fn iac_quoting_round_trips(payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let mut f = fsm();
            let wire = f.send_record(&payload, DataType::Tn3270Data, 0);

            let mut rx = fsm();
            let mut sink = Vec::new();
            let records = rx.feed(&wire, &mut sink).unwrap();
            proptest::prop_assert_eq!(records.len(), 1);
            proptest::prop_assert_eq!(&records[0].payload, &payload);
        }
    }
}
