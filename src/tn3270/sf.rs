//! `SfEngine` (§4.4): the Write Structured Field command handler,
//! including Query Reply synthesis grounded in
//! `original_source/Common/pr3287/sf.c`'s `supported_replies` table.

use crate::charset::{CharSet, XTable};
use crate::error::{DsStatus, Tn3270Error};
use crate::printer::PrinterSink;
use crate::tn3270::codes::*;
use crate::tn3270::ds::{write_orders, DsOptions};
use crate::tn3270::page::PageBuilder;

/// Fixed Query Reply IDs this printer profile can answer, in the order
/// advertised by SUMMARY. DBCS_ASIA is included only when DBCS support
/// is enabled (constructor parameter), matching the source's guard.
fn supported_replies(dbcs: bool) -> Vec<u8> {
    let mut v = vec![
        QR_SUMMARY,
        QR_USABLE_AREA,
        QR_ALPHA_PART,
        QR_CHARSETS,
        QR_COLOR,
        QR_HIGHLIGHTING,
        QR_REPLY_MODES,
        QR_IMP_PART,
        QR_DDM,
    ];
    if dbcs {
        v.push(QR_DBCS_ASIA);
    }
    v
}

/// The Query Reply TLV wrapper marker byte (always 0x81), distinct from
/// any individual reply ID even though it coincides numerically with
/// `QR_USABLE_AREA`.
const QUERY_REPLY_MARKER: u8 = 0x81;

pub struct SfEngine {
    dbcs: bool,
    reply_modes: std::collections::HashMap<u8, u8>,
    pending_reply: Option<Vec<u8>>,
}

impl SfEngine {
    pub fn new() -> Self {
        SfEngine { dbcs: false, reply_modes: std::collections::HashMap::new(), pending_reply: None }
    }

    pub fn with_dbcs(mut self, dbcs: bool) -> Self {
        self.dbcs = dbcs;
        self
    }

    /// Pop the accumulated outbound Query Reply bytes, if any were
    /// produced by the last `process` call. The caller (the telnet
    /// layer) frames and transmits these as an ordinary 3270-DATA record
    /// beginning with AID `STRUCTURED_FIELD`.
    pub fn take_pending_reply(&mut self) -> Option<Vec<u8>> {
        self.pending_reply.take()
    }

    /// Iterate `[len_hi, len_lo, id, ...]` fields until the buffer is
    /// exhausted, per §4.4.
    pub fn process(
        &mut self,
        buf: &[u8],
        page: &mut PageBuilder,
        charset: CharSet,
        xtable: Option<&XTable>,
        sink: &mut dyn PrinterSink,
        opts: &DsOptions,
    ) -> Result<DsStatus, Tn3270Error> {
        let mut i = 0usize;
        let mut any_output = false;
        let mut any_error = false;

        while i < buf.len() {
            let remaining = buf.len() - i;
            if remaining < 3 {
                any_error = true;
                break;
            }
            let len = u16::from_be_bytes([buf[i], buf[i + 1]]) as usize;
            let field_len = if len == 0 { buf.len() - i } else { len };
            if field_len < 3 || i + field_len > buf.len() {
                any_error = true;
                break;
            }
            let id = buf[i + 2];
            let body = &buf[i + 3..i + field_len];

            let status = self.dispatch_field(id, body, page, charset, xtable, sink, opts)?;
            match status {
                DsStatus::OkayOutput => any_output = true,
                DsStatus::BadCmd | DsStatus::BadAddr | DsStatus::Failed => any_error = true,
                DsStatus::OkayNoOutput => {}
            }
            i += field_len;
        }

        if any_error && !any_output {
            return Ok(DsStatus::BadCmd);
        }
        Ok(if any_output { DsStatus::OkayOutput } else { DsStatus::OkayNoOutput })
    }

    fn dispatch_field(
        &mut self,
        id: u8,
        body: &[u8],
        page: &mut PageBuilder,
        charset: CharSet,
        xtable: Option<&XTable>,
        sink: &mut dyn PrinterSink,
        opts: &DsOptions,
    ) -> Result<DsStatus, Tn3270Error> {
        match id {
            SF_READ_PARTITION => self.read_partition(body),
            SF_ERASE_RESET => {
                if body.first() == Some(&ER_ALTERNATE) {
                    page.buf.rows = 27;
                    page.buf.cols = 132;
                }
                page.buf.erase();
                Ok(DsStatus::OkayNoOutput)
            }
            SF_SET_REPLY_MODE => {
                let (Some(&partition), Some(&mode)) = (body.first(), body.get(1)) else {
                    return Ok(DsStatus::BadCmd);
                };
                if partition != 0x00 {
                    return Ok(DsStatus::BadCmd);
                }
                self.reply_modes.insert(partition, mode);
                Ok(DsStatus::OkayNoOutput)
            }
            SF_OUTBOUND_DS => {
                let (Some(&partition), Some(&nested)) = (body.first(), body.get(1)) else {
                    return Ok(DsStatus::BadCmd);
                };
                if partition != 0x00 {
                    return Ok(DsStatus::BadCmd);
                }
                let Some(nested_cmd) = CommandCode::from_u8(nested) else {
                    return Ok(DsStatus::BadCmd);
                };
                let rest = &body[2..];
                match nested_cmd {
                    CommandCode::EraseAllUnprotected => {
                        page.buf.erase_all_unprotected();
                        Ok(DsStatus::OkayNoOutput)
                    }
                    CommandCode::EraseWrite | CommandCode::EraseWriteAlternate => {
                        page.buf.erase();
                        let Some(&_wcc) = rest.first() else { return Ok(DsStatus::OkayNoOutput) };
                        let (status, _emit) = write_orders(page, &rest[1..], charset, xtable, opts)?;
                        Ok(status)
                    }
                    CommandCode::Write => {
                        let Some(&_wcc) = rest.first() else { return Ok(DsStatus::OkayNoOutput) };
                        let (status, _emit) = write_orders(page, &rest[1..], charset, xtable, opts)?;
                        Ok(status)
                    }
                    _ => Ok(DsStatus::BadCmd),
                }
            }
            SF_TRANSFER_DATA => Ok(DsStatus::BadCmd),
            _ => Ok(DsStatus::OkayNoOutput),
        }
    }

    fn read_partition(&mut self, body: &[u8]) -> Result<DsStatus, Tn3270Error> {
        let (Some(&_partition), Some(&sub)) = (body.first(), body.get(1)) else {
            return Ok(DsStatus::BadCmd);
        };
        match sub {
            RP_QUERY => {
                self.emit_query_reply(QR_SUMMARY);
                Ok(DsStatus::OkayOutput)
            }
            RP_QUERY_LIST => {
                let list_type = body.get(2).copied().unwrap_or(QL_LIST);
                let requested: Vec<u8> = match list_type {
                    QL_ALL => supported_replies(self.dbcs),
                    _ => body.get(3..).map(|s| s.to_vec()).unwrap_or_default(),
                };
                for id in requested {
                    self.emit_query_reply(id);
                }
                Ok(DsStatus::OkayOutput)
            }
            _ => Ok(DsStatus::BadCmd),
        }
    }

    /// Synthesize one Query Reply TLV `[len_hi, len_lo, 0x81, code, ...]`.
    /// Per the Open Question decision in DESIGN.md, an ID outside the
    /// advertised SUMMARY set produces an empty reply body rather than
    /// silently answering it anyway.
    fn emit_query_reply(&mut self, id: u8) {
        let advertised = supported_replies(self.dbcs);
        let body: Vec<u8> = if id == QR_SUMMARY {
            advertised.clone()
        } else if advertised.contains(&id) {
            self.query_reply_body(id)
        } else {
            Vec::new()
        };
        let mut field = Vec::with_capacity(body.len() + 4);
        let len = body.len() + 4;
        field.push((len >> 8) as u8);
        field.push((len & 0xFF) as u8);
        field.push(QUERY_REPLY_MARKER);
        field.push(id);
        field.extend_from_slice(&body);
        self.pending_reply.get_or_insert_with(Vec::new).extend_from_slice(&field);
    }

    /// Fixed printer-profile bodies for the non-SUMMARY replies,
    /// grounded in `original_source/Common/pr3287/ctlr.c` and `sf.c`'s
    /// printer reply layouts (§ SUPPLEMENT in SPEC_FULL.md).
    fn query_reply_body(&self, id: u8) -> Vec<u8> {
        match id {
            QR_USABLE_AREA => vec![0x00, 0x00, 0x00, 0x00, 0x4B, 0x00, 0x1B, 0x01, 0x00, 0x00, 0x00],
            QR_ALPHA_PART => vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            QR_CHARSETS => vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            QR_COLOR => vec![0x00, 0x08, 0x00, 0xF4, 0x00, 0xF1, 0x00, 0xF2, 0x00, 0xF3],
            QR_HIGHLIGHTING => vec![0x04, 0x00, 0xF0, 0xF1, 0xF1, 0xF2, 0xF2, 0xF4, 0xF4],
            QR_REPLY_MODES => vec![REPLY_MODE_FIELD, REPLY_MODE_XFIELD, REPLY_MODE_CHAR],
            QR_DBCS_ASIA => vec![0x00],
            QR_IMP_PART => vec![0x00, 0x00, 0x0B, 0x01, 0x00, 0x00, 0x18, 0x00, 0x50],
            QR_DDM => vec![0x00, 0x58, 0x00, 0x58, 0x00, 0x00],
            _ => Vec::new(),
        }
    }
}

impl Default for SfEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::tests::MemSink;

    #[test]
    fn query_summary_advertises_reply_ids() {
        let mut sf = SfEngine::new();
        let mut page = PageBuilder::new(24, 80);
        let mut sink = MemSink::default();
        let opts = DsOptions::default();
        // READ PARTITION, partition 0xFF, QUERY
        let body = [0xFF, RP_QUERY];
        let status = sf
            .dispatch_field(SF_READ_PARTITION, &body, &mut page, CharSet::Cp037, None, &mut sink, &opts)
            .unwrap();
        assert_eq!(status, DsStatus::OkayOutput);
        let reply = sf.take_pending_reply().expect("reply produced");
        assert_eq!(reply[2], QUERY_REPLY_MARKER);
        assert_eq!(reply[3], QR_SUMMARY);
        assert!(reply[4..].contains(&QR_COLOR));
    }

    #[test]
    fn unadvertised_reply_id_is_empty() {
        let mut sf = SfEngine::new();
        sf.emit_query_reply(0x99);
        let reply = sf.take_pending_reply().unwrap();
        assert_eq!(u16::from_be_bytes([reply[0], reply[1]]) as usize, 4);
    }

    #[test]
    fn erase_reset_alternate_resizes_and_clears() {
        let mut sf = SfEngine::new();
        let mut page = PageBuilder::new(24, 80);
        let mut sink = MemSink::default();
        let opts = DsOptions::default();
        sf.dispatch_field(SF_ERASE_RESET, &[ER_ALTERNATE], &mut page, CharSet::Cp037, None, &mut sink, &opts)
            .unwrap();
        assert_eq!(page.buf.rows, 27);
        assert_eq!(page.buf.cols, 132);
    }
}
