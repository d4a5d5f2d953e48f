//! `DsInterpreter` (§4.2): dispatches 3270 Write/EW/EWA/WSF commands and
//! drives `PageBuilder`.

use crate::charset::{self, CharSet, ExpandOption, XTable};
use crate::error::{DsStatus, Tn3270Error};
use crate::printer::PrinterSink;
use crate::tn3270::codes::*;
use crate::tn3270::page::{CellCharset, GraphicRendition, PageBuilder, RenderOptions, WccLineLength};
use crate::tn3270::sf::SfEngine;

/// Options the interpreter consults while rendering and dispatching,
/// narrowed from `config::Options` (kept here to avoid a dependency
/// cycle between `tn3270` and `config`).
#[derive(Debug, Clone, Copy)]
pub struct DsOptions {
    pub render: RenderOptions,
    pub emflush: bool,
}

impl Default for DsOptions {
    fn default() -> Self {
        DsOptions { render: RenderOptions::default(), emflush: false }
    }
}

pub struct DsInterpreter {
    pub page: PageBuilder,
    pub sf_engine: SfEngine,
    pub charset: CharSet,
    pub xtable: Option<XTable>,
    pub(crate) job_pending: bool,
}

impl DsInterpreter {
    pub fn new(rows: usize, cols: usize) -> Self {
        DsInterpreter {
            page: PageBuilder::new(rows, cols),
            sf_engine: SfEngine::new(),
            charset: CharSet::Cp037,
            xtable: None,
            job_pending: false,
        }
    }

    /// Process one well-framed inbound payload beginning with a command
    /// byte. Returns the status the caller (TelnetFsm) converts into a
    /// TN3270E response.
    pub fn process(
        &mut self,
        payload: &[u8],
        sink: &mut dyn PrinterSink,
        opts: &DsOptions,
    ) -> Result<DsStatus, Tn3270Error> {
        let Some(&cmd_byte) = payload.first() else {
            return Ok(DsStatus::OkayNoOutput);
        };
        let Some(cmd) = CommandCode::from_u8(cmd_byte) else {
            return Ok(DsStatus::BadCmd);
        };
        match cmd {
            CommandCode::EraseAllUnprotected => {
                self.page.buf.erase_all_unprotected();
                self.job_pending = true;
                self.flush_job(sink, opts)
            }
            CommandCode::EraseWrite | CommandCode::EraseWriteAlternate => {
                self.page.buf.erase();
                self.write(&payload[1..], sink, opts)
            }
            CommandCode::Write => self.write(&payload[1..], sink, opts),
            CommandCode::WriteStructuredField => {
                let status = self.sf_engine.process(
                    &payload[1..],
                    &mut self.page,
                    self.charset,
                    self.xtable.as_ref(),
                    sink,
                    opts,
                );
                if status.is_ok() {
                    self.job_pending = true;
                }
                status
            }
            CommandCode::Nop => Ok(DsStatus::OkayNoOutput),
            CommandCode::ReadBuffer | CommandCode::ReadModified | CommandCode::ReadModifiedAll => {
                Ok(DsStatus::BadCmd)
            }
        }
    }

    /// `write(buf, erase)` per §4.2: consume the WCC then iterate orders.
    fn write(&mut self, buf: &[u8], sink: &mut dyn PrinterSink, opts: &DsOptions) -> Result<DsStatus, Tn3270Error> {
        let Some(&wcc) = buf.first() else {
            return Ok(DsStatus::OkayNoOutput);
        };
        let _ = wcc; // WCC carries only reset/alarm/restore/MDT bits (§3).
        self.job_pending = true;
        let (status, emit_now) =
            write_orders(&mut self.page, &buf[1..], self.charset, self.xtable.as_ref(), opts)?;
        if emit_now {
            return self.flush_job(sink, opts);
        }
        Ok(status)
    }

    /// Flush the page to `sink` at end-of-job (Print-EOJ/UNBIND) or, in
    /// unformatted mode with `emflush` set, on an EM order.
    pub fn flush_job(&mut self, sink: &mut dyn PrinterSink, opts: &DsOptions) -> Result<DsStatus, Tn3270Error> {
        if !self.job_pending {
            return Ok(DsStatus::OkayNoOutput);
        }
        let status = if self.page.buf.wcc_line_length.is_unformatted() {
            self.page.render_unformatted(sink, opts.render)
        } else {
            self.page.render_formatted(sink, opts.render)
        }?;
        self.job_pending = false;
        Ok(status)
    }

    /// Pop any outbound Query Reply produced by a structured field this
    /// interpreter has processed.
    pub fn take_pending_reply(&mut self) -> Option<Vec<u8>> {
        self.sf_engine.take_pending_reply()
    }
}

/// Shared order-walking loop used both by top-level W/EW/EWA processing
/// and by `SfEngine`'s OUTBOUND DS nested command, so the two never
/// drift apart. Returns the status and whether an EM-triggered
/// `emflush` output should happen immediately.
pub(crate) fn write_orders(
    page: &mut PageBuilder,
    buf: &[u8],
    charset: CharSet,
    xtable: Option<&XTable>,
    opts: &DsOptions,
) -> Result<(DsStatus, bool), Tn3270Error> {
    let translate = |b: u8| charset::ebcdic_to_unicode(b, charset, ExpandOption::None, xtable);
    let mut i = 0usize;
    let mut emit_now = false;

    while i < buf.len() {
        let b = buf[i];
        match b {
            ORDER_SF => {
                i += 1;
                let fa = *buf.get(i).unwrap_or(&0);
                page.start_field(fa);
                i += 1;
            }
            ORDER_SFE => {
                i += 1;
                let Some(&count) = buf.get(i) else { return Ok((DsStatus::BadAddr, false)) };
                i += 1;
                let mut pairs = Vec::new();
                for _ in 0..count {
                    let (Some(&id), Some(&val)) = (buf.get(i), buf.get(i + 1)) else {
                        return Ok((DsStatus::BadAddr, false));
                    };
                    pairs.push((id, val));
                    i += 2;
                }
                let fa = pairs.iter().find(|(id, _)| *id == XA_3270).map(|(_, v)| *v).unwrap_or(0);
                page.start_field(fa);
                page.modify_field(&pairs);
            }
            ORDER_MF => {
                i += 1;
                let Some(&count) = buf.get(i) else { return Ok((DsStatus::BadAddr, false)) };
                i += 1;
                let mut pairs = Vec::new();
                for _ in 0..count {
                    let (Some(&id), Some(&val)) = (buf.get(i), buf.get(i + 1)) else {
                        return Ok((DsStatus::BadAddr, false));
                    };
                    pairs.push((id, val));
                    i += 2;
                }
                page.modify_field(&pairs);
            }
            ORDER_SBA => {
                let (Some(&b1), Some(&b2)) = (buf.get(i + 1), buf.get(i + 2)) else {
                    return Ok((DsStatus::BadAddr, false));
                };
                let addr = decode_address(b1, b2);
                if addr as usize >= page.buf.len() {
                    return Ok((DsStatus::BadAddr, false));
                }
                page.set_address(addr);
                i += 3;
            }
            ORDER_SA => {
                let (Some(&id), Some(&val)) = (buf.get(i + 1), buf.get(i + 2)) else {
                    return Ok((DsStatus::BadAddr, false));
                };
                apply_sa(page, id, val);
                i += 3;
            }
            ORDER_IC => {
                page.buf.cursor_addr = page.buf.buffer_addr;
                i += 1;
            }
            ORDER_PT => {
                // Program tab: advance to the next field-attribute
                // boundary; simplified to "next cell" when none found.
                let start = page.buf.buffer_addr;
                let n = page.buf.len();
                let mut addr = (start + 1) % n;
                while addr != start && !page.buf.cell(addr).is_field_attribute() {
                    addr = (addr + 1) % n;
                }
                page.buf.buffer_addr = addr;
                i += 1;
            }
            ORDER_RA => {
                let (Some(&b1), Some(&b2), Some(&code)) =
                    (buf.get(i + 1), buf.get(i + 2), buf.get(i + 3))
                else {
                    return Ok((DsStatus::BadAddr, false));
                };
                let addr = decode_address(b1, b2);
                if addr as usize >= page.buf.len() {
                    return Ok((DsStatus::BadAddr, false));
                }
                let ch = translate(code);
                let gr = page.buf.default_gr;
                page.repeat_to(addr, ch, CellCharset::Base, gr);
                i += 4;
            }
            ORDER_EUA => {
                let (Some(&b1), Some(&b2)) = (buf.get(i + 1), buf.get(i + 2)) else {
                    return Ok((DsStatus::BadAddr, false));
                };
                let addr = decode_address(b1, b2) as usize;
                if addr >= page.buf.len() {
                    return Ok((DsStatus::BadAddr, false));
                }
                let mut a = page.buf.buffer_addr;
                while a != addr {
                    if !page.buf.cell(a).is_field_attribute() {
                        *page.buf.cell_mut(a) = Default::default();
                    }
                    a = (a + 1) % page.buf.len();
                }
                i += 3;
            }
            ORDER_GE => {
                i += 1;
                let Some(&code) = buf.get(i) else { return Ok((DsStatus::BadAddr, false)) };
                let ch = translate(code);
                let gr = page.buf.default_gr;
                page.add(code, ch, CellCharset::LineDraw, gr);
                i += 1;
            }
            FC_EM => {
                i += 1;
                if opts.emflush && page.buf.wcc_line_length.is_unformatted() {
                    emit_now = true;
                }
            }
            _ if b <= 0x3F => {
                // Illegal-but-recoverable: emit a NUL cell and continue.
                let gr = page.buf.default_gr;
                page.add(0, '\0', CellCharset::Base, gr);
                i += 1;
            }
            _ => {
                let ch = translate(b);
                let cs = page.buf.default_cs;
                let gr = page.buf.default_gr;
                page.add(b, ch, cs, gr);
                i += 1;
            }
        }
    }

    Ok((DsStatus::OkayNoOutput, emit_now))
}

fn apply_sa(page: &mut PageBuilder, id: u8, val: u8) {
    match id {
        XA_ALL if val == 0 => {
            page.buf.default_gr = GraphicRendition::default();
            page.buf.default_fg = 0;
            page.buf.default_cs = CellCharset::Base;
        }
        XA_HIGHLIGHTING => {
            page.buf.default_gr = GraphicRendition {
                blink: val == HIGHLIGHT_BLINK,
                reverse: val == HIGHLIGHT_REVERSE,
                underscore: val == HIGHLIGHT_UNDERSCORE,
                intensify: page.buf.default_gr.intensify,
            };
        }
        XA_FOREGROUND => page.buf.default_fg = val,
        _ => { /* skipped per §4.2 */ }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::tests::MemSink;

    #[test]
    fn erase_write_then_character_renders_on_eoj() {
        let mut ds = DsInterpreter::new(24, 80);
        let opts = DsOptions::default();
        let mut sink = MemSink::default();
        // EW, WCC 0xC3, SBA row1 col1 (12-bit: 0x40 0x40 -> addr 0), "HI"
        let payload = [CMD_ERASE_WRITE, 0xC3, ORDER_SBA, 0x40, 0x40, 0xC8, 0xC9];
        let status = ds.process(&payload, &mut sink, &opts).unwrap();
        assert_eq!(status, DsStatus::OkayNoOutput);
        let status = ds.flush_job(&mut sink, &opts).unwrap();
        assert_eq!(status, DsStatus::OkayOutput);
        assert_eq!(sink.data, b"HI\n");
    }

    #[test]
    fn undefined_command_is_bad_cmd() {
        let mut ds = DsInterpreter::new(24, 80);
        let opts = DsOptions::default();
        let mut sink = MemSink::default();
        let status = ds.process(&[0xFE], &mut sink, &opts).unwrap();
        assert_eq!(status, DsStatus::BadCmd);
    }

    #[test]
    fn read_commands_are_bad_cmd() {
        let mut ds = DsInterpreter::new(24, 80);
        let opts = DsOptions::default();
        let mut sink = MemSink::default();
        assert_eq!(
            ds.process(&[CMD_READ_BUFFER], &mut sink, &opts).unwrap(),
            DsStatus::BadCmd
        );
    }
}
