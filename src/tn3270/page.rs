//! The 3270 page buffer: `Cell`, `PageBuffer`, and `PageBuilder` (§3, §4.5).

use crate::error::{DsStatus, Tn3270Error};
use crate::printer::PrinterSink;
use crate::tn3270::codes::{ATTR_DISPLAY, ATTR_MDT, DISPLAY_HIDDEN};

/// Character-set attribute of a cell, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellCharset {
    #[default]
    Base,
    Apl,
    LineDraw,
    DbcsLeft,
    DbcsRight,
}

/// DBCS shift-state tag of a cell, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbcsState {
    #[default]
    None,
    Sb,
    Si,
    Left,
    Right,
    LeftWrap,
    RightWrap,
}

/// Graphic-rendition bits of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicRendition {
    pub intensify: bool,
    pub blink: bool,
    pub reverse: bool,
    pub underscore: bool,
}

/// One buffer position (§3).
#[derive(Debug, Clone, Copy, Default)]
pub struct Cell {
    pub ebcdic: u8,
    pub unicode: u32,
    pub charset: CellCharset,
    pub gr: GraphicRendition,
    pub fg: u8,
    pub dbcs: DbcsState,
    /// Non-zero iff this cell is a field-attribute position (I2).
    pub fa: u8,
}

impl Cell {
    pub fn is_field_attribute(&self) -> bool {
        self.fa != 0
    }

    fn blank() -> Self {
        Cell { unicode: ' ' as u32, ..Default::default() }
    }
}

/// WCC-derived print line length, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WccLineLength {
    Unformatted132,
    Forty,
    SixtyFour,
    Eighty,
}

impl WccLineLength {
    pub fn columns(self) -> usize {
        match self {
            WccLineLength::Unformatted132 => 132,
            WccLineLength::Forty => 40,
            WccLineLength::SixtyFour => 64,
            WccLineLength::Eighty => 80,
        }
    }

    pub fn is_unformatted(self) -> bool {
        matches!(self, WccLineLength::Unformatted132)
    }
}

/// Options threaded into rendering from `config::Options`, kept narrow so
/// `page` does not depend on the `config` module directly.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub mpp: usize,
    pub skipcc: bool,
    pub ffskip: bool,
    pub blanklines: bool,
    pub crlf: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { mpp: 132, skipcc: false, ffskip: false, blanklines: false, crlf: false }
    }
}

/// The 3270 buffer: ROWS×COLS cells with wrap-around addressing (§3).
#[derive(Debug, Clone)]
pub struct PageBuffer {
    pub rows: usize,
    pub cols: usize,
    cells: Vec<Cell>,
    pub cursor_addr: usize,
    pub buffer_addr: usize,
    pub formatted: bool,
    pub default_fg: u8,
    pub default_cs: CellCharset,
    pub default_gr: GraphicRendition,
    pub wcc_line_length: WccLineLength,
}

impl PageBuffer {
    pub fn new(rows: usize, cols: usize) -> Self {
        PageBuffer {
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
            cursor_addr: 0,
            buffer_addr: 0,
            formatted: false,
            default_fg: 0,
            default_cs: CellCharset::Base,
            default_gr: GraphicRendition::default(),
            wcc_line_length: WccLineLength::Unformatted132,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn wrap(&self, addr: usize) -> usize {
        addr % self.len()
    }

    pub fn cell(&self, addr: usize) -> &Cell {
        &self.cells[self.wrap(addr)]
    }

    pub fn cell_mut(&mut self, addr: usize) -> &mut Cell {
        let a = self.wrap(addr);
        &mut self.cells[a]
    }

    /// Erase the entire buffer and reset cursor to 0 (EW/EWA, §3).
    pub fn erase(&mut self) {
        for c in self.cells.iter_mut() {
            *c = Cell::default();
        }
        self.cursor_addr = 0;
        self.buffer_addr = 0;
        self.formatted = false;
    }

    /// Clear unprotected fields (EAU, §4.2): any non-FA cell whose
    /// governing field is unprotected is blanked; field attributes and
    /// protected-field data are left intact.
    pub fn erase_all_unprotected(&mut self) {
        let n = self.len();
        let mut current_protected = false;
        for i in 0..n {
            if self.cells[i].is_field_attribute() {
                current_protected = self.cells[i].fa & super::codes::ATTR_PROTECTED != 0;
                self.cells[i].fa &= !ATTR_MDT;
            } else if !current_protected {
                self.cells[i] = Cell::blank();
            }
        }
    }
}

/// Owns the in-memory page and exposes the write-stream operations (§4.5).
pub struct PageBuilder {
    pub buf: PageBuffer,
}

impl PageBuilder {
    pub fn new(rows: usize, cols: usize) -> Self {
        PageBuilder { buf: PageBuffer::new(rows, cols) }
    }

    pub fn set_address(&mut self, addr: u16) {
        self.buf.buffer_addr = addr as usize % self.buf.len();
        self.buf.cursor_addr = self.buf.buffer_addr;
    }

    /// `add(ebc, unicode, cs, gr)`: writes at the current buffer address
    /// and advances it modulo N.
    pub fn add(&mut self, ebc: u8, unicode: char, cs: CellCharset, gr: GraphicRendition) {
        let addr = self.buf.buffer_addr;
        let fg = self.buf.default_fg;
        {
            let cell = self.buf.cell_mut(addr);
            cell.ebcdic = ebc;
            cell.unicode = unicode as u32;
            cell.charset = cs;
            cell.gr = gr;
            cell.fg = fg;
            cell.fa = 0;
        }
        self.buf.buffer_addr = (self.buf.buffer_addr + 1) % self.buf.len();
    }

    /// `repeat_to(addr, ebc, cs, gr, ge)`: fills cells from the current
    /// cursor (inclusive) up to but not including `addr`, translating the
    /// source byte exactly once.
    pub fn repeat_to(&mut self, target: u16, unicode: char, cs: CellCharset, gr: GraphicRendition) {
        let target = target as usize % self.buf.len();
        let mut addr = self.buf.buffer_addr;
        loop {
            {
                let fg = self.buf.default_fg;
                let cell = self.buf.cell_mut(addr);
                cell.unicode = unicode as u32;
                cell.charset = cs;
                cell.gr = gr;
                cell.fg = fg;
                cell.fa = 0;
            }
            addr = (addr + 1) % self.buf.len();
            if addr == target {
                break;
            }
        }
        self.buf.buffer_addr = target;
    }

    /// `start_field(fa)`: writes a field-attribute cell at the current
    /// address and marks the page formatted (I2).
    pub fn start_field(&mut self, fa: u8) {
        let addr = self.buf.buffer_addr;
        {
            let cell = self.buf.cell_mut(addr);
            *cell = Cell { fa, unicode: ' ' as u32, ..Default::default() };
        }
        self.buf.buffer_addr = (self.buf.buffer_addr + 1) % self.buf.len();
        self.buf.formatted = true;
    }

    /// `modify_field(pairs)`: applies SFE/MF attribute-pairs to the
    /// field-attribute cell at the current address.
    pub fn modify_field(&mut self, pairs: &[(u8, u8)]) {
        let addr = self.buf.buffer_addr;
        let cell = self.buf.cell_mut(addr);
        for &(id, value) in pairs {
            match id {
                super::codes::XA_3270 => cell.fa = value,
                super::codes::XA_HIGHLIGHTING => {
                    cell.gr = GraphicRendition {
                        blink: value == super::codes::HIGHLIGHT_BLINK,
                        reverse: value == super::codes::HIGHLIGHT_REVERSE,
                        underscore: value == super::codes::HIGHLIGHT_UNDERSCORE,
                        intensify: cell.gr.intensify,
                    }
                }
                super::codes::XA_FOREGROUND => cell.fg = value,
                super::codes::XA_ALL if value == 0 => {
                    *cell = Cell { fa: cell.fa, ..Default::default() };
                }
                _ => { /* unrecognized pair: skipped per §4.2 */ }
            }
        }
    }

    /// Render line-by-line into `sink` using the current WCC line length,
    /// per the formatted rendering rules of §4.2.
    pub fn render_formatted(&self, sink: &mut dyn PrinterSink, opts: RenderOptions) -> Result<DsStatus, Tn3270Error> {
        let cols = self.buf.wcc_line_length.columns().min(self.buf.cols.max(1));
        let total_lines = (self.buf.len() / cols.max(1)).max(1);
        let mut last_nonblank_line = None;
        let mut rendered_lines: Vec<String> = Vec::with_capacity(total_lines);

        for line in 0..total_lines {
            let mut out = String::new();
            for col in 0..cols {
                let addr = line * cols + col;
                if addr >= self.buf.len() {
                    break;
                }
                let cell = self.buf.cell(addr);
                if cell.is_field_attribute() {
                    out.push(' ');
                    continue;
                }
                let hidden = cell.fa == 0 && (cell.fa & ATTR_DISPLAY) == DISPLAY_HIDDEN;
                if hidden {
                    out.push(' ');
                } else if let Some(ch) = char::from_u32(cell.unicode) {
                    out.push(ch);
                } else {
                    out.push(' ');
                }
            }
            let trimmed_end = out.trim_end_matches(' ').len();
            if trimmed_end > 0 {
                last_nonblank_line = Some(line);
            }
            rendered_lines.push(out);
        }

        let last_line = if opts.blanklines {
            total_lines.saturating_sub(1)
        } else {
            last_nonblank_line.unwrap_or(0)
        };

        if last_nonblank_line.is_none() && opts.ffskip {
            return Ok(DsStatus::OkayNoOutput);
        }

        for (i, line) in rendered_lines.iter().enumerate() {
            if i > last_line {
                break;
            }
            let trimmed = line.trim_end_matches(' ');
            for b in trimmed.as_bytes() {
                sink.write(*b).map_err(Tn3270Error::from)?;
            }
            write_newline(sink, opts.crlf)?;
        }
        Ok(DsStatus::OkayOutput)
    }

    /// Render the buffer as an unformatted character stream with NL/CR/FF/EM
    /// semantics and MPP wrapping, per §4.2.
    pub fn render_unformatted(&self, sink: &mut dyn PrinterSink, opts: RenderOptions) -> Result<DsStatus, Tn3270Error> {
        let mpp = opts.mpp.max(1);
        let limit = if opts.skipcc { mpp + 1 } else { mpp };
        let mut col = 0usize;
        let mut any_output = false;
        let mut pending: Vec<u8> = Vec::new();

        for addr in 0..self.buf.len() {
            let cell = self.buf.cell(addr);
            if cell.is_field_attribute() {
                continue;
            }
            match cell.ebcdic {
                super::codes::FC_NL => {
                    flush_trimmed(sink, &mut pending, opts.crlf)?;
                    col = 0;
                    any_output = true;
                }
                super::codes::FC_CR => {
                    flush_trimmed(sink, &mut pending, opts.crlf)?;
                    col = 0;
                    any_output = true;
                }
                super::codes::FC_FF => {
                    flush_trimmed(sink, &mut pending, opts.crlf)?;
                    if !(opts.ffskip && !any_output) {
                        sink.write(0x0C).map_err(Tn3270Error::from)?;
                    }
                    col = 0;
                }
                super::codes::FC_EM => {
                    flush_trimmed(sink, &mut pending, opts.crlf)?;
                    col = 0;
                }
                _ => {
                    if let Some(ch) = char::from_u32(cell.unicode) {
                        let mut buf = [0u8; 4];
                        let n = ch.encode_utf8(&mut buf).len();
                        pending.extend_from_slice(&buf[..n]);
                        any_output = true;
                        col += 1;
                        if col >= limit {
                            flush_trimmed(sink, &mut pending, opts.crlf)?;
                            col = 0;
                        }
                    }
                }
            }
        }
        flush_trimmed(sink, &mut pending, opts.crlf)?;
        Ok(if any_output { DsStatus::OkayOutput } else { DsStatus::OkayNoOutput })
    }
}

fn flush_trimmed(sink: &mut dyn PrinterSink, pending: &mut Vec<u8>, crlf: bool) -> Result<(), Tn3270Error> {
    while pending.last() == Some(&b' ') {
        pending.pop();
    }
    if pending.is_empty() {
        return Ok(());
    }
    sink.write_bytes(pending).map_err(Tn3270Error::from)?;
    pending.clear();
    write_newline(sink, crlf)
}

fn write_newline(sink: &mut dyn PrinterSink, crlf: bool) -> Result<(), Tn3270Error> {
    if crlf {
        sink.write(b'\r').map_err(Tn3270Error::from)?;
    }
    sink.write(b'\n').map_err(Tn3270Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::tests::MemSink;

    #[test]
    fn wrap_around_addressing() {
        let mut pb = PageBuilder::new(2, 2);
        pb.set_address(3);
        pb.add(0xC8, 'H', CellCharset::Base, GraphicRendition::default());
        assert_eq!(pb.buf.cell(3).unicode, 'H' as u32);
        assert_eq!(pb.buf.buffer_addr, 0);
    }

    #[test]
    fn erase_resets_cursor() {
        let mut pb = PageBuilder::new(2, 2);
        pb.set_address(2);
        pb.add(0xC8, 'H', CellCharset::Base, GraphicRendition::default());
        pb.buf.erase();
        assert_eq!(pb.buf.cursor_addr, 0);
        assert_eq!(pb.buf.cell(2).unicode, 0);
    }

    #[test]
    fn unformatted_render_emits_single_line() {
        let mut pb = PageBuilder::new(1, 2);
        pb.add(0xC8, 'H', CellCharset::Base, GraphicRendition::default());
        pb.add(0xC9, 'I', CellCharset::Base, GraphicRendition::default());
        let mut sink = MemSink::default();
        pb.render_unformatted(&mut sink, RenderOptions::default()).unwrap();
        assert_eq!(sink.data, b"HI\n");
    }
}
