//! IBM 3270 protocol constants and codes.
//!
//! Command codes, order codes, AID keys, field attributes, structured
//! field IDs and Query Reply IDs as specified in RFC 1205/2355 and the
//! IBM 3270 Data Stream Programmer's Reference, extended with the
//! Structured Field and Query Reply constants confirmed against
//! `original_source/Common/pr3287/sf.c`.

// 3270 command codes.
pub const CMD_WRITE: u8 = 0x01;
pub const CMD_ERASE_WRITE: u8 = 0x05;
pub const CMD_ERASE_WRITE_ALTERNATE: u8 = 0x0D;
pub const CMD_READ_BUFFER: u8 = 0x02;
pub const CMD_READ_MODIFIED: u8 = 0x06;
pub const CMD_READ_MODIFIED_ALL: u8 = 0x0E;
pub const CMD_ERASE_ALL_UNPROTECTED: u8 = 0x0F;
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0x11;
pub const CMD_NOP: u8 = 0x03;

// 3270 order codes.
pub const ORDER_SF: u8 = 0x1D;
pub const ORDER_SFE: u8 = 0x29;
pub const ORDER_SBA: u8 = 0x11;
pub const ORDER_SA: u8 = 0x28;
pub const ORDER_MF: u8 = 0x2C;
pub const ORDER_IC: u8 = 0x13;
pub const ORDER_PT: u8 = 0x05;
pub const ORDER_RA: u8 = 0x3C;
pub const ORDER_EUA: u8 = 0x12;
pub const ORDER_GE: u8 = 0x08;

// Format-control bytes (also valid in the unformatted data stream).
pub const FC_FF: u8 = 0x0C;
pub const FC_CR: u8 = 0x0D;
pub const FC_NL: u8 = 0x15;
pub const FC_EM: u8 = 0x19;
pub const FC_DUP: u8 = 0x1C;
pub const FC_FM: u8 = 0x1E;
pub const FC_SUB: u8 = 0x3F;
pub const FC_EO: u8 = 0xFF;
pub const FC_NULL: u8 = 0x00;

// Write Control Character bits.
pub const WCC_RESET: u8 = 0x40;
pub const WCC_ALARM: u8 = 0x04;
pub const WCC_RESTORE: u8 = 0x02;
pub const WCC_RESET_MDT: u8 = 0x01;

// AID keys.
pub const AID_NO_AID: u8 = 0x60;
pub const AID_STRUCTURED_FIELD: u8 = 0x88;
pub const AID_READ_PARTITION: u8 = 0x61;
pub const AID_TRIGGER: u8 = 0x7F;
pub const AID_ENTER: u8 = 0x7D;
pub const AID_CLEAR: u8 = 0x6D;
pub const AID_PA1: u8 = 0x6C;
pub const AID_PA2: u8 = 0x6E;
pub const AID_PA3: u8 = 0x6B;
pub const AID_SYSREQ: u8 = 0xF0;

// Field attribute byte bits.
pub const ATTR_PROTECTED: u8 = 0x20;
pub const ATTR_NUMERIC: u8 = 0x10;
pub const ATTR_DISPLAY: u8 = 0x0C;
pub const ATTR_RESERVED: u8 = 0x02;
pub const ATTR_MDT: u8 = 0x01;

pub const DISPLAY_NORMAL: u8 = 0x00;
pub const DISPLAY_INTENSIFIED: u8 = 0x08;
pub const DISPLAY_HIDDEN: u8 = 0x0C;

// Extended field attribute (SFE/MF/SA) pair IDs.
pub const XA_ALL: u8 = 0x00;
pub const XA_3270: u8 = 0xC0;
pub const XA_VALIDATION: u8 = 0xC1;
pub const XA_OUTLINING: u8 = 0xC2;
pub const XA_HIGHLIGHTING: u8 = 0x41;
pub const XA_FOREGROUND: u8 = 0x42;
pub const XA_CHARSET: u8 = 0x43;
pub const XA_BACKGROUND: u8 = 0x45;
pub const XA_TRANSPARENCY: u8 = 0x46;

pub const HIGHLIGHT_DEFAULT: u8 = 0x00;
pub const HIGHLIGHT_NORMAL: u8 = 0xF0;
pub const HIGHLIGHT_BLINK: u8 = 0xF1;
pub const HIGHLIGHT_REVERSE: u8 = 0xF2;
pub const HIGHLIGHT_UNDERSCORE: u8 = 0xF4;

// Structured Field IDs (WSF command payload, §6).
pub const SF_READ_PARTITION: u8 = 0x01;
pub const SF_ERASE_RESET: u8 = 0x03;
pub const SF_SET_REPLY_MODE: u8 = 0x09;
pub const SF_OUTBOUND_DS: u8 = 0x40;
pub const SF_TRANSFER_DATA: u8 = 0xD0;

// READ PARTITION sub-commands (byte 4).
pub const RP_QUERY: u8 = 0x02;
pub const RP_QUERY_LIST: u8 = 0x03;

// Query-List list types (first byte of the QUERY-LIST payload).
pub const QL_LIST: u8 = 0x00;
pub const QL_EQUIVALENT: u8 = 0x01;
pub const QL_ALL: u8 = 0x02;

// Query Reply IDs, confirmed against sf.c's `supported_replies` table.
pub const QR_SUMMARY: u8 = 0x80;
pub const QR_USABLE_AREA: u8 = 0x81;
pub const QR_ALPHA_PART: u8 = 0x84;
pub const QR_CHARSETS: u8 = 0x85;
pub const QR_COLOR: u8 = 0x86;
pub const QR_HIGHLIGHTING: u8 = 0x87;
pub const QR_REPLY_MODES: u8 = 0x88;
pub const QR_DBCS_ASIA: u8 = 0x91;
pub const QR_IMP_PART: u8 = 0xA6;
pub const QR_DDM: u8 = 0x95;

// ERASE RESET sub-codes.
pub const ER_DEFAULT: u8 = 0x00;
pub const ER_ALTERNATE: u8 = 0x80;

// SET REPLY MODE modes.
pub const REPLY_MODE_FIELD: u8 = 0x00;
pub const REPLY_MODE_XFIELD: u8 = 0x01;
pub const REPLY_MODE_CHAR: u8 = 0x02;

/// Enum view of 3270 command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Write,
    EraseWrite,
    EraseWriteAlternate,
    ReadBuffer,
    ReadModified,
    ReadModifiedAll,
    EraseAllUnprotected,
    WriteStructuredField,
    Nop,
}

impl CommandCode {
    /// Every 3270 command code has two valid wire encodings (the
    /// original and the "graphics escape" form); hosts use either
    /// interchangeably, so both are accepted here.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_WRITE | 0xF1 => Some(Self::Write),
            CMD_ERASE_WRITE | 0xF5 => Some(Self::EraseWrite),
            CMD_ERASE_WRITE_ALTERNATE | 0x7E => Some(Self::EraseWriteAlternate),
            CMD_READ_BUFFER | 0xF2 => Some(Self::ReadBuffer),
            CMD_READ_MODIFIED | 0xF6 => Some(Self::ReadModified),
            CMD_READ_MODIFIED_ALL | 0x6E => Some(Self::ReadModifiedAll),
            CMD_ERASE_ALL_UNPROTECTED | 0x6F => Some(Self::EraseAllUnprotected),
            CMD_WRITE_STRUCTURED_FIELD | 0xF3 => Some(Self::WriteStructuredField),
            CMD_NOP => Some(Self::Nop),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Write => CMD_WRITE,
            Self::EraseWrite => CMD_ERASE_WRITE,
            Self::EraseWriteAlternate => CMD_ERASE_WRITE_ALTERNATE,
            Self::ReadBuffer => CMD_READ_BUFFER,
            Self::ReadModified => CMD_READ_MODIFIED,
            Self::ReadModifiedAll => CMD_READ_MODIFIED_ALL,
            Self::EraseAllUnprotected => CMD_ERASE_ALL_UNPROTECTED,
            Self::WriteStructuredField => CMD_WRITE_STRUCTURED_FIELD,
            Self::Nop => CMD_NOP,
        }
    }
}

/// Enum view of 3270 order codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    StartField,
    StartFieldExtended,
    SetBufferAddress,
    SetAttribute,
    ModifyField,
    InsertCursor,
    ProgramTab,
    RepeatToAddress,
    EraseUnprotectedToAddress,
    GraphicEscape,
}

impl OrderCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            ORDER_SF => Some(Self::StartField),
            ORDER_SFE => Some(Self::StartFieldExtended),
            ORDER_SBA => Some(Self::SetBufferAddress),
            ORDER_SA => Some(Self::SetAttribute),
            ORDER_MF => Some(Self::ModifyField),
            ORDER_IC => Some(Self::InsertCursor),
            ORDER_PT => Some(Self::ProgramTab),
            ORDER_RA => Some(Self::RepeatToAddress),
            ORDER_EUA => Some(Self::EraseUnprotectedToAddress),
            ORDER_GE => Some(Self::GraphicEscape),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::StartField => ORDER_SF,
            Self::StartFieldExtended => ORDER_SFE,
            Self::SetBufferAddress => ORDER_SBA,
            Self::SetAttribute => ORDER_SA,
            Self::ModifyField => ORDER_MF,
            Self::InsertCursor => ORDER_IC,
            Self::ProgramTab => ORDER_PT,
            Self::RepeatToAddress => ORDER_RA,
            Self::EraseUnprotectedToAddress => ORDER_EUA,
            Self::GraphicEscape => ORDER_GE,
        }
    }
}

/// Decode a 3270 buffer address per §4.2: the two high bits of the first
/// address byte select 12-bit (01/11) or 14-bit (00) encoding.
pub fn decode_address(b1: u8, b2: u8) -> u16 {
    if b1 & 0xC0 == 0x00 {
        (((b1 & 0x3F) as u16) << 8) | b2 as u16
    } else {
        (((b1 & 0x3F) as u16) << 6) | (b2 & 0x3F) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_code_conversion() {
        assert_eq!(CommandCode::from_u8(CMD_WRITE), Some(CommandCode::Write));
        assert_eq!(CommandCode::Write.to_u8(), CMD_WRITE);
        assert_eq!(CommandCode::from_u8(0xFF), None);
    }

    #[test]
    fn test_order_code_conversion() {
        assert_eq!(OrderCode::from_u8(ORDER_SF), Some(OrderCode::StartField));
        assert_eq!(OrderCode::StartField.to_u8(), ORDER_SF);
    }

    #[test]
    fn test_14bit_address() {
        // 00 000001 00000001 -> row/col style 14-bit address 0x101
        assert_eq!(decode_address(0x01, 0x01), 0x101);
    }

    #[test]
    fn test_12bit_address() {
        // high bits 01 select 12-bit encoding, low 6 bits of each byte
        assert_eq!(decode_address(0x40, 0x41), 0x01);
    }

    proptest::proptest! {
        // P4: every address byte pair decodes within a 14-bit range, so
        // `% (ROWS*COLS)` downstream always lands in bounds.
        #[test]
        fn decoded_address_fits_14_bits(b1 in proptest::prelude::any::<u8>(), b2 in proptest::prelude::any::<u8>()) {
            let addr = decode_address(b1, b2);
            proptest::prop_assert!(addr < (1 << 14));
        }
    }
}
