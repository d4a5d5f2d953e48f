//! 3270 data stream: command/order constants, the data-stream interpreter,
//! the page buffer, and structured fields (§4.2, §4.4, §4.5).

pub mod codes;
pub mod ds;
pub mod page;
pub mod sf;
