pub mod codec;
pub mod constants;
pub mod packets;
pub mod result;
pub mod stream;

/// Largest payload that fits in a single wire frame.
pub const MAX_PAYLOAD_LEN: usize = 0xFF_FFFF;

pub const PACKET_HEADER_SIZE: usize = 4;

pub const NULL_TERMINATOR: u8 = 0x00;
