//! # Packet Wire Format
//!
//! Fixed 16-byte header followed by exactly `packet_size` symbol bytes:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Source ID (i32, -1 for repair)              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Repair ID (i32, -1 for source)              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Window Start (i32, -1 for source)           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Window End (i32, -1 for source)             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Symbols (packet_size bytes) ...             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Integers are big-endian. Coding coefficients are never serialized; the
//! receiver regenerates them from the shared coefficient stream.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::WireError;

/// Header size in bytes.
pub const HEADER_LEN: usize = 16;

/// Largest id representable in the header.
pub const MAX_ID: u32 = i32::MAX as u32;

/// What a packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// An uncoded source symbol.
    Source { id: u32 },
    /// A linear combination of source ids `window_start..=window_end`.
    Repair {
        id: u32,
        window_start: u32,
        window_end: u32,
    },
}

/// A source or repair packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    /// Repair coefficients, one per id in the window. In memory only.
    pub coefficients: Option<Vec<u8>>,
    /// Source symbols or their coded combination.
    pub symbols: Vec<u8>,
}

impl Packet {
    pub fn source(id: u32, symbols: Vec<u8>) -> Self {
        Packet {
            kind: PacketKind::Source { id },
            coefficients: None,
            symbols,
        }
    }

    pub fn repair(
        id: u32,
        window_start: u32,
        window_end: u32,
        coefficients: Vec<u8>,
        symbols: Vec<u8>,
    ) -> Self {
        debug_assert_eq!(coefficients.len(), (window_end - window_start) as usize + 1);
        Packet {
            kind: PacketKind::Repair {
                id,
                window_start,
                window_end,
            },
            coefficients: Some(coefficients),
            symbols,
        }
    }

    pub fn is_repair(&self) -> bool {
        matches!(self.kind, PacketKind::Repair { .. })
    }

    pub fn source_id(&self) -> Option<u32> {
        match self.kind {
            PacketKind::Source { id } => Some(id),
            PacketKind::Repair { .. } => None,
        }
    }

    pub fn repair_id(&self) -> Option<u32> {
        match self.kind {
            PacketKind::Repair { id, .. } => Some(id),
            PacketKind::Source { .. } => None,
        }
    }

    /// Encoding window `(start, end)` of a repair packet.
    pub fn window(&self) -> Option<(u32, u32)> {
        match self.kind {
            PacketKind::Repair {
                window_start,
                window_end,
                ..
            } => Some((window_start, window_end)),
            PacketKind::Source { .. } => None,
        }
    }

    /// Serialized size.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.symbols.len()
    }

    /// Serialize into a fresh buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf
    }

    /// Serialize into `buf`.
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        let (source_id, repair_id, start, end) = match self.kind {
            PacketKind::Source { id } => (wire_id(id), -1, -1, -1),
            PacketKind::Repair {
                id,
                window_start,
                window_end,
            } => (-1, wire_id(id), wire_id(window_start), wire_id(window_end)),
        };
        buf.put_i32(source_id);
        buf.put_i32(repair_id);
        buf.put_i32(start);
        buf.put_i32(end);
        buf.put_slice(&self.symbols);
    }

    /// Parse a packet whose payload must be exactly `packet_size` bytes.
    pub fn decode(mut buf: &[u8], packet_size: usize) -> Result<Packet, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated {
                needed: HEADER_LEN,
                available: buf.len(),
            });
        }
        let source_id = buf.get_i32();
        let repair_id = buf.get_i32();
        let start = buf.get_i32();
        let end = buf.get_i32();

        if buf.len() != packet_size {
            return Err(WireError::PayloadLength {
                expected: packet_size,
                actual: buf.len(),
            });
        }

        let kind = match (source_id >= 0, repair_id >= 0) {
            (true, false) => PacketKind::Source {
                id: source_id as u32,
            },
            (false, true) => {
                if start < 0 || end < start {
                    return Err(WireError::Window { start, end });
                }
                PacketKind::Repair {
                    id: repair_id as u32,
                    window_start: start as u32,
                    window_end: end as u32,
                }
            }
            _ => {
                return Err(WireError::Header {
                    source_id,
                    repair_id,
                })
            }
        };

        Ok(Packet {
            kind,
            coefficients: None,
            symbols: buf.to_vec(),
        })
    }
}

fn wire_id(id: u32) -> i32 {
    debug_assert!(id <= MAX_ID, "id {id} exceeds the wire id space");
    id as i32
}
