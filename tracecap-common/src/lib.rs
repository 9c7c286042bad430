//! # Shared Wire Format (Producer ↔ Tooling)
//!
//! Defines the bit-level layout of everything tracecap puts on disk or on the
//! wire. Every function here is pure and allocation-free so the same
//! definitions can be used from the capture path and from tooling that only
//! needs to inspect a stream.
//!
//! ## Key Items
//!
//! - [`encode_uvarint`] - Unary-length-tagged, big-endian unsigned varint
//! - [`zigzag`] - Signed → unsigned mapping used before varint encoding
//! - [`f32_wire_bits`] / [`f64_wire_bits`] - Float bit patterns prepared for varint encoding
//! - [`FieldKind`] - Kind codes written into entity definitions
//! - [`INDEX_ID_LEN_SIZE`] and friends - Archive index record layout

#![no_std]

// ============================================================================
// Varint Layout
// ============================================================================

/// Longest possible encoding: one `0xFF` escape byte plus eight raw bytes
pub const MAX_VARINT_LEN: usize = 9;

/// Leading byte that announces eight raw big-endian bytes
pub const VARINT_ESCAPE: u8 = 0xFF;

/// Largest length that still carries value bits in the leading byte
///
/// Lengths 1..=7 hold `7 * L` value bits. Length 8 would hold 56 bits behind a
/// `0xFE` header but the smallest-fit rule never selects it: anything that does
/// not fit in 49 bits goes straight to the 9-byte escape.
pub const MAX_TAGGED_LEN: usize = 7;

/// Number of bytes [`encode_uvarint`] produces for `value`
#[must_use]
pub const fn uvarint_len(value: u64) -> usize {
    let mut len = 1;
    while len <= MAX_TAGGED_LEN {
        if value < (1u64 << (7 * len)) {
            return len;
        }
        len += 1;
    }
    MAX_VARINT_LEN
}

/// Encode `value` into `out`, returning the number of bytes used
///
/// The leading byte carries a unary length tag: its top `L - 1` bits are set,
/// followed by a clear bit, followed by the most significant value bits. The
/// remaining `L - 1` bytes hold the rest of the value, most significant first.
///
/// ```text
/// 0xxxxxxx                              7 bits
/// 10xxxxxx xxxxxxxx                    14 bits
/// 110xxxxx xxxxxxxx xxxxxxxx           21 bits
/// ...
/// 11111110 ...                         never produced
/// 11111111 [8 raw bytes]               64 bits
/// ```
pub fn encode_uvarint(value: u64, out: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let len = uvarint_len(value);
    let be = value.to_be_bytes();

    if len == MAX_VARINT_LEN {
        out[0] = VARINT_ESCAPE;
        out[1..].copy_from_slice(&be);
        return len;
    }

    out[..len].copy_from_slice(&be[8 - len..]);
    out[0] |= length_tag(len);
    len
}

/// Leading-byte tag bits for an encoding of `len` bytes (1..=8)
#[inline]
#[must_use]
pub const fn length_tag(len: usize) -> u8 {
    !(0xFFu8 >> (len - 1))
}

/// Number of bytes announced by a leading byte
///
/// Counts the run of set bits from the top of the byte; a full run of eight
/// means the 9-byte escape.
#[inline]
#[must_use]
pub const fn tagged_len(first: u8) -> usize {
    if first == VARINT_ESCAPE {
        MAX_VARINT_LEN
    } else {
        first.leading_ones() as usize + 1
    }
}

// ============================================================================
// Scalar Mappings
// ============================================================================

/// Zigzag-map a signed integer (0→0, -1→1, 1→2, -2→3, ...)
#[inline]
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag`]
#[inline]
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Bit pattern of an `f32` with its bytes reversed
///
/// Whole numbers and zero have trailing zero bytes in their IEEE-754 pattern;
/// reversing moves those to the top so the varint stays short.
#[inline]
#[must_use]
pub fn f32_wire_bits(value: f32) -> u64 {
    u64::from(value.to_bits().swap_bytes())
}

/// Bit pattern of an `f64` with its bytes reversed, see [`f32_wire_bits`]
#[inline]
#[must_use]
pub fn f64_wire_bits(value: f64) -> u64 {
    value.to_bits().swap_bytes()
}

// ============================================================================
// Object Graph Tags
// ============================================================================

/// Reference tag for a first occurrence (definition follows)
#[inline]
#[must_use]
pub const fn definition_tag(id: u64) -> u64 {
    (id << 1) | 1
}

/// Reference tag for a repeat occurrence (backreference only)
#[inline]
#[must_use]
pub const fn backreference_tag(id: u64) -> u64 {
    id << 1
}

/// Tag written for an absent object, variant or entity
pub const NULL_TAG: u64 = 0;

/// Field kind codes written into entity definitions
///
/// One raw byte per field. Code 0 is reserved so a zeroed byte never decodes
/// as a valid kind.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool = 1,
    Int8 = 2,
    Uint8 = 3,
    Int16 = 4,
    Uint16 = 5,
    Int32 = 6,
    Uint32 = 7,
    Int64 = 8,
    Uint64 = 9,
    Float32 = 10,
    Float64 = 11,
    String = 12,
    Data = 13,
    Object = 14,
    Variant = 15,
}

impl FieldKind {
    /// Raw code written to the stream
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Map a raw code back to its kind
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Bool,
            2 => Self::Int8,
            3 => Self::Uint8,
            4 => Self::Int16,
            5 => Self::Uint16,
            6 => Self::Int32,
            7 => Self::Uint32,
            8 => Self::Int64,
            9 => Self::Uint64,
            10 => Self::Float32,
            11 => Self::Float64,
            12 => Self::String,
            13 => Self::Data,
            14 => Self::Object,
            15 => Self::Variant,
            _ => return None,
        })
    }
}

// ============================================================================
// Archive Layout
// ============================================================================

/// Suffix of the blob payload file
pub const DATA_FILE_SUFFIX: &str = ".data";

/// Suffix of the index file
pub const INDEX_FILE_SUFFIX: &str = ".index";

/// Index record: `u32` id length (native byte order)
pub const INDEX_ID_LEN_SIZE: usize = 4;

/// Index record: `u64` data-file offset (native byte order)
pub const INDEX_OFFSET_SIZE: usize = 8;

/// Index record: `u32` blob size (native byte order)
pub const INDEX_SIZE_SIZE: usize = 4;

/// Encoded size of an index record whose id is `id_len` bytes long
#[inline]
#[must_use]
pub const fn index_record_len(id_len: usize) -> usize {
    INDEX_ID_LEN_SIZE + id_len + INDEX_OFFSET_SIZE + INDEX_SIZE_SIZE
}

/// Granularity of mapped-file capacity
pub const PAGE_SIZE: u64 = 4096;

/// Next capacity for a mapped file that must hold at least `required` bytes
///
/// Grows by at least half the current capacity and rounds up to a whole page,
/// so repeated appends cost amortized O(1) remaps per byte.
#[must_use]
pub const fn grown_capacity(current: u64, required: u64) -> u64 {
    let geometric = current + current / 2;
    let target = if required > geometric { required } else { geometric };
    target.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> ([u8; MAX_VARINT_LEN], usize) {
        let mut out = [0u8; MAX_VARINT_LEN];
        let len = encode_uvarint(value, &mut out);
        (out, len)
    }

    #[test]
    fn test_uvarint_length_boundaries() {
        assert_eq!(uvarint_len(0), 1);
        assert_eq!(uvarint_len(127), 1);
        assert_eq!(uvarint_len(128), 2);
        assert_eq!(uvarint_len(16_383), 2);
        assert_eq!(uvarint_len(16_384), 3);
        assert_eq!(uvarint_len((1 << 49) - 1), 7);
        assert_eq!(uvarint_len(1 << 49), 9);
        assert_eq!(uvarint_len(u64::MAX), 9);
    }

    #[test]
    fn test_uvarint_bit_patterns() {
        let (out, len) = encode(0x7F);
        assert_eq!(&out[..len], &[0x7F]);

        let (out, len) = encode(0x80);
        assert_eq!(&out[..len], &[0x80, 0x80]);

        let (out, len) = encode(0x3FFF);
        assert_eq!(&out[..len], &[0xBF, 0xFF]);

        let (out, len) = encode(0x4000);
        assert_eq!(&out[..len], &[0xC0, 0x40, 0x00]);

        let (out, len) = encode(u64::MAX);
        assert_eq!(&out[..len], &[0xFF; 9]);

        let (out, len) = encode(1 << 49);
        assert_eq!(&out[..len], &[0xFF, 0x00, 0x02, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_tagged_len_matches_encoding() {
        for value in [0, 1, 127, 128, 1 << 20, (1 << 49) - 1, 1 << 49, u64::MAX] {
            let (out, len) = encode(value);
            assert_eq!(tagged_len(out[0]), len, "value {value:#x}");
        }
    }

    #[test]
    fn test_zigzag_order() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        assert_eq!(zigzag(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag(i64::MIN), u64::MAX);
        for v in [0, 1, -1, 42, -42, i64::MAX, i64::MIN] {
            assert_eq!(unzigzag(zigzag(v)), v);
        }
    }

    #[test]
    fn test_float_wire_bits_compress_whole_numbers() {
        assert_eq!(f32_wire_bits(0.0), 0);
        assert_eq!(f64_wire_bits(0.0), 0);
        // 1.0f32 = 0x3F800000, reversed = 0x0000803F
        assert_eq!(f32_wire_bits(1.0), 0x803F);
        assert_eq!(uvarint_len(f64_wire_bits(2.0)), 1);
    }

    #[test]
    fn test_field_kind_codes() {
        for code in 0..=u8::MAX {
            if let Some(kind) = FieldKind::from_code(code) {
                assert_eq!(kind.code(), code);
            }
        }
        assert!(FieldKind::from_code(0).is_none());
        assert_eq!(FieldKind::from_code(12), Some(FieldKind::String));
    }

    #[test]
    fn test_grown_capacity() {
        assert_eq!(grown_capacity(0, 1), PAGE_SIZE);
        assert_eq!(grown_capacity(PAGE_SIZE, PAGE_SIZE + 1), 2 * PAGE_SIZE);
        assert_eq!(grown_capacity(8 * PAGE_SIZE, 8 * PAGE_SIZE + 1), 12 * PAGE_SIZE);
        assert_eq!(grown_capacity(PAGE_SIZE, 10 * PAGE_SIZE + 7), 11 * PAGE_SIZE);
    }
}
