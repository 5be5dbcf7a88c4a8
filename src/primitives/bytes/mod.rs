#![forbid(unsafe_code)]
//! Order-preserving encoders and varints shared by the key and batch codecs.

pub mod ord {
    //! Order-preserving encoders for numeric key components.
    //!
    //! Every `push_*` appends a fixed-width big-endian image whose unsigned
    //! byte order matches the numeric order of the input.

    const SIGN_BIT_64: u64 = 1 << 63;
    const SIGN_BIT_32: u32 = 1 << 31;

    /// Appends a big-endian u32.
    pub fn push_u32_be(dst: &mut Vec<u8>, v: u32) {
        dst.extend_from_slice(&v.to_be_bytes());
    }

    /// Appends a big-endian u64.
    pub fn push_u64_be(dst: &mut Vec<u8>, v: u64) {
        dst.extend_from_slice(&v.to_be_bytes());
    }

    /// Appends a signed i32 with the sign bit flipped so negatives sort first.
    pub fn push_i32_be(dst: &mut Vec<u8>, v: i32) {
        push_u32_be(dst, (v as u32) ^ SIGN_BIT_32);
    }

    /// Appends a signed i64 with the sign bit flipped so negatives sort first.
    pub fn push_i64_be(dst: &mut Vec<u8>, v: i64) {
        push_u64_be(dst, (v as u64) ^ SIGN_BIT_64);
    }

    /// Appends an f64 with order preservation (NaN not allowed).
    pub fn push_f64_be(dst: &mut Vec<u8>, v: f64) {
        debug_assert!(!v.is_nan(), "NaN keys are not allowed");
        push_u64_be(dst, encode_f64_bits(v));
    }

    /// Decodes a big-endian u32 from the head of `src`.
    pub fn get_u32_be(src: &[u8]) -> Option<u32> {
        let head: [u8; 4] = src.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(head))
    }

    /// Decodes a big-endian u64 from the head of `src`.
    pub fn get_u64_be(src: &[u8]) -> Option<u64> {
        let head: [u8; 8] = src.get(..8)?.try_into().ok()?;
        Some(u64::from_be_bytes(head))
    }

    /// Decodes an order-preserving i32.
    pub fn get_i32_be(src: &[u8]) -> Option<i32> {
        get_u32_be(src).map(|raw| (raw ^ SIGN_BIT_32) as i32)
    }

    /// Decodes an order-preserving i64.
    pub fn get_i64_be(src: &[u8]) -> Option<i64> {
        get_u64_be(src).map(|raw| (raw ^ SIGN_BIT_64) as i64)
    }

    /// Decodes an order-preserving f64.
    pub fn get_f64_be(src: &[u8]) -> Option<f64> {
        get_u64_be(src).map(|bits| f64::from_bits(decode_f64_bits(bits)))
    }

    /// Appends `bytes` padded with zeros (or truncated) to exactly `width` bytes.
    pub fn push_fixed(dst: &mut Vec<u8>, bytes: &[u8], width: usize) {
        let take = bytes.len().min(width);
        dst.extend_from_slice(&bytes[..take]);
        dst.resize(dst.len() + (width - take), 0);
    }

    fn encode_f64_bits(v: f64) -> u64 {
        let bits = v.to_bits();
        if bits & SIGN_BIT_64 != 0 {
            !bits
        } else {
            bits ^ SIGN_BIT_64
        }
    }

    fn decode_f64_bits(encoded: u64) -> u64 {
        if encoded & SIGN_BIT_64 != 0 {
            encoded ^ SIGN_BIT_64
        } else {
            !encoded
        }
    }
}

pub mod var {
    //! Unsigned LEB128 varints.

    /// Encodes a u64 as an unsigned varint.
    pub fn encode_u64(mut v: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    /// Decodes a u64 varint, advancing `off`. Returns `None` when truncated or overlong.
    pub fn decode_u64(src: &[u8], off: &mut usize) -> Option<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        for i in 0..10 {
            let byte = *src.get(*off)?;
            *off += 1;
            let payload = u64::from(byte & 0x7f);
            if i == 9 && payload > 1 {
                return None;
            }
            result |= payload << shift;
            if byte & 0x80 == 0 {
                return Some(result);
            }
            shift += 7;
        }
        None
    }
}
