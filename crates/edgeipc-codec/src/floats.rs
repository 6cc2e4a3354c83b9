//! Packing of float32 sequences into raw little-endian byte buffers.

use bytes::{Buf, BufMut};

use crate::error::{CodecError, Result};

/// Bytes per packed value.
pub const FLOAT_BYTES: usize = 4;

/// Pack `values` as contiguous little-endian IEEE-754 float32.
pub fn pack_floats(values: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * FLOAT_BYTES);
    for value in values {
        buf.put_f32_le(*value);
    }
    buf
}

/// Unpack a raw buffer belonging to `field` into float32 values.
///
/// Fails with [`CodecError::MalformedBuffer`] if the length is not a
/// multiple of 4.
pub fn unpack_floats(field: &str, mut buf: &[u8]) -> Result<Vec<f32>> {
    if buf.len() % FLOAT_BYTES != 0 {
        return Err(CodecError::MalformedBuffer {
            key: field.to_string(),
            len: buf.len(),
        });
    }

    let mut values = Vec::with_capacity(buf.len() / FLOAT_BYTES);
    while buf.has_remaining() {
        values.push(buf.get_f32_le());
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_little_endian() {
        let packed = pack_floats(&[1.0, -2.5]);
        assert_eq!(packed, [0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x20, 0xc0]);
    }

    #[test]
    fn unpack_is_bit_exact() {
        let values = [
            0.0f32,
            -0.0,
            1.0e-45,
            f32::MIN_POSITIVE,
            f32::MAX,
            f32::MIN,
            std::f32::consts::PI,
            f32::INFINITY,
            f32::from_bits(0x7fc0_0001),
        ];
        let unpacked = unpack_floats("Identity", &pack_floats(&values)).unwrap();

        let bits: Vec<u32> = unpacked.iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn empty_buffer_is_empty_sequence() {
        assert!(unpack_floats("Identity", &[]).unwrap().is_empty());
        assert!(pack_floats(&[]).is_empty());
    }

    #[test]
    fn misaligned_buffer_rejected() {
        let err = unpack_floats("Identity", &[0, 0, 128]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MalformedBuffer { ref key, len: 3 } if key == "Identity"
        ));
    }
}
