//! Sample encoding conversion.

/// Converts an f32 sample to i16.
///
/// Input should be in the range [-1.0, 1.0]; values outside it are clamped.
/// Scales by 32767 so -1.0 maps to -32767.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Converts an i16 sample to f32 in the range [-1.0, 1.0].
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Decodes little-endian PCM16 bytes into `samples`.
///
/// Converts `min(bytes.len() / 2, samples.len())` samples and returns that count.
pub fn bytes_to_samples(bytes: &[u8], samples: &mut [i16]) -> usize {
    let mut count = 0;
    for (pair, sample) in bytes.chunks_exact(2).zip(samples.iter_mut()) {
        *sample = i16::from_le_bytes([pair[0], pair[1]]);
        count += 1;
    }
    count
}

/// Encodes `samples` as little-endian PCM16 into `bytes`.
///
/// Returns the number of bytes written.
pub fn samples_to_bytes(samples: &[i16], bytes: &mut [u8]) -> usize {
    let mut written = 0;
    for (sample, pair) in samples.iter().zip(bytes.chunks_exact_mut(2)) {
        pair.copy_from_slice(&sample.to_le_bytes());
        written += 2;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_full_range() {
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32767);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[test]
    fn test_f32_to_i16_clamping() {
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(-2.0), -32768);
    }

    #[test]
    fn test_i16_to_f32_full_range() {
        let max = i16_to_f32(32767);
        assert!((max - 0.99997).abs() < 0.001);
        assert_eq!(i16_to_f32(-32768), -1.0);
        assert_eq!(i16_to_f32(0), 0.0);
    }

    #[test]
    fn test_bytes_are_little_endian() {
        let mut samples = [0i16; 2];
        let count = bytes_to_samples(&[0x34, 0x12, 0xff, 0xff], &mut samples);
        assert_eq!(count, 2);
        assert_eq!(samples, [0x1234, -1]);

        let mut bytes = [0u8; 4];
        assert_eq!(samples_to_bytes(&samples, &mut bytes), 4);
        assert_eq!(bytes, [0x34, 0x12, 0xff, 0xff]);
    }

    #[test]
    fn test_short_destination_truncates() {
        let mut samples = [0i16; 1];
        assert_eq!(bytes_to_samples(&[1, 0, 2, 0, 3], &mut samples), 1);
        assert_eq!(samples, [1]);

        let mut bytes = [0u8; 3];
        assert_eq!(samples_to_bytes(&[7, 8], &mut bytes), 2);
        assert_eq!(bytes, [7, 0, 0]);
    }
}
