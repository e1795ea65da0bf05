use crate::clip::PixelBuffer;

/// Canopy cover as the percentage of nonzero elements in a clipped buffer.
///
/// The buffer is expected to have had background pixels zeroed by the
/// masking step that produced it; this statistic is oblivious to which
/// masking approach was used. The count runs over the full buffer including
/// the channel axis. An empty buffer yields 0.0 rather than dividing by
/// zero.
pub fn canopy_cover_ratio(buffer: &PixelBuffer) -> f64 {
    let total = buffer.len();
    if total == 0 {
        return 0.0;
    }

    let nonzero = buffer.data().iter().filter(|value| **value != 0.0).count();
    (nonzero as f64 / total as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_buffer() {
        let buffer = PixelBuffer::new(2, 2, 3, vec![0.0; 12]);
        assert_eq!(canopy_cover_ratio(&buffer), 0.0);
    }

    #[test]
    fn test_all_nonzero_buffer() {
        let buffer = PixelBuffer::new(2, 2, 3, vec![255.0; 12]);
        assert_eq!(canopy_cover_ratio(&buffer), 100.0);
    }

    #[test]
    fn test_empty_buffer_does_not_divide_by_zero() {
        let buffer = PixelBuffer::new(0, 0, 0, vec![]);
        assert_eq!(canopy_cover_ratio(&buffer), 0.0);
    }

    #[test]
    fn test_partial_cover() {
        // 2x2x3 with exactly two nonzero elements: 2/12 * 100
        let data = vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0,
        ];
        let buffer = PixelBuffer::new(2, 2, 3, data);
        let ratio = canopy_cover_ratio(&buffer);
        assert!((ratio - 100.0 * 2.0 / 12.0).abs() < 1e-9);
    }
}
