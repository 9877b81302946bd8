//! Band generators with predictable values.
//!
//! Every generator returns samples in row-major order (row 0 first).

/// Creates a band that ramps linearly from `min` (first cell) to `max`
/// (last cell).
pub fn create_ramp_band(width: usize, height: usize, min: f32, max: f32) -> Vec<f32> {
    let n = width * height;
    if n <= 1 {
        return vec![min; n];
    }
    (0..n)
        .map(|i| min + (max - min) * i as f32 / (n - 1) as f32)
        .collect()
}

/// Creates a band with every cell set to `value`.
pub fn create_constant_band(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a reflectance-like band in `0..=10000`, brighter toward the
/// bottom-right corner, as a 16-bit satellite band would look.
pub fn create_reflectance_band(width: usize, height: usize) -> Vec<u16> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x = col as f32 / width.max(1) as f32;
            let y = row as f32 / height.max(1) as f32;
            data.push(((x + y) * 5000.0) as u16);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_endpoints() {
        let band = create_ramp_band(4, 4, -10.0, 50.0);
        assert_eq!(band[0], -10.0);
        assert_eq!(band[15], 50.0);
        assert!(band.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_ramp_single_cell() {
        assert_eq!(create_ramp_band(1, 1, 3.0, 9.0), vec![3.0]);
    }

    #[test]
    fn test_reflectance_range() {
        let band = create_reflectance_band(20, 20);
        assert_eq!(band[0], 0);
        assert!(band.iter().all(|&v| v <= 10000));
    }
}
