/// Single-antenna channel equalization
///
/// MMSE combining per resource element: z = y * conj(h) / (|h|^2 + N0).
/// With a zero noise estimate this reduces to zero forcing.

use crate::LayerError;
use num_complex::Complex32;

/// Equalizer sized for a maximum number of resource elements per call
pub struct Equalizer {
    max_symbols: usize,
}

impl Equalizer {
    pub fn new(max_symbols: usize) -> Result<Self, LayerError> {
        if max_symbols == 0 {
            return Err(LayerError::ConfigurationError(
                "Equalizer needs a positive symbol capacity".to_string(),
            ));
        }
        Ok(Self { max_symbols })
    }

    /// Equalize `symbols` against `channel_estimate` into `output`
    pub fn equalize(
        &self,
        symbols: &[Complex32],
        channel_estimate: &[Complex32],
        output: &mut [Complex32],
        noise_estimate: f32,
    ) -> Result<(), LayerError> {
        let n = symbols.len();
        if n > self.max_symbols {
            return Err(LayerError::InvalidInput(format!(
                "{} symbols exceed equalizer capacity {}",
                n, self.max_symbols
            )));
        }
        if channel_estimate.len() < n || output.len() < n {
            return Err(LayerError::InvalidInput(format!(
                "Equalizer needs {} channel estimates and outputs, got {} and {}",
                n,
                channel_estimate.len(),
                output.len()
            )));
        }
        if !noise_estimate.is_finite() || noise_estimate < 0.0 {
            return Err(LayerError::InvalidInput(format!(
                "Invalid noise estimate {}",
                noise_estimate
            )));
        }

        for ((y, h), z) in symbols.iter().zip(channel_estimate).zip(output.iter_mut()) {
            let denominator = h.norm_sqr() + noise_estimate;
            *z = if denominator > f32::EPSILON {
                y * h.conj() / denominator
            } else {
                Complex32::new(0.0, 0.0)
            };
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_forcing_inverts_channel() {
        let eq = Equalizer::new(4).unwrap();
        let tx = [
            Complex32::new(1.0, 0.0),
            Complex32::new(0.0, -1.0),
            Complex32::new(-0.5, 0.5),
            Complex32::new(0.3, 0.2),
        ];
        let h = [
            Complex32::new(0.5, 0.5),
            Complex32::new(2.0, 0.0),
            Complex32::from_polar(0.8, 1.2),
            Complex32::new(1.0, 0.0),
        ];
        let rx: Vec<Complex32> = tx.iter().zip(&h).map(|(s, h)| s * h).collect();
        let mut z = [Complex32::new(0.0, 0.0); 4];
        eq.equalize(&rx, &h, &mut z, 0.0).unwrap();
        for (a, b) in tx.iter().zip(&z) {
            assert!((a - b).norm() < 1e-5);
        }
    }

    #[test]
    fn test_mmse_shrinks_and_handles_nulls() {
        let eq = Equalizer::new(2).unwrap();
        let rx = [Complex32::new(1.0, 0.0), Complex32::new(1.0, 1.0)];
        let h = [Complex32::new(1.0, 0.0), Complex32::new(0.0, 0.0)];
        let mut z = [Complex32::new(9.0, 9.0); 2];
        eq.equalize(&rx, &h, &mut z, 1.0).unwrap();
        assert!((z[0].re - 0.5).abs() < 1e-6);
        assert_eq!(z[1], Complex32::new(0.0, 0.0));
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let eq = Equalizer::new(1).unwrap();
        let two = [Complex32::new(1.0, 0.0); 2];
        let mut out = [Complex32::new(0.0, 0.0); 2];
        assert!(eq.equalize(&two, &two, &mut out, 0.0).is_err());
        assert!(eq.equalize(&two[..1], &two, &mut out, -1.0).is_err());
        assert!(Equalizer::new(0).is_err());
    }
}
