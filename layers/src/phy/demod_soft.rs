/// Soft-output demodulation
///
/// Max-log approximation of the per-bit log-likelihood ratio:
/// LLR(b) = (min_{s: b=1} |y - s|^2 - min_{s: b=0} |y - s|^2) / (2 sigma^2).
/// A positive LLR favours bit 0.

use crate::LayerError;
use num_complex::Complex32;
use std::sync::Arc;

use super::modem::ModemTable;

/// Largest constellation handled (64QAM)
const MAX_POINTS: usize = 64;

/// Soft demodulator sized for a maximum number of symbols per call
pub struct SoftDemodulator {
    max_symbols: usize,
    sigma: f32,
    table: Option<Arc<ModemTable>>,
}

impl SoftDemodulator {
    pub fn new(max_symbols: usize) -> Result<Self, LayerError> {
        if max_symbols == 0 {
            return Err(LayerError::ConfigurationError(
                "Soft demodulator needs a positive symbol capacity".to_string(),
            ));
        }
        Ok(Self {
            max_symbols,
            sigma: std::f32::consts::FRAC_1_SQRT_2,
            table: None,
        })
    }

    /// Set the noise standard deviation used to normalize the LLRs
    pub fn set_sigma(&mut self, sigma: f32) {
        self.sigma = sigma;
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Select the constellation to demodulate against
    pub fn set_table(&mut self, table: Arc<ModemTable>) {
        self.table = Some(table);
    }

    /// Demodulate `symbols` into `llrs`, returning the number of soft bits written
    pub fn demodulate(&self, symbols: &[Complex32], llrs: &mut [f32]) -> Result<usize, LayerError> {
        let table = self.table.as_ref().ok_or_else(|| {
            LayerError::InvalidInput("No modulation table selected".to_string())
        })?;
        if symbols.len() > self.max_symbols {
            return Err(LayerError::InvalidInput(format!(
                "{} symbols exceed demodulator capacity {}",
                symbols.len(),
                self.max_symbols
            )));
        }

        let bits_per_symbol = table.bits_per_symbol();
        let nof_bits = symbols.len() * bits_per_symbol;
        if nof_bits > llrs.len() {
            return Err(LayerError::InvalidInput(format!(
                "LLR buffer holds {} values, {} required",
                llrs.len(),
                nof_bits
            )));
        }

        let points = table.points();
        let scale = 1.0 / (2.0 * self.sigma * self.sigma);
        let mut distances = [0.0f32; MAX_POINTS];

        for (symbol, out) in symbols.iter().zip(llrs.chunks_exact_mut(bits_per_symbol)) {
            for (d, point) in distances.iter_mut().zip(points) {
                *d = (symbol - point).norm_sqr();
            }

            for (i, llr) in out.iter_mut().enumerate() {
                let shift = bits_per_symbol - 1 - i;
                let mut min0 = f32::INFINITY;
                let mut min1 = f32::INFINITY;
                for (label, &d) in distances[..points.len()].iter().enumerate() {
                    if (label >> shift) & 1 == 0 {
                        min0 = min0.min(d);
                    } else {
                        min1 = min1.min(d);
                    }
                }
                *llr = (min1 - min0) * scale;
            }
        }

        Ok(nof_bits)
    }
}
