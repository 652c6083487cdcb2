/// Modulation mapper
/// Based on 3GPP TS 36.211 Section 7.1

use crate::LayerError;
use common::types::Modulation;
use num_complex::Complex32;
use std::f32::consts::FRAC_1_SQRT_2;

/// Constellation for one modulation, indexed by its bit label (first bit is the MSB)
#[derive(Debug, Clone)]
pub struct ModemTable {
    modulation: Modulation,
    points: Vec<Complex32>,
}

impl ModemTable {
    /// Build the LTE constellation for `modulation`
    pub fn new(modulation: Modulation) -> Self {
        let bits_per_symbol = modulation.bits_per_symbol();
        let points = (0..1usize << bits_per_symbol)
            .map(|label| {
                let bit = |i: usize| ((label >> (bits_per_symbol - 1 - i)) & 1) as f32;
                match modulation {
                    Modulation::Bpsk => map_bpsk(bit(0)),
                    Modulation::Qpsk => map_qpsk(bit(0), bit(1)),
                    Modulation::Qam16 => map_16qam([bit(0), bit(1), bit(2), bit(3)]),
                    Modulation::Qam64 => {
                        map_64qam([bit(0), bit(1), bit(2), bit(3), bit(4), bit(5)])
                    }
                }
            })
            .collect();

        Self { modulation, points }
    }

    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.modulation.bits_per_symbol()
    }

    /// Constellation points indexed by bit label
    pub fn points(&self) -> &[Complex32] {
        &self.points
    }

    /// Map `bits` onto symbols, returning the number of symbols written
    pub fn modulate(&self, bits: &[u8], symbols: &mut [Complex32]) -> Result<usize, LayerError> {
        let bits_per_symbol = self.bits_per_symbol();
        if bits.len() % bits_per_symbol != 0 {
            return Err(LayerError::InvalidInput(format!(
                "{} bits is not a multiple of {} bits per {} symbol",
                bits.len(),
                bits_per_symbol,
                self.modulation
            )));
        }

        let nof_symbols = bits.len() / bits_per_symbol;
        if nof_symbols > symbols.len() {
            return Err(LayerError::InvalidInput(format!(
                "Symbol buffer holds {} symbols, {} required",
                symbols.len(),
                nof_symbols
            )));
        }

        for (chunk, symbol) in bits.chunks_exact(bits_per_symbol).zip(symbols.iter_mut()) {
            let label = chunk
                .iter()
                .fold(0usize, |acc, &b| (acc << 1) | (b & 1) as usize);
            *symbol = self.points[label];
        }

        Ok(nof_symbols)
    }
}

fn map_bpsk(b0: f32) -> Complex32 {
    let v = FRAC_1_SQRT_2 * (1.0 - 2.0 * b0);
    Complex32::new(v, v)
}

fn map_qpsk(b0: f32, b1: f32) -> Complex32 {
    Complex32::new(
        FRAC_1_SQRT_2 * (1.0 - 2.0 * b0),
        FRAC_1_SQRT_2 * (1.0 - 2.0 * b1),
    )
}

fn map_16qam(b: [f32; 4]) -> Complex32 {
    let scale = 1.0 / 10.0_f32.sqrt();
    let i = (1.0 - 2.0 * b[0]) * (2.0 - (1.0 - 2.0 * b[2]));
    let q = (1.0 - 2.0 * b[1]) * (2.0 - (1.0 - 2.0 * b[3]));
    Complex32::new(scale * i, scale * q)
}

fn map_64qam(b: [f32; 6]) -> Complex32 {
    let scale = 1.0 / 42.0_f32.sqrt();
    let i = (1.0 - 2.0 * b[0]) * (4.0 - (1.0 - 2.0 * b[2]) * (2.0 - (1.0 - 2.0 * b[4])));
    let q = (1.0 - 2.0 * b[1]) * (4.0 - (1.0 - 2.0 * b[3]) * (2.0 - (1.0 - 2.0 * b[5])));
    Complex32::new(scale * i, scale * q)
}
