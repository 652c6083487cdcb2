/// Pseudo-random sequence generation
/// Based on 3GPP TS 36.211 Section 7.2

use crate::LayerError;
use common::types::{Pci, Rnti};

/// Fast-forward applied to both m-sequences before the first output bit
const NC: usize = 1600;

/// Length-31 Gold sequence generator
pub struct GoldSequence {
    /// First m-sequence state, bit 0 holds x1(n)
    x1: u32,
    /// Second m-sequence state, bit 0 holds x2(n)
    x2: u32,
}

impl GoldSequence {
    /// Create a generator positioned at c(0) for the given initialization value
    pub fn new(c_init: u32) -> Self {
        let mut generator = Self {
            // x1(0) = 1, x1(n) = 0 for n = 1..30
            x1: 1,
            x2: c_init & 0x7FFFFFFF,
        };

        for _ in 0..NC {
            generator.advance();
        }

        generator
    }

    /// Advance LFSR state
    fn advance(&mut self) {
        // x1(n+31) = (x1(n+3) + x1(n)) mod 2
        let x1_new = ((self.x1 >> 3) ^ self.x1) & 1;
        self.x1 = ((self.x1 >> 1) | (x1_new << 30)) & 0x7FFFFFFF;

        // x2(n+31) = (x2(n+3) + x2(n+2) + x2(n+1) + x2(n)) mod 2
        let x2_new = ((self.x2 >> 3) ^ (self.x2 >> 2) ^ (self.x2 >> 1) ^ self.x2) & 1;
        self.x2 = ((self.x2 >> 1) | (x2_new << 30)) & 0x7FFFFFFF;
    }

    /// Generate next bit from the sequence
    pub fn next_bit(&mut self) -> u8 {
        let c = (self.x1 ^ self.x2) & 1;
        self.advance();
        c as u8
    }

    /// Fill `out` with consecutive sequence bits
    pub fn fill(&mut self, out: &mut [u8]) {
        for bit in out.iter_mut() {
            *bit = self.next_bit();
        }
    }
}

/// PUSCH scrambling initialization, 36.211 5.3.1
///
/// c_init = n_RNTI * 2^14 + floor(n_s / 2) * 2^9 + N_ID^cell
pub fn pusch_cinit(rnti: Rnti, ns: u32, cell_id: Pci) -> u32 {
    ((rnti.0 as u32) << 14) + ((ns / 2) << 9) + cell_id.0 as u32
}

/// Generate a PUSCH scrambling sequence of `len` bits for slot number `ns`
pub fn generate_pusch(rnti: Rnti, ns: u32, cell_id: Pci, len: usize) -> Result<Vec<u8>, LayerError> {
    if len == 0 {
        return Err(LayerError::InvalidInput(
            "Scrambling sequence length must be positive".to_string(),
        ));
    }
    if ns >= 20 {
        return Err(LayerError::InvalidInput(format!("Invalid slot number {}", ns)));
    }

    let mut sequence = vec![0u8; len];
    GoldSequence::new(pusch_cinit(rnti, ns, cell_id)).fill(&mut sequence);
    Ok(sequence)
}
