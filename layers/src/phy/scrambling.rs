//! PUSCH scrambling
//!
//! Holds the per-subframe scrambling sequences bound to one RNTI and applies
//! them to hard bits (transmit) or soft bits (receive).

use crate::LayerError;
use common::types::{Pci, Rnti, NSUBFRAMES_X_FRAME};
use tracing::debug;

use super::sequence::generate_pusch;

/// Scrambling sequences for every subframe of a radio frame, bound to one RNTI
#[derive(Debug, Clone, PartialEq)]
pub struct ScramblingTable {
    rnti: Rnti,
    sequences: Vec<Vec<u8>>,
}

impl ScramblingTable {
    /// Generate all sequences for `rnti`, each `len` bits long
    ///
    /// Subframe `i` is seeded with slot number `2 * i`.
    pub fn generate(rnti: Rnti, cell_id: Pci, len: usize) -> Result<Self, LayerError> {
        let sequences = (0..NSUBFRAMES_X_FRAME)
            .map(|sf| generate_pusch(rnti, 2 * sf as u32, cell_id, len))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Generated {} PUSCH scrambling sequences of {} bits for RNTI {}",
            sequences.len(),
            len,
            rnti
        );

        Ok(Self { rnti, sequences })
    }

    /// RNTI the sequences were generated for
    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    /// Sequence for a subframe within the frame
    pub fn sequence(&self, subframe: usize) -> Result<&[u8], LayerError> {
        self.sequences
            .get(subframe)
            .map(Vec::as_slice)
            .ok_or_else(|| LayerError::InvalidInput(format!("Invalid subframe {}", subframe)))
    }
}

fn check_span(sequence: &[u8], offset: usize, len: usize) -> Result<(), LayerError> {
    if offset + len > sequence.len() {
        return Err(LayerError::InvalidInput(format!(
            "Scrambling span {}..{} exceeds sequence length {}",
            offset,
            offset + len,
            sequence.len()
        )));
    }
    Ok(())
}

/// XOR hard bits in place with `sequence[offset..]`
pub fn scramble_bits(sequence: &[u8], bits: &mut [u8], offset: usize) -> Result<(), LayerError> {
    check_span(sequence, offset, bits.len())?;
    for (bit, &c) in bits.iter_mut().zip(&sequence[offset..]) {
        *bit ^= c;
    }
    Ok(())
}

/// Flip the sign of soft bits in place wherever `sequence[offset..]` is one
pub fn descramble_llrs(sequence: &[u8], llrs: &mut [f32], offset: usize) -> Result<(), LayerError> {
    check_span(sequence, offset, llrs.len())?;
    for (llr, &c) in llrs.iter_mut().zip(&sequence[offset..]) {
        if c != 0 {
            *llr = -*llr;
        }
    }
    Ok(())
}
