//! Transform precoding for SC-FDMA
//!
//! Implements 3GPP TS 36.211 Section 5.3.3: every SC-FDMA data symbol of
//! M = 12 * N_PRB modulation symbols is spread by an M-point DFT scaled by 1/sqrt(M).
//! FFT plans for every valid allocation size are created once at construction.

use crate::LayerError;
use common::types::RE_X_RB;
use rustfft::{FftPlanner, num_complex::Complex32, Fft};
use std::sync::Arc;
use tracing::debug;

/// Allocation sizes allowed for transform precoding are 2^a * 3^b * 5^c resource blocks
pub fn is_valid_prb(nof_prb: u32) -> bool {
    if nof_prb == 0 {
        return false;
    }
    let mut n = nof_prb;
    for factor in [2, 3, 5] {
        while n % factor == 0 {
            n /= factor;
        }
    }
    n == 1
}

/// DFT spreading and de-spreading engine
pub struct DftPrecoder {
    max_prb: u32,
    /// Forward plans indexed by PRB count, `None` for invalid sizes
    dft: Vec<Option<Arc<dyn Fft<f32>>>>,
    /// Inverse plans indexed by PRB count
    idft: Vec<Option<Arc<dyn Fft<f32>>>>,
    /// Scratch shared by all plans, sized for the largest one
    scratch: Vec<Complex32>,
}

impl DftPrecoder {
    /// Create plans for every valid allocation up to `max_prb`
    pub fn new(max_prb: u32) -> Result<Self, LayerError> {
        if max_prb == 0 {
            return Err(LayerError::ConfigurationError(
                "Transform precoder needs at least one resource block".to_string(),
            ));
        }

        let mut planner = FftPlanner::new();
        let mut dft = vec![None; max_prb as usize + 1];
        let mut idft = vec![None; max_prb as usize + 1];
        let mut scratch_len = 0;

        for nof_prb in (1..=max_prb).filter(|&n| is_valid_prb(n)) {
            let size = nof_prb as usize * RE_X_RB;
            let forward = planner.plan_fft_forward(size);
            let inverse = planner.plan_fft_inverse(size);
            scratch_len = scratch_len
                .max(forward.get_inplace_scratch_len())
                .max(inverse.get_inplace_scratch_len());
            dft[nof_prb as usize] = Some(forward);
            idft[nof_prb as usize] = Some(inverse);
        }

        debug!(
            "Transform precoder ready: {} DFT sizes up to {} PRB",
            dft.iter().filter(|p| p.is_some()).count(),
            max_prb
        );

        Ok(Self {
            max_prb,
            dft,
            idft,
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        })
    }

    /// Apply transform precoding over both slots of a subframe
    pub fn precode(
        &mut self,
        input: &[Complex32],
        output: &mut [Complex32],
        nof_prb: u32,
        nof_symbols_per_slot: usize,
    ) -> Result<(), LayerError> {
        let plan = self.plan(&self.dft, nof_prb)?;
        Self::run(plan, &mut self.scratch, input, output, nof_prb, nof_symbols_per_slot)
    }

    /// Remove transform precoding over both slots of a subframe
    pub fn deprecode(
        &mut self,
        input: &[Complex32],
        output: &mut [Complex32],
        nof_prb: u32,
        nof_symbols_per_slot: usize,
    ) -> Result<(), LayerError> {
        let plan = self.plan(&self.idft, nof_prb)?;
        Self::run(plan, &mut self.scratch, input, output, nof_prb, nof_symbols_per_slot)
    }

    fn plan(
        &self,
        plans: &[Option<Arc<dyn Fft<f32>>>],
        nof_prb: u32,
    ) -> Result<Arc<dyn Fft<f32>>, LayerError> {
        if nof_prb > self.max_prb {
            return Err(LayerError::InvalidInput(format!(
                "{} PRB exceeds precoder capacity of {} PRB",
                nof_prb, self.max_prb
            )));
        }
        plans[nof_prb as usize].clone().ok_or_else(|| {
            LayerError::InvalidInput(format!(
                "Invalid number of PRB for transform precoding: {}",
                nof_prb
            ))
        })
    }

    fn run(
        plan: Arc<dyn Fft<f32>>,
        scratch: &mut [Complex32],
        input: &[Complex32],
        output: &mut [Complex32],
        nof_prb: u32,
        nof_symbols_per_slot: usize,
    ) -> Result<(), LayerError> {
        if nof_symbols_per_slot < 2 {
            return Err(LayerError::InvalidInput(format!(
                "Invalid number of symbols per slot: {}",
                nof_symbols_per_slot
            )));
        }

        // One SC-FDMA symbol per slot carries the reference signal
        let size = nof_prb as usize * RE_X_RB;
        let total = 2 * (nof_symbols_per_slot - 1) * size;
        if input.len() < total || output.len() < total {
            return Err(LayerError::InvalidInput(format!(
                "Precoding needs {} symbols, got input {} output {}",
                total,
                input.len(),
                output.len()
            )));
        }

        let buffer = &mut output[..total];
        buffer.copy_from_slice(&input[..total]);
        let scratch_len = plan.get_inplace_scratch_len();
        plan.process_with_scratch(buffer, &mut scratch[..scratch_len]);

        let norm = 1.0 / (size as f32).sqrt();
        for value in buffer.iter_mut() {
            *value *= norm;
        }

        Ok(())
    }
}
