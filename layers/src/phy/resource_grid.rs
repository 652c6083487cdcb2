//! Uplink Resource Grid
//!
//! One subframe of the LTE uplink resource grid (3GPP TS 36.211 Section 5.2):
//! `nof_prb * 12` subcarriers by `2 * N_symb^UL` SC-FDMA symbols.

use crate::LayerError;
use common::types::{CellConfig, CyclicPrefix, RE_X_RB};
use num_complex::Complex32;
use ndarray::Array2;
use tracing::debug;

/// Resource grid for one subframe
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceGrid {
    /// 2D grid: [subcarriers, symbols]
    grid: Array2<Complex32>,
    /// Number of resource blocks
    num_rbs: u32,
    /// Cyclic prefix of the cell
    cp: CyclicPrefix,
}

impl ResourceGrid {
    /// Create a zeroed grid for `num_rbs` resource blocks
    pub fn new(num_rbs: u32, cp: CyclicPrefix) -> Result<Self, LayerError> {
        if num_rbs == 0 {
            return Err(LayerError::InvalidInput(
                "Resource grid needs at least one resource block".to_string(),
            ));
        }

        let shape = (num_rbs as usize * RE_X_RB, 2 * cp.symbols_per_slot());
        debug!("Creating uplink resource grid with dimensions: {:?}", shape);

        Ok(Self {
            grid: Array2::zeros(shape),
            num_rbs,
            cp,
        })
    }

    /// Create a zeroed grid matching the cell bandwidth
    pub fn for_cell(cell: &CellConfig) -> Result<Self, LayerError> {
        Self::new(cell.nof_prb, cell.cp)
    }

    pub fn num_rbs(&self) -> u32 {
        self.num_rbs
    }

    pub fn cyclic_prefix(&self) -> CyclicPrefix {
        self.cp
    }

    pub fn num_subcarriers(&self) -> usize {
        self.grid.nrows()
    }

    /// SC-FDMA symbols in the subframe
    pub fn num_symbols(&self) -> usize {
        self.grid.ncols()
    }

    /// Clear the entire grid
    pub fn clear(&mut self) {
        self.fill(Complex32::new(0.0, 0.0));
    }

    /// Set every resource element to `value`
    pub fn fill(&mut self, value: Complex32) {
        self.grid.fill(value);
    }

    /// Map a resource element
    pub fn map_re(&mut self, subcarrier: usize, symbol: usize, value: Complex32) -> Result<(), LayerError> {
        let re = self.grid.get_mut((subcarrier, symbol)).ok_or_else(|| {
            LayerError::InvalidInput(format!(
                "RE out of bounds: subcarrier={}, symbol={}",
                subcarrier, symbol
            ))
        })?;
        *re = value;
        Ok(())
    }

    /// Get a resource element
    pub fn get_re(&self, subcarrier: usize, symbol: usize) -> Option<Complex32> {
        self.grid.get((subcarrier, symbol)).copied()
    }

    /// Apply `f` to every resource element
    pub fn map_inplace(&mut self, mut f: impl FnMut(&mut Complex32)) {
        self.grid.iter_mut().for_each(|re| f(re));
    }

    /// Export the grid symbol by symbol (index = symbol * subcarriers + subcarrier)
    pub fn to_linear(&self) -> Vec<Complex32> {
        self.grid.t().iter().copied().collect()
    }

    /// Import a grid laid out symbol by symbol, as produced by [`ResourceGrid::to_linear`]
    pub fn copy_from_linear(&mut self, data: &[Complex32]) -> Result<(), LayerError> {
        let nof_re = self.num_subcarriers();
        if data.len() != nof_re * self.num_symbols() {
            return Err(LayerError::InvalidInput(format!(
                "Data length {} doesn't match grid size {}",
                data.len(),
                nof_re * self.num_symbols()
            )));
        }

        for (symbol, column) in data.chunks_exact(nof_re).enumerate() {
            self.grid
                .column_mut(symbol)
                .assign(&ndarray::ArrayView1::from(column));
        }
        Ok(())
    }
}
