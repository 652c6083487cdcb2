//! PUSCH resource element mapping
//!
//! Implements 3GPP TS 36.211 Section 5.3.4. Symbols are placed in increasing
//! subcarrier order within each SC-FDMA symbol, symbols in increasing order
//! within each slot, slot 0 before slot 1. The reference signal symbol of
//! each slot is skipped. GET walks the grid in exactly the same order as PUT.

use crate::LayerError;
use common::types::{CyclicPrefix, NSUBFRAMES_X_FRAME, RE_X_RB};
use num_complex::Complex32;
use tracing::{trace, warn};

use super::harq::PrbAllocation;
use super::resource_grid::ResourceGrid;

/// Direction of a mapping operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapDirection {
    /// Linear buffer to grid
    Put,
    /// Grid to linear buffer
    Get,
}

/// Maps PUSCH symbols between a linear buffer and the subframe resource grid
#[derive(Debug, Clone, Copy)]
pub struct PuschResourceMapper {
    nof_prb: u32,
    cp: CyclicPrefix,
}

impl PuschResourceMapper {
    pub fn new(nof_prb: u32, cp: CyclicPrefix) -> Self {
        Self { nof_prb, cp }
    }

    /// Number of PUSCH resource elements for `alloc` in one subframe
    pub fn count(&self, alloc: &PrbAllocation) -> usize {
        2 * alloc.nof_prb() as usize * RE_X_RB * (self.cp.symbols_per_slot() - 1)
    }

    /// Check allocation and subframe against the cell, returning the symbol count
    pub fn validate(&self, alloc: &PrbAllocation, subframe: usize) -> Result<usize, LayerError> {
        if subframe >= NSUBFRAMES_X_FRAME {
            return Err(LayerError::InvalidInput(format!("Invalid subframe {}", subframe)));
        }

        let nof_prb = alloc.nof_prb();
        if nof_prb == 0 {
            return Err(LayerError::InvalidInput("Empty PRB allocation".to_string()));
        }

        for (slot, slot_alloc) in alloc.slot.iter().enumerate() {
            if slot_alloc.nof_prb != nof_prb {
                return Err(LayerError::InvalidInput(format!(
                    "Slot {} allocates {} PRB, slot 0 allocates {}",
                    slot, slot_alloc.nof_prb, nof_prb
                )));
            }
            if !slot_alloc.end_prb().is_some_and(|end| end <= self.nof_prb) {
                return Err(LayerError::InvalidInput(format!(
                    "Slot {} allocation of {} PRB from PRB {} exceeds cell bandwidth of {} PRB",
                    slot, slot_alloc.nof_prb, slot_alloc.first_prb, self.nof_prb
                )));
            }
        }

        Ok(self.count(alloc))
    }

    /// Check that `grid` spans the cell bandwidth and cyclic prefix
    pub fn check_grid(&self, grid: &ResourceGrid) -> Result<(), LayerError> {
        if grid.num_rbs() != self.nof_prb || grid.cyclic_prefix() != self.cp {
            return Err(LayerError::InvalidInput(format!(
                "Grid of {} PRB {:?} CP does not match cell of {} PRB {:?} CP",
                grid.num_rbs(),
                grid.cyclic_prefix(),
                self.nof_prb,
                self.cp
            )));
        }
        Ok(())
    }

    /// Visit every PUSCH resource element in mapping order as (index, subcarrier, symbol)
    fn traverse(&self, alloc: &PrbAllocation, mut visit: impl FnMut(usize, usize, usize)) -> usize {
        let symbols_per_slot = self.cp.symbols_per_slot();
        let dmrs_symbol = self.cp.pusch_dmrs_symbol();
        let mut idx = 0;

        for (slot, slot_alloc) in alloc.slot.iter().enumerate() {
            let first_sc = slot_alloc.first_prb as usize * RE_X_RB;
            let last_sc = first_sc + slot_alloc.nof_prb as usize * RE_X_RB;

            for l in (0..symbols_per_slot).filter(|&l| l != dmrs_symbol) {
                let symbol = slot * symbols_per_slot + l;
                for subcarrier in first_sc..last_sc {
                    visit(idx, subcarrier, symbol);
                    idx += 1;
                }
            }
        }

        idx
    }

    /// Write `symbols` into the grid, returning the number of resource elements written
    pub fn put(
        &self,
        symbols: &[Complex32],
        grid: &mut ResourceGrid,
        alloc: &PrbAllocation,
        subframe: usize,
    ) -> Result<usize, LayerError> {
        let count = self.validate(alloc, subframe)?;
        self.check_grid(grid)?;
        if symbols.len() < count {
            return Err(LayerError::InvalidInput(format!(
                "Allocation needs {} symbols, buffer holds {}",
                count,
                symbols.len()
            )));
        }

        let written = self.traverse(alloc, |idx, subcarrier, symbol| {
            // Grid dimensions were checked above
            let _ = grid.map_re(subcarrier, symbol, symbols[idx]);
        });
        trace!("PUSCH put {} RE in subframe {}", written, subframe);
        Ok(written)
    }

    /// Read the allocation's resource elements from the grid into `symbols`
    pub fn get(
        &self,
        grid: &ResourceGrid,
        symbols: &mut [Complex32],
        alloc: &PrbAllocation,
        subframe: usize,
    ) -> Result<usize, LayerError> {
        let count = self.validate(alloc, subframe)?;
        self.check_grid(grid)?;
        if symbols.len() < count {
            return Err(LayerError::InvalidInput(format!(
                "Allocation needs {} symbols, buffer holds {}",
                count,
                symbols.len()
            )));
        }

        let read = self.traverse(alloc, |idx, subcarrier, symbol| {
            symbols[idx] = grid.get_re(subcarrier, symbol).unwrap_or_default();
        });
        trace!("PUSCH get {} RE in subframe {}", read, subframe);
        Ok(read)
    }

    /// Copy between `symbols` and `grid` in the given direction
    pub fn map_to_grid(
        &self,
        symbols: &mut [Complex32],
        grid: &mut ResourceGrid,
        alloc: &PrbAllocation,
        subframe: usize,
        direction: MapDirection,
    ) -> Result<usize, LayerError> {
        let result = match direction {
            MapDirection::Put => self.put(symbols, grid, alloc, subframe),
            MapDirection::Get => self.get(grid, symbols, alloc, subframe),
        };
        if let Err(e) = &result {
            warn!("PUSCH {:?} rejected: {}", direction, e);
        }
        result
    }
}
