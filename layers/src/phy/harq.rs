//! HARQ process and uplink resource allocation
//!
//! The caller owns one [`HarqProcess`] per uplink HARQ process and passes it to
//! every encode/decode call. Only the transport codec mutates its soft buffer.

use common::types::{CyclicPrefix, Modulation, RE_X_RB};
use serde::{Deserialize, Serialize};

/// Modulation and coding scheme of a transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mcs {
    /// Modulation scheme
    pub modulation: Modulation,
    /// Transport block size in bits
    pub tbs: usize,
}

/// Contiguous resource blocks assigned in one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotAllocation {
    /// First allocated resource block
    pub first_prb: u32,
    /// Number of allocated resource blocks
    pub nof_prb: u32,
}

impl SlotAllocation {
    /// One past the last allocated resource block, `None` on overflow
    pub fn end_prb(&self) -> Option<u32> {
        self.first_prb.checked_add(self.nof_prb)
    }
}

/// Resource blocks assigned in both slots of a subframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrbAllocation {
    pub slot: [SlotAllocation; 2],
}

impl PrbAllocation {
    /// Same contiguous block in both slots
    pub fn contiguous(first_prb: u32, nof_prb: u32) -> Self {
        let slot = SlotAllocation { first_prb, nof_prb };
        Self { slot: [slot, slot] }
    }

    /// Frequency hopping between slots with a constant allocation size
    pub fn hopping(first_prb_slot0: u32, first_prb_slot1: u32, nof_prb: u32) -> Self {
        Self {
            slot: [
                SlotAllocation { first_prb: first_prb_slot0, nof_prb },
                SlotAllocation { first_prb: first_prb_slot1, nof_prb },
            ],
        }
    }

    /// Allocation size, taken from the first slot
    pub fn nof_prb(&self) -> u32 {
        self.slot[0].nof_prb
    }
}

/// Uplink HARQ process state
#[derive(Debug, Clone)]
pub struct HarqProcess {
    /// Modulation and transport block size
    pub mcs: Mcs,
    /// Resource allocation
    pub prb_alloc: PrbAllocation,
    /// SC-FDMA symbols per uplink slot
    pub n_symb_ul: usize,
    /// Accumulated soft bits of the rate-matching circular buffer
    pub(crate) soft_buffer: Vec<f32>,
}

impl HarqProcess {
    /// Create a process for a new transport block
    pub fn new(mcs: Mcs, prb_alloc: PrbAllocation, cp: CyclicPrefix) -> Self {
        Self {
            mcs,
            prb_alloc,
            n_symb_ul: cp.symbols_per_slot(),
            soft_buffer: Vec::new(),
        }
    }

    /// Reconfigure for a new transport block, discarding combined soft bits
    pub fn configure(&mut self, mcs: Mcs, prb_alloc: PrbAllocation) {
        self.mcs = mcs;
        self.prb_alloc = prb_alloc;
        self.reset();
    }

    /// Discard combined soft bits
    pub fn reset(&mut self) {
        self.soft_buffer.iter_mut().for_each(|llr| *llr = 0.0);
    }

    /// Modulation symbols carried by the allocation (one SC-FDMA symbol per slot holds DMRS)
    pub fn nof_symbols(&self) -> usize {
        2 * self.prb_alloc.nof_prb() as usize * RE_X_RB * self.n_symb_ul.saturating_sub(1)
    }

    /// Coded bits carried by the allocation
    pub fn nof_coded_bits(&self) -> usize {
        self.nof_symbols() * self.mcs.modulation.bits_per_symbol()
    }

    /// Soft-combined values of the circular buffer
    pub fn soft_buffer(&self) -> &[f32] {
        &self.soft_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_accounting() {
        let mcs = Mcs { modulation: Modulation::Qpsk, tbs: 600 };
        let harq = HarqProcess::new(mcs, PrbAllocation::contiguous(0, 6), CyclicPrefix::Normal);
        assert_eq!(harq.nof_symbols(), 864);
        assert_eq!(harq.nof_coded_bits(), 1728);

        let mcs = Mcs { modulation: Modulation::Qam64, tbs: 100 };
        let harq = HarqProcess::new(mcs, PrbAllocation::contiguous(2, 3), CyclicPrefix::Extended);
        assert_eq!(harq.nof_symbols(), 2 * 3 * 12 * 5);
        assert_eq!(harq.nof_coded_bits(), 2 * 3 * 12 * 5 * 6);
    }

    #[test]
    fn test_hopping_allocation() {
        let alloc = PrbAllocation::hopping(0, 4, 2);
        assert_eq!(alloc.nof_prb(), 2);
        assert_eq!(alloc.slot[1].end_prb(), Some(6));
        assert_eq!(PrbAllocation::contiguous(u32::MAX, 1).slot[0].end_prb(), None);
    }

    #[test]
    fn test_configure_resets_soft_buffer() {
        let mcs = Mcs { modulation: Modulation::Bpsk, tbs: 16 };
        let mut harq = HarqProcess::new(mcs, PrbAllocation::contiguous(0, 1), CyclicPrefix::Normal);
        harq.soft_buffer = vec![1.5; 40];
        harq.configure(Mcs { modulation: Modulation::Qpsk, tbs: 32 }, PrbAllocation::contiguous(1, 1));
        assert_eq!(harq.mcs.tbs, 32);
        assert!(harq.soft_buffer().iter().all(|&v| v == 0.0));
    }
}
