//! Physical Layer (PHY) Submodules
//!
//! LTE uplink shared channel processing according to 3GPP TS 36.211 and 36.212.

pub mod demod_soft;
pub mod dft_precoding;
pub mod equalizer;
pub mod harq;
pub mod modem;
pub mod pusch;
pub mod resource_grid;
pub mod resource_mapper;
pub mod scrambling;
pub mod sequence;
pub mod ulsch;

// Re-export commonly used types
pub use harq::{HarqProcess, Mcs, PrbAllocation, SlotAllocation};
pub use pusch::PuschContext;
pub use resource_grid::ResourceGrid;
pub use resource_mapper::{MapDirection, PuschResourceMapper};
pub use scrambling::ScramblingTable;
pub use ulsch::{TransportCodec, UciData, Ulsch};
