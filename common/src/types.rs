//! Common Types for the LTE eNodeB uplink
//!
//! Defines fundamental types shared by the PHY layer and its users

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};
use std::fmt;
use std::str::FromStr;

/// Number of subframes in a 10 ms radio frame
pub const NSUBFRAMES_X_FRAME: usize = 10;

/// Number of subcarriers (resource elements) per resource block and symbol
pub const RE_X_RB: usize = 12;

/// Smallest cell bandwidth in resource blocks (1.4 MHz)
pub const MIN_PRB: u32 = 6;

/// Largest cell bandwidth in resource blocks (20 MHz)
pub const MAX_PRB: u32 = 110;

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Physical Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl Pci {
    /// Maximum valid LTE PCI value (0-503)
    pub const MAX: u16 = 503;

    /// Create a new PCI with validation
    pub fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }
}

/// Cyclic prefix type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclicPrefix {
    Normal = 0,
    Extended = 1,
}

impl CyclicPrefix {
    /// SC-FDMA symbols per slot
    pub fn symbols_per_slot(&self) -> usize {
        match self {
            CyclicPrefix::Normal => 7,
            CyclicPrefix::Extended => 6,
        }
    }

    /// Symbol index within each slot carrying the PUSCH demodulation reference signal
    pub fn pusch_dmrs_symbol(&self) -> usize {
        match self {
            CyclicPrefix::Normal => 3,
            CyclicPrefix::Extended => 2,
        }
    }

    /// Resource elements per resource block over one subframe (both slots)
    pub fn re_x_prb_x_subframe(&self) -> usize {
        2 * self.symbols_per_slot() * RE_X_RB
    }
}

impl Default for CyclicPrefix {
    fn default() -> Self {
        CyclicPrefix::Normal
    }
}

/// Modulation schemes usable on PUSCH
///
/// The discriminant is the modulation index carried in scheduling information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modulation {
    Bpsk = 0,
    Qpsk = 1,
    Qam16 = 2,
    Qam64 = 3,
}

impl Modulation {
    /// All modulations in index order
    pub const ALL: [Modulation; 4] = [
        Modulation::Bpsk,
        Modulation::Qpsk,
        Modulation::Qam16,
        Modulation::Qam64,
    ];

    /// Modulation with the largest number of bits per symbol
    pub const HIGHEST: Modulation = Modulation::Qam64;

    /// Bits carried per modulation symbol (Qm)
    pub fn bits_per_symbol(&self) -> usize {
        match self {
            Modulation::Bpsk => 1,
            Modulation::Qpsk => 2,
            Modulation::Qam16 => 4,
            Modulation::Qam64 => 6,
        }
    }

    /// Position of this modulation in [`Modulation::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modulation::Bpsk => "BPSK",
            Modulation::Qpsk => "QPSK",
            Modulation::Qam16 => "16QAM",
            Modulation::Qam64 => "64QAM",
        };
        f.write_str(name)
    }
}

impl FromStr for Modulation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bpsk" => Ok(Modulation::Bpsk),
            "qpsk" => Ok(Modulation::Qpsk),
            "qam16" | "16qam" => Ok(Modulation::Qam16),
            "qam64" | "64qam" => Ok(Modulation::Qam64),
            other => Err(format!("Unknown modulation: {}", other)),
        }
    }
}

/// LTE cell parameters relevant to the uplink shared channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellConfig {
    /// Uplink bandwidth in resource blocks
    pub nof_prb: u32,
    /// Cyclic prefix length
    #[serde(default)]
    pub cp: CyclicPrefix,
    /// Number of antenna ports
    #[serde(default = "default_nof_ports")]
    pub nof_ports: u32,
    /// Physical cell identity
    pub id: Pci,
}

fn default_nof_ports() -> u32 {
    1
}

impl CellConfig {
    /// Check bandwidth, port count and cell identity against their LTE ranges
    pub fn is_valid(&self) -> bool {
        (MIN_PRB..=MAX_PRB).contains(&self.nof_prb)
            && matches!(self.nof_ports, 1 | 2 | 4)
            && self.id.0 <= Pci::MAX
    }
}
