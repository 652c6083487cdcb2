//! Loopback scenario configuration
//!
//! A scenario describes one cell and the UEs transmitting on it. Files are
//! YAML (`.yml`/`.yaml`) or TOML (`.toml`), chosen by extension.

use common::types::{CellConfig, Modulation, Rnti};
use layers::phy::{Mcs, PrbAllocation, UciData};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete simulation scenario
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    /// Cell configuration
    pub cell: CellConfig,
    /// Simulation parameters
    #[serde(default)]
    pub sim: SimConfig,
    /// UEs scheduled on PUSCH
    pub ues: Vec<UeConfig>,
}

/// Simulation parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimConfig {
    /// Subframes simulated per UE
    #[serde(default = "default_subframes")]
    pub subframes: u32,
    /// Channel SNR in dB, noiseless when absent
    #[serde(default)]
    pub snr_db: Option<f32>,
    /// Transmissions per transport block before it is counted as lost
    #[serde(default = "default_max_tx")]
    pub max_tx: u32,
    /// Seed for payloads and channel noise
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_subframes() -> u32 {
    100
}

fn default_max_tx() -> u32 {
    4
}

fn default_seed() -> u64 {
    1
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            subframes: default_subframes(),
            snr_db: None,
            max_tx: default_max_tx(),
            seed: default_seed(),
        }
    }
}

/// Per-UE uplink grant
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UeConfig {
    /// C-RNTI
    pub rnti: u16,
    /// Modulation scheme
    pub modulation: Modulation,
    /// Transport block size in bits
    pub tbs: usize,
    /// First resource block in slot 0
    pub first_prb: u32,
    /// Allocated resource blocks
    pub nof_prb: u32,
    /// First resource block in slot 1 when frequency hopping
    #[serde(default)]
    pub hopping_prb: Option<u32>,
    /// CQI bits multiplexed on PUSCH
    #[serde(default)]
    pub cqi_bits: usize,
    /// Multiplex a HARQ-ACK bit
    #[serde(default)]
    pub ack: bool,
}

impl UeConfig {
    pub fn rnti(&self) -> Rnti {
        Rnti::new(self.rnti)
    }

    pub fn mcs(&self) -> Mcs {
        Mcs {
            modulation: self.modulation,
            tbs: self.tbs,
        }
    }

    pub fn allocation(&self) -> PrbAllocation {
        match self.hopping_prb {
            Some(slot1) => PrbAllocation::hopping(self.first_prb, slot1, self.nof_prb),
            None => PrbAllocation::contiguous(self.first_prb, self.nof_prb),
        }
    }

    /// UCI layout carried by every transmission, if any
    pub fn uci_template(&self) -> Option<UciData> {
        let uci = UciData {
            cqi: vec![0; self.cqi_bits],
            ack: self.ack.then_some(0),
            ri: None,
        };
        (!uci.is_empty()).then_some(uci)
    }
}

impl ScenarioConfig {
    /// Load a scenario from a YAML or TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml_str(&contents)?,
            Some("toml") => Self::from_toml_str(&contents)?,
            _ => {
                return Err(anyhow::anyhow!(
                    "Unsupported configuration format: {}",
                    path.display()
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Check the scenario for errors the PHY would only report per subframe
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.cell.is_valid() {
            return Err(anyhow::anyhow!("Invalid cell configuration: {:?}", self.cell));
        }
        if self.ues.is_empty() {
            return Err(anyhow::anyhow!("Scenario has no UEs"));
        }
        if self.sim.max_tx == 0 {
            return Err(anyhow::anyhow!("max_tx must be at least 1"));
        }

        let mut rntis: Vec<u16> = self.ues.iter().map(|ue| ue.rnti).collect();
        rntis.sort_unstable();
        if rntis.windows(2).any(|w| w[0] == w[1]) {
            return Err(anyhow::anyhow!("Duplicate RNTI in scenario"));
        }

        for ue in &self.ues {
            let alloc = ue.allocation();
            let fits = alloc
                .slot
                .iter()
                .all(|s| s.end_prb().is_some_and(|end| end <= self.cell.nof_prb));
            if ue.nof_prb == 0 || !fits {
                return Err(anyhow::anyhow!(
                    "UE {}: allocation of {} PRB from PRB {} does not fit {} PRB cell",
                    ue.rnti(),
                    ue.nof_prb,
                    ue.first_prb,
                    self.cell.nof_prb
                ));
            }
            if ue.tbs == 0 {
                return Err(anyhow::anyhow!("UE {}: transport block size is zero", ue.rnti()));
            }
        }

        Ok(())
    }
}
