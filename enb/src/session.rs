//! Loopback session of one UE
//!
//! Every subframe carries one PUSCH transmission through encode, the AWGN
//! channel and decode. A transport block that fails its CRC is retransmitted
//! in the following subframes with the next redundancy version until it is
//! delivered or `max_tx` transmissions are spent.

use common::types::{CellConfig, NSUBFRAMES_X_FRAME};
use common::utils::{bit_errors, bytes_to_hex, pack_bits, unpack_bits};
use layers::phy::{HarqProcess, PuschContext, ResourceGrid, UciData};
use num_complex::Complex32;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::channel::AwgnChannel;
use crate::config::{SimConfig, UeConfig};

/// Redundancy versions in transmission order
pub const RV_SEQUENCE: [u32; 4] = [0, 2, 3, 1];

/// Outcome of a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub rnti: u16,
    /// Transport blocks started
    pub blocks: u32,
    /// Transport blocks delivered with a passing CRC
    pub delivered: u32,
    /// Transport blocks dropped after `max_tx` transmissions
    pub lost: u32,
    /// PUSCH transmissions, retransmissions included
    pub transmissions: u32,
    /// Blocks whose first transmission failed
    pub first_tx_failures: u32,
    /// Delivered blocks that differ from what was sent
    pub undetected_errors: u32,
    /// UCI payloads received with bit errors
    pub uci_errors: u32,
}

impl SessionReport {
    /// Block error rate of first transmissions
    pub fn initial_bler(&self) -> f64 {
        ratio(self.first_tx_failures, self.blocks)
    }

    /// Block error rate after HARQ
    pub fn residual_bler(&self) -> f64 {
        ratio(self.lost, self.blocks)
    }
}

fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Transport block in flight
struct PendingBlock {
    data: Vec<u8>,
    tx_count: u32,
}

fn random_block(rng: &mut StdRng, tbs: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; tbs.div_ceil(8)];
    rng.fill(bytes.as_mut_slice());
    let mut bits = unpack_bits(&bytes);
    bits.truncate(tbs);
    bits
}

fn randomize_uci(rng: &mut StdRng, uci: &mut UciData) {
    uci.cqi.iter_mut().for_each(|b| *b = rng.gen_range(0..2));
    if let Some(ack) = uci.ack.as_mut() {
        *ack = rng.gen_range(0..2);
    }
}

/// Run `sim.subframes` subframes of PUSCH loopback for one UE
pub fn run_session(cell: CellConfig, ue: UeConfig, sim: SimConfig) -> anyhow::Result<SessionReport> {
    let rnti = ue.rnti();
    let mut ctx = PuschContext::new(cell)?;
    ctx.bind_rnti(rnti)?;

    let seed = sim.seed ^ u64::from(rnti.value()) << 16;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut channel = AwgnChannel::new(sim.snr_db, seed.wrapping_add(1))?;

    let tx_harq = HarqProcess::new(ue.mcs(), ue.allocation(), cell.cp);
    let mut rx_harq = tx_harq.clone();

    let mut grid = ResourceGrid::for_cell(&cell)?;
    let mut ce = ResourceGrid::for_cell(&cell)?;
    ce.fill(Complex32::new(1.0, 0.0));

    let mut uci_tx = ue.uci_template();
    let mut uci_rx = ue.uci_template();
    let mut decoded = vec![0u8; ue.tbs];
    let mut pending: Option<PendingBlock> = None;
    let mut report = SessionReport {
        rnti: rnti.value(),
        ..Default::default()
    };

    info!(
        "UE {}: {} TBS={} over {} PRB, {} symbols / {} coded bits per subframe",
        rnti,
        ue.modulation,
        ue.tbs,
        ue.nof_prb,
        tx_harq.nof_symbols(),
        tx_harq.nof_coded_bits()
    );

    for n in 0..sim.subframes {
        let subframe = n as usize % NSUBFRAMES_X_FRAME;
        let block = pending.get_or_insert_with(|| {
            report.blocks += 1;
            rx_harq.configure(ue.mcs(), ue.allocation());
            PendingBlock {
                data: random_block(&mut rng, ue.tbs),
                tx_count: 0,
            }
        });
        let rv = RV_SEQUENCE[block.tx_count as usize % RV_SEQUENCE.len()];
        block.tx_count += 1;
        report.transmissions += 1;

        if let Some(uci) = uci_tx.as_mut() {
            randomize_uci(&mut rng, uci);
        }

        grid.clear();
        ctx.encode_with_uci(&block.data, uci_tx.as_ref(), &mut grid, subframe, &tx_harq, rv)?;
        channel.apply(&mut grid);

        let result = ctx.decode_with_uci(
            &grid,
            &ce,
            channel.noise_variance(),
            &mut decoded,
            uci_rx.as_mut(),
            subframe,
            &mut rx_harq,
            rv,
        );

        if uci_rx != uci_tx {
            report.uci_errors += 1;
        }

        match result {
            Ok(()) => {
                let errors = bit_errors(&decoded, &block.data);
                if errors > 0 {
                    warn!("UE {}: CRC passed with {} bit errors", rnti, errors);
                    report.undetected_errors += 1;
                }
                debug!(
                    "UE {}: sf={} rv={} delivered after {} tx, head {}",
                    rnti,
                    subframe,
                    rv,
                    block.tx_count,
                    bytes_to_hex(&pack_bits(&decoded[..decoded.len().min(64)]))
                );
                report.delivered += 1;
                pending = None;
            }
            Err(e) if e.is_retransmittable() => {
                if block.tx_count == 1 {
                    report.first_tx_failures += 1;
                }
                if block.tx_count >= sim.max_tx {
                    warn!("UE {}: block lost after {} transmissions", rnti, block.tx_count);
                    report.lost += 1;
                    pending = None;
                } else {
                    debug!("UE {}: sf={} rv={} failed, retransmitting", rnti, subframe, rv);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    ctx.teardown();

    info!(
        "UE {}: {} blocks, {} delivered, {} lost, {} transmissions, initial BLER {:.3}, residual BLER {:.3}",
        rnti,
        report.blocks,
        report.delivered,
        report.lost,
        report.transmissions,
        report.initial_bler(),
        report.residual_bler()
    );

    Ok(report)
}
