/// PUSCH (Physical Uplink Shared Channel) implementation
/// Based on 3GPP TS 36.211 Section 5.3 and 36.212 Section 5.2.2
///
/// Encode: transport encode, scrambling, modulation, transform precoding,
/// resource element mapping.
/// Decode: resource element extraction, equalization, transform decoding,
/// soft demodulation, descrambling, transport decode.

use crate::LayerError;
use common::types::{CellConfig, Modulation, Rnti, NSUBFRAMES_X_FRAME};
use num_complex::Complex32;
use std::f32::consts::FRAC_1_SQRT_2;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::demod_soft::SoftDemodulator;
use super::dft_precoding::{is_valid_prb, DftPrecoder};
use super::equalizer::Equalizer;
use super::harq::HarqProcess;
use super::modem::ModemTable;
use super::resource_grid::ResourceGrid;
use super::resource_mapper::PuschResourceMapper;
use super::scrambling::{descramble_llrs, scramble_bits, ScramblingTable};
use super::ulsch::{TransportCodec, UciData, Ulsch};

/// Noise standard deviation assumed by the soft demodulator
///
/// Max-log LLRs only scale with sigma, so the decoder does not depend on it.
pub const PUSCH_DEMOD_SIGMA: f32 = FRAC_1_SQRT_2;

/// Per-user PUSCH processing context
///
/// Created once per cell, bound to an RNTI once per user session, then driven
/// once per subframe. All buffers are sized for the full cell bandwidth at
/// construction.
pub struct PuschContext {
    cell: CellConfig,
    max_symbols: usize,
    max_bits: usize,
    modem_tables: Vec<Arc<ModemTable>>,
    demod: SoftDemodulator,
    precoder: DftPrecoder,
    equalizer: Equalizer,
    mapper: PuschResourceMapper,
    codec: Box<dyn TransportCodec>,
    /// Present once an RNTI is bound
    scrambling: Option<ScramblingTable>,
    symbols_d: Vec<Complex32>,
    symbols_z: Vec<Complex32>,
    ce: Vec<Complex32>,
    bits_g: Vec<u8>,
    llr_q: Vec<f32>,
}

/// Symbol and bit counts of one subframe allocation
#[derive(Debug, Clone, Copy)]
struct Accounting {
    nof_prb: u32,
    nof_symbols: usize,
    nof_coded_bits: usize,
}

impl PuschContext {
    /// Build a context for `cell` with the reference transport codec
    pub fn new(cell: CellConfig) -> Result<Self, LayerError> {
        if !cell.is_valid() {
            error!("Rejecting cell configuration {:?}", cell);
            return Err(LayerError::InvalidInput(format!(
                "Invalid cell: {} PRB, {} ports, PCI {}",
                cell.nof_prb, cell.nof_ports, cell.id.0
            )));
        }

        let max_symbols = cell.nof_prb as usize * cell.cp.re_x_prb_x_subframe();
        let max_bits = max_symbols * Modulation::HIGHEST.bits_per_symbol();

        let modem_tables = Modulation::ALL
            .iter()
            .map(|&m| Arc::new(ModemTable::new(m)))
            .collect();
        let demod = SoftDemodulator::new(max_symbols)?;
        let precoder = DftPrecoder::new(cell.nof_prb)?;
        let equalizer = Equalizer::new(max_symbols)?;

        info!(
            "PUSCH context ready: {} PRB, {:?} CP, PCI {}, {} symbols / {} bits capacity",
            cell.nof_prb, cell.cp, cell.id.0, max_symbols, max_bits
        );

        Ok(Self {
            cell,
            max_symbols,
            max_bits,
            modem_tables,
            demod,
            precoder,
            equalizer,
            mapper: PuschResourceMapper::new(cell.nof_prb, cell.cp),
            codec: Box::new(Ulsch::new(max_bits)),
            scrambling: None,
            symbols_d: vec![Complex32::new(0.0, 0.0); max_symbols],
            symbols_z: vec![Complex32::new(0.0, 0.0); max_symbols],
            ce: vec![Complex32::new(0.0, 0.0); max_symbols],
            bits_g: vec![0; max_bits],
            llr_q: vec![0.0; max_bits],
        })
    }

    /// Replace the transport codec
    pub fn with_codec(mut self, codec: Box<dyn TransportCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Release buffers, engines and scrambling sequences
    pub fn teardown(self) {
        info!(
            "PUSCH context torn down (RNTI {})",
            self.rnti().map(|r| r.to_string()).unwrap_or_else(|| "unbound".to_string())
        );
    }

    pub fn cell(&self) -> &CellConfig {
        &self.cell
    }

    /// Modulation symbols per subframe over the full bandwidth, reference symbols included
    pub fn max_symbols(&self) -> usize {
        self.max_symbols
    }

    /// Bound RNTI, if any
    pub fn rnti(&self) -> Option<Rnti> {
        self.scrambling.as_ref().map(ScramblingTable::rnti)
    }

    /// Bind `rnti`, regenerating the scrambling sequence of every subframe
    ///
    /// The new sequences replace the old ones only once all are generated.
    /// On failure the context is left unbound.
    pub fn bind_rnti(&mut self, rnti: Rnti) -> Result<(), LayerError> {
        match ScramblingTable::generate(rnti, self.cell.id, self.max_bits) {
            Ok(table) => {
                self.scrambling = Some(table);
                info!("PUSCH bound to RNTI {}", rnti);
                Ok(())
            }
            Err(e) => {
                self.scrambling = None;
                error!("Failed to bind RNTI {}: {}", rnti, e);
                Err(e)
            }
        }
    }

    /// Scrambling sequence of `subframe` for the bound RNTI
    pub fn scrambling_sequence(&self, subframe: usize) -> Result<&[u8], LayerError> {
        self.scrambling
            .as_ref()
            .ok_or_else(Self::unbound)?
            .sequence(subframe)
    }

    fn unbound() -> LayerError {
        LayerError::InvalidInput("No RNTI bound to PUSCH context".to_string())
    }

    /// Symbol and bit accounting for one subframe, checked against capacity and the grid mapping
    fn accounting(&self, harq: &HarqProcess, subframe: usize) -> Result<Accounting, LayerError> {
        if subframe >= NSUBFRAMES_X_FRAME {
            return Err(LayerError::InvalidInput(format!("Invalid subframe {}", subframe)));
        }

        let tbs = harq.mcs.tbs;
        if tbs == 0 {
            return Err(LayerError::InvalidInput("Transport block size is zero".to_string()));
        }

        let nof_symbols = harq.nof_symbols();
        let nof_coded_bits = harq.nof_coded_bits();
        if tbs > nof_coded_bits {
            return Err(LayerError::InvalidInput(format!(
                "Code rate {:.3} too high: {} bits over {} coded bits",
                tbs as f32 / nof_coded_bits as f32,
                tbs,
                nof_coded_bits
            )));
        }

        if nof_symbols > self.max_symbols {
            return Err(LayerError::InvalidInput(format!(
                "Allocation of {} symbols exceeds capacity {}",
                nof_symbols, self.max_symbols
            )));
        }

        let count = self.mapper.validate(&harq.prb_alloc, subframe)?;
        if count != nof_symbols {
            error!(
                "PUSCH mapping of {} RE does not match {} allocated symbols",
                count, nof_symbols
            );
            return Err(LayerError::SizeMismatch {
                expected: nof_symbols,
                actual: count,
            });
        }

        let nof_prb = harq.prb_alloc.nof_prb();
        if !is_valid_prb(nof_prb) {
            return Err(LayerError::InvalidInput(format!(
                "Invalid number of PRB for transform precoding: {}",
                nof_prb
            )));
        }

        Ok(Accounting {
            nof_prb,
            nof_symbols,
            nof_coded_bits,
        })
    }

    /// Encode one transport block into the PUSCH resource elements of `grid`
    pub fn encode(
        &mut self,
        data: &[u8],
        grid: &mut ResourceGrid,
        subframe: usize,
        harq: &HarqProcess,
        rv: u32,
    ) -> Result<(), LayerError> {
        self.encode_with_uci(data, None, grid, subframe, harq, rv)
    }

    /// Encode one transport block with uplink control information multiplexed in
    pub fn encode_with_uci(
        &mut self,
        data: &[u8],
        uci: Option<&UciData>,
        grid: &mut ResourceGrid,
        subframe: usize,
        harq: &HarqProcess,
        rv: u32,
    ) -> Result<(), LayerError> {
        let scrambling = self.scrambling.as_ref().ok_or_else(Self::unbound)?;
        let acc = self.accounting(harq, subframe)?;
        if data.len() < harq.mcs.tbs {
            return Err(LayerError::InvalidInput(format!(
                "Transport block of {} bits, got {} data bits",
                harq.mcs.tbs,
                data.len()
            )));
        }
        self.mapper.check_grid(grid)?;

        debug!(
            "PUSCH encode sf={} rnti={} {} PRB {} TBS={} symbols={} coded_bits={} rv={}",
            subframe,
            scrambling.rnti(),
            acc.nof_prb,
            harq.mcs.modulation,
            harq.mcs.tbs,
            acc.nof_symbols,
            acc.nof_coded_bits,
            rv
        );

        let bits = &mut self.bits_g[..acc.nof_coded_bits];
        self.codec.encode(data, uci, bits, harq, rv)?;

        scramble_bits(scrambling.sequence(subframe)?, bits, 0)?;

        let table = &self.modem_tables[harq.mcs.modulation.index()];
        table.modulate(bits, &mut self.symbols_z[..acc.nof_symbols])?;

        self.precoder.precode(
            &self.symbols_z[..acc.nof_symbols],
            &mut self.symbols_d[..acc.nof_symbols],
            acc.nof_prb,
            harq.n_symb_ul,
        )?;

        let count = self
            .mapper
            .put(&self.symbols_d[..acc.nof_symbols], grid, &harq.prb_alloc, subframe)?;
        if count != acc.nof_symbols {
            error!("PUSCH mapped {} symbols, expected {}", count, acc.nof_symbols);
            return Err(LayerError::SizeMismatch {
                expected: acc.nof_symbols,
                actual: count,
            });
        }
        Ok(())
    }

    /// Decode one transport block from the PUSCH resource elements of `grid`
    ///
    /// `data` is written only when the transport block passes its CRC.
    #[allow(clippy::too_many_arguments)]
    pub fn decode(
        &mut self,
        grid: &ResourceGrid,
        ce: &ResourceGrid,
        noise_estimate: f32,
        data: &mut [u8],
        subframe: usize,
        harq: &mut HarqProcess,
        rv: u32,
    ) -> Result<(), LayerError> {
        self.decode_with_uci(grid, ce, noise_estimate, data, None, subframe, harq, rv)
    }

    /// Decode one transport block and the uplink control information multiplexed with it
    ///
    /// The field sizes of `uci` select the expected layout; its values are overwritten.
    #[allow(clippy::too_many_arguments)]
    pub fn decode_with_uci(
        &mut self,
        grid: &ResourceGrid,
        ce: &ResourceGrid,
        noise_estimate: f32,
        data: &mut [u8],
        uci: Option<&mut UciData>,
        subframe: usize,
        harq: &mut HarqProcess,
        rv: u32,
    ) -> Result<(), LayerError> {
        let scrambling = self.scrambling.as_ref().ok_or_else(Self::unbound)?;
        let acc = self.accounting(harq, subframe)?;
        let tbs = harq.mcs.tbs;
        if data.len() < tbs {
            return Err(LayerError::InvalidInput(format!(
                "Output of {} bits cannot hold transport block of {} bits",
                data.len(),
                tbs
            )));
        }
        self.mapper.check_grid(grid)?;
        self.mapper.check_grid(ce)?;

        debug!(
            "PUSCH decode sf={} rnti={} {} PRB {} TBS={} symbols={} coded_bits={} rv={}",
            subframe,
            scrambling.rnti(),
            acc.nof_prb,
            harq.mcs.modulation,
            tbs,
            acc.nof_symbols,
            acc.nof_coded_bits,
            rv
        );

        let symbols = &mut self.symbols_d[..acc.nof_symbols];
        let count = self.mapper.get(grid, symbols, &harq.prb_alloc, subframe)?;
        if count != acc.nof_symbols {
            error!("PUSCH extracted {} symbols, expected {}", count, acc.nof_symbols);
            return Err(LayerError::SizeMismatch {
                expected: acc.nof_symbols,
                actual: count,
            });
        }

        let channel = &mut self.ce[..acc.nof_symbols];
        let count = self.mapper.get(ce, channel, &harq.prb_alloc, subframe)?;
        if count != acc.nof_symbols {
            error!("PUSCH extracted {} channel estimates, expected {}", count, acc.nof_symbols);
            return Err(LayerError::SizeMismatch {
                expected: acc.nof_symbols,
                actual: count,
            });
        }

        self.equalizer.equalize(
            &self.symbols_d[..acc.nof_symbols],
            &self.ce[..acc.nof_symbols],
            &mut self.symbols_z[..acc.nof_symbols],
            noise_estimate,
        )?;

        self.precoder.deprecode(
            &self.symbols_z[..acc.nof_symbols],
            &mut self.symbols_d[..acc.nof_symbols],
            acc.nof_prb,
            harq.n_symb_ul,
        )?;

        self.demod.set_sigma(PUSCH_DEMOD_SIGMA);
        self.demod
            .set_table(Arc::clone(&self.modem_tables[harq.mcs.modulation.index()]));
        let llrs = &mut self.llr_q[..acc.nof_coded_bits];
        self.demod.demodulate(&self.symbols_d[..acc.nof_symbols], llrs)?;

        descramble_llrs(scrambling.sequence(subframe)?, llrs, 0)?;

        if let Err(e) = self
            .codec
            .decode(llrs, data, tbs, acc.nof_coded_bits, harq, rv, uci)
        {
            warn!("PUSCH decode failed sf={} rv={}: {}", subframe, rv, e);
            return Err(e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::harq::{Mcs, PrbAllocation};
    use common::types::{CyclicPrefix, Pci};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn cell(nof_prb: u32) -> CellConfig {
        CellConfig {
            nof_prb,
            cp: CyclicPrefix::Normal,
            nof_ports: 1,
            id: Pci(1),
        }
    }

    fn random_bits(n: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(0..2u8)).collect()
    }

    fn flat_channel(cell: &CellConfig) -> ResourceGrid {
        let mut ce = ResourceGrid::for_cell(cell).unwrap();
        ce.fill(Complex32::new(1.0, 0.0));
        ce
    }

    fn harq(modulation: Modulation, tbs: usize, alloc: PrbAllocation) -> HarqProcess {
        HarqProcess::new(Mcs { modulation, tbs }, alloc, CyclicPrefix::Normal)
    }

    #[test]
    fn test_invalid_cell_rejected() {
        assert!(matches!(
            PuschContext::new(cell(5)),
            Err(LayerError::InvalidInput(_))
        ));
        let ctx = PuschContext::new(cell(6)).unwrap();
        assert_eq!(ctx.max_symbols(), 6 * 2 * 7 * 12);
        assert_eq!(ctx.rnti(), None);
        ctx.teardown();
    }

    #[test]
    fn test_unbound_context_touches_nothing() {
        let cell = cell(6);
        let mut ctx = PuschContext::new(cell).unwrap();
        let mut process = harq(Modulation::Qpsk, 100, PrbAllocation::contiguous(0, 6));

        let mut grid = ResourceGrid::for_cell(&cell).unwrap();
        grid.fill(Complex32::new(0.25, -0.25));
        let before = grid.clone();

        let err = ctx.encode(&[1; 100], &mut grid, 0, &process, 0).unwrap_err();
        assert!(matches!(err, LayerError::InvalidInput(_)));
        assert_eq!(grid, before);

        let mut out = vec![9u8; 100];
        let ce = flat_channel(&cell);
        let err = ctx.decode(&grid, &ce, 0.0, &mut out, 0, &mut process, 0).unwrap_err();
        assert!(matches!(err, LayerError::InvalidInput(_)));
        assert!(out.iter().all(|&b| b == 9));
        assert!(process.soft_buffer().is_empty());
        assert!(ctx.scrambling_sequence(0).is_err());
    }

    #[test]
    fn test_capacity_and_code_rate_rejected() {
        let cell = cell(6);
        let mut ctx = PuschContext::new(cell).unwrap();
        ctx.bind_rnti(Rnti(0x46)).unwrap();
        let mut grid = ResourceGrid::for_cell(&cell).unwrap();
        let before = grid.clone();

        let oversized = harq(Modulation::Qpsk, 100, PrbAllocation::contiguous(0, 9));
        let err = ctx.encode(&[0; 100], &mut grid, 0, &oversized, 0).unwrap_err();
        assert!(matches!(err, LayerError::InvalidInput(_)));

        let too_many_bits = harq(Modulation::Qpsk, 300, PrbAllocation::contiguous(0, 1));
        match ctx.encode(&[0; 300], &mut grid, 0, &too_many_bits, 0) {
            Err(LayerError::InvalidInput(msg)) => assert!(msg.contains("1.042"), "{}", msg),
            other => panic!("unexpected result {:?}", other),
        }

        let bad_subframe = harq(Modulation::Qpsk, 100, PrbAllocation::contiguous(0, 1));
        assert!(ctx.encode(&[0; 100], &mut grid, 10, &bad_subframe, 0).is_err());
        assert_eq!(grid, before);
    }

    /// Codec that must never be reached
    struct UnreachableCodec;

    impl TransportCodec for UnreachableCodec {
        fn encode(
            &mut self,
            _data: &[u8],
            _uci: Option<&UciData>,
            _coded: &mut [u8],
            _harq: &HarqProcess,
            _rv: u32,
        ) -> Result<(), LayerError> {
            panic!("transport encoder called for a rejected allocation");
        }

        fn decode(
            &mut self,
            _llrs: &[f32],
            _data: &mut [u8],
            _tbs: usize,
            _nof_coded_bits: usize,
            _harq: &mut HarqProcess,
            _rv: u32,
            _uci: Option<&mut UciData>,
        ) -> Result<(), LayerError> {
            panic!("transport decoder called for a rejected allocation");
        }
    }

    #[test]
    fn test_rejections_precede_engine_calls() {
        let cell = cell(6);
        let mut ctx = PuschContext::new(cell).unwrap().with_codec(Box::new(UnreachableCodec));
        ctx.bind_rnti(Rnti(0x46)).unwrap();
        let ce = flat_channel(&cell);
        let mut grid = ResourceGrid::for_cell(&cell).unwrap();
        grid.fill(Complex32::new(0.5, 0.5));
        let before = grid.clone();

        let allocations = [
            PrbAllocation::contiguous(0, 9),
            PrbAllocation::contiguous(u32::MAX, 1),
            PrbAllocation::hopping(0, u32::MAX - 1, 2),
            PrbAllocation::contiguous(0, 7),
        ];
        for alloc in allocations {
            let mut process = harq(Modulation::Qpsk, 100, alloc);
            let err = ctx.encode(&[0; 100], &mut grid, 0, &process, 0).unwrap_err();
            assert!(matches!(err, LayerError::InvalidInput(_)), "{:?}: {}", alloc, err);

            let mut out = vec![3u8; 100];
            let err = ctx.decode(&grid, &ce, 0.0, &mut out, 0, &mut process, 0).unwrap_err();
            assert!(matches!(err, LayerError::InvalidInput(_)), "{:?}: {}", alloc, err);
            assert!(out.iter().all(|&b| b == 3));
        }
        assert_eq!(grid, before);
    }

    #[test]
    fn test_symbol_count_mismatch() {
        let cell = cell(6);
        let mut ctx = PuschContext::new(cell).unwrap();
        ctx.bind_rnti(Rnti(0x46)).unwrap();
        let mut grid = ResourceGrid::for_cell(&cell).unwrap();

        let extended = HarqProcess::new(
            Mcs { modulation: Modulation::Qpsk, tbs: 100 },
            PrbAllocation::contiguous(0, 2),
            CyclicPrefix::Extended,
        );
        let err = ctx.encode(&[0; 100], &mut grid, 1, &extended, 0).unwrap_err();
        assert_eq!(
            err,
            LayerError::SizeMismatch { expected: 2 * 2 * 12 * 5, actual: 2 * 2 * 12 * 6 }
        );
    }

    #[test]
    fn test_rebinding_regenerates_identical_sequences() {
        let mut ctx = PuschContext::new(cell(6)).unwrap();
        ctx.bind_rnti(Rnti(0x46)).unwrap();
        let first: Vec<Vec<u8>> = (0..10)
            .map(|sf| ctx.scrambling_sequence(sf).unwrap().to_vec())
            .collect();
        assert_eq!(first[0].len(), ctx.max_symbols() * 6);
        assert_ne!(first[0], first[1]);

        ctx.bind_rnti(Rnti(0x47)).unwrap();
        assert_ne!(ctx.scrambling_sequence(3).unwrap(), &first[3][..]);

        ctx.bind_rnti(Rnti(0x46)).unwrap();
        assert_eq!(ctx.rnti(), Some(Rnti(0x46)));
        for (sf, seq) in first.iter().enumerate() {
            assert_eq!(ctx.scrambling_sequence(sf).unwrap(), &seq[..]);
        }
    }

    #[test]
    fn test_end_to_end_qpsk() {
        let cell = cell(6);
        let mut ctx = PuschContext::new(cell).unwrap();
        ctx.bind_rnti(Rnti(0x46)).unwrap();

        let mut process = harq(Modulation::Qpsk, 600, PrbAllocation::contiguous(0, 6));
        assert_eq!(process.nof_symbols(), 864);
        assert_eq!(process.nof_coded_bits(), 1728);

        let data = random_bits(600, 3);
        let mut grid = ResourceGrid::for_cell(&cell).unwrap();
        ctx.encode(&data, &mut grid, 3, &process, 0).unwrap();

        // Reference symbols stay empty
        for slot in 0..2 {
            assert_eq!(grid.get_re(0, slot * 7 + 3), Some(Complex32::new(0.0, 0.0)));
        }

        let mut out = vec![0u8; 600];
        ctx.decode(&grid, &flat_channel(&cell), 0.0, &mut out, 3, &mut process, 0)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_noiseless_inverse_all_modulations() {
        let cell = cell(100);
        let mut ctx = PuschContext::new(cell).unwrap();
        ctx.bind_rnti(Rnti(0x1234)).unwrap();
        let ce = flat_channel(&cell);

        for (i, modulation) in Modulation::ALL.into_iter().enumerate() {
            for (first_prb, nof_prb) in [(37, 1), (0, 100)] {
                let alloc = PrbAllocation::contiguous(first_prb, nof_prb);
                let tbs = harq(modulation, 1, alloc).nof_coded_bits() / 3;
                let mut process = harq(modulation, tbs, alloc);
                let data = random_bits(tbs, i as u64 * 7 + nof_prb as u64);

                let mut grid = ResourceGrid::for_cell(&cell).unwrap();
                ctx.encode(&data, &mut grid, i, &process, 0).unwrap();

                let mut out = vec![0u8; tbs];
                ctx.decode(&grid, &ce, 0.0, &mut out, i, &mut process, 0)
                    .unwrap_or_else(|e| panic!("{} over {} PRB: {}", modulation, nof_prb, e));
                assert_eq!(out, data, "{} over {} PRB", modulation, nof_prb);
            }
        }
    }

    #[test]
    fn test_frequency_hopping_through_pipeline() {
        let cell = cell(15);
        let mut ctx = PuschContext::new(cell).unwrap();
        ctx.bind_rnti(Rnti(0x46)).unwrap();

        let mut process = harq(Modulation::Qam16, 500, PrbAllocation::hopping(1, 10, 4));
        let data = random_bits(500, 11);
        let mut grid = ResourceGrid::for_cell(&cell).unwrap();
        ctx.encode(&data, &mut grid, 7, &process, 0).unwrap();

        let mut out = vec![0u8; 500];
        ctx.decode(&grid, &flat_channel(&cell), 0.0, &mut out, 7, &mut process, 0)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_uci_roundtrip() {
        let cell = cell(6);
        let mut ctx = PuschContext::new(cell).unwrap();
        ctx.bind_rnti(Rnti(0x46)).unwrap();

        let mut process = harq(Modulation::Qpsk, 400, PrbAllocation::contiguous(2, 3));
        let data = random_bits(400, 5);
        let uci = UciData { cqi: vec![1, 1, 0, 1, 0, 0, 1, 0], ack: Some(1), ri: Some(0) };

        let mut grid = ResourceGrid::for_cell(&cell).unwrap();
        ctx.encode_with_uci(&data, Some(&uci), &mut grid, 2, &process, 0).unwrap();

        let mut received = UciData { cqi: vec![0; 8], ack: Some(0), ri: Some(1) };
        let mut out = vec![0u8; 400];
        ctx.decode_with_uci(
            &grid,
            &flat_channel(&cell),
            0.0,
            &mut out,
            Some(&mut received),
            2,
            &mut process,
            0,
        )
        .unwrap();
        assert_eq!(received, uci);
        assert_eq!(out, data);
    }

    #[test]
    fn test_retransmission_combines_soft_bits() {
        let cell = cell(6);
        let mut ctx = PuschContext::new(cell).unwrap();
        ctx.bind_rnti(Rnti(0x46)).unwrap();

        // One PRB of QPSK carries 288 coded bits, exactly one circular buffer
        let alloc = PrbAllocation::contiguous(0, 1);
        let mut process = harq(Modulation::Qpsk, 264, alloc);
        let mut data = random_bits(264, 17);
        data[0] = 1;

        // First SC-FDMA symbol erased: its 24 soft bits come out as zero
        let mut faded = flat_channel(&cell);
        for sc in 0..12 {
            faded.map_re(sc, 0, Complex32::new(0.0, 0.0)).unwrap();
        }

        let mut grid = ResourceGrid::for_cell(&cell).unwrap();
        let mut out = vec![5u8; 264];
        ctx.encode(&data, &mut grid, 4, &process, 0).unwrap();
        let err = ctx
            .decode(&grid, &faded, 0.0, &mut out, 4, &mut process, 0)
            .unwrap_err();
        assert!(err.is_retransmittable());
        assert!(out.iter().all(|&b| b == 5));

        ctx.encode(&data, &mut grid, 4, &process, 2).unwrap();
        ctx.decode(&grid, &flat_channel(&cell), 0.0, &mut out, 4, &mut process, 2)
            .unwrap();
        assert_eq!(out, data);
    }
}
