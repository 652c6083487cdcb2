/// Uplink shared channel transport processing
/// Based on 3GPP TS 36.212 Section 5.2.2
///
/// [`TransportCodec`] is the seam between the PUSCH pipeline and the channel
/// coder. [`Ulsch`] is the reference codec: CRC-24A attachment, circular-buffer
/// repetition rate matching with redundancy-version start points, HARQ soft
/// combining, and a repetition-coded UCI prefix. It carries no turbo code.

use crate::LayerError;
use common::utils::{crc24a_bits, crc24_to_bits, CRC24_LEN};
use tracing::{debug, trace};

use super::harq::HarqProcess;

/// Number of redundancy versions
pub const NOF_RV: u32 = 4;

/// Coded bits spent on every UCI bit
pub const UCI_REPETITION: usize = 4;

/// Uplink control information multiplexed on PUSCH
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UciData {
    /// Channel quality bits
    pub cqi: Vec<u8>,
    /// HARQ-ACK bit
    pub ack: Option<u8>,
    /// Rank indicator bit
    pub ri: Option<u8>,
}

impl UciData {
    /// Total UCI payload bits
    pub fn nof_bits(&self) -> usize {
        self.cqi.len() + self.ack.is_some() as usize + self.ri.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.nof_bits() == 0
    }

    /// Coded bits occupied on PUSCH
    pub fn nof_coded_bits(&self) -> usize {
        self.nof_bits() * UCI_REPETITION
    }

    fn bits(&self) -> impl Iterator<Item = u8> + '_ {
        self.cqi.iter().copied().chain(self.ack).chain(self.ri)
    }

    fn bits_mut(&mut self) -> impl Iterator<Item = &mut u8> + '_ {
        self.cqi.iter_mut().chain(self.ack.iter_mut()).chain(self.ri.iter_mut())
    }
}

/// Transport channel encoder/decoder with HARQ
pub trait TransportCodec: Send {
    /// Encode `harq.mcs.tbs` data bits (plus optional UCI) into exactly `coded.len()` bits
    fn encode(
        &mut self,
        data: &[u8],
        uci: Option<&UciData>,
        coded: &mut [u8],
        harq: &HarqProcess,
        rv: u32,
    ) -> Result<(), LayerError>;

    /// Combine `llrs` into the HARQ buffer and decode `tbs` bits into `data`
    ///
    /// `data` is written only when the transport block passes its CRC. When `uci`
    /// is given its field sizes select the UCI layout and its values are overwritten.
    #[allow(clippy::too_many_arguments)]
    fn decode(
        &mut self,
        llrs: &[f32],
        data: &mut [u8],
        tbs: usize,
        nof_coded_bits: usize,
        harq: &mut HarqProcess,
        rv: u32,
        uci: Option<&mut UciData>,
    ) -> Result<(), LayerError>;
}

/// Start of the redundancy version within a circular buffer of `k` bits
pub fn rv_offset(rv: u32, k: usize) -> usize {
    rv as usize * k / NOF_RV as usize
}

/// Reference ULSCH codec
pub struct Ulsch {
    /// Circular buffer: transport block followed by its CRC
    w: Vec<u8>,
}

impl Ulsch {
    /// Create a codec whose buffers fit `max_coded_bits`
    pub fn new(max_coded_bits: usize) -> Self {
        Self {
            w: Vec::with_capacity(max_coded_bits + CRC24_LEN),
        }
    }

    fn check_rv(rv: u32) -> Result<(), LayerError> {
        if rv >= NOF_RV {
            return Err(LayerError::InvalidInput(format!("Invalid redundancy version {}", rv)));
        }
        Ok(())
    }

    fn check_uci_space(uci_len: usize, nof_coded_bits: usize) -> Result<(), LayerError> {
        if uci_len >= nof_coded_bits {
            return Err(LayerError::InvalidInput(format!(
                "UCI needs {} of {} coded bits, no room left for data",
                uci_len, nof_coded_bits
            )));
        }
        Ok(())
    }
}

impl TransportCodec for Ulsch {
    fn encode(
        &mut self,
        data: &[u8],
        uci: Option<&UciData>,
        coded: &mut [u8],
        harq: &HarqProcess,
        rv: u32,
    ) -> Result<(), LayerError> {
        Self::check_rv(rv)?;
        let tbs = harq.mcs.tbs;
        if tbs == 0 || data.len() < tbs {
            return Err(LayerError::InvalidInput(format!(
                "Transport block of {} bits needs {} input bits, got {}",
                tbs,
                tbs,
                data.len()
            )));
        }

        let uci_len = uci.map(UciData::nof_coded_bits).unwrap_or(0);
        Self::check_uci_space(uci_len, coded.len())?;

        let k = tbs + CRC24_LEN;
        self.w.clear();
        self.w.extend(data[..tbs].iter().map(|b| b & 1));
        self.w.resize(k, 0);
        let crc = crc24a_bits(&self.w[..tbs]);
        crc24_to_bits(crc, &mut self.w[tbs..]);

        if let Some(uci) = uci {
            for (chunk, bit) in coded[..uci_len].chunks_exact_mut(UCI_REPETITION).zip(uci.bits()) {
                chunk.fill(bit & 1);
            }
        }

        let k0 = rv_offset(rv, k);
        for (i, e) in coded[uci_len..].iter_mut().enumerate() {
            *e = self.w[(k0 + i) % k];
        }

        debug!(
            "ULSCH encoded TBS={} K={} E={} UCI={} rv={} crc=0x{:06x}",
            tbs,
            k,
            coded.len(),
            uci_len,
            rv,
            crc
        );
        Ok(())
    }

    fn decode(
        &mut self,
        llrs: &[f32],
        data: &mut [u8],
        tbs: usize,
        nof_coded_bits: usize,
        harq: &mut HarqProcess,
        rv: u32,
        uci: Option<&mut UciData>,
    ) -> Result<(), LayerError> {
        Self::check_rv(rv)?;
        if tbs == 0 || data.len() < tbs {
            return Err(LayerError::InvalidInput(format!(
                "Transport block of {} bits does not fit output of {} bits",
                tbs,
                data.len()
            )));
        }
        if llrs.len() < nof_coded_bits {
            return Err(LayerError::InvalidInput(format!(
                "Expected {} soft bits, got {}",
                nof_coded_bits,
                llrs.len()
            )));
        }
        let llrs = &llrs[..nof_coded_bits];

        let uci_len = uci.as_ref().map(|u| u.nof_coded_bits()).unwrap_or(0);
        Self::check_uci_space(uci_len, nof_coded_bits)?;

        if let Some(uci) = uci {
            for (bit, chunk) in uci.bits_mut().zip(llrs[..uci_len].chunks_exact(UCI_REPETITION)) {
                *bit = (chunk.iter().sum::<f32>() < 0.0) as u8;
            }
        }

        let k = tbs + CRC24_LEN;
        if harq.soft_buffer.len() != k {
            harq.soft_buffer.clear();
            harq.soft_buffer.resize(k, 0.0);
        } else if rv == 0 {
            harq.reset();
        }

        let k0 = rv_offset(rv, k);
        for (i, &llr) in llrs[uci_len..].iter().enumerate() {
            harq.soft_buffer[(k0 + i) % k] += llr;
        }

        self.w.clear();
        self.w.extend(harq.soft_buffer.iter().map(|&v| (v < 0.0) as u8));

        if crc24a_bits(&self.w) != 0 {
            trace!("ULSCH CRC mismatch TBS={} rv={}", tbs, rv);
            return Err(LayerError::TransportDecodeFailure(format!(
                "CRC mismatch for TBS={} rv={}",
                tbs, rv
            )));
        }

        data[..tbs].copy_from_slice(&self.w[..tbs]);
        debug!("ULSCH decoded TBS={} E={} rv={}", tbs, nof_coded_bits, rv);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::harq::{Mcs, PrbAllocation};
    use common::types::{CyclicPrefix, Modulation};

    fn harq(tbs: usize) -> HarqProcess {
        HarqProcess::new(
            Mcs { modulation: Modulation::Bpsk, tbs },
            PrbAllocation::contiguous(0, 1),
            CyclicPrefix::Normal,
        )
    }

    fn to_llrs(bits: &[u8], magnitude: f32) -> Vec<f32> {
        bits.iter().map(|&b| if b == 0 { magnitude } else { -magnitude }).collect()
    }

    fn payload(n: usize) -> Vec<u8> {
        (0..n).map(|i| ((i * 5 + 1) % 3 == 0) as u8).collect()
    }

    #[test]
    fn test_rv_offsets() {
        assert_eq!(rv_offset(0, 64), 0);
        assert_eq!(rv_offset(2, 64), 32);
        assert_eq!(rv_offset(3, 100), 75);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut codec = Ulsch::new(144);
        let mut process = harq(96);
        let data = payload(96);
        let mut coded = vec![0u8; 144];
        codec.encode(&data, None, &mut coded, &process, 0).unwrap();
        // Systematic bits lead the circular buffer
        assert_eq!(&coded[..96], &data[..]);

        let mut out = vec![0u8; 96];
        codec
            .decode(&to_llrs(&coded, 1.0), &mut out, 96, 144, &mut process, 0, None)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_harq_combining_recovers_after_failure() {
        let mut codec = Ulsch::new(64);
        let mut process = harq(40);
        let data = payload(40);
        let mut out = vec![7u8; 40];

        let mut coded = vec![0u8; 64];
        codec.encode(&data, None, &mut coded, &process, 0).unwrap();
        let mut llrs = to_llrs(&coded, 1.0);
        llrs[5] = -llrs[5];
        let err = codec.decode(&llrs, &mut out, 40, 64, &mut process, 0, None).unwrap_err();
        assert!(err.is_retransmittable());
        assert!(out.iter().all(|&b| b == 7));

        codec.encode(&data, None, &mut coded, &process, 2).unwrap();
        codec
            .decode(&to_llrs(&coded, 2.0), &mut out, 40, 64, &mut process, 2, None)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_new_transmission_clears_soft_buffer() {
        let mut codec = Ulsch::new(64);
        let mut process = harq(40);
        let mut coded = vec![0u8; 64];
        codec.encode(&payload(40), None, &mut coded, &process, 0).unwrap();
        let mut out = vec![0u8; 40];
        codec.decode(&to_llrs(&coded, 1.0), &mut out, 40, 64, &mut process, 0, None).unwrap();
        assert!(process.soft_buffer().iter().all(|v| v.abs() == 1.0));

        codec.decode(&to_llrs(&coded, 1.0), &mut out, 40, 64, &mut process, 0, None).unwrap();
        assert!(process.soft_buffer().iter().all(|v| v.abs() == 1.0));
    }

    #[test]
    fn test_uci_multiplexing() {
        let mut codec = Ulsch::new(144);
        let mut process = harq(64);
        let data = payload(64);
        let uci = UciData { cqi: vec![1, 0, 1, 1], ack: Some(1), ri: None };
        let mut coded = vec![0u8; 144];
        codec.encode(&data, Some(&uci), &mut coded, &process, 0).unwrap();
        assert_eq!(&coded[..4], &[1, 1, 1, 1]);

        let mut received = UciData { cqi: vec![0; 4], ack: Some(0), ri: None };
        let mut out = vec![0u8; 64];
        codec
            .decode(&to_llrs(&coded, 1.0), &mut out, 64, 144, &mut process, 0, Some(&mut received))
            .unwrap();
        assert_eq!(received, uci);
        assert_eq!(out, data);
    }

    #[test]
    fn test_invalid_arguments() {
        let mut codec = Ulsch::new(16);
        let process = harq(8);
        let mut coded = vec![0u8; 16];
        assert!(codec.encode(&[0; 8], None, &mut coded, &process, 4).is_err());
        assert!(codec.encode(&[0; 4], None, &mut coded, &process, 0).is_err());

        let big_uci = UciData { cqi: vec![0; 4], ..Default::default() };
        assert!(codec.encode(&[0; 8], Some(&big_uci), &mut coded, &process, 0).is_err());
    }
}
