//! Frequency-domain AWGN channel
//!
//! PUSCH symbols have unit average power, so the noise variance per resource
//! element is N0 = 10^(-SNR/10), split evenly between I and Q.

use layers::phy::ResourceGrid;
use num_complex::Complex32;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub struct AwgnChannel {
    rng: StdRng,
    noise: Option<Normal<f32>>,
    n0: f32,
}

impl AwgnChannel {
    /// Noiseless when `snr_db` is `None`
    pub fn new(snr_db: Option<f32>, seed: u64) -> anyhow::Result<Self> {
        let (noise, n0) = match snr_db {
            Some(snr) => {
                let n0 = 10f32.powf(-snr / 10.0);
                let normal = Normal::new(0.0, (n0 / 2.0).sqrt())
                    .map_err(|e| anyhow::anyhow!("Invalid SNR {} dB: {}", snr, e))?;
                (Some(normal), n0)
            }
            None => (None, 0.0),
        };

        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            noise,
            n0,
        })
    }

    /// Noise variance per resource element, the receiver's noise estimate
    pub fn noise_variance(&self) -> f32 {
        self.n0
    }

    /// Add noise to every resource element of `grid`
    pub fn apply(&mut self, grid: &mut ResourceGrid) {
        let Some(noise) = self.noise else {
            return;
        };
        grid.map_inplace(|re| {
            *re += Complex32::new(noise.sample(&mut self.rng), noise.sample(&mut self.rng));
        });
    }
}
