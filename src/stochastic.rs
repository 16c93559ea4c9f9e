//! Stochastic-computing arithmetic emulation.
//!
//! A stochastic number is a fixed-length bitstream: the last bit is the sign, the preceding
//! `L - 1` bits are the magnitude, and the represented magnitude is the fraction of set
//! magnitude bits. Multiplication is a bitwise AND of two independent streams (plus XOR of
//! the signs); addition is a random multiplexer over the input streams.
//!
//! Nothing here is wired into [`crate::Network`]. The emulation is used to pick a bitstream
//! length before committing to a hardware arithmetic unit; see [`precision_study`].

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::{Error, Result};

/// Bitstream length used by the hardware design, and the fixed-point scale of exported
/// weights.
pub const DEFAULT_BITSTREAM_LENGTH: usize = 1024;

/// Operand pairs used to compare stochastic against exact multiplication, covering both
/// signs and magnitudes down to ~1e-7.
pub const REFERENCE_PAIRS: [(f64, f64); 8] = [
    (0.5531, 0.6249),
    (0.864, -0.543),
    (-0.85978, 0.56807),
    (-0.76974, -0.68908),
    (0.0000125, 0.0000356),
    (0.00000035342, -0.00000035596),
    (-0.0025021, 0.035905),
    (-0.10944, -0.096046),
];

/// Magnitude bits followed by one sign bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitstream {
    bits: Vec<bool>,
}

impl Bitstream {
    /// Wrap raw bits; the last bit is the sign. At least one magnitude bit is required.
    pub fn from_bits(bits: Vec<bool>) -> Result<Self> {
        if bits.len() < 2 {
            return Err(Error::InvalidConfig(format!(
                "bitstream needs a magnitude bit and a sign bit, got {} bit(s)",
                bits.len()
            )));
        }
        Ok(Self { bits })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    #[inline]
    pub fn sign(&self) -> bool {
        self.bits[self.bits.len() - 1]
    }

    #[inline]
    pub fn magnitude_bits(&self) -> &[bool] {
        &self.bits[..self.bits.len() - 1]
    }

    /// Number of set magnitude bits; the sign bit is not counted.
    #[inline]
    pub fn ones(&self) -> usize {
        self.magnitude_bits().iter().filter(|&&b| b).count()
    }

    pub fn decode(&self) -> f64 {
        let magnitude = self.ones() as f64 / (self.bits.len() - 1) as f64;
        if self.sign() { -magnitude } else { magnitude }
    }

    /// AND-gate multiplier: magnitude bits are ANDed pairwise, signs are XORed.
    pub fn and(&self, other: &Bitstream) -> Result<Bitstream> {
        if self.len() != other.len() {
            return Err(Error::InvalidConfig(format!(
                "bitstream lengths differ: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        let mut bits: Vec<bool> = self
            .magnitude_bits()
            .iter()
            .zip(other.magnitude_bits())
            .map(|(&a, &b)| a && b)
            .collect();
        bits.push(self.sign() ^ other.sign());
        Ok(Bitstream { bits })
    }
}

/// Stochastic arithmetic over bitstreams of a fixed length, driven by an owned RNG.
#[derive(Debug, Clone)]
pub struct StochasticArithmetic<R = StdRng> {
    length: usize,
    rng: R,
}

impl StochasticArithmetic<StdRng> {
    pub fn with_seed(length: usize, seed: u64) -> Result<Self> {
        Self::new(length, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> StochasticArithmetic<R> {
    pub fn new(length: usize, rng: R) -> Result<Self> {
        if length < 2 {
            return Err(Error::InvalidConfig(format!(
                "bitstream length must be >= 2, got {length}"
            )));
        }
        Ok(Self { length, rng })
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Smallest non-zero magnitude a stream of this length can represent.
    #[inline]
    pub fn resolution(&self) -> f64 {
        1.0 / (self.length - 1) as f64
    }

    /// Encode `x ∈ [-1, 1]`: `round(|x| * (L-1))` set bits in a uniformly shuffled
    /// magnitude, then the sign bit.
    pub fn encode(&mut self, x: f64) -> Result<Bitstream> {
        if !(x.is_finite() && x.abs() <= 1.0) {
            return Err(Error::OutOfRange(x));
        }
        let magnitude_len = self.length - 1;
        let ones = (x.abs() * magnitude_len as f64).round() as usize;

        let mut bits = vec![false; self.length];
        bits[..ones].fill(true);
        bits[..magnitude_len].shuffle(&mut self.rng);
        bits[magnitude_len] = x < 0.0;
        Ok(Bitstream { bits })
    }

    #[inline]
    pub fn decode(&self, stream: &Bitstream) -> f64 {
        stream.decode()
    }

    /// Multiply two reals in `[-1, 1]` through an emulated AND-gate multiplier.
    ///
    /// Each operand is doubled until its magnitude reaches `0.5` (a logical shift left in
    /// hardware), the streams are multiplied, and the product is shifted back right by the
    /// total shift count.
    pub fn multiply(&mut self, x: f64, y: f64) -> Result<f64> {
        for v in [x, y] {
            if !(v.is_finite() && v.abs() <= 1.0) {
                return Err(Error::OutOfRange(v));
            }
        }
        if x == 0.0 || y == 0.0 {
            return Ok(0.0);
        }

        let (x, x_shifts) = prescale(x);
        let (y, y_shifts) = prescale(y);

        let a = self.encode(x)?;
        let b = self.encode(y)?;
        let product = a.and(&b)?.decode();

        Ok(product / 2f64.powi(x_shifts) / 2f64.powi(y_shifts))
    }

    /// Add reals in `[-1, 1]` through an emulated multiplexer adder.
    ///
    /// For each bit position, `samples` input streams are picked uniformly at random and the
    /// output bit is the majority of their bits at that position (ties count as set). The
    /// sign position is voted like any other. The decoded result is scaled back up by the
    /// number of inputs.
    pub fn sum(&mut self, values: &[f64], samples: usize) -> Result<f64> {
        if values.is_empty() {
            return Err(Error::InvalidConfig(
                "cannot sum an empty sequence of values".to_owned(),
            ));
        }
        if samples == 0 {
            return Err(Error::InvalidConfig("samples must be > 0".to_owned()));
        }

        let streams = values
            .iter()
            .map(|&v| self.encode(v))
            .collect::<Result<Vec<_>>>()?;

        let mut bits = Vec::with_capacity(self.length);
        for pos in 0..self.length {
            let mut ones = 0;
            for _ in 0..samples {
                let pick = self.rng.gen_range(0..streams.len());
                if streams[pick].bits[pos] {
                    ones += 1;
                }
            }
            bits.push(majority(ones, samples));
        }

        Ok(Bitstream { bits }.decode() * values.len() as f64)
    }

    /// Mean relative error of [`Self::multiply`] against the exact product over `pairs`,
    /// averaged across `trials` repetitions. Pairs with an exact product of zero are skipped.
    pub fn multiply_error(&mut self, pairs: &[(f64, f64)], trials: usize) -> Result<f64> {
        if trials == 0 {
            return Err(Error::InvalidConfig("trials must be > 0".to_owned()));
        }
        let mut total = 0.0;
        let mut count = 0usize;
        for &(a, b) in pairs {
            let exact = a * b;
            if exact == 0.0 {
                continue;
            }
            for _ in 0..trials {
                let approx = self.multiply(a, b)?;
                total += ((approx - exact) / exact).abs();
                count += 1;
            }
        }
        if count == 0 {
            return Err(Error::InvalidConfig(
                "no operand pair with a non-zero product".to_owned(),
            ));
        }
        Ok(total / count as f64)
    }
}

/// Doubles `x` until `2|x| >= 1`, returning the scaled value and the shift count.
fn prescale(mut x: f64) -> (f64, i32) {
    let mut shifts = 0;
    while 2.0 * x.abs() < 1.0 {
        x *= 2.0;
        shifts += 1;
    }
    (x, shifts)
}

#[inline]
pub(crate) fn majority(ones: usize, samples: usize) -> bool {
    2 * ones >= samples
}

/// Result of one bitstream length in a [`precision_study`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudyPoint {
    pub length: usize,
    pub mean_relative_error: f64,
}

/// Mean relative multiplication error for each candidate bitstream length.
///
/// Every length gets its own generator seeded from `seed`, so points are independent of the
/// order of `lengths`.
pub fn precision_study(
    lengths: &[usize],
    pairs: &[(f64, f64)],
    trials: usize,
    seed: u64,
) -> Result<Vec<StudyPoint>> {
    lengths
        .iter()
        .map(|&length| {
            let mut sc = StochasticArithmetic::with_seed(length, seed)?;
            let mean_relative_error = sc.multiply_error(pairs, trials)?;
            log::debug!("bitstream length {length}: mean relative error {mean_relative_error:.6}");
            Ok(StudyPoint {
                length,
                mean_relative_error,
            })
        })
        .collect()
}
