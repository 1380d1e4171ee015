//! Dead-zone scalar quantization of wavelet coefficients.
//!
//! Samples are first normalized into `[-1/2, 1/2]` from the declared
//! `[lo, hi]` range, clamped into the guard interval, and mapped to
//! sign-magnitude integers with step `delta = 2^-exponent * (1 + mantissa/2048)`.
//! The sign bit sits immediately above the highest magnitude bit.

use std::cell::Cell;

use log::debug;

use crate::error::CodecError;

/// Exclusive limit.
const MAX_EXPONENT: u8 = 32;
/// Exclusive limit.
const MAX_MANTISSA: u16 = 1 << 11;
/// Inclusive limit.
const MAX_GUARD: u8 = 7;

pub struct Quantizer {
    exponent: u8,
    guard: u8,
    /// Mask extracting the sign bit of quantized values.
    sign_mask: u32,
    /// Largest representable magnitude.
    max_magnitude: u32,
    /// Interval samples are clamped into before quantizing.
    lower_guard: f32,
    upper_guard: f32,
    delta: f32,
    sample_lower_limit: f32,
    sample_interval_length: f32,
    reconstruction_offset: f32,
    /// Saturation events observed while quantizing (not an error).
    clamped: Cell<u64>,
}

impl Quantizer {
    /// Build a quantizer.
    ///
    /// `exponent` fixes the coarse step size (and with `guard` the number of
    /// magnitude bits), `mantissa` refines the step in 1/2048 increments,
    /// `guard` adds headroom for samples exceeding the declared
    /// `[sample_lower_limit, sample_upper_limit]` range, and
    /// `reconstruction_offset` shifts dequantized values inside their
    /// interval (0.5 rounds to the centre; 0.375 suits peaked distributions).
    pub fn new(
        exponent: u8,
        mantissa: u16,
        guard: u8,
        sample_lower_limit: f32,
        sample_upper_limit: f32,
        reconstruction_offset: f32,
    ) -> Result<Self, CodecError> {
        if exponent >= MAX_EXPONENT {
            return Err(CodecError::InvalidExponent(exponent));
        }
        if mantissa >= MAX_MANTISSA {
            return Err(CodecError::InvalidMantissa(mantissa));
        }
        if guard > MAX_GUARD {
            return Err(CodecError::InvalidGuard(guard));
        }
        if exponent == 0 && guard == 0 {
            return Err(CodecError::DegenerateQuantizer);
        }
        // the sign bit must still fit a 32-bit sign-magnitude coefficient
        if exponent + guard > 32 {
            return Err(CodecError::InvalidBitDepth(exponent + guard));
        }
        if sample_lower_limit >= sample_upper_limit {
            return Err(CodecError::InvalidSampleLimits(
                sample_lower_limit,
                sample_upper_limit,
            ));
        }
        if !(-1.0..=1.0).contains(&reconstruction_offset) {
            return Err(CodecError::InvalidReconstructionOffset(
                reconstruction_offset,
            ));
        }

        let magnitude_bitplanes = (exponent + guard).saturating_sub(1) as u32;
        let sign_mask = 1u32 << magnitude_bitplanes;
        let (lower_guard, upper_guard) = if guard == 0 {
            (-0.5, 0.5)
        } else {
            let bound = (1u32 << (guard - 1)) as f32;
            (-bound, bound)
        };
        let exp_factor = 1.0 / (1u64 << exponent) as f32;
        let delta = exp_factor * (1.0 + mantissa as f32 / MAX_MANTISSA as f32);

        Ok(Self {
            exponent,
            guard,
            sign_mask,
            max_magnitude: sign_mask - 1,
            lower_guard,
            upper_guard,
            delta,
            sample_lower_limit,
            sample_interval_length: sample_upper_limit - sample_lower_limit,
            reconstruction_offset,
            clamped: Cell::new(0),
        })
    }

    /// Number of magnitude bits in quantized values; the sign bit lives at
    /// this position.
    pub fn magnitude_bitplanes(&self) -> u8 {
        (self.exponent + self.guard).saturating_sub(1)
    }

    /// Quantization step size.
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Worst-case reconstruction error in denormalized sample units.
    pub fn error_bound(&self) -> f32 {
        self.delta * self.sample_interval_length
    }

    /// Normalize a sample into `[-1/2, 1/2]` and quantize it to
    /// sign-magnitude form. Never fails: out-of-guard samples clamp.
    pub fn quantize(&self, input: f32) -> u32 {
        let normalized = (input - self.sample_lower_limit) / self.sample_interval_length - 0.5;
        let bounded = normalized.max(self.lower_guard).min(self.upper_guard);
        if bounded != normalized {
            self.clamped.set(self.clamped.get() + 1);
        }
        let sign = if bounded < 0.0 { 1u32 } else { 0u32 };
        // min() covers the guard interval's upper edge rounding into one
        // magnitude step too many.
        let magnitude = ((bounded.abs() / self.delta).floor() as u32).min(self.max_magnitude);
        if magnitude == 0 {
            // canonical zero: a bare sign bit cannot travel through the
            // bitplane coder
            return 0;
        }
        magnitude | (sign << self.magnitude_bitplanes())
    }

    /// Invert [`Self::quantize`] up to the quantization error: zero maps to
    /// zero, everything else reconstructs at `(magnitude + offset) * delta`.
    pub fn dequantize(&self, input: u32) -> f32 {
        let value = if input == 0 {
            0.0
        } else {
            let magnitude = (input & !self.sign_mask) as f32;
            let reconstructed = (magnitude + self.reconstruction_offset) * self.delta;
            if input & self.sign_mask != 0 {
                -reconstructed
            } else {
                reconstructed
            }
        };
        (value + 0.5) * self.sample_interval_length + self.sample_lower_limit
    }

    /// Report and reset the saturation counter.
    pub fn take_saturation_count(&self) -> u64 {
        let count = self.clamped.replace(0);
        if count > 0 {
            debug!("{count} samples exceeded the guard interval and were clamped");
        }
        count
    }
}
