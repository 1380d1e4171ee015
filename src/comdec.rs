//! Compression pipeline glue.
//!
//! `Compressor` sequences reduce -> wavelet -> quantize -> block ->
//! entropy-code and frames each code block with a byte-length prefix;
//! `Decompressor` replays the sequence in reverse from the same
//! `ComParameters` block at the head of the stream. Everything the decoder
//! needs besides the image header travels in the stream.

use log::debug;

use crate::bits::{BitReader, BitWriter};
use crate::blocker::{Blocker, DEFAULT_EXPECTED_DIM, DEFAULT_MAX_BLOCK_DIM};
use crate::ebc::{CodingBlock, EbCoder, EbDecoder};
use crate::error::CodecError;
use crate::image::{HyperspectralImage, ImageHeader, SampleType};
use crate::matrix::{IntegerMatrix, Matrix};
use crate::quantizer::Quantizer;
use crate::reduction::{DimensionalityReduction, FloatCube};
use crate::wavelet;

/// Everything the decoder must recover before the first code block:
/// wavelet depth, quantizer setup, block geometry and the sample range the
/// quantizer normalizes against.
#[derive(Debug, Clone, PartialEq)]
pub struct ComParameters {
    pub wave_steps: u8,
    pub exponent: u8,
    pub mantissa: u16,
    pub guard: u8,
    pub reconstruction_offset: f32,
    pub expected_block_dim: u16,
    pub max_block_dim: u16,
    pub sample_lower_limit: f32,
    pub sample_upper_limit: f32,
}

impl ComParameters {
    pub fn save_to(&self, writer: &mut BitWriter) {
        writer.write_byte(self.wave_steps);
        writer.write_byte(self.exponent);
        writer.write_u16(self.mantissa);
        writer.write_byte(self.guard);
        writer.write_f32(self.reconstruction_offset);
        writer.write_u16(self.expected_block_dim);
        writer.write_u16(self.max_block_dim);
        writer.write_f32(self.sample_lower_limit);
        writer.write_f32(self.sample_upper_limit);
    }

    pub fn load_from(reader: &mut BitReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            wave_steps: reader.read_byte()?,
            exponent: reader.read_byte()?,
            mantissa: reader.read_u16()?,
            guard: reader.read_byte()?,
            reconstruction_offset: reader.read_f32()?,
            expected_block_dim: reader.read_u16()?,
            max_block_dim: reader.read_u16()?,
            sample_lower_limit: reader.read_f32()?,
            sample_upper_limit: reader.read_f32()?,
        })
    }

    pub fn quantizer(&self) -> Result<Quantizer, CodecError> {
        Quantizer::new(
            self.exponent,
            self.mantissa,
            self.guard,
            self.sample_lower_limit,
            self.sample_upper_limit,
            self.reconstruction_offset,
        )
    }

    /// Code-block depth: the quantizer's magnitude planes plus the sign,
    /// which works out to `exponent + guard`.
    pub fn block_depth(&self) -> Result<u8, CodecError> {
        let depth = self.exponent.saturating_add(self.guard);
        if depth < 2 {
            return Err(CodecError::NotEnoughBitplanes);
        }
        if depth > 32 {
            return Err(CodecError::InvalidBitDepth(depth));
        }
        Ok(depth)
    }

    fn blocker(&self, lines: usize, samples: usize) -> Result<Blocker, CodecError> {
        Blocker::new(
            lines,
            samples,
            self.wave_steps as usize,
            self.expected_block_dim as usize,
            self.max_block_dim as usize,
        )
    }
}

/// Compression settings. `exponent: None` sizes the quantizer from the
/// reduced sample range, one magnitude bit per bit of integer range.
#[derive(Debug, Clone)]
pub struct Compressor {
    pub wave_steps: u8,
    pub exponent: Option<u8>,
    pub mantissa: u16,
    pub guard: u8,
    pub reconstruction_offset: f32,
    pub expected_block_dim: u16,
    pub max_block_dim: u16,
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            wave_steps: 3,
            exponent: None,
            mantissa: 0,
            // headroom for detail coefficients overshooting the declared
            // sample range
            guard: 4,
            reconstruction_offset: 0.375,
            expected_block_dim: DEFAULT_EXPECTED_DIM as u16,
            max_block_dim: DEFAULT_MAX_BLOCK_DIM as u16,
        }
    }
}

impl Compressor {
    /// Compress `image` into `writer`: parameter block, reducer state, then
    /// per reduced band the length-prefixed code blocks in blocker order.
    pub fn compress(
        &self,
        image: &HyperspectralImage,
        reduction: &mut DimensionalityReduction,
        writer: &mut BitWriter,
    ) -> Result<(), CodecError> {
        reduction.train(image)?;
        let lo = reduction.min_value(image)? as f32;
        let hi = reduction.max_value(image)? as f32;
        let exponent = match self.exponent {
            Some(exponent) => exponent,
            None => derived_exponent(lo, hi, self.guard)?,
        };

        let params = ComParameters {
            wave_steps: self.wave_steps,
            exponent,
            mantissa: self.mantissa,
            guard: self.guard,
            reconstruction_offset: self.reconstruction_offset,
            expected_block_dim: self.expected_block_dim,
            max_block_dim: self.max_block_dim,
            sample_lower_limit: lo,
            sample_upper_limit: hi,
        };
        let quantizer = params.quantizer()?;
        let depth = params.block_depth()?;
        let lines = image.lines();
        let samples = image.samples();
        let blocker = params.blocker(lines, samples)?;

        params.save_to(writer);
        reduction.save_to(writer)?;

        let cube = reduction.reduce(image)?;
        let mut coder = EbCoder::new();
        for band in 0..cube.bands() {
            let mut wave = cube.band(band).to_vec();
            wavelet::forward_2d(&mut wave, lines, samples, params.wave_steps as usize);

            let mut coefficients = Matrix::zeros(lines, samples);
            for line in 0..lines {
                for sample in 0..samples {
                    coefficients.set(
                        quantizer.quantize(wave[line * samples + sample]),
                        line,
                        sample,
                    );
                }
            }

            for descriptor in blocker.blocks() {
                let mut block =
                    CodingBlock::from_descriptor(&mut coefficients, descriptor, depth)?;
                let coded = coder.code(&mut block)?;
                writer.write_u32(coded.len() as u32);
                writer.write_bytes(&coded);
            }
            quantizer.take_saturation_count();
            debug!("coded band {band} in {} blocks", blocker.blocks().len());
        }
        Ok(())
    }
}

pub struct Decompressor;

impl Decompressor {
    /// Decode a stream produced by [`Compressor::compress`]. The image
    /// header comes from the collaborator that stored it.
    pub fn decompress(
        header: &ImageHeader,
        reader: &mut BitReader<'_>,
    ) -> Result<HyperspectralImage, CodecError> {
        let params = ComParameters::load_from(reader)?;
        let reduction = DimensionalityReduction::load_from(reader)?;
        let quantizer = params.quantizer()?;
        let depth = params.block_depth()?;
        let lines = header.lines;
        let samples = header.samples;
        let blocker = params.blocker(lines, samples)?;

        let components = reduction.num_components()?;
        let mut cube = FloatCube::zeros(components, lines, samples);
        let mut decoder = EbDecoder::new();
        for band in 0..components {
            let mut coefficients = Matrix::zeros(lines, samples);
            for descriptor in blocker.blocks() {
                let length = reader.read_u32()? as usize;
                let coded = reader.read_bytes(length)?;
                let mut block =
                    CodingBlock::from_descriptor(&mut coefficients, descriptor, depth)?;
                decoder.decode(&coded, &mut block)?;
            }

            let wave = cube.band_mut(band);
            for line in 0..lines {
                for sample in 0..samples {
                    wave[line * samples + sample] =
                        quantizer.dequantize(coefficients.get(line, sample));
                }
            }
            wavelet::inverse_2d(wave, lines, samples, params.wave_steps as usize);
            debug!("decoded band {band}");
        }

        let mut image = HyperspectralImage::zeros(header);
        reduction.boost(&cube, &mut image)?;
        Ok(image)
    }
}

/// One magnitude bit per bit of the recomputed post-reduction sample type,
/// capped so the total depth (with the guard bits) stays in a 32-bit
/// coefficient.
fn derived_exponent(lo: f32, hi: f32, guard: u8) -> Result<u8, CodecError> {
    let max_abs = lo.abs().max(hi.abs()) as f64;
    let reduced_type = SampleType::fit(max_abs, true)?;
    let magnitude_bits = (reduced_type.bit_depth() - 1) as i64;
    let cap = (32 - guard.min(31) as i64).max(1);
    Ok(magnitude_bits.clamp(1, cap) as u8)
}
