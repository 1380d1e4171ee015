//! Hyperspectral image storage and band views.
//!
//! An image is a band-major integer cube `(bands, lines, samples)` of a
//! declared [`SampleType`]. Bands are exposed as 2-D views; the mutable view
//! writes decoded floats back into integer storage, clamping to the sample
//! type's range (saturation is counted and logged, never an error).

use log::debug;

use crate::error::CodecError;

/// Bit depth and signedness of the samples in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleType {
    bit_depth: u8,
    signed: bool,
}

impl SampleType {
    pub fn new(bit_depth: u8, signed: bool) -> Result<Self, CodecError> {
        if !(2..=32).contains(&bit_depth) {
            return Err(CodecError::InvalidBitDepth(bit_depth));
        }
        Ok(Self { bit_depth, signed })
    }

    /// Smallest type whose range covers `[-max_abs, max_abs]` (signed) or
    /// `[0, max_abs]` (unsigned). Used to recompute the depth after the
    /// spectral projection widens the sample range.
    pub fn fit(max_abs: f64, signed: bool) -> Result<Self, CodecError> {
        // the representable maximum is 2^bits - 1, so covering an exact
        // power of two needs one more bit
        let magnitude_bits = (max_abs.abs().max(1.0) + 1.0).log2().ceil() as u8;
        let depth = magnitude_bits + if signed { 1 } else { 0 };
        Self::new(depth.clamp(2, 32), signed)
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn signed(&self) -> bool {
        self.signed
    }

    pub fn min_value(&self) -> f64 {
        if self.signed {
            -(2f64.powi(self.bit_depth as i32 - 1))
        } else {
            0.0
        }
    }

    pub fn max_value(&self) -> f64 {
        if self.signed {
            2f64.powi(self.bit_depth as i32 - 1) - 1.0
        } else {
            2f64.powi(self.bit_depth as i32) - 1.0
        }
    }

    /// Largest absolute value the type can represent.
    pub fn max_magnitude(&self) -> f64 {
        self.min_value().abs().max(self.max_value())
    }

    /// Round to the nearest representable sample, reporting whether the
    /// input had to be clamped into range.
    pub(crate) fn to_sample(&self, value: f64) -> (i32, bool) {
        let rounded = value.round();
        let clamped = rounded
            .max(self.min_value())
            .min(self.max_value())
            .max(i32::MIN as f64)
            .min(i32::MAX as f64);
        (clamped as i32, clamped != rounded)
    }
}

/// Image geometry and sample type as provided by the header collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub bands: usize,
    pub lines: usize,
    pub samples: usize,
    pub sample_type: SampleType,
}

/// Band-major integer cube.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperspectralImage {
    data: Vec<i32>,
    bands: usize,
    lines: usize,
    samples: usize,
    sample_type: SampleType,
}

impl HyperspectralImage {
    pub fn zeros(header: &ImageHeader) -> Self {
        Self {
            data: vec![0; header.bands * header.lines * header.samples],
            bands: header.bands,
            lines: header.lines,
            samples: header.samples,
            sample_type: header.sample_type,
        }
    }

    pub fn from_data(
        data: Vec<i32>,
        header: &ImageHeader,
    ) -> Result<Self, CodecError> {
        if data.len() != header.bands * header.lines * header.samples {
            return Err(CodecError::BandSizeMismatch {
                rows: header.lines,
                cols: header.samples,
                got_rows: data.len() / header.samples.max(1) / header.bands.max(1),
                got_cols: header.samples,
            });
        }
        Ok(Self {
            data,
            bands: header.bands,
            lines: header.lines,
            samples: header.samples,
            sample_type: header.sample_type,
        })
    }

    pub fn header(&self) -> ImageHeader {
        ImageHeader {
            bands: self.bands,
            lines: self.lines,
            samples: self.samples,
            sample_type: self.sample_type,
        }
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn value_at(&self, band: usize, line: usize, sample: usize) -> i32 {
        self.data[(band * self.lines + line) * self.samples + sample]
    }

    pub fn set_value_at(&mut self, value: i32, band: usize, line: usize, sample: usize) {
        self.data[(band * self.lines + line) * self.samples + sample] = value;
    }

    /// Write a reconstructed value, clamped into the sample type's range.
    /// Returns whether clamping occurred.
    pub(crate) fn set_value_clamped(
        &mut self,
        value: f64,
        band: usize,
        line: usize,
        sample: usize,
    ) -> bool {
        let (sample_value, clamped) = self.sample_type.to_sample(value);
        self.set_value_at(sample_value, band, line, sample);
        clamped
    }

    /// Fill `out` with the spectral vector at one spatial position.
    pub fn pixel(&self, line: usize, sample: usize, out: &mut [f64]) {
        for (band, slot) in out.iter_mut().enumerate().take(self.bands) {
            *slot = self.value_at(band, line, sample) as f64;
        }
    }

    pub fn band(&self, band: usize) -> Band<'_> {
        let plane = self.lines * self.samples;
        Band {
            data: &self.data[band * plane..(band + 1) * plane],
            lines: self.lines,
            samples: self.samples,
        }
    }

    pub fn band_mut(&mut self, band: usize) -> BandMut<'_> {
        let plane = self.lines * self.samples;
        BandMut {
            data: &mut self.data[band * plane..(band + 1) * plane],
            lines: self.lines,
            samples: self.samples,
            sample_type: self.sample_type,
        }
    }
}

/// Read-only 2-D view of one band.
pub struct Band<'a> {
    data: &'a [i32],
    lines: usize,
    samples: usize,
}

impl Band<'_> {
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn value_at(&self, line: usize, sample: usize) -> i32 {
        self.data[line * self.samples + sample]
    }

    /// Extract a float matrix for wavelet analysis, skipping `line_offset`
    /// lines and `sample_offset` samples.
    pub fn to_wave(
        &self,
        line_offset: usize,
        sample_offset: usize,
        lines: usize,
        samples: usize,
    ) -> Vec<f32> {
        let mut wave = vec![0f32; lines * samples];
        for i in 0..lines {
            for j in 0..samples {
                wave[i * samples + j] =
                    self.value_at(i + line_offset, j + sample_offset) as f32;
            }
        }
        wave
    }
}

/// Mutable 2-D view of one band.
pub struct BandMut<'a> {
    data: &'a mut [i32],
    lines: usize,
    samples: usize,
    sample_type: SampleType,
}

impl BandMut<'_> {
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn set_value_at(&mut self, value: i32, line: usize, sample: usize) {
        self.data[line * self.samples + sample] = value;
    }

    /// Write a float matrix back into the band, honouring the line and
    /// sample offsets. Values outside the sample type's range are clamped.
    pub fn from_wave(
        &mut self,
        wave: &[f32],
        line_offset: usize,
        sample_offset: usize,
        lines: usize,
        samples: usize,
    ) {
        let mut saturated = 0usize;
        for i in 0..lines {
            for j in 0..samples {
                let (sample, clamped) = self.sample_type.to_sample(wave[i * samples + j] as f64);
                if clamped {
                    saturated += 1;
                }
                self.set_value_at(sample, i + line_offset, j + sample_offset);
            }
        }
        if saturated > 0 {
            debug!("clamped {saturated} of {} samples into the target range", lines * samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(bands: usize, lines: usize, samples: usize) -> ImageHeader {
        ImageHeader {
            bands,
            lines,
            samples,
            sample_type: SampleType::new(16, true).unwrap(),
        }
    }

    #[test]
    fn test_sample_type_ranges() {
        let s16 = SampleType::new(16, true).unwrap();
        assert_eq!(s16.min_value(), -32768.0);
        assert_eq!(s16.max_value(), 32767.0);

        let u8t = SampleType::new(8, false).unwrap();
        assert_eq!(u8t.min_value(), 0.0);
        assert_eq!(u8t.max_value(), 255.0);

        assert!(SampleType::new(1, false).is_err());
        assert!(SampleType::new(33, true).is_err());
    }

    #[test]
    fn test_sample_type_fit() {
        let t = SampleType::fit(300.0, true).unwrap();
        assert!(t.max_value() >= 300.0);
        assert!(t.min_value() <= -300.0);
        assert_eq!(t.bit_depth(), 10);

        // exact powers of two still fit inside the range
        let t = SampleType::fit(256.0, true).unwrap();
        assert!(t.max_value() >= 256.0);
        assert_eq!(SampleType::fit(255.0, true).unwrap().bit_depth(), 9);
        assert_eq!(SampleType::fit(255.0, false).unwrap().bit_depth(), 8);
        assert_eq!(SampleType::fit(256.0, false).unwrap().bit_depth(), 9);
    }

    #[test]
    fn test_wave_roundtrip_with_offsets() {
        let h = header(1, 4, 5);
        let mut img = HyperspectralImage::zeros(&h);
        for line in 0..4 {
            for sample in 0..5 {
                img.set_value_at((line * 5 + sample) as i32 - 7, 0, line, sample);
            }
        }
        let wave = img.band(0).to_wave(1, 2, 2, 3);
        assert_eq!(wave[0], img.value_at(0, 1, 2) as f32);

        let mut copy = HyperspectralImage::zeros(&h);
        copy.band_mut(0).from_wave(&wave, 1, 2, 2, 3);
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(copy.value_at(0, i + 1, j + 2), img.value_at(0, i + 1, j + 2));
            }
        }
        // Untouched corner stays zero
        assert_eq!(copy.value_at(0, 0, 0), 0);
    }

    #[test]
    fn test_from_wave_clamps_to_type() {
        let h = ImageHeader {
            bands: 1,
            lines: 1,
            samples: 2,
            sample_type: SampleType::new(8, false).unwrap(),
        };
        let mut img = HyperspectralImage::zeros(&h);
        img.band_mut(0).from_wave(&[300.0, -4.0], 0, 0, 1, 2);
        assert_eq!(img.value_at(0, 0, 0), 255);
        assert_eq!(img.value_at(0, 0, 1), 0);
    }
}
