//! Minimum noise fraction.
//!
//! Orders components by signal-to-noise ratio instead of raw variance. The
//! noise is estimated from horizontal sample differences (pushbroom sensor
//! assumption), the data is whitened against the noise covariance, and the
//! whitened covariance is decomposed. The projection is not orthonormal, so
//! the unprojection comes from the inverse of the full square projection.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::error::CodecError;
use crate::image::HyperspectralImage;

use super::projecting::{sorted_symmetric_eigen, spectral_covariance, spectral_mean, Projection};

pub struct MinimumNoiseFraction {
    components: usize,
    projection: Option<Projection>,
}

impl MinimumNoiseFraction {
    pub fn new(components: usize) -> Self {
        Self {
            components,
            projection: None,
        }
    }

    pub(super) fn from_projection(projection: Projection) -> Self {
        Self {
            components: projection.num_components(),
            projection: Some(projection),
        }
    }

    pub(super) fn projection(&self) -> Result<&Projection, CodecError> {
        self.projection
            .as_ref()
            .ok_or(CodecError::ReductionNotTrained)
    }

    pub fn train(&mut self, image: &HyperspectralImage) -> Result<(), CodecError> {
        let bands = image.bands();
        if self.components == 0 || self.components > bands {
            return Err(CodecError::TooManyComponents {
                requested: self.components,
                available: bands,
            });
        }

        debug!("mnf: estimating noise");
        let noise_covariance = noise_covariance(image);

        debug!("mnf: computing data covariance");
        let mean = spectral_mean(image);
        let covariance = spectral_covariance(image, &mean);

        debug!("mnf: whitening against the noise");
        let (noise_values, noise_basis) = sorted_symmetric_eigen(noise_covariance);
        let largest = noise_values[0];
        if !largest.is_finite() || largest <= 0.0 {
            return Err(CodecError::NoiseDecompositionFailed);
        }
        // Guard near-null noise directions; they would blow up the whitener.
        let floor = largest * 1e-12;
        let inverse_roots =
            DVector::from_iterator(bands, noise_values.iter().map(|&v| 1.0 / v.max(floor).sqrt()));
        let whitener = &noise_basis * DMatrix::from_diagonal(&inverse_roots);

        debug!("mnf: decomposing the whitened covariance");
        let transformed = whitener.transpose() * covariance * &whitener;
        // symmetrize away the numerical residue before the eigensolver
        let transformed = (&transformed + transformed.transpose()) * 0.5;
        let (_, basis) = sorted_symmetric_eigen(transformed);

        let full_projection = (&whitener * &basis).transpose();
        let full_unprojection = full_projection
            .clone()
            .try_inverse()
            .ok_or(CodecError::NoiseDecompositionFailed)?;

        let projection = full_projection.rows(0, self.components).into_owned();
        let unprojection = full_unprojection.columns(0, self.components).into_owned();
        self.projection = Some(Projection::new(mean, projection, unprojection));
        debug!("mnf: finished");
        Ok(())
    }
}

/// Noise covariance from horizontal differences:
/// `noise(i, j) = (x(i, j) - x(i, j + 1)) / 2`, with the last sample of
/// each line falling back to its left neighbour.
fn noise_covariance(image: &HyperspectralImage) -> DMatrix<f64> {
    let bands = image.bands();
    let mut covariance = DMatrix::<f64>::zeros(bands, bands);
    if image.samples() < 2 {
        // no horizontal neighbours to difference against
        return covariance;
    }
    let mut noise = vec![0f64; bands];
    for line in 0..image.lines() {
        for sample in 0..image.samples() {
            let other = if sample + 1 < image.samples() {
                sample + 1
            } else {
                sample - 1
            };
            for (band, slot) in noise.iter_mut().enumerate() {
                *slot = (image.value_at(band, line, sample) as f64
                    - image.value_at(band, line, other) as f64)
                    / 2.0;
            }
            for a in 0..bands {
                for b in a..bands {
                    covariance[(a, b)] += noise[a] * noise[b];
                }
            }
        }
    }
    for a in 0..bands {
        for b in a..bands {
            covariance[(b, a)] = covariance[(a, b)];
        }
    }
    covariance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageHeader, SampleType};
    use crate::reduction::DimensionalityReduction;

    fn noisy_image() -> HyperspectralImage {
        let header = ImageHeader {
            bands: 3,
            lines: 6,
            samples: 8,
            sample_type: SampleType::new(16, true).unwrap(),
        };
        let mut image = HyperspectralImage::zeros(&header);
        // smooth signal plus a deterministic high-frequency ripple
        for line in 0..6 {
            for sample in 0..8 {
                let signal = (line * 8 + sample) as i32;
                let ripple = if (line + sample) % 2 == 0 { 2 } else { -2 };
                image.set_value_at(10 * signal + ripple, 0, line, sample);
                image.set_value_at(-5 * signal + ripple, 1, line, sample);
                image.set_value_at(2 * signal - ripple, 2, line, sample);
            }
        }
        image
    }

    #[test]
    fn test_full_rank_mnf_roundtrips() {
        let image = noisy_image();
        let mut reduction = DimensionalityReduction::mnf(3);
        reduction.train(&image).unwrap();

        let cube = reduction.reduce(&image).unwrap();
        let mut restored = HyperspectralImage::zeros(&image.header());
        reduction.boost(&cube, &mut restored).unwrap();
        // full-rank projection, so the inverse restores everything
        for band in 0..3 {
            for line in 0..6 {
                for sample in 0..8 {
                    assert_eq!(
                        image.value_at(band, line, sample),
                        restored.value_at(band, line, sample)
                    );
                }
            }
        }
    }

    #[test]
    fn test_truncated_mnf_keeps_signal() {
        let image = noisy_image();
        let mut reduction = DimensionalityReduction::mnf(2);
        reduction.train(&image).unwrap();

        let cube = reduction.reduce(&image).unwrap();
        assert_eq!(cube.bands(), 2);
        let mut restored = HyperspectralImage::zeros(&image.header());
        reduction.boost(&cube, &mut restored).unwrap();

        // the retained components carry the smooth signal to within the
        // ripple amplitude
        for band in 0..3 {
            for line in 0..6 {
                for sample in 0..8 {
                    let expected = image.value_at(band, line, sample);
                    let got = restored.value_at(band, line, sample);
                    assert!(
                        (expected - got).abs() <= 8,
                        "band {} ({}, {}): {} vs {}",
                        band,
                        line,
                        sample,
                        expected,
                        got
                    );
                }
            }
        }
    }

    #[test]
    fn test_save_load_projects_identically() {
        let image = noisy_image();
        let mut reduction = DimensionalityReduction::mnf(2);
        reduction.train(&image).unwrap();
        let direct = reduction.reduce(&image).unwrap();

        let mut writer = crate::bits::BitWriter::new();
        reduction.save_to(&mut writer).unwrap();
        let bytes = writer.finish();
        let mut reader = crate::bits::BitReader::new(&bytes);
        let loaded = DimensionalityReduction::load_from(&mut reader).unwrap();
        assert_eq!(direct, loaded.reduce(&image).unwrap());
    }
}
