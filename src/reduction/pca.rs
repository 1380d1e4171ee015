//! Principal component analysis over the spectral dimension.
//!
//! Pixels are treated as spectral vectors; the basis maximizing retained
//! variance is the eigenbasis of their covariance matrix, taken in
//! descending eigenvalue order. The projection is orthonormal, so the
//! unprojection is its transpose.

use log::debug;

use crate::error::CodecError;
use crate::image::HyperspectralImage;

use super::projecting::{sorted_symmetric_eigen, spectral_covariance, spectral_mean, Projection};

pub struct PrincipalComponentAnalysis {
    components: usize,
    projection: Option<Projection>,
}

impl PrincipalComponentAnalysis {
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

        debug!("pca: computing spectral statistics over {} bands", bands);
        let mean = spectral_mean(image);
        let covariance = spectral_covariance(image, &mean);

        debug!("pca: decomposing covariance");
        let (_, basis) = sorted_symmetric_eigen(covariance);

        // rows of the projection are the leading eigenvectors
        let projection = basis.columns(0, self.components).transpose();
        let unprojection = projection.transpose();
        self.projection = Some(Projection::new(mean, projection, unprojection));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageHeader, SampleType};
    use crate::reduction::{DimensionalityReduction, FloatCube};

    /// Two perfectly correlated bands plus one constant band: rank one, so
    /// a single component reconstructs the image almost exactly.
    fn low_rank_image() -> HyperspectralImage {
        let header = ImageHeader {
            bands: 3,
            lines: 4,
            samples: 4,
            sample_type: SampleType::new(16, true).unwrap(),
        };
        let mut image = HyperspectralImage::zeros(&header);
        for line in 0..4 {
            for sample in 0..4 {
                let t = (line * 4 + sample) as i32 - 8;
                image.set_value_at(3 * t, 0, line, sample);
                image.set_value_at(-2 * t + 5, 1, line, sample);
                image.set_value_at(7, 2, line, sample);
            }
        }
        image
    }

    #[test]
    fn test_single_component_reconstructs_rank_one_image() {
        let image = low_rank_image();
        let mut reduction = DimensionalityReduction::pca(1);
        reduction.train(&image).unwrap();

        let cube = reduction.reduce(&image).unwrap();
        assert_eq!(cube.bands(), 1);

        let mut restored = HyperspectralImage::zeros(&image.header());
        reduction.boost(&cube, &mut restored).unwrap();
        for band in 0..3 {
            for line in 0..4 {
                for sample in 0..4 {
                    let expected = image.value_at(band, line, sample);
                    let got = restored.value_at(band, line, sample);
                    assert!(
                        (expected - got).abs() <= 1,
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
    fn test_rejects_untrained_use() {
        let image = low_rank_image();
        let reduction = DimensionalityReduction::pca(2);
        assert!(matches!(
            reduction.reduce(&image),
            Err(CodecError::ReductionNotTrained)
        ));
    }

    #[test]
    fn test_rejects_too_many_components() {
        let image = low_rank_image();
        let mut reduction = DimensionalityReduction::pca(4);
        assert!(matches!(
            reduction.train(&image),
            Err(CodecError::TooManyComponents { .. })
        ));
    }

    #[test]
    fn test_save_load_projects_identically() {
        let image = low_rank_image();
        let mut reduction = DimensionalityReduction::pca(2);
        reduction.train(&image).unwrap();
        let direct = reduction.reduce(&image).unwrap();

        let mut writer = crate::bits::BitWriter::new();
        reduction.save_to(&mut writer).unwrap();
        let bytes = writer.finish();
        let mut reader = crate::bits::BitReader::new(&bytes);
        let loaded = DimensionalityReduction::load_from(&mut reader).unwrap();
        let reloaded: FloatCube = loaded.reduce(&image).unwrap();
        assert_eq!(direct, reloaded);
    }
}
