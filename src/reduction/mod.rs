//! Spectral dimensionality reduction.
//!
//! A tagged variant replaces subclass dispatch: the one-byte tag written to
//! the stream selects the algorithm on load. Deletion is the identity
//! projection, PCA and MNF are linear projections sharing the
//! [`projecting::Projection`] core.

mod mnf;
mod pca;
mod projecting;

pub use mnf::MinimumNoiseFraction;
pub use pca::PrincipalComponentAnalysis;

use crate::bits::{BitReader, BitWriter};
use crate::error::CodecError;
use crate::image::HyperspectralImage;

use log::debug;

const TAG_PCA: u8 = 0;
const TAG_DELETION: u8 = 1;
const TAG_MNF: u8 = 2;

/// Float cube produced by [`DimensionalityReduction::reduce`]: band-major,
/// same spatial grid as the source image, `bands` spectral components.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatCube {
    data: Vec<f32>,
    bands: usize,
    lines: usize,
    samples: usize,
}

impl FloatCube {
    pub fn zeros(bands: usize, lines: usize, samples: usize) -> Self {
        Self {
            data: vec![0.0; bands * lines * samples],
            bands,
            lines,
            samples,
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

    pub fn band(&self, band: usize) -> &[f32] {
        let plane = self.lines * self.samples;
        &self.data[band * plane..(band + 1) * plane]
    }

    pub fn band_mut(&mut self, band: usize) -> &mut [f32] {
        let plane = self.lines * self.samples;
        &mut self.data[band * plane..(band + 1) * plane]
    }
}

/// The identity reduction: keeps the first `k` components and deletes the
/// rest (all of them by default, making it a pure pass-through).
#[derive(Debug, Clone, Default)]
pub struct DeletingReduction {
    components: usize,
    requested: Option<usize>,
}

impl DeletingReduction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keeping(components: usize) -> Self {
        Self {
            components: 0,
            requested: Some(components),
        }
    }
}

/// One spectral reduction algorithm with its trained state.
pub enum DimensionalityReduction {
    Pca(PrincipalComponentAnalysis),
    Deletion(DeletingReduction),
    Mnf(MinimumNoiseFraction),
}

impl DimensionalityReduction {
    /// Identity reduction, the default when no projection is requested.
    pub fn deletion() -> Self {
        Self::Deletion(DeletingReduction::new())
    }

    pub fn pca(components: usize) -> Self {
        Self::Pca(PrincipalComponentAnalysis::new(components))
    }

    pub fn mnf(components: usize) -> Self {
        Self::Mnf(MinimumNoiseFraction::new(components))
    }

    /// Analyze the image's spectral statistics so [`Self::reduce`] and
    /// [`Self::boost`] can project along the learned basis.
    pub fn train(&mut self, image: &HyperspectralImage) -> Result<(), CodecError> {
        match self {
            Self::Pca(pca) => pca.train(image),
            Self::Mnf(mnf) => mnf.train(image),
            Self::Deletion(del) => {
                del.components = match del.requested {
                    Some(k) if k > image.bands() => {
                        return Err(CodecError::TooManyComponents {
                            requested: k,
                            available: image.bands(),
                        })
                    }
                    Some(k) => k,
                    None => image.bands(),
                };
                Ok(())
            }
        }
    }

    /// Project the spectral dimension down to `num_components`.
    pub fn reduce(&self, image: &HyperspectralImage) -> Result<FloatCube, CodecError> {
        match self {
            Self::Pca(pca) => pca.projection()?.reduce(image),
            Self::Mnf(mnf) => mnf.projection()?.reduce(image),
            Self::Deletion(del) => {
                let bands = self.checked_components(del)?;
                let mut cube = FloatCube::zeros(bands, image.lines(), image.samples());
                for band in 0..bands {
                    let plane = cube.band_mut(band);
                    for line in 0..image.lines() {
                        for sample in 0..image.samples() {
                            plane[line * image.samples() + sample] =
                                image.value_at(band, line, sample) as f32;
                        }
                    }
                }
                Ok(cube)
            }
        }
    }

    /// Project a reduced cube back into the original spectral space,
    /// writing into `dst` with the destination type's clamping.
    pub fn boost(
        &self,
        cube: &FloatCube,
        dst: &mut HyperspectralImage,
    ) -> Result<(), CodecError> {
        match self {
            Self::Pca(pca) => pca.projection()?.boost(cube, dst),
            Self::Mnf(mnf) => mnf.projection()?.boost(cube, dst),
            Self::Deletion(del) => {
                let bands = self.checked_components(del)?;
                if cube.bands() != bands {
                    return Err(CodecError::ComponentCountMismatch {
                        expected: bands,
                        got: cube.bands(),
                    });
                }
                let mut saturated = 0usize;
                for band in 0..bands.min(dst.bands()) {
                    let plane = cube.band(band);
                    for line in 0..dst.lines() {
                        for sample in 0..dst.samples() {
                            let value = plane[line * dst.samples() + sample] as f64;
                            if dst.set_value_clamped(value, band, line, sample) {
                                saturated += 1;
                            }
                        }
                    }
                }
                if saturated > 0 {
                    debug!("boost clamped {saturated} samples");
                }
                Ok(())
            }
        }
    }

    fn checked_components(&self, del: &DeletingReduction) -> Result<usize, CodecError> {
        if del.components == 0 {
            return Err(CodecError::ReductionNotTrained);
        }
        Ok(del.components)
    }

    /// The target dimension the algorithm reduces to / restores from.
    pub fn num_components(&self) -> Result<usize, CodecError> {
        match self {
            Self::Pca(pca) => Ok(pca.projection()?.num_components()),
            Self::Mnf(mnf) => Ok(mnf.projection()?.num_components()),
            Self::Deletion(del) => {
                if del.components == 0 {
                    Err(CodecError::ReductionNotTrained)
                } else {
                    Ok(del.components)
                }
            }
        }
    }

    /// Upper bound on the values reduced samples can take.
    pub fn max_value(&self, image: &HyperspectralImage) -> Result<f64, CodecError> {
        match self {
            Self::Pca(pca) => Ok(pca.projection()?.range_bound(image)),
            Self::Mnf(mnf) => Ok(mnf.projection()?.range_bound(image)),
            Self::Deletion(_) => Ok(image.sample_type().max_value()),
        }
    }

    /// Lower bound on the values reduced samples can take.
    pub fn min_value(&self, image: &HyperspectralImage) -> Result<f64, CodecError> {
        match self {
            Self::Pca(pca) => Ok(-pca.projection()?.range_bound(image)),
            Self::Mnf(mnf) => Ok(-mnf.projection()?.range_bound(image)),
            Self::Deletion(_) => Ok(image.sample_type().min_value()),
        }
    }

    /// Serialize the algorithm tag and trained state.
    pub fn save_to(&self, writer: &mut BitWriter) -> Result<(), CodecError> {
        match self {
            Self::Pca(pca) => {
                let projection = pca.projection()?;
                writer.write_byte(TAG_PCA);
                projection.save_to(writer);
            }
            Self::Deletion(del) => {
                let components = self.checked_components(del)?;
                writer.write_byte(TAG_DELETION);
                writer.write_u16(components as u16);
            }
            Self::Mnf(mnf) => {
                let projection = mnf.projection()?;
                writer.write_byte(TAG_MNF);
                projection.save_to(writer);
            }
        }
        Ok(())
    }

    /// Rebuild a trained reduction from the stream. An unknown tag is a
    /// framing error.
    pub fn load_from(reader: &mut BitReader<'_>) -> Result<Self, CodecError> {
        let tag = reader.read_byte()?;
        match tag {
            TAG_PCA => Ok(Self::Pca(PrincipalComponentAnalysis::from_projection(
                projecting::Projection::load_from(reader)?,
            ))),
            TAG_DELETION => {
                let components = reader.read_u16()? as usize;
                Ok(Self::Deletion(DeletingReduction {
                    components,
                    requested: Some(components),
                }))
            }
            TAG_MNF => Ok(Self::Mnf(MinimumNoiseFraction::from_projection(
                projecting::Projection::load_from(reader)?,
            ))),
            other => Err(CodecError::UnknownReductionTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageHeader, SampleType};

    fn small_image() -> HyperspectralImage {
        let header = ImageHeader {
            bands: 3,
            lines: 2,
            samples: 2,
            sample_type: SampleType::new(8, false).unwrap(),
        };
        let mut image = HyperspectralImage::zeros(&header);
        for band in 0..3 {
            for line in 0..2 {
                for sample in 0..2 {
                    image.set_value_at(
                        (band * 40 + line * 10 + sample * 3) as i32,
                        band,
                        line,
                        sample,
                    );
                }
            }
        }
        image
    }

    #[test]
    fn test_deletion_is_identity() {
        let image = small_image();
        let mut reduction = DimensionalityReduction::deletion();
        reduction.train(&image).unwrap();
        assert_eq!(reduction.num_components().unwrap(), 3);

        let cube = reduction.reduce(&image).unwrap();
        assert_eq!(cube.bands(), 3);
        assert_eq!(cube.band(2)[3], image.value_at(2, 1, 1) as f32);

        let mut restored = HyperspectralImage::zeros(&image.header());
        reduction.boost(&cube, &mut restored).unwrap();
        assert_eq!(restored, image);
    }

    #[test]
    fn test_deletion_keeps_prefix() {
        let image = small_image();
        let mut reduction = DimensionalityReduction::Deletion(DeletingReduction::keeping(2));
        reduction.train(&image).unwrap();
        let cube = reduction.reduce(&image).unwrap();
        assert_eq!(cube.bands(), 2);
    }

    #[test]
    fn test_deletion_rejects_too_many_components() {
        let image = small_image();
        let mut reduction = DimensionalityReduction::Deletion(DeletingReduction::keeping(5));
        assert!(matches!(
            reduction.train(&image),
            Err(CodecError::TooManyComponents {
                requested: 5,
                available: 3
            })
        ));
    }

    #[test]
    fn test_save_load_deletion() {
        let image = small_image();
        let mut reduction = DimensionalityReduction::deletion();
        reduction.train(&image).unwrap();

        let mut writer = BitWriter::new();
        reduction.save_to(&mut writer).unwrap();
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let loaded = DimensionalityReduction::load_from(&mut reader).unwrap();
        assert_eq!(loaded.num_components().unwrap(), 3);
    }

    #[test]
    fn test_unknown_tag_is_framing_error() {
        let bytes = [9u8, 0, 0];
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            DimensionalityReduction::load_from(&mut reader),
            Err(CodecError::UnknownReductionTag(9))
        ));
    }
}
