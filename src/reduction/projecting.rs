//! Shared core of the projecting reductions (PCA, MNF): a mean vector, a
//! `k x B` projection matrix and a `B x k` unprojection matrix.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::bits::{BitReader, BitWriter};
use crate::error::CodecError;
use crate::image::HyperspectralImage;

use super::FloatCube;

pub struct Projection {
    mean: DVector<f64>,
    /// `k x B`, applied to mean-centred pixels.
    projection: DMatrix<f64>,
    /// `B x k`, takes reduced pixels back before re-adding the mean.
    unprojection: DMatrix<f64>,
}

impl Projection {
    pub fn new(mean: DVector<f64>, projection: DMatrix<f64>, unprojection: DMatrix<f64>) -> Self {
        debug_assert_eq!(projection.ncols(), mean.len());
        debug_assert_eq!(unprojection.nrows(), mean.len());
        debug_assert_eq!(projection.nrows(), unprojection.ncols());
        Self {
            mean,
            projection,
            unprojection,
        }
    }

    pub fn num_components(&self) -> usize {
        self.projection.nrows()
    }

    pub fn original_dimension(&self) -> usize {
        self.mean.len()
    }

    /// Project every pixel's spectral vector into the reduced space.
    pub fn reduce(&self, image: &HyperspectralImage) -> Result<FloatCube, CodecError> {
        let bands = self.original_dimension();
        if image.bands() != bands {
            return Err(CodecError::ComponentCountMismatch {
                expected: bands,
                got: image.bands(),
            });
        }
        let k = self.num_components();
        let mut cube = FloatCube::zeros(k, image.lines(), image.samples());
        let mut pixel = DVector::<f64>::zeros(bands);
        for line in 0..image.lines() {
            for sample in 0..image.samples() {
                image.pixel(line, sample, pixel.as_mut_slice());
                pixel -= &self.mean;
                let reduced = &self.projection * &pixel;
                for component in 0..k {
                    cube.band_mut(component)[line * image.samples() + sample] =
                        reduced[component] as f32;
                }
            }
        }
        Ok(cube)
    }

    /// Lift every reduced pixel back to the original spectral space,
    /// clamping into the destination sample type.
    pub fn boost(&self, cube: &FloatCube, dst: &mut HyperspectralImage) -> Result<(), CodecError> {
        let k = self.num_components();
        if cube.bands() != k {
            return Err(CodecError::ComponentCountMismatch {
                expected: k,
                got: cube.bands(),
            });
        }
        if dst.bands() != self.original_dimension() {
            return Err(CodecError::ComponentCountMismatch {
                expected: self.original_dimension(),
                got: dst.bands(),
            });
        }
        let mut reduced = DVector::<f64>::zeros(k);
        let mut saturated = 0usize;
        for line in 0..dst.lines() {
            for sample in 0..dst.samples() {
                for component in 0..k {
                    reduced[component] =
                        cube.band(component)[line * dst.samples() + sample] as f64;
                }
                let mut restored = &self.unprojection * &reduced;
                restored += &self.mean;
                for band in 0..dst.bands() {
                    if dst.set_value_clamped(restored[band], band, line, sample) {
                        saturated += 1;
                    }
                }
            }
        }
        if saturated > 0 {
            debug!("boost clamped {saturated} samples into the target range");
        }
        Ok(())
    }

    /// Bound on the absolute value of projected samples, from the projection
    /// row norms and the image's representable range. Safe rather than
    /// tight.
    pub fn range_bound(&self, image: &HyperspectralImage) -> f64 {
        let sample_type = image.sample_type();
        let mut bound = 0f64;
        for row in 0..self.projection.nrows() {
            let mut row_bound = 0f64;
            for band in 0..self.projection.ncols() {
                let centered = (sample_type.min_value() - self.mean[band])
                    .abs()
                    .max((sample_type.max_value() - self.mean[band]).abs());
                row_bound += self.projection[(row, band)].abs() * centered;
            }
            bound = bound.max(row_bound);
        }
        // keep degenerate projections quantizable
        bound.max(1.0)
    }

    pub fn save_to(&self, writer: &mut BitWriter) {
        let bands = self.original_dimension();
        let k = self.num_components();
        writer.write_u16(bands as u16);
        writer.write_u16(k as u16);
        for band in 0..bands {
            writer.write_f64(self.mean[band]);
        }
        for row in 0..k {
            for band in 0..bands {
                writer.write_f64(self.projection[(row, band)]);
            }
        }
        for band in 0..bands {
            for row in 0..k {
                writer.write_f64(self.unprojection[(band, row)]);
            }
        }
    }

    pub fn load_from(reader: &mut BitReader<'_>) -> Result<Self, CodecError> {
        let bands = reader.read_u16()? as usize;
        let k = reader.read_u16()? as usize;
        let mut mean = DVector::<f64>::zeros(bands);
        for band in 0..bands {
            mean[band] = reader.read_f64()?;
        }
        let mut projection = DMatrix::<f64>::zeros(k, bands);
        for row in 0..k {
            for band in 0..bands {
                projection[(row, band)] = reader.read_f64()?;
            }
        }
        let mut unprojection = DMatrix::<f64>::zeros(bands, k);
        for band in 0..bands {
            for row in 0..k {
                unprojection[(band, row)] = reader.read_f64()?;
            }
        }
        Ok(Self::new(mean, projection, unprojection))
    }
}

/// Mean spectral vector over all pixels.
pub(super) fn spectral_mean(image: &HyperspectralImage) -> DVector<f64> {
    let bands = image.bands();
    let mut mean = DVector::<f64>::zeros(bands);
    let mut pixel = vec![0f64; bands];
    for line in 0..image.lines() {
        for sample in 0..image.samples() {
            image.pixel(line, sample, &mut pixel);
            for (band, &value) in pixel.iter().enumerate() {
                mean[band] += value;
            }
        }
    }
    mean / (image.lines() * image.samples()) as f64
}

/// Covariance of the mean-centred spectral vectors.
pub(super) fn spectral_covariance(
    image: &HyperspectralImage,
    mean: &DVector<f64>,
) -> DMatrix<f64> {
    let bands = image.bands();
    let mut covariance = DMatrix::<f64>::zeros(bands, bands);
    let mut pixel = vec![0f64; bands];
    for line in 0..image.lines() {
        for sample in 0..image.samples() {
            image.pixel(line, sample, &mut pixel);
            for a in 0..bands {
                let da = pixel[a] - mean[a];
                for b in a..bands {
                    covariance[(a, b)] += da * (pixel[b] - mean[b]);
                }
            }
        }
    }
    let count = (image.lines() * image.samples()) as f64;
    for a in 0..bands {
        for b in a..bands {
            let value = covariance[(a, b)] / count;
            covariance[(a, b)] = value;
            covariance[(b, a)] = value;
        }
    }
    covariance
}

/// Symmetric eigendecomposition with eigenpairs ordered by descending
/// eigenvalue, so the most informative components come first.
pub(super) fn sorted_symmetric_eigen(matrix: DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let eigen = matrix.symmetric_eigen();
    let n = eigen.eigenvalues.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut values = DVector::<f64>::zeros(n);
    let mut vectors = DMatrix::<f64>::zeros(n, n);
    for (slot, &source) in order.iter().enumerate() {
        values[slot] = eigen.eigenvalues[source];
        vectors.set_column(slot, &eigen.eigenvectors.column(source));
    }
    (values, vectors)
}
