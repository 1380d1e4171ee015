//! Bitplane decoder: the exact mirror of [`super::coder::EbCoder`].
//!
//! It replays the same pass schedule from the block's declared depth and
//! writes decoded magnitude bits and signs straight through the block view
//! into the band's storage. A mis-synchronized arithmetic stream is not
//! detectable here; truncation is caught by the framing layer that hands in
//! the block's exact byte slice.

use crate::error::CodecError;

use super::block::{CodingBlock, CodingPlane};
use super::coder::STRIPE_HEIGHT;
use super::context::{self, ContextSet, SignificanceMap, CTX_RUN, CTX_UNIFORM};
use super::mq_coder::MqDecoder;

pub struct EbDecoder {
    contexts: ContextSet,
    significance: SignificanceMap,
}

impl EbDecoder {
    pub fn new() -> Self {
        Self {
            contexts: ContextSet::new(),
            significance: SignificanceMap::new(0, 0),
        }
    }

    /// Decode `data` into the block. The block is cleared first; contexts
    /// and significance state reset per block.
    pub fn decode(&mut self, data: &[u8], block: &mut CodingBlock<'_>) -> Result<(), CodecError> {
        self.contexts = ContextSet::new();
        self.significance = SignificanceMap::new(block.height(), block.width());
        block.clear();
        let mut mq = MqDecoder::new(data);

        let top_plane = block.magnitude_bitplanes() - 1;
        {
            let mut plane = block.plane(top_plane)?;
            self.cleanup_pass(&mut plane, &mut mq);
        }
        self.significance.end_plane();

        for p in (0..top_plane).rev() {
            let mut plane = block.plane(p)?;
            self.significance_pass(&mut plane, &mut mq);
            self.refinement_pass(&mut plane, &mut mq);
            self.cleanup_pass(&mut plane, &mut mq);
            self.significance.end_plane();
        }

        Ok(())
    }

    fn significance_pass(&mut self, plane: &mut CodingPlane<'_, '_>, mq: &mut MqDecoder<'_>) {
        let rows = plane.rows();
        let columns = plane.columns();
        for stripe in (0..rows).step_by(STRIPE_HEIGHT) {
            for col in 0..columns {
                for row in stripe..rows.min(stripe + STRIPE_HEIGHT) {
                    if self.significance.is_significant(row, col)
                        || self.significance.is_visited(row, col)
                    {
                        continue;
                    }
                    let (h, v, d) = self.significance.neighbor_counts(row, col);
                    if h + v + d == 0 {
                        continue;
                    }
                    let ctx = context::zero_coding(plane.band(), h, v, d);
                    let bit = mq.decode(self.contexts.state_mut(ctx));
                    self.significance.mark_visited(row, col);
                    if bit == 1 {
                        plane.set_bit(row, col);
                        self.decode_sign(plane, row, col, mq);
                    }
                }
            }
        }
    }

    fn refinement_pass(&mut self, plane: &mut CodingPlane<'_, '_>, mq: &mut MqDecoder<'_>) {
        let rows = plane.rows();
        let columns = plane.columns();
        for stripe in (0..rows).step_by(STRIPE_HEIGHT) {
            for col in 0..columns {
                for row in stripe..rows.min(stripe + STRIPE_HEIGHT) {
                    if !self.significance.was_significant(row, col)
                        || self.significance.is_visited(row, col)
                    {
                        continue;
                    }
                    let ctx = context::magnitude_refinement(
                        !self.significance.is_refined(row, col),
                        self.significance.has_significant_neighbor(row, col),
                    );
                    if mq.decode(self.contexts.state_mut(ctx)) == 1 {
                        plane.set_bit(row, col);
                    }
                    self.significance.mark_refined(row, col);
                    self.significance.mark_visited(row, col);
                }
            }
        }
    }

    fn cleanup_pass(&mut self, plane: &mut CodingPlane<'_, '_>, mq: &mut MqDecoder<'_>) {
        let rows = plane.rows();
        let columns = plane.columns();
        for stripe in (0..rows).step_by(STRIPE_HEIGHT) {
            for col in 0..columns {
                let stripe_rows = rows.min(stripe + STRIPE_HEIGHT) - stripe;
                let run_eligible = stripe_rows == STRIPE_HEIGHT
                    && (stripe..stripe + STRIPE_HEIGHT).all(|row| {
                        !self.significance.is_significant(row, col)
                            && !self.significance.is_visited(row, col)
                            && !self.significance.has_significant_neighbor(row, col)
                    });

                if run_eligible {
                    if mq.decode(self.contexts.state_mut(CTX_RUN)) == 1 {
                        let high = mq.decode(self.contexts.state_mut(CTX_UNIFORM)) as usize;
                        let low = mq.decode(self.contexts.state_mut(CTX_UNIFORM)) as usize;
                        let pos = (high << 1) | low;
                        let row = stripe + pos;
                        plane.set_bit(row, col);
                        self.decode_sign(plane, row, col, mq);
                        for row in stripe + pos + 1..stripe + STRIPE_HEIGHT {
                            self.cleanup_sample(plane, row, col, mq);
                        }
                    }
                    for row in stripe..stripe + STRIPE_HEIGHT {
                        self.significance.mark_visited(row, col);
                    }
                } else {
                    for row in stripe..stripe + stripe_rows {
                        if !self.significance.is_significant(row, col)
                            && !self.significance.is_visited(row, col)
                        {
                            self.cleanup_sample(plane, row, col, mq);
                        }
                    }
                }
            }
        }
    }

    fn cleanup_sample(
        &mut self,
        plane: &mut CodingPlane<'_, '_>,
        row: usize,
        col: usize,
        mq: &mut MqDecoder<'_>,
    ) {
        let (h, v, d) = self.significance.neighbor_counts(row, col);
        let ctx = context::zero_coding(plane.band(), h, v, d);
        let bit = mq.decode(self.contexts.state_mut(ctx));
        self.significance.mark_visited(row, col);
        if bit == 1 {
            plane.set_bit(row, col);
            self.decode_sign(plane, row, col, mq);
        }
    }

    fn decode_sign(
        &mut self,
        plane: &mut CodingPlane<'_, '_>,
        row: usize,
        col: usize,
        mq: &mut MqDecoder<'_>,
    ) {
        let (h, v) = self.significance.sign_contributions(row, col);
        let (ctx, xor) = context::sign_coding(h, v);
        let negative = mq.decode(self.contexts.state_mut(ctx)) ^ xor != 0;
        plane.set_sign(row, col, negative);
        self.significance.mark_significant(row, col, negative);
        self.significance.mark_sign_coded(row, col);
    }
}

impl Default for EbDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebc::{CodingBlock, EbCoder, SubBand};
    use crate::matrix::{IntegerMatrix, Matrix};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn roundtrip(values: &Matrix, depth: u8, band: SubBand) {
        let mut source = values.clone();
        let rows = source.rows();
        let columns = source.columns();

        let coded = {
            let mut block =
                CodingBlock::new(&mut source, rows, columns, 0, 0, depth, band).unwrap();
            EbCoder::new().code(&mut block).unwrap()
        };

        let mut target = Matrix::zeros(rows, columns);
        {
            let mut block =
                CodingBlock::new(&mut target, rows, columns, 0, 0, depth, band).unwrap();
            EbDecoder::new().decode(&coded, &mut block).unwrap();
        }
        assert_eq!(
            values, &target,
            "roundtrip mismatch for {}x{} depth {} {:?}",
            rows, columns, depth, band
        );
    }

    fn random_matrix(rng: &mut StdRng, rows: usize, columns: usize, depth: u8) -> Matrix {
        let sign_shift = depth - 1;
        let data = (0..rows * columns)
            .map(|_| {
                // leave a healthy share of zeros so run-length paths trigger
                if rng.gen_bool(0.4) {
                    0
                } else {
                    let magnitude = rng.gen_range(0..(1u32 << sign_shift));
                    let sign = (rng.gen_bool(0.5) as u32) << sign_shift;
                    if magnitude == 0 {
                        0
                    } else {
                        magnitude | sign
                    }
                }
            })
            .collect();
        Matrix::from_vec(data, rows, columns)
    }

    #[test]
    fn test_roundtrip_shapes_and_depths() {
        let mut rng = StdRng::seed_from_u64(0xB10C);
        for &(rows, columns) in &[(4usize, 4usize), (8, 8), (16, 16), (5, 7), (3, 9), (4, 64), (13, 2)] {
            for &depth in &[2u8, 3, 5, 8, 12] {
                let values = random_matrix(&mut rng, rows, columns, depth);
                roundtrip(&values, depth, SubBand::Hh);
            }
        }
    }

    #[test]
    fn test_roundtrip_all_subbands() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for band in [SubBand::Ll, SubBand::Hl, SubBand::Lh, SubBand::Hh] {
            let values = random_matrix(&mut rng, 8, 8, 6);
            roundtrip(&values, 6, band);
        }
    }

    #[test]
    fn test_roundtrip_all_zero_block() {
        roundtrip(&Matrix::zeros(8, 8), 8, SubBand::Ll);
    }

    #[test]
    fn test_roundtrip_single_coefficient() {
        let mut m = Matrix::zeros(4, 4);
        // -5 at depth 4: sign bit 3, magnitude 5
        m.set(0b1101, 2, 1);
        roundtrip(&m, 4, SubBand::Lh);
    }

    #[test]
    fn test_roundtrip_dense_extremes() {
        // every coefficient at the magnitude limit, alternating signs
        let depth = 5u8;
        let max_mag = (1u32 << (depth - 1)) - 1;
        let data = (0..6 * 6)
            .map(|i| max_mag | (((i % 2) as u32) << (depth - 1)))
            .collect();
        roundtrip(&Matrix::from_vec(data, 6, 6), depth, SubBand::Hl);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(42);
        let values = random_matrix(&mut rng, 8, 8, 7);
        let code = |values: &Matrix| {
            let mut source = values.clone();
            let mut block =
                CodingBlock::new(&mut source, 8, 8, 0, 0, 7, SubBand::Ll).unwrap();
            EbCoder::new().code(&mut block).unwrap()
        };
        assert_eq!(code(&values), code(&values));
    }

    #[test]
    fn test_decode_writes_through_window() {
        // Code a small block, then decode it into a window of a larger
        // band and check the surrounding area stays untouched.
        let mut source = Matrix::zeros(4, 4);
        source.set(0b0110, 1, 1);
        source.set(0b1011, 3, 2);
        let coded = {
            let mut block = CodingBlock::new(&mut source, 4, 4, 0, 0, 4, SubBand::Hh).unwrap();
            EbCoder::new().code(&mut block).unwrap()
        };

        let mut band = Matrix::from_vec(vec![0xFFFF; 8 * 8], 8, 8);
        {
            let mut block = CodingBlock::new(&mut band, 4, 4, 2, 3, 4, SubBand::Hh).unwrap();
            EbDecoder::new().decode(&coded, &mut block).unwrap();
        }
        assert_eq!(band.get(3, 4), 0b0110);
        assert_eq!(band.get(5, 5), 0b1011);
        assert_eq!(band.get(2, 4), 0);
        assert_eq!(band.get(0, 0), 0xFFFF);
        assert_eq!(band.get(7, 7), 0xFFFF);
    }
}
