//! Bitplane encoder for one code block.
//!
//! Magnitude planes are coded most significant first. Every plane below the
//! top runs three passes in order: significance propagation, magnitude
//! refinement, cleanup. The top plane runs cleanup only, since no
//! coefficient can be significant yet. The pass schedule is a pure function
//! of the block's declared depth, so the decoder replays it without any
//! side information.

use crate::error::CodecError;

use super::block::{CodingBlock, CodingPlane};
use super::context::{self, ContextSet, SignificanceMap, CTX_RUN, CTX_UNIFORM};
use super::mq_coder::MqEncoder;

pub(super) const STRIPE_HEIGHT: usize = 4;

pub struct EbCoder {
    contexts: ContextSet,
    significance: SignificanceMap,
}

impl EbCoder {
    pub fn new() -> Self {
        Self {
            contexts: ContextSet::new(),
            significance: SignificanceMap::new(0, 0),
        }
    }

    /// Encode the block, returning the arithmetic-coded bytes. Contexts and
    /// significance state reset per block.
    pub fn code(&mut self, block: &mut CodingBlock<'_>) -> Result<Vec<u8>, CodecError> {
        self.contexts = ContextSet::new();
        self.significance = SignificanceMap::new(block.height(), block.width());
        let mut mq = MqEncoder::new();

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

        Ok(mq.finish())
    }

    /// Visit insignificant samples with at least one significant neighbour.
    fn significance_pass(&mut self, plane: &mut CodingPlane<'_, '_>, mq: &mut MqEncoder) {
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
                    let bit = plane.bit(row, col);
                    let ctx = context::zero_coding(plane.band(), h, v, d);
                    mq.encode(bit, self.contexts.state_mut(ctx));
                    self.significance.mark_visited(row, col);
                    if bit == 1 {
                        self.code_sign(plane, row, col, mq);
                    }
                }
            }
        }
    }

    /// Refine samples that were already significant before this plane.
    fn refinement_pass(&mut self, plane: &mut CodingPlane<'_, '_>, mq: &mut MqEncoder) {
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
                    debug_assert!(self.significance.is_sign_coded(row, col));
                    let ctx = context::magnitude_refinement(
                        !self.significance.is_refined(row, col),
                        self.significance.has_significant_neighbor(row, col),
                    );
                    mq.encode(plane.bit(row, col), self.contexts.state_mut(ctx));
                    self.significance.mark_refined(row, col);
                    self.significance.mark_visited(row, col);
                }
            }
        }
    }

    /// Code everything the first two passes skipped. A full stripe column
    /// with no significant neighbourhood takes the run-length escape: one
    /// symbol for "all four stay zero", otherwise the position of the first
    /// 1 as two uniform bits.
    fn cleanup_pass(&mut self, plane: &mut CodingPlane<'_, '_>, mq: &mut MqEncoder) {
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
                    match (0..STRIPE_HEIGHT).find(|&k| plane.bit(stripe + k, col) == 1) {
                        None => {
                            mq.encode(0, self.contexts.state_mut(CTX_RUN));
                        }
                        Some(pos) => {
                            mq.encode(1, self.contexts.state_mut(CTX_RUN));
                            mq.encode(((pos >> 1) & 1) as u8, self.contexts.state_mut(CTX_UNIFORM));
                            mq.encode((pos & 1) as u8, self.contexts.state_mut(CTX_UNIFORM));
                            self.code_sign(plane, stripe + pos, col, mq);
                            for row in stripe + pos + 1..stripe + STRIPE_HEIGHT {
                                self.cleanup_sample(plane, row, col, mq);
                            }
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
        mq: &mut MqEncoder,
    ) {
        let (h, v, d) = self.significance.neighbor_counts(row, col);
        let bit = plane.bit(row, col);
        let ctx = context::zero_coding(plane.band(), h, v, d);
        mq.encode(bit, self.contexts.state_mut(ctx));
        self.significance.mark_visited(row, col);
        if bit == 1 {
            self.code_sign(plane, row, col, mq);
        }
    }

    /// Code the sign of a coefficient that just became significant.
    fn code_sign(
        &mut self,
        plane: &CodingPlane<'_, '_>,
        row: usize,
        col: usize,
        mq: &mut MqEncoder,
    ) {
        let negative = plane.is_negative(row, col);
        self.significance.mark_significant(row, col, negative);
        let (h, v) = self.significance.sign_contributions(row, col);
        let (ctx, xor) = context::sign_coding(h, v);
        mq.encode(negative as u8 ^ xor, self.contexts.state_mut(ctx));
        self.significance.mark_sign_coded(row, col);
    }
}

impl Default for EbCoder {
    fn default() -> Self {
        Self::new()
    }
}
