//! Context modeling for the three coding passes.
//!
//! Nineteen adaptive contexts drive the MQ coder: ids 0-8 code significance
//! (zero coding, keyed by subband and neighbourhood), 9-13 code signs,
//! 14-16 code refinement bits, 17 is the run-length context and 18 the
//! uniform context for run-interrupt positions. All contexts reset at every
//! code block.
//!
//! The per-sample significance state lives here too, since context
//! formation is a function of it.

use super::mq_coder::ContextState;
use super::SubBand;

pub const CONTEXT_COUNT: usize = 19;
pub const CTX_RUN: usize = 17;
pub const CTX_UNIFORM: usize = 18;

const SIGN_CTX_BASE: usize = 9;
const REFINEMENT_CTX_BASE: usize = 14;

/// The mutable `(state, mps)` pairs of one coder instance.
pub struct ContextSet {
    states: [ContextState; CONTEXT_COUNT],
}

impl ContextSet {
    /// Fresh per-block context bank: everything at state 0 except the
    /// run-length context (state 3) and the uniform context (state 46).
    pub fn new() -> Self {
        let mut states = [ContextState::default(); CONTEXT_COUNT];
        states[CTX_RUN] = ContextState::new(3, 0);
        states[CTX_UNIFORM] = ContextState::new(46, 0);
        Self { states }
    }

    pub fn state_mut(&mut self, id: usize) -> &mut ContextState {
        &mut self.states[id]
    }
}

impl Default for ContextSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Zero-coding context from the number of significant horizontal, vertical
/// and diagonal neighbours. HL swaps the roles of rows and columns, HH is
/// diagonal-dominant.
pub fn zero_coding(band: SubBand, h: u8, v: u8, d: u8) -> usize {
    let (first, second) = match band {
        SubBand::Ll | SubBand::Lh => (h, v),
        SubBand::Hl => (v, h),
        SubBand::Hh => {
            return match (d, h + v) {
                (d, _) if d >= 3 => 8,
                (2, hv) if hv >= 1 => 7,
                (2, 0) => 6,
                (1, hv) if hv >= 2 => 5,
                (1, 1) => 4,
                (1, 0) => 3,
                (0, hv) if hv >= 2 => 2,
                (0, 1) => 1,
                _ => 0,
            };
        }
    };
    match (first, second, d) {
        (2, _, _) => 8,
        (1, s, _) if s >= 1 => 7,
        (1, 0, d) if d >= 1 => 6,
        (1, 0, 0) => 5,
        (0, 2, _) => 4,
        (0, 1, _) => 3,
        (0, 0, d) if d >= 2 => 2,
        (0, 0, 1) => 1,
        _ => 0,
    }
}

/// Sign-coding context from the clamped horizontal and vertical sign
/// contributions. Returns the context id and the XOR bit applied to the
/// sign before coding.
pub fn sign_coding(h: i8, v: i8) -> (usize, u8) {
    let (offset, xor) = match (h, v) {
        (1, 1) => (4, 0),
        (1, 0) => (3, 0),
        (1, -1) => (2, 0),
        (0, 1) => (1, 0),
        (0, 0) => (0, 0),
        (0, -1) => (1, 1),
        (-1, 1) => (2, 1),
        (-1, 0) => (3, 1),
        _ => (4, 1),
    };
    (SIGN_CTX_BASE + offset, xor)
}

/// Magnitude-refinement context: first refinement splits on whether any
/// neighbour is significant, later refinements share one context.
pub fn magnitude_refinement(first_refinement: bool, any_significant_neighbor: bool) -> usize {
    if first_refinement {
        if any_significant_neighbor {
            REFINEMENT_CTX_BASE + 1
        } else {
            REFINEMENT_CTX_BASE
        }
    } else {
        REFINEMENT_CTX_BASE + 2
    }
}

const SIG: u8 = 1 << 0;
const JUST_SIG: u8 = 1 << 1;
const VISITED: u8 = 1 << 2;
const REFINED: u8 = 1 << 3;
const NEG: u8 = 1 << 4;
const SIGN_CODED: u8 = 1 << 5;

/// Per-sample coding state for one code block.
///
/// A sample that codes a 1 becomes `just significant` for the rest of the
/// plane, so the refinement pass of the same plane skips it; `end_plane`
/// promotes it to fully significant. The visited flag marks samples the
/// significance-propagation pass already coded, so cleanup leaves them
/// alone.
pub struct SignificanceMap {
    flags: Vec<u8>,
    rows: usize,
    columns: usize,
}

impl SignificanceMap {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            flags: vec![0; rows * columns],
            rows,
            columns,
        }
    }

    fn at(&self, row: usize, col: usize) -> u8 {
        self.flags[row * self.columns + col]
    }

    fn or(&mut self, row: usize, col: usize, bits: u8) {
        self.flags[row * self.columns + col] |= bits;
    }

    /// Significant as seen by neighbourhood queries, including samples that
    /// became significant earlier in the current plane.
    pub fn is_significant(&self, row: usize, col: usize) -> bool {
        self.at(row, col) & (SIG | JUST_SIG) != 0
    }

    /// Significant before the current plane started; the refinement pass
    /// visits exactly these.
    pub fn was_significant(&self, row: usize, col: usize) -> bool {
        self.at(row, col) & SIG != 0
    }

    pub fn is_negative(&self, row: usize, col: usize) -> bool {
        self.at(row, col) & NEG != 0
    }

    pub fn mark_significant(&mut self, row: usize, col: usize, negative: bool) {
        self.or(row, col, if negative { JUST_SIG | NEG } else { JUST_SIG });
    }

    pub fn mark_sign_coded(&mut self, row: usize, col: usize) {
        self.or(row, col, SIGN_CODED);
    }

    pub fn is_sign_coded(&self, row: usize, col: usize) -> bool {
        self.at(row, col) & SIGN_CODED != 0
    }

    pub fn is_visited(&self, row: usize, col: usize) -> bool {
        self.at(row, col) & VISITED != 0
    }

    pub fn mark_visited(&mut self, row: usize, col: usize) {
        self.or(row, col, VISITED);
    }

    pub fn is_refined(&self, row: usize, col: usize) -> bool {
        self.at(row, col) & REFINED != 0
    }

    pub fn mark_refined(&mut self, row: usize, col: usize) {
        self.or(row, col, REFINED);
    }

    /// Promote just-significant samples and clear the per-plane visit marks.
    pub fn end_plane(&mut self) {
        for flags in &mut self.flags {
            if *flags & JUST_SIG != 0 {
                *flags = (*flags & !JUST_SIG) | SIG;
            }
            *flags &= !VISITED;
        }
    }

    /// Count significant 8-neighbours, split into horizontal, vertical and
    /// diagonal groups. Neighbours outside the block do not contribute.
    pub fn neighbor_counts(&self, row: usize, col: usize) -> (u8, u8, u8) {
        let mut h = 0;
        let mut v = 0;
        let mut d = 0;
        let left = col > 0;
        let right = col + 1 < self.columns;
        let up = row > 0;
        let down = row + 1 < self.rows;

        if left && self.is_significant(row, col - 1) {
            h += 1;
        }
        if right && self.is_significant(row, col + 1) {
            h += 1;
        }
        if up && self.is_significant(row - 1, col) {
            v += 1;
        }
        if down && self.is_significant(row + 1, col) {
            v += 1;
        }
        if up && left && self.is_significant(row - 1, col - 1) {
            d += 1;
        }
        if up && right && self.is_significant(row - 1, col + 1) {
            d += 1;
        }
        if down && left && self.is_significant(row + 1, col - 1) {
            d += 1;
        }
        if down && right && self.is_significant(row + 1, col + 1) {
            d += 1;
        }
        (h, v, d)
    }

    pub fn has_significant_neighbor(&self, row: usize, col: usize) -> bool {
        let (h, v, d) = self.neighbor_counts(row, col);
        h + v + d > 0
    }

    /// Clamped sign contributions of the horizontal and vertical neighbours:
    /// +1 if the significant ones agree positive, -1 if negative, 0 if none
    /// or cancelling.
    pub fn sign_contributions(&self, row: usize, col: usize) -> (i8, i8) {
        let value = |r: usize, c: usize| -> i8 {
            if !self.is_significant(r, c) {
                0
            } else if self.is_negative(r, c) {
                -1
            } else {
                1
            }
        };
        let mut h = 0i8;
        if col > 0 {
            h += value(row, col - 1);
        }
        if col + 1 < self.columns {
            h += value(row, col + 1);
        }
        let mut v = 0i8;
        if row > 0 {
            v += value(row - 1, col);
        }
        if row + 1 < self.rows {
            v += value(row + 1, col);
        }
        (h.clamp(-1, 1), v.clamp(-1, 1))
    }
}
