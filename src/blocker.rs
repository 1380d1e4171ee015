//! Deterministic partition of a wavelet-transformed band into code blocks.
//!
//! Every emitted block lies inside exactly one subband, holds at most
//! `expected_dim^2` samples, and long-thin blocks keep their short side at
//! `expected_dim / 2` or more so the cleanup pass can still run stripes.
//! The emission order is a pure function of the arguments; encoder and
//! decoder both walk it and must agree block for block.

use crate::ebc::SubBand;
use crate::error::CodecError;
use crate::wavelet::step_sizes;

/// Blocks are expected to be 64x64 samples.
pub const DEFAULT_EXPECTED_DIM: usize = 64;
/// With at most 64x64 = 4096 samples per block, capping the long side at
/// 1024 keeps the other dimension at 4 samples or more, enough for the
/// run-length stripes of the entropy coder.
pub const DEFAULT_MAX_BLOCK_DIM: usize = 1024;

/// Position and shape of one code block inside its band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub row: usize,
    pub col: usize,
    pub height: usize,
    pub width: usize,
    pub band: SubBand,
}

pub struct Blocker {
    expected_dim: usize,
    max_dim: usize,
    max_size: usize,
    blocks: Vec<BlockDescriptor>,
}

impl Blocker {
    /// Partition a `lines x samples` band decomposed by `wavelet_steps`
    /// levels. `expected_dim` must be a power of two and `max_dim` at least
    /// as large.
    pub fn new(
        lines: usize,
        samples: usize,
        wavelet_steps: usize,
        expected_dim: usize,
        max_dim: usize,
    ) -> Result<Self, CodecError> {
        if expected_dim == 0 || !expected_dim.is_power_of_two() {
            return Err(CodecError::BlockDimNotPowerOfTwo(expected_dim));
        }
        if max_dim < expected_dim {
            return Err(CodecError::MaxBlockDimTooSmall(max_dim, expected_dim));
        }

        let mut blocker = Self {
            expected_dim,
            max_dim,
            max_size: expected_dim * expected_dim,
            blocks: Vec::new(),
        };
        blocker.block(lines, samples, wavelet_steps);
        Ok(blocker)
    }

    pub fn blocks(&self) -> &[BlockDescriptor] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<BlockDescriptor> {
        self.blocks
    }

    /// Walk the subband layout from the innermost LL outwards. The LL sits
    /// at the smallest stepper size; each coarser level contributes its HL,
    /// LH and HH rings.
    fn block(&mut self, lines: usize, samples: usize, wavelet_steps: usize) {
        let rows = step_sizes(lines, wavelet_steps);
        let cols = step_sizes(samples, wavelet_steps);
        let mut row = 0;
        let mut col = 0;
        for i in (0..=wavelet_steps).rev() {
            if i == wavelet_steps {
                self.block_region(SubBand::Ll, row, col, rows[i], cols[i]);
            } else {
                self.block_region(SubBand::Hl, 0, col, row, cols[i] - col);
                self.block_region(SubBand::Lh, row, 0, rows[i] - row, col);
                self.block_region(SubBand::Hh, row, col, rows[i] - row, cols[i] - col);
            }
            row = rows[i];
            col = cols[i];
        }
    }

    /// Subdivide a single-subband region into blocks, top-left to
    /// bottom-right.
    fn block_region(&mut self, band: SubBand, strow: usize, stcol: usize, rows: usize, cols: usize) {
        // corner case: region of zero size
        if rows == 0 || cols == 0 {
            return;
        }

        let expected = self.expected_dim;
        if rows < expected && cols < expected {
            // whole region fits in one block
            self.push(strow, stcol, rows, cols, band);
        } else if rows < expected {
            // short vertically: emit a long horizontal block and recurse right
            let max_length = (self.max_size / rows).min(self.max_dim);
            let length = max_length.min(cols);
            self.push(strow, stcol, rows, length, band);
            if length < cols {
                self.block_region(band, strow, stcol + length, rows, cols - length);
            }
        } else if cols < expected {
            // short horizontally: emit a long vertical block and recurse down
            let max_length = (self.max_size / cols).min(self.max_dim);
            let length = max_length.min(rows);
            self.push(strow, stcol, length, cols, band);
            if length < rows {
                self.block_region(band, strow + length, stcol, rows - length, cols);
            }
        } else {
            // full block at the top left, then the three remaining regions
            self.push(strow, stcol, expected, expected, band);
            self.block_region(band, strow, stcol + expected, expected, cols - expected);
            self.block_region(band, strow + expected, stcol, rows - expected, expected);
            self.block_region(
                band,
                strow + expected,
                stcol + expected,
                rows - expected,
                cols - expected,
            );
        }
    }

    fn push(&mut self, row: usize, col: usize, height: usize, width: usize, band: SubBand) {
        self.blocks.push(BlockDescriptor {
            row,
            col,
            height,
            width,
            band,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(
        lines: usize,
        samples: usize,
        steps: usize,
        expected: usize,
        max_dim: usize,
    ) -> Vec<BlockDescriptor> {
        Blocker::new(lines, samples, steps, expected, max_dim)
            .unwrap()
            .into_blocks()
    }

    #[test]
    fn test_rejects_bad_dims() {
        assert!(matches!(
            Blocker::new(16, 16, 1, 48, 1024),
            Err(CodecError::BlockDimNotPowerOfTwo(48))
        ));
        assert!(matches!(
            Blocker::new(16, 16, 1, 64, 32),
            Err(CodecError::MaxBlockDimTooSmall(32, 64))
        ));
    }

    #[test]
    fn test_small_band_one_block_per_subband() {
        let list = blocks(16, 16, 1, 64, 1024);
        assert_eq!(list.len(), 4);
        for block in &list {
            assert_eq!((block.height, block.width), (8, 8));
        }
        assert_eq!(list[0].band, SubBand::Ll);
        assert_eq!((list[0].row, list[0].col), (0, 0));
        assert_eq!(list[1].band, SubBand::Hl);
        assert_eq!((list[1].row, list[1].col), (0, 8));
        assert_eq!(list[2].band, SubBand::Lh);
        assert_eq!((list[2].row, list[2].col), (8, 0));
        assert_eq!(list[3].band, SubBand::Hh);
        assert_eq!((list[3].row, list[3].col), (8, 8));
    }

    #[test]
    fn test_typical_band_block_counts() {
        let list = blocks(512, 512, 3, 64, 1024);

        // The innermost LL is 64x64: exactly one full-size block.
        let ll: Vec<_> = list.iter().filter(|b| b.band == SubBand::Ll).collect();
        assert_eq!(ll.len(), 1);
        assert_eq!((ll[0].height, ll[0].width), (64, 64));

        // The outermost HH ring is 256x256 and tiles into sixteen 64x64s.
        let outer_hh: Vec<_> = list
            .iter()
            .filter(|b| b.band == SubBand::Hh && b.row >= 256 && b.col >= 256)
            .collect();
        assert_eq!(outer_hh.len(), 16);
        assert!(outer_hh.iter().all(|b| b.height == 64 && b.width == 64));

        // One LL block plus 1 + 4 + 16 blocks in each of the three detail
        // orientations per level.
        assert_eq!(list.len(), 1 + 3 * (1 + 4 + 16));
    }

    #[test]
    fn test_determinism() {
        let a = blocks(300, 173, 4, 32, 512);
        let b = blocks(300, 173, 4, 32, 512);
        assert_eq!(a, b);
    }

    #[test]
    fn test_coverage_no_overlap() {
        for &(lines, samples, steps) in
            &[(16usize, 16usize, 1usize), (100, 60, 2), (512, 512, 3), (37, 129, 3)]
        {
            let list = blocks(lines, samples, steps, 16, 256);
            let mut covered = vec![false; lines * samples];
            for block in &list {
                assert!(block.height * block.width <= 16 * 16);
                for i in block.row..block.row + block.height {
                    for j in block.col..block.col + block.width {
                        assert!(
                            !covered[i * samples + j],
                            "overlap at ({}, {}) for {}x{}",
                            i,
                            j,
                            lines,
                            samples
                        );
                        covered[i * samples + j] = true;
                    }
                }
            }
            assert!(
                covered.iter().all(|&c| c),
                "uncovered samples in {}x{} over {} steps",
                lines,
                samples,
                steps
            );
        }
    }

    #[test]
    fn test_blocks_respect_subband_boundaries() {
        let lines = 48;
        let samples = 80;
        let steps = 2;
        let rows = crate::wavelet::step_sizes(lines, steps);
        let cols = crate::wavelet::step_sizes(samples, steps);
        for block in blocks(lines, samples, steps, 16, 256) {
            // A block straddles a boundary if any stepper line cuts through
            // its interior.
            for &r in &rows {
                assert!(
                    block.row >= r || block.row + block.height <= r,
                    "block {:?} straddles row boundary {}",
                    block,
                    r
                );
            }
            for &c in &cols {
                assert!(
                    block.col >= c || block.col + block.width <= c,
                    "block {:?} straddles column boundary {}",
                    block,
                    c
                );
            }
        }
    }

    #[test]
    fn test_long_thin_blocks_bounded() {
        // A 4-line region at default dims should produce 4x1024 blocks.
        let list = blocks(4, 4096, 0, DEFAULT_EXPECTED_DIM, DEFAULT_MAX_BLOCK_DIM);
        assert_eq!(list.len(), 4);
        for block in &list {
            assert_eq!(block.height, 4);
            assert_eq!(block.width, 1024);
        }
    }
}
