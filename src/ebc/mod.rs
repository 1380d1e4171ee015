//! Bitplane entropy coding (Tier-1 style).
//!
//! The subsystem is split the same way the coding proceeds:
//!
//! - `mq_coder`: the binary arithmetic encoder/decoder and its probability
//!   state table.
//! - `context`: maps neighbourhood state to context ids for the three
//!   coding passes.
//! - `block`: the code-block view over a band's storage, plus per-plane
//!   access.
//! - `coder` / `decoder`: drive the significance-propagation, refinement
//!   and cleanup passes bitplane by bitplane.

pub mod block;
pub mod coder;
pub mod context;
pub mod decoder;
pub mod mq_coder;

pub use block::{CodingBlock, CodingPlane};
pub use coder::EbCoder;
pub use decoder::EbDecoder;

/// Wavelet subband a code block belongs to. The zero-coding context tables
/// differ per subband since detail orientation changes which neighbours are
/// predictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubBand {
    /// Low-pass residual.
    Ll,
    /// Horizontal detail (high-pass along rows).
    Hl,
    /// Vertical detail (high-pass along columns).
    Lh,
    /// Diagonal detail.
    Hh,
}
