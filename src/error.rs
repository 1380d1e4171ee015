use thiserror::Error;

/// Errors produced by the codec.
///
/// Three families: configuration errors are raised eagerly when a component
/// is built with bad parameters, contract violations indicate a bug in the
/// driving code, and framing errors mean the coded stream cannot be decoded.
/// Quantizer saturation is not an error and is only logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    // Configuration errors
    #[error("quantizer exponent {0} not in [0, 32)")]
    InvalidExponent(u8),
    #[error("quantizer mantissa {0} not in [0, 2048)")]
    InvalidMantissa(u16),
    #[error("quantizer guard {0} not in [0, 7]")]
    InvalidGuard(u8),
    #[error("sample limits [{0}, {1}] do not form a non-empty interval")]
    InvalidSampleLimits(f32, f32),
    #[error("reconstruction offset {0} not in [-1, 1]")]
    InvalidReconstructionOffset(f32),
    #[error("exponent 0 with guard 0 leaves no quantization interval")]
    DegenerateQuantizer,
    #[error("expected block dimension {0} is not a power of two")]
    BlockDimNotPowerOfTwo(usize),
    #[error("max block dimension {0} is smaller than the expected dimension {1}")]
    MaxBlockDimTooSmall(usize, usize),
    #[error("bit depth {0} not in [2, 32]")]
    InvalidBitDepth(u8),
    #[error("quantizer setup yields no magnitude bitplanes")]
    NotEnoughBitplanes,

    // Contract violations
    #[error("requested bitplane {requested} does not exist, available [0, {available})")]
    NoSuchBitplane { requested: u8, available: u8 },
    #[error("block at ({row}, {col}) of size {height}x{width} exceeds its {rows}x{columns} parent")]
    BlockOutOfBounds {
        row: usize,
        col: usize,
        height: usize,
        width: usize,
        rows: usize,
        columns: usize,
    },
    #[error("coefficient at ({row}, {col}) carries a sign with zero magnitude")]
    SignedZeroCoefficient { row: usize, col: usize },
    #[error("band is {got_rows}x{got_cols}, expected {rows}x{cols}")]
    BandSizeMismatch {
        rows: usize,
        cols: usize,
        got_rows: usize,
        got_cols: usize,
    },
    #[error("reduced cube has {got} components, reduction expects {expected}")]
    ComponentCountMismatch { expected: usize, got: usize },
    #[error("more components requested ({requested}) than source bands ({available})")]
    TooManyComponents { requested: usize, available: usize },

    // Stream framing errors
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,
    #[error("unknown dimensionality reduction tag {0}")]
    UnknownReductionTag(u8),
    #[error("dimensionality reduction used before training")]
    ReductionNotTrained,
    #[error("noise covariance decomposition failed")]
    NoiseDecompositionFailed,
}
