/*!
# hsi-codec

A lossy compression engine for hyperspectral image cubes, built the way
JPEG2000 builds its core: a spectral front-end projects the bands onto a
smaller subspace, each reduced band goes through a dyadic 2-D wavelet
transform, the coefficients are scalar-quantized into sign-magnitude
integers, partitioned into subband-aligned code blocks, and entropy-coded
bitplane by bitplane with a context-driven MQ arithmetic coder.

The crate is a library of codec building blocks plus the glue that chains
them:

- `bits`: MSB-first bit I/O over byte buffers.
- `image` / `matrix`: the integer cube, band views, and the shared
  integer-matrix capability code blocks window into.
- `wavelet`: CDF 9/7 lifting, multi-level, with the stepper that also
  locates subband boundaries.
- `quantizer`: dead-zone scalar quantization to sign-magnitude form.
- `blocker`: the deterministic subband-respecting block partition both
  codec directions must agree on.
- `ebc`: the bitplane entropy coder (MQ coder, context model, three-pass
  block coder and its mirror decoder).
- `reduction`: spectral dimensionality reduction (deletion, PCA, MNF)
  behind a one-byte stream tag.
- `comdec`: `Compressor`/`Decompressor` orchestration and the parameter
  block at the head of every stream.

```no_run
use hsi_codec::bits::{BitReader, BitWriter};
use hsi_codec::comdec::{Compressor, Decompressor};
use hsi_codec::image::{HyperspectralImage, ImageHeader, SampleType};
use hsi_codec::reduction::DimensionalityReduction;

fn roundtrip(image: &HyperspectralImage) -> Result<HyperspectralImage, hsi_codec::CodecError> {
    let mut reduction = DimensionalityReduction::pca(8);
    let mut writer = BitWriter::new();
    Compressor::default().compress(image, &mut reduction, &mut writer)?;
    let stream = writer.finish();

    let mut reader = BitReader::new(&stream);
    Decompressor::decompress(&image.header(), &mut reader)
}
```

The codec path is single-threaded and strictly sequential; if parallelism
is wanted it belongs above this crate, one band per worker, since bands
share no mutable codec state.
*/

pub mod bits;
pub mod blocker;
pub mod comdec;
pub mod ebc;
pub mod error;
pub mod image;
pub mod matrix;
pub mod quantizer;
pub mod reduction;
pub mod wavelet;

pub use error::CodecError;
