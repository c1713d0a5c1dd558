//! Spectral reduction
//!
//! A [`BucketMap`] describes how the `W/2 + 1` magnitude bins of one FFT are
//! folded into a shorter perceptual spectrum; [`SpectralReducer`] applies it.

mod bucket_map;
mod reducer;

pub use bucket_map::{Bucket, BucketMap, LogSpacedLayout};
pub use reducer::{reduce, SpectralReducer};
