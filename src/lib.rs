mod clock;
mod control;
mod decode;
pub mod error;
mod ffi_hwaccel;
mod flags;
pub mod frame;
mod hwaccel;
mod io;
pub mod location;
pub mod media;
pub mod options;
mod packet;
pub mod rational;
mod scale;

pub use error::{InitFailure, MediaError};
pub use frame::{
    AudioFrame, ColorRange, ColorSpace, PixelFormat, SampleFormat, VideoFrame, MAX_AV_PLANES,
};
pub use location::Location;
pub use media::{Media, MediaBuilder};
pub use options::Options;
pub use rational::Rational;
pub use rsmpeg::ffi;

/// Re-export internal `AVFrame` for callers that need the raw frame type.
pub type RawFrame = rsmpeg::avutil::AVFrame;
