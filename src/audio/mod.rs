//! Audio processing utilities.
//!
//! Extracts audio tracks from lecture videos and splits long recordings into
//! segments small enough for the speech-to-text API.

mod extract;

pub use extract::{extract_audio, split_audio, AudioSlice};
