//! Core value types.
//!
//! - [`DecodedSample`] is the 16-bit measurement carried by one valid response frame
//! - [`Sample`] is a decoded measurement stamped with its arrival sequence and time
//! - [`UpdateRate`] controls how often subscribers see new samples

mod sample;
mod update_rate;

pub use sample::{DecodedSample, Sample};
pub use update_rate::UpdateRate;
