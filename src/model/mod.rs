//! Model module: the hand-sign CNN built with the Burn framework
//!
//! ## Architecture
//!
//! - Three 3x3 convolution + 2x2 max-pool blocks (32, 64, 128 filters)
//! - Flatten
//! - Dense layer over the letter classes, softmax at inference

pub mod cnn;

pub use cnn::{HandSignCnn, HandSignCnnConfig};
