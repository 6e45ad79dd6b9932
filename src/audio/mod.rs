//! Audio retiming and muxing.

pub mod mux;
pub mod tempo;
