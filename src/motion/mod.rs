pub mod farneback;
pub mod flow;
pub mod interpolate;
pub mod kernel_cache;
