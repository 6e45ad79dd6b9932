pub mod parse;
#[allow(clippy::module_inception)]
pub mod sequence;
pub mod subregion;
