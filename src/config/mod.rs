pub mod file;
pub mod settings;
