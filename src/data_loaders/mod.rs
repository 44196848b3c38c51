pub mod json;
pub mod settings;
