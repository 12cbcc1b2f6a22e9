pub mod json;
pub mod modular;
