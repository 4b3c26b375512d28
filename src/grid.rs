pub mod assigner;
pub mod bbox;
pub mod geo;
