pub mod collapsed;
pub mod overlay;
