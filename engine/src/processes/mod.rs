pub mod scaffolder;
pub mod strategy;
