//! Domain models

pub mod downstream;
pub mod release;
