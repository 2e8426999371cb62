//! Admin console API access

pub mod api;
pub mod client;
pub mod tasks;
pub mod versions;
