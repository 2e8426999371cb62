//! relctl Library
//!
//! Release lifecycle decisions and polling for an installed application.

pub mod app;
pub mod errors;
pub mod http;
pub mod lifecycle;
pub mod logs;
pub mod models;
pub mod storage;
pub mod utils;
pub mod workers;
