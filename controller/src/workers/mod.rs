//! Background polling primitives

pub mod registry;
pub mod repeater;
