//! Request and response models for the admin console release API.

pub mod models;
