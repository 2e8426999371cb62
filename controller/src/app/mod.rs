pub mod controller;
pub mod intents;
pub mod options;
pub mod run;
pub mod session;
pub mod state;
