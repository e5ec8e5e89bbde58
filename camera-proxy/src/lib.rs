pub mod config;
pub mod errors;
pub mod serde_helpers;
pub mod sdk;
pub mod pipe;
pub mod receiver;
#[cfg(test)]
mod receiver_test;
pub mod maintenance;
pub mod transcoder;
pub mod shutdown;
pub mod session;
pub mod app;
#[cfg(test)]
mod mock;

pub use errors::*;
