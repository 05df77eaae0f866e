//! External collaborators: the market gateway interface and its paper implementation.

pub mod gateway;
pub mod paper;

pub use gateway::{GatewayError, GatewayResult, MarketGateway};
pub use paper::PaperGateway;
