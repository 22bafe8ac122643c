pub mod health;
pub mod inbound;
pub mod rpc;

pub use health::health;
pub use rpc::{handle_attributes, handle_rpc};
