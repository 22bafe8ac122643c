pub mod collector;
pub mod config;
pub mod error;
pub mod formatter;
pub mod gateway;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod sink;
pub mod snmp;

pub use error::{GatewayError, ParseError, ProtocolError};
