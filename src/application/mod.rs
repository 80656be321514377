//! Application layer: wires configuration, credentials and services into a
//! ready-to-use gateway.

pub mod gateway;

pub use gateway::Gateway;
