pub extern crate actix_web;

pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod cursor_registry;
pub mod handlers;
pub mod hub;
pub mod hub_state;
