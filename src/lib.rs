// src/lib.rs

pub mod config;
pub mod console;
pub mod core;
pub mod hub;
pub mod server;
