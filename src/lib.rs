pub mod config;
pub mod error;
pub mod generation;
pub mod response;
pub mod server;
pub mod tools;
