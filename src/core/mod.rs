//! Core translation engine module

pub mod client;
pub mod config;
pub mod errors;
pub mod languages;
pub mod models;
pub mod placeholder;
pub mod service;
pub mod skip;
pub mod unit;
pub mod validator;
