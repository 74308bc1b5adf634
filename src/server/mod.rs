//! HTTP control panel

pub mod api;
