//! HTTP API: configuration, composition root, routing, and request/response
//! mapping.

pub mod app;
pub mod config;
