//! Quire - library catalog, blog and book REST API
//!
//! This library provides the core functionality for the Quire server.

pub mod api;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod services;
