//! HTTP request handlers

pub mod health;
pub mod trace_demo;
