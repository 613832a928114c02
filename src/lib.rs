//! X-ray Review Service
//!
//! This library provides the core of the xray-review system: an in-memory
//! review queue that hands submitted photos to workers, collects candidate
//! results, and archives the ones a reviewer confirms, plus the fracture
//! compositing algorithm reviewers can apply to a candidate before confirming.

pub mod app_state;
pub mod config;
pub mod imaging;
pub mod models;
pub mod routes;
pub mod services;
