//! bufconfig library
//!
//! The multi-version configuration model for `buf.yaml`, `buf.lock`,
//! `buf.gen.yaml` and `buf.work.yaml`. This module exports the core
//! components for testing and integration.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalpath;
pub mod storage;
