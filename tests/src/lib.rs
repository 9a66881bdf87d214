//! # Mempool-Sentinel Test Suite
//!
//! Unified test crate for cross-subsystem flows that no single crate can
//! exercise alone: attack waves driving drift and self-healing, degraded
//! watchdog windows, and the composed admission surface.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sentinel-tests
//! cargo test -p sentinel-tests integration::
//! ```

#![allow(unused_imports)]

pub mod integration;
