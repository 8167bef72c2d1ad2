//! HTTP layer for the FIRMS caching proxy.
//!
//! Exposes the cached CSV feed, the health report and Prometheus metrics,
//! and serves the frontend bundle for every other path.

pub mod handler;
pub mod static_files;
