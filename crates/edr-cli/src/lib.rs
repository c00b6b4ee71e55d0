//! Library components of the EDR rules exporter.
//!
//! The binary wires these together: [`config`] resolves settings,
//! [`logging`] sets up `tracing`, and [`pipeline::run`] performs the export,
//! counting rules with [`metrics`] and writing through [`output`].

pub mod config;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod pipeline;
