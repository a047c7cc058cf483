//! Uniform control surface for USB-attached presence-indicator LED lights.
//!
//! Five layered components, leaves first: [`transport`] (HID/serial wire
//! adapters), [`driver`] (one wire encoding per product family),
//! [`registry`] (enumeration, ownership, plug/unplug), [`effect`] (the
//! cooperative scheduler and effect library), and [`controller`] (the
//! user-facing Selection/operation façade). A CLI or HTTP binding is a thin
//! layer over [`controller::Controller`]; neither is part of this crate.
pub mod color;
pub mod config;
pub mod controller;
pub mod driver;
pub mod effect;
pub mod error;
pub mod logging;
pub mod registry;
pub mod transport;

pub use color::{Colour, LedIndex};
pub use config::CoreConfig;
pub use controller::{Controller, Selection};
pub use error::{LumenError, Result};
pub use registry::{LightIdentity, Registry};
