//! liquidclock: a particle clock
//!
//! Particles settle into the current time of day, two concentric rings, or
//! a short result text, and flow like a fluid when the device is tilted or
//! shaken. The library holds the simulation and renders into a software
//! pixel buffer; the `window` feature adds an SDL2 host binary.

pub mod config;
pub mod control;
pub mod display;
pub mod error;
pub mod forcing;
pub mod math;
pub mod mqtt;
pub mod particles;
pub mod physics;
pub mod sampler;
pub mod simulation;
pub mod state;
pub mod util;

pub use config::Config;
pub use error::{Error, Result};
pub use forcing::SharedForcing;
pub use simulation::{ClockSource, FixedClock, LocalClock, Simulation, Surface};
pub use state::DisplayState;
