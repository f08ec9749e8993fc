//! Control core for a three-phase grid-tied inverter.
//!
//! ```
//! use gridtie::{Inverter, Mode, SampleFrame};
//!
//! let mut inverter = Inverter::builder().build().unwrap();
//! inverter.start().unwrap();
//!
//! let frame = SampleFrame {
//!     v_dc: 700.,
//!     temperature: 25.,
//!     ..SampleFrame::default()
//! };
//! let duties = inverter.control_loop(&frame);
//!
//! assert_eq!(inverter.mode(), Mode::GridCheck);
//! assert_eq!(duties, [0.5; 3]);
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod config;
pub use config::{InverterConfig, Ratings, StartupConfig, StartupRamp};

pub mod control;

pub mod drive;
pub use drive::{GateDrive, PwmGateDrive};

pub mod error;
pub use error::{CommandError, ConfigError, ModulationError};

pub mod inverter;
pub use inverter::{Builder, Diagnostics, Inverter, Mode};

pub mod model;
pub use model::{SampleFrame, Sampler, SensorBank};

pub mod protection;
pub use protection::{FaultKind, FaultLog, FaultSet, NoFaultLog, Protection, Thresholds};

pub mod transform;
pub use transform::{Abc, AlphaBeta, Dq};
