//! Discrete-time building blocks of the control pipeline.

pub mod pi;
pub use pi::{PiConfig, PiController};

pub mod pr;
pub use pr::{PrConfig, PrController};

pub mod pll;
pub use pll::{Pll, PllConfig};

pub mod pwm;
pub use pwm::{space_vector, Modulation, Sector};

mod rate_limiter;
pub use rate_limiter::RateLimiter;
