//! Fixed configuration of the inverter, supplied once at construction.

use crate::{
    control::{PiConfig, PllConfig, PrConfig},
    error::ConfigError,
    protection::Thresholds,
    transform::SQRT_3,
};
use core::f32::consts::{PI, SQRT_2, TAU};

/// Nameplate ratings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ratings {
    /// DC bus voltage (V)
    pub v_dc: f32,
    /// Grid line-to-line RMS voltage (V)
    pub v_grid: f32,
    /// Phase current magnitude (A)
    pub current: f32,
    /// Output power (W)
    pub power: f32,
    /// Grid frequency (Hz)
    pub frequency: f32,
}

impl Ratings {
    /// Peak phase voltage of the nominal grid, which is also the magnitude of
    /// its stationary-frame vector.
    pub fn grid_peak(&self) -> f32 {
        self.v_grid * SQRT_2 / SQRT_3
    }

    pub fn grid_omega(&self) -> f32 {
        TAU * self.frequency
    }
}

impl Default for Ratings {
    fn default() -> Self {
        Self {
            v_dc: 700.,
            v_grid: 380.,
            current: 100.,
            power: 50e3,
            frequency: 50.,
        }
    }
}

/// How the d-axis current reference evolves while in [`Mode::Startup`](crate::Mode::Startup).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StartupRamp {
    /// Multiply the reference by `factor` every cycle.
    Geometric { factor: f32 },
    /// Ramp from zero toward the commanded d-axis current at `slew` A/s.
    RateLimited { slew: f32 },
}

impl Default for StartupRamp {
    fn default() -> Self {
        Self::Geometric { factor: 0.99 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StartupConfig {
    pub ramp: StartupRamp,
    /// Control cycles spent in startup before running
    pub cycles: u32,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            ramp: StartupRamp::default(),
            cycles: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InverterConfig {
    /// Control loop period in seconds
    pub sample_period: f32,
    pub ratings: Ratings,
    /// Stationary-frame current regulators, output in volts
    pub current_loop: PrConfig,
    /// DC bus voltage regulator, output in amperes of d-axis current
    pub dc_link_loop: PiConfig,
    pub pll: PllConfig,
    pub protection: Thresholds,
    pub startup: StartupConfig,
    /// Bus voltage that ends precharge (V)
    pub precharge_voltage: f32,
    /// Smallest grid voltage vector magnitude accepted for connection (V)
    pub grid_min_voltage: f32,
}

impl Default for InverterConfig {
    fn default() -> Self {
        let t_s = 50e-6;
        let ratings = Ratings::default();
        let w_grid = ratings.grid_omega();
        // Largest phase voltage inside the linear modulation range
        let v_max = 0.95 * ratings.v_dc / SQRT_3;

        Self {
            sample_period: t_s,
            ratings,
            current_loop: PrConfig {
                k_p: 0.3,
                k_r: 30.,
                w_c: 10.,
                w_0: w_grid,
                t_s,
                u_min: -v_max,
                u_max: v_max,
            },
            dc_link_loop: PiConfig {
                k_p: 0.5,
                k_i: 50.,
                t_s,
                u_min: -ratings.current,
                u_max: ratings.current,
            },
            pll: PllConfig {
                k_p: 0.5,
                k_i: 0.0025,
                w_ff: w_grid,
                w_min: 0.9 * w_grid,
                w_max: 1.1 * w_grid,
                t_s,
            },
            protection: Thresholds {
                i_max: 1.2 * ratings.current,
                v_dc_max: 1.15 * ratings.v_dc,
                v_dc_min: 0.8 * ratings.v_dc,
                temp_max: 85.,
                debounce_cycles: 10,
            },
            startup: StartupConfig::default(),
            precharge_voltage: 0.9 * ratings.v_dc,
            grid_min_voltage: 0.8 * ratings.grid_peak(),
        }
    }
}

impl InverterConfig {
    /// Set the loop period of the configuration and of every regulator in it.
    pub fn set_sample_period(&mut self, t_s: f32) {
        self.sample_period = t_s;
        self.current_loop.t_s = t_s;
        self.dc_link_loop.t_s = t_s;
        self.pll.t_s = t_s;
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t_s = self.sample_period;
        if !(t_s > 0. && t_s.is_finite()) {
            return Err(ConfigError::SamplePeriod(t_s));
        }

        for (controller, found) in [
            ("current loop", self.current_loop.t_s),
            ("DC link loop", self.dc_link_loop.t_s),
            ("PLL", self.pll.t_s),
        ] {
            if found != t_s {
                return Err(ConfigError::SamplePeriodMismatch {
                    controller,
                    expected: t_s,
                    found,
                });
            }
        }

        for (controller, min, max) in [
            ("current loop", self.current_loop.u_min, self.current_loop.u_max),
            ("DC link loop", self.dc_link_loop.u_min, self.dc_link_loop.u_max),
        ] {
            if !(min < max) {
                return Err(ConfigError::OutputBounds {
                    controller,
                    min,
                    max,
                });
            }
        }

        let w0 = self.current_loop.w_0;
        if !(w0 > 0. && w0 < PI / t_s) {
            return Err(ConfigError::ResonantFrequency { w0 });
        }
        if !(self.current_loop.w_c > 0.) {
            return Err(ConfigError::ResonantBandwidth(self.current_loop.w_c));
        }

        let PllConfig {
            w_ff, w_min, w_max, ..
        } = self.pll;
        if !(w_min <= w_ff && w_ff <= w_max && w_min < w_max) {
            return Err(ConfigError::PllFrequencyBounds { w_ff, w_min, w_max });
        }

        let Thresholds {
            i_max,
            v_dc_max,
            v_dc_min,
            ..
        } = self.protection;
        if !(v_dc_min < v_dc_max) {
            return Err(ConfigError::BusThresholds {
                min: v_dc_min,
                max: v_dc_max,
            });
        }
        if !(i_max > 0.) {
            return Err(ConfigError::CurrentThreshold(i_max));
        }

        if !(self.ratings.current > 0.) {
            return Err(ConfigError::RatedCurrent(self.ratings.current));
        }

        match self.startup.ramp {
            StartupRamp::Geometric { factor } if !(factor > 0. && factor <= 1.) => {
                Err(ConfigError::StartupRamp(factor))
            }
            StartupRamp::RateLimited { slew } if !(slew > 0. && slew.is_finite()) => {
                Err(ConfigError::StartupRamp(slew))
            }
            _ => Ok(()),
        }
    }
}
