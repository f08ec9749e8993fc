//! Synchronous reference frame phase-locked loop.
//!
//! Rotates the grid voltage vector into a frame at the estimated angle and
//! drives the quadrature component to zero, which aligns the d axis with the
//! grid voltage.

use crate::transform::{park, AlphaBeta};
use core::f32::consts::TAU;
use num_traits::Float;

/// Relative quadrature voltage (|vq| / |v|) below which the loop counts as aligned.
pub const LOCK_THRESHOLD: f32 = 0.05;

/// Consecutive aligned samples before lock is declared.
pub const LOCK_COUNT: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PllConfig {
    pub k_p: f32,
    /// Integral gain applied once per sample (no sample period factor)
    pub k_i: f32,
    /// Feed-forward (nominal grid) angular frequency in rad/s
    pub w_ff: f32,
    pub w_min: f32,
    pub w_max: f32,
    /// Sample period in seconds
    pub t_s: f32,
}

#[derive(Debug, Clone)]
pub struct Pll {
    config: PllConfig,
    theta: f32,
    omega: f32,
    integrator: f32,
    v_d: f32,
    v_q: f32,
    v_mag: f32,
    locked: bool,
    lock_counter: u16,
}

impl Pll {
    pub fn new(config: PllConfig) -> Self {
        Self {
            omega: config.w_ff,
            config,
            theta: 0.,
            integrator: 0.,
            v_d: 0.,
            v_q: 0.,
            v_mag: 0.,
            locked: false,
            lock_counter: 0,
        }
    }

    /// Advance the loop by one sample of the grid voltage in the stationary frame.
    pub fn update(&mut self, v: AlphaBeta) {
        let PllConfig {
            k_p,
            k_i,
            w_ff,
            w_min,
            w_max,
            t_s,
        } = self.config;

        if !(v.alpha.is_finite() && v.beta.is_finite()) {
            self.unlock();
            return;
        }

        let dq = park(v, self.theta);
        self.v_d = dq.d;
        self.v_q = dq.q;
        self.v_mag = v.magnitude();

        // vq = |v| sin(grid angle - theta), positive while the frame lags
        let error = self.v_q;

        self.integrator = (self.integrator + k_i * error)
            .min(w_max - w_ff)
            .max(w_min - w_ff);
        self.omega = (w_ff + k_p * error + self.integrator).min(w_max).max(w_min);

        self.theta += self.omega * t_s;
        while self.theta >= TAU {
            self.theta -= TAU;
        }
        while self.theta < 0. {
            self.theta += TAU;
        }
        // -tiny + TAU rounds to TAU
        if self.theta >= TAU {
            self.theta = 0.;
        }

        let aligned = self.v_mag > 0. && Float::abs(self.v_q) / self.v_mag < LOCK_THRESHOLD;
        if aligned {
            if self.lock_counter < LOCK_COUNT {
                self.lock_counter += 1;
            } else {
                if !self.locked {
                    log::debug!("PLL locked at {} rad/s", self.omega);
                }
                self.locked = true;
            }
        } else {
            self.unlock();
        }
    }

    fn unlock(&mut self) {
        if self.locked {
            log::debug!("PLL lost lock");
        }
        self.lock_counter = 0;
        self.locked = false;
    }

    /// Return to the power-on estimate: zero angle at the feed-forward frequency.
    pub fn reset(&mut self) {
        self.theta = 0.;
        self.omega = self.config.w_ff;
        self.integrator = 0.;
        self.v_d = 0.;
        self.v_q = 0.;
        self.v_mag = 0.;
        self.locked = false;
        self.lock_counter = 0;
    }

    pub fn config(&self) -> &PllConfig {
        &self.config
    }

    /// Estimated grid angle in `[0, 2π)`.
    pub fn theta(&self) -> f32 {
        self.theta
    }

    /// Estimated grid angular frequency in rad/s.
    pub fn omega(&self) -> f32 {
        self.omega
    }

    pub fn integrator(&self) -> f32 {
        self.integrator
    }

    pub fn vd(&self) -> f32 {
        self.v_d
    }

    pub fn vq(&self) -> f32 {
        self.v_q
    }

    pub fn v_mag(&self) -> f32 {
        self.v_mag
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock_counter(&self) -> u16 {
        self.lock_counter
    }
}
