//! Proportional-resonant regulator.
//!
//! G(s) = Kp + Kr * 2*wc*s / (s^2 + 2*wc*s + wd^2), discretised with the
//! bilinear transform pre-warped at the resonant frequency.

use num_traits::Float;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrConfig {
    /// Proportional gain
    pub k_p: f32,
    /// Resonant gain
    pub k_r: f32,
    /// Resonant bandwidth (rad/s)
    pub w_c: f32,
    /// Resonant frequency (rad/s)
    pub w_0: f32,
    /// Sample period in seconds
    pub t_s: f32,
    pub u_min: f32,
    pub u_max: f32,
}

/// Discretised resonant term, `a0` normalised to one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Coefficients {
    fn resonant(w_c: f32, w_0: f32, t_s: f32) -> Self {
        let c = 2. / t_s;
        let w_d = c * (w_0 * t_s / 2.).tan();

        let w_d_sq = w_d * w_d;
        let c_sq = c * c;
        let wc_c = w_c * c;
        let denom = c_sq + 2. * wc_c + w_d_sq;

        Self {
            b0: 2. * wc_c / denom,
            b1: 0.,
            b2: -2. * wc_c / denom,
            a1: (2. * w_d_sq - 2. * c_sq) / denom,
            a2: (c_sq - 2. * wc_c + w_d_sq) / denom,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrController {
    config: PrConfig,
    coefficients: Coefficients,
    /// Direct-form-II delay line, `[z^-1, z^-2]`
    delay: [f32; 2],
    output: f32,
    saturated: bool,
}

impl PrController {
    pub fn new(config: PrConfig) -> Self {
        Self {
            coefficients: Coefficients::resonant(config.w_c, config.w_0, config.t_s),
            config,
            delay: [0.; 2],
            output: 0.,
            saturated: false,
        }
    }

    /// Retune the resonant peak to `w_0` rad/s.
    ///
    /// The delay line is kept so tracking continues across the retune.
    pub fn set_frequency(&mut self, w_0: f32) {
        self.config.w_0 = w_0;
        self.coefficients = Coefficients::resonant(self.config.w_c, w_0, self.config.t_s);
    }

    /// Run one sample and return the clamped output.
    ///
    /// A non-finite error leaves the delay line untouched and repeats the
    /// previous output.
    pub fn update(&mut self, reference: f32, feedback: f32) -> f32 {
        let Coefficients { b0, b1, b2, a1, a2 } = self.coefficients;
        let error = reference - feedback;
        if !error.is_finite() {
            return self.output;
        }

        let proportional = self.config.k_p * error;

        let w = error - a1 * self.delay[0] - a2 * self.delay[1];
        let resonant = self.config.k_r * (b0 * w + b1 * self.delay[0] + b2 * self.delay[1]);
        self.delay = [w, self.delay[0]];

        let output = proportional + resonant;
        self.saturated = true;
        self.output = if output > self.config.u_max {
            self.config.u_max
        } else if output < self.config.u_min {
            self.config.u_min
        } else {
            self.saturated = false;
            output
        };
        self.output
    }

    pub fn reset(&mut self) {
        self.delay = [0.; 2];
        self.output = 0.;
        self.saturated = false;
    }

    pub fn config(&self) -> &PrConfig {
        &self.config
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    pub fn resonant_frequency(&self) -> f32 {
        self.config.w_0
    }

    pub fn delay_line(&self) -> [f32; 2] {
        self.delay
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }
}
