/// Gains, sample period and output bounds of a [`PiController`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PiConfig {
    pub k_p: f32,
    pub k_i: f32,
    /// Sample period in seconds
    pub t_s: f32,
    pub u_min: f32,
    pub u_max: f32,
}

/// Discrete PI regulator with output clamping and conditional integration.
#[derive(Debug, Clone)]
pub struct PiController {
    config: PiConfig,
    integrator: f32,
    prev_error: f32,
    output: f32,
    saturated: bool,
}

impl PiController {
    pub fn new(config: PiConfig) -> Self {
        Self {
            config,
            integrator: 0.,
            prev_error: 0.,
            output: 0.,
            saturated: false,
        }
    }

    /// Run one sample and return the clamped output.
    ///
    /// While the output is clamped, the integrator only moves if the error
    /// drives it back toward the linear region. A non-finite error repeats
    /// the previous output without touching the integrator.
    pub fn update(&mut self, reference: f32, feedback: f32) -> f32 {
        let PiConfig {
            k_p,
            k_i,
            t_s,
            u_min,
            u_max,
        } = self.config;

        let error = reference - feedback;
        if !error.is_finite() {
            return self.output;
        }
        let proportional = k_p * error;
        let integrator = self.integrator + k_i * t_s * error;
        let mut output = proportional + integrator;

        self.saturated = false;
        if output > u_max {
            output = u_max;
            self.saturated = true;
            if error < 0. {
                self.integrator = integrator;
            }
        } else if output < u_min {
            output = u_min;
            self.saturated = true;
            if error > 0. {
                self.integrator = integrator;
            }
        } else {
            self.integrator = integrator;
        }

        self.prev_error = error;
        self.output = output;
        output
    }

    /// Clear the dynamic state; gains and bounds are kept.
    pub fn reset(&mut self) {
        self.integrator = 0.;
        self.prev_error = 0.;
        self.output = 0.;
        self.saturated = false;
    }

    pub fn config(&self) -> &PiConfig {
        &self.config
    }

    pub fn integrator(&self) -> f32 {
        self.integrator
    }

    pub fn prev_error(&self) -> f32 {
        self.prev_error
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }
}
