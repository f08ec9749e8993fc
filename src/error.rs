use crate::inverter::Mode;

/// Rejected configuration, reported once at construction.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("sample period must be positive and finite, got {0} s")]
    SamplePeriod(f32),

    #[error("{controller} sample period {found} s does not match the loop period {expected} s")]
    SamplePeriodMismatch {
        controller: &'static str,
        expected: f32,
        found: f32,
    },

    #[error("{controller} output bounds are inverted: min {min} >= max {max}")]
    OutputBounds {
        controller: &'static str,
        min: f32,
        max: f32,
    },

    #[error("resonant frequency {w0} rad/s must be positive and below Nyquist")]
    ResonantFrequency { w0: f32 },

    #[error("resonant bandwidth must be positive, got {0} rad/s")]
    ResonantBandwidth(f32),

    #[error("PLL feed-forward {w_ff} rad/s lies outside [{w_min}, {w_max}]")]
    PllFrequencyBounds { w_ff: f32, w_min: f32, w_max: f32 },

    #[error("DC bus thresholds are inverted: min {min} V >= max {max} V")]
    BusThresholds { min: f32, max: f32 },

    #[error("over-current threshold must be positive, got {0} A")]
    CurrentThreshold(f32),

    #[error("rated current must be positive, got {0} A")]
    RatedCurrent(f32),

    #[error("soft-start ramp parameter {0} is out of range")]
    StartupRamp(f32),
}

/// The modulator refused to produce duties for this cycle.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ModulationError {
    #[error("DC bus voltage {0} V is too low to modulate")]
    BusVoltageTooLow(f32),
}

/// A mode command that is not valid in the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("command not allowed in {0:?} mode")]
    InvalidMode(Mode),
}
