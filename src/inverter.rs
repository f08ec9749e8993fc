//! Supervisory state machine and the per-cycle control pipeline.
//!
//! Each call to [`Inverter::control_loop`] runs, in order: protection,
//! Clarke transforms, PLL, Park transforms, grid supervision, mode
//! transitions, the mode's control law and space vector modulation.

use crate::{
    config::{InverterConfig, Ratings, StartupConfig, StartupRamp},
    control::{
        pwm::{self, MIDPOINT},
        PiConfig, PiController, Pll, PllConfig, PrConfig, PrController, RateLimiter, Sector,
    },
    drive::GateDrive,
    error::{CommandError, ConfigError},
    model::{SampleFrame, Sampler},
    protection::{FaultKind, FaultLog, FaultSet, NoFaultLog, Protection, Thresholds},
    transform::{clarke, inverse_park, park, AlphaBeta, Dq},
};
use num_complex::Complex32;
use num_traits::Float;

/// Smallest |vd| (V) a power command is converted with.
const MIN_COMMAND_VOLTAGE: f32 = 10.;

/// Apparent power (VA) below which the power factor is reported as zero.
const MIN_APPARENT_POWER: f32 = 1e-3;

/// Frequency drift (rad/s) that triggers a retune of the current regulators.
const RETUNE_TOLERANCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    Standby,
    Precharge,
    GridCheck,
    Startup,
    Running,
    Fault,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics {
    /// W
    pub active_power: f32,
    /// var
    pub reactive_power: f32,
    pub power_factor: f32,
}

impl Diagnostics {
    fn from_dq(v: Dq, i: Dq) -> Self {
        let s = 1.5 * Complex32::from(v) * Complex32::from(i).conj();
        let apparent = s.norm();
        Self {
            active_power: s.re,
            reactive_power: s.im,
            power_factor: if apparent < MIN_APPARENT_POWER {
                0.
            } else {
                s.re / apparent
            },
        }
    }
}

pub struct Builder<L = NoFaultLog> {
    config: InverterConfig,
    fault_log: L,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            config: InverterConfig::default(),
            fault_log: NoFaultLog,
        }
    }
}

impl<L> Builder<L> {
    pub fn config(mut self, config: InverterConfig) -> Self {
        self.config = config;
        self
    }

    /// Sample period of the loop and of every regulator.
    pub fn sample_period(mut self, t_s: f32) -> Self {
        self.config.set_sample_period(t_s);
        self
    }

    pub fn ratings(mut self, ratings: Ratings) -> Self {
        self.config.ratings = ratings;
        self
    }

    pub fn current_loop(mut self, current_loop: PrConfig) -> Self {
        self.config.current_loop = current_loop;
        self
    }

    pub fn dc_link_loop(mut self, dc_link_loop: PiConfig) -> Self {
        self.config.dc_link_loop = dc_link_loop;
        self
    }

    pub fn pll(mut self, pll: PllConfig) -> Self {
        self.config.pll = pll;
        self
    }

    pub fn protection(mut self, thresholds: Thresholds) -> Self {
        self.config.protection = thresholds;
        self
    }

    pub fn startup(mut self, startup: StartupConfig) -> Self {
        self.config.startup = startup;
        self
    }

    pub fn precharge_voltage(mut self, v: f32) -> Self {
        self.config.precharge_voltage = v;
        self
    }

    pub fn grid_min_voltage(mut self, v: f32) -> Self {
        self.config.grid_min_voltage = v;
        self
    }

    pub fn fault_log<L2: FaultLog>(self, fault_log: L2) -> Builder<L2> {
        Builder {
            config: self.config,
            fault_log,
        }
    }

    pub fn build(self) -> Result<Inverter<L>, ConfigError>
    where
        L: FaultLog,
    {
        self.config.validate()?;
        Ok(Inverter::with_parts(self.config, self.fault_log))
    }
}

/// Three-phase grid-tied inverter controller.
pub struct Inverter<L = NoFaultLog> {
    config: InverterConfig,
    fault_log: L,
    mode: Mode,

    pr_alpha: PrController,
    pr_beta: PrController,
    pi_vdc: PiController,
    pll: Pll,
    protection: Protection,
    ramp: RateLimiter,

    frame: SampleFrame,
    i_ab: AlphaBeta,
    v_ab: AlphaBeta,
    i_dq: Dq,
    v_dq: Dq,

    /// Current reference followed by the current loop
    i_dq_ref: Dq,
    /// Last d-axis current set by a power command
    i_d_command: f32,
    v_dc_ref: f32,
    v_ab_cmd: AlphaBeta,
    v_dq_cmd: Dq,

    duties: [f32; 3],
    sector: Option<Sector>,
    diagnostics: Diagnostics,
    cycle_count: u32,
    mode_cycles: u32,
    /// Fault kinds already reported since the last clear
    reported: FaultSet,
}

impl Inverter {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn new(config: InverterConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }
}

impl<L: FaultLog> Inverter<L> {
    fn with_parts(config: InverterConfig, fault_log: L) -> Self {
        let slew = match config.startup.ramp {
            StartupRamp::RateLimited { slew } => slew,
            StartupRamp::Geometric { .. } => 0.,
        };

        Self {
            fault_log,
            mode: Mode::Standby,
            pr_alpha: PrController::new(config.current_loop),
            pr_beta: PrController::new(config.current_loop),
            pi_vdc: PiController::new(config.dc_link_loop),
            pll: Pll::new(config.pll),
            protection: Protection::new(config.protection),
            ramp: RateLimiter::new(slew),
            frame: SampleFrame {
                v_dc: config.ratings.v_dc,
                temperature: 25.,
                ..SampleFrame::default()
            },
            i_ab: AlphaBeta::ZERO,
            v_ab: AlphaBeta::ZERO,
            i_dq: Dq::ZERO,
            v_dq: Dq::ZERO,
            i_dq_ref: Dq::ZERO,
            i_d_command: 0.,
            v_dc_ref: config.ratings.v_dc,
            v_ab_cmd: AlphaBeta::ZERO,
            v_dq_cmd: Dq::ZERO,
            duties: MIDPOINT,
            sector: None,
            diagnostics: Diagnostics::default(),
            cycle_count: 0,
            mode_cycles: 0,
            reported: FaultSet::EMPTY,
            config,
        }
    }

    /// Sample, run one control cycle and hand the duties to the gate driver.
    pub fn step<S, D>(&mut self, sampler: &mut S, drive: &mut D) -> [f32; 3]
    where
        S: Sampler,
        D: GateDrive,
    {
        let frame = sampler.sample();
        let duties = self.control_loop(&frame);
        drive.drive(duties);
        duties
    }

    /// Run one control cycle and return the phase duty ratios.
    ///
    /// A confirmed fault skips the rest of the pipeline and returns the
    /// zero-vector midpoint.
    pub fn control_loop(&mut self, frame: &SampleFrame) -> [f32; 3] {
        self.frame = *frame;
        let SampleFrame {
            currents,
            voltages,
            v_dc,
            temperature,
        } = *frame;

        let faults = self
            .protection
            .update(currents.a, currents.b, currents.c, v_dc, temperature);
        if !faults.is_empty() {
            self.fault_handler(faults);
            return self.duties;
        }

        // A glitched sample is debounced by protection; hold the zero vector
        // and keep the regulators out of it
        if !frame.is_finite() {
            log::warn!("Non-finite sample at cycle {}, holding zero vector", self.cycle_count);
            self.duties = MIDPOINT;
            self.sector = None;
            self.cycle_count = self.cycle_count.wrapping_add(1);
            return self.duties;
        }

        self.i_ab = clarke(currents);
        self.v_ab = clarke(voltages);

        self.pll.update(self.v_ab);
        let theta = self.pll.theta();
        self.i_dq = park(self.i_ab, theta);
        self.v_dq = park(self.v_ab, theta);

        if matches!(self.mode, Mode::Startup | Mode::Running) {
            let mut grid_faults = FaultSet::EMPTY;
            if !(self.pll.v_mag() >= self.config.grid_min_voltage) {
                grid_faults.insert(FaultKind::GridLost);
            }
            if !self.pll.is_locked() {
                grid_faults.insert(FaultKind::PllUnlock);
            }
            if !grid_faults.is_empty() {
                self.protection.raise(grid_faults);
                self.fault_handler(grid_faults);
                return self.duties;
            }
        }

        self.advance_mode(v_dc);
        self.mode_cycles = self.mode_cycles.saturating_add(1);

        match self.mode {
            Mode::Running => {
                // Export more current while the bus sits above its reference
                self.i_dq_ref.d = self.pi_vdc.update(v_dc, self.v_dc_ref);
                self.current_loop(theta);
            }
            Mode::Startup => {
                let t_s = self.config.sample_period;
                self.i_dq_ref.d = match self.config.startup.ramp {
                    StartupRamp::Geometric { factor } => self.i_dq_ref.d * factor,
                    StartupRamp::RateLimited { .. } => {
                        self.ramp.rate_limit(t_s, self.i_d_command)
                    }
                };
                self.current_loop(theta);
            }
            Mode::Standby | Mode::Precharge | Mode::GridCheck | Mode::Fault => {
                self.v_ab_cmd = AlphaBeta::ZERO;
                self.v_dq_cmd = Dq::ZERO;
            }
        }

        let modulation = match pwm::space_vector(self.v_ab_cmd, v_dc) {
            Ok(modulation) => modulation,
            Err(error) => {
                log::warn!("{error}, holding zero vector");
                pwm::Modulation::ZERO_VECTOR
            }
        };
        if self.mode == Mode::Fault {
            self.duties = MIDPOINT;
            self.sector = None;
        } else {
            self.duties = modulation.duties;
            self.sector = modulation.sector;
        }

        self.diagnostics = Diagnostics::from_dq(self.v_dq, self.i_dq);
        self.cycle_count = self.cycle_count.wrapping_add(1);

        self.duties
    }

    /// Stationary-frame PR current control with grid voltage feed-forward.
    fn current_loop(&mut self, theta: f32) {
        if self.pll.is_locked() {
            let omega = self.pll.omega();
            if Float::abs(omega - self.pr_alpha.resonant_frequency()) > RETUNE_TOLERANCE {
                log::debug!("Retuning current loop to {omega} rad/s");
                self.pr_alpha.set_frequency(omega);
                self.pr_beta.set_frequency(omega);
            }
        }

        let i_ref = inverse_park(self.i_dq_ref, theta);
        self.v_ab_cmd = AlphaBeta::new(
            self.pr_alpha.update(i_ref.alpha, self.i_ab.alpha) + self.v_ab.alpha,
            self.pr_beta.update(i_ref.beta, self.i_ab.beta) + self.v_ab.beta,
        );
        self.v_dq_cmd = park(self.v_ab_cmd, theta);
    }

    fn advance_mode(&mut self, v_dc: f32) {
        match self.mode {
            Mode::Precharge if v_dc >= self.config.precharge_voltage => {
                self.set_mode(Mode::GridCheck);
            }
            Mode::GridCheck
                if self.pll.is_locked() && self.pll.v_mag() >= self.config.grid_min_voltage =>
            {
                self.reset_regulators();
                self.ramp.reset(0.);
                self.set_mode(Mode::Startup);
            }
            Mode::Startup if self.mode_cycles >= self.config.startup.cycles => {
                self.set_mode(Mode::Running);
            }
            _ => {}
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            log::info!("{:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.mode_cycles = 0;
        }
    }

    fn reset_regulators(&mut self) {
        self.pr_alpha.reset();
        self.pr_beta.reset();
        self.pi_vdc.reset();
    }

    /// Force the zero vector, enter [`Mode::Fault`] and report any fault
    /// kinds not yet reported since the last clear.
    ///
    /// The protection manager's latched history is left untouched.
    pub fn fault_handler(&mut self, faults: FaultSet) {
        self.duties = MIDPOINT;
        self.sector = None;
        self.v_ab_cmd = AlphaBeta::ZERO;
        self.v_dq_cmd = Dq::ZERO;
        self.set_mode(Mode::Fault);

        self.reset_regulators();
        self.ramp.reset(0.);

        let new = faults.difference(self.reported);
        if !new.is_empty() {
            log::error!("Fault {:?} at cycle {}", new, self.cycle_count);
            self.fault_log.record(new, self.cycle_count);
            self.reported |= new;
        }
    }

    /// Convert an active and reactive power request (W, var) into current
    /// references for the next cycle.
    ///
    /// Ignored while the grid d-axis voltage is too small to divide by. The
    /// result is scaled down to the rated current if needed.
    pub fn set_power_command(&mut self, p_ref: f32, q_ref: f32) {
        if !(p_ref.is_finite() && q_ref.is_finite()) {
            log::warn!("Ignoring power command: P = {p_ref} W, Q = {q_ref} var");
            return;
        }

        let v_d = self.pll.vd();
        if !(Float::abs(v_d) > MIN_COMMAND_VOLTAGE) {
            log::warn!("Ignoring power command: grid d-axis voltage {v_d} V");
            return;
        }

        let mut i_ref = Dq::new(p_ref / (1.5 * v_d), -q_ref / (1.5 * v_d));

        let i_mag = i_ref.magnitude();
        let i_rated = self.config.ratings.current;
        if i_mag > i_rated {
            log::warn!("Power command needs {i_mag} A, limiting to {i_rated} A");
            let scale = i_rated / i_mag;
            i_ref.d *= scale;
            i_ref.q *= scale;
        }

        self.i_dq_ref = i_ref;
        self.i_d_command = i_ref.d;
    }

    /// Leave standby and begin precharging the DC bus.
    pub fn start(&mut self) -> Result<(), CommandError> {
        if self.mode != Mode::Standby {
            return Err(CommandError::InvalidMode(self.mode));
        }
        self.set_mode(Mode::Precharge);
        Ok(())
    }

    /// Return to standby from any mode except [`Mode::Fault`].
    pub fn stop(&mut self) -> Result<(), CommandError> {
        if self.mode == Mode::Fault {
            return Err(CommandError::InvalidMode(self.mode));
        }
        self.reset_regulators();
        self.ramp.reset(0.);
        self.v_ab_cmd = AlphaBeta::ZERO;
        self.v_dq_cmd = Dq::ZERO;
        self.set_mode(Mode::Standby);
        Ok(())
    }

    /// Forget every fault and return to standby.
    pub fn clear_faults(&mut self) {
        self.protection.clear();
        self.reported = FaultSet::EMPTY;
        if self.mode == Mode::Fault {
            self.set_mode(Mode::Standby);
        }
    }

    pub fn emergency_stop(&mut self) {
        self.raise(FaultKind::EmergencyStop);
    }

    pub fn report_igbt_fault(&mut self) {
        self.raise(FaultKind::IgbtFault);
    }

    fn raise(&mut self, kind: FaultKind) {
        let faults = FaultSet::from(kind);
        self.protection.raise(faults);
        self.fault_handler(faults);
    }

    /// True in [`Mode::Startup`] and [`Mode::Running`].
    pub fn is_running(&self) -> bool {
        matches!(self.mode, Mode::Startup | Mode::Running)
    }

    pub fn is_safe(&self) -> bool {
        self.protection.is_safe()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn duties(&self) -> [f32; 3] {
        self.duties
    }

    pub fn sector(&self) -> Option<Sector> {
        self.sector
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn config(&self) -> &InverterConfig {
        &self.config
    }

    pub fn pll(&self) -> &Pll {
        &self.pll
    }

    pub fn protection(&self) -> &Protection {
        &self.protection
    }

    pub fn fault_log(&self) -> &L {
        &self.fault_log
    }

    /// Last sample frame passed to the control loop.
    pub fn frame(&self) -> &SampleFrame {
        &self.frame
    }

    pub fn i_ab(&self) -> AlphaBeta {
        self.i_ab
    }

    pub fn v_ab(&self) -> AlphaBeta {
        self.v_ab
    }

    pub fn i_dq(&self) -> Dq {
        self.i_dq
    }

    pub fn v_dq(&self) -> Dq {
        self.v_dq
    }

    /// Frequency (rad/s) the current regulators are tuned to.
    pub fn current_loop_frequency(&self) -> f32 {
        self.pr_alpha.resonant_frequency()
    }

    pub fn current_reference(&self) -> Dq {
        self.i_dq_ref
    }

    pub fn v_dc_reference(&self) -> f32 {
        self.v_dc_ref
    }

    pub fn set_v_dc_reference(&mut self, v_dc_ref: f32) {
        self.v_dc_ref = v_dc_ref;
    }

    /// Stationary-frame voltage command handed to the modulator.
    pub fn voltage_command(&self) -> AlphaBeta {
        self.v_ab_cmd
    }

    /// Rotating-frame image of [`voltage_command`](Self::voltage_command).
    pub fn voltage_command_dq(&self) -> Dq {
        self.v_dq_cmd
    }
}
