//! Measurements fed to the control loop and the sensors that produce them.

mod sensor;
pub use sensor::{AdcChannel, AnalogSensor, Sensor};

use crate::transform::Abc;

/// One sampling instant worth of measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleFrame {
    /// Phase currents (A)
    pub currents: Abc,
    /// Grid phase voltages (V)
    pub voltages: Abc,
    /// DC bus voltage (V)
    pub v_dc: f32,
    /// IGBT temperature (°C)
    pub temperature: f32,
}

impl SampleFrame {
    /// Whether every measurement is a finite number.
    pub fn is_finite(&self) -> bool {
        let Self {
            currents,
            voltages,
            v_dc,
            temperature,
        } = self;
        [currents.a, currents.b, currents.c, voltages.a, voltages.b, voltages.c]
            .iter()
            .chain([v_dc, temperature])
            .all(|x| x.is_finite())
    }
}

pub trait Sampler {
    fn sample(&mut self) -> SampleFrame;
}

impl Sampler for SampleFrame {
    fn sample(&mut self) -> SampleFrame {
        *self
    }
}

/// Builds a [`SampleFrame`] from one sensor per measurement.
pub struct SensorBank<I, V, B, T> {
    pub current_sensors: [I; 3],
    pub voltage_sensors: [V; 3],
    pub dc_bus_sensor: B,
    pub temperature_sensor: T,
}

impl<I, V, B, T> SensorBank<I, V, B, T> {
    pub fn new(
        current_sensors: [I; 3],
        voltage_sensors: [V; 3],
        dc_bus_sensor: B,
        temperature_sensor: T,
    ) -> Self {
        Self {
            current_sensors,
            voltage_sensors,
            dc_bus_sensor,
            temperature_sensor,
        }
    }
}

impl<I, V, B, T> Sampler for SensorBank<I, V, B, T>
where
    I: Sensor,
    V: Sensor,
    B: Sensor,
    T: Sensor,
{
    fn sample(&mut self) -> SampleFrame {
        let [i_a, i_b, i_c] = &mut self.current_sensors;
        let [v_a, v_b, v_c] = &mut self.voltage_sensors;

        SampleFrame {
            currents: Abc::new(i_a.read(), i_b.read(), i_c.read()),
            voltages: Abc::new(v_a.read(), v_b.read(), v_c.read()),
            v_dc: self.dc_bus_sensor.read(),
            temperature: self.temperature_sensor.read(),
        }
    }
}
