use core::{cell::RefCell, marker::PhantomData};
use embedded_hal::adc::{Channel, OneShot};
use num_traits::ToPrimitive;

/// Source of one physical measurement.
///
/// A reading that could not be taken is reported as NaN, which the
/// protection manager treats as a threshold violation.
pub trait Sensor {
    fn read(&mut self) -> f32;
}

impl<F> Sensor for F
where
    F: FnMut() -> f32,
{
    fn read(&mut self) -> f32 {
        self()
    }
}

/// Linear mapping from raw ADC counts to a physical quantity.
#[derive(Debug, Clone)]
pub struct AnalogSensor<P> {
    pub pin: P,
    pub from_min: f32,
    pub from_max: f32,
    pub to_min: f32,
    pub to_max: f32,
}

impl<P> AnalogSensor<P> {
    pub fn new(pin: P, from: (f32, f32), to: (f32, f32)) -> Self {
        Self {
            pin,
            from_min: from.0,
            from_max: from.1,
            to_min: to.0,
            to_max: to.1,
        }
    }

    pub fn scale(&self, raw: f32) -> f32 {
        // Calculate the ratio of the input value relative to the input range
        let ratio = (raw - self.from_min) / (self.from_max - self.from_min);

        // Map the ratio to the output range
        self.to_min + (ratio * (self.to_max - self.to_min))
    }

    /// Take one conversion, or `None` if the ADC is busy or failed.
    pub fn read<T, A, W>(&mut self, adc: &mut T) -> Option<f32>
    where
        T: OneShot<A, W, P>,
        P: Channel<A>,
        W: ToPrimitive,
    {
        let raw = adc.read(&mut self.pin).ok()?.to_f32()?;
        Some(self.scale(raw))
    }

    /// Bind this sensor to an ADC shared with other channels.
    pub fn on<T, A, W>(self, adc: &RefCell<T>) -> AdcChannel<'_, T, P, A, W> {
        AdcChannel {
            adc,
            sensor: self,
            _marker: PhantomData,
        }
    }
}

/// An [`AnalogSensor`] reading through a shared ADC.
pub struct AdcChannel<'a, T, P, A, W> {
    adc: &'a RefCell<T>,
    sensor: AnalogSensor<P>,
    _marker: PhantomData<(A, W)>,
}

impl<T, P, A, W> Sensor for AdcChannel<'_, T, P, A, W>
where
    T: OneShot<A, W, P>,
    P: Channel<A>,
    W: ToPrimitive,
{
    fn read(&mut self) -> f32 {
        let Ok(mut adc) = self.adc.try_borrow_mut() else {
            return f32::NAN;
        };
        self.sensor.read(&mut *adc).unwrap_or(f32::NAN)
    }
}
