use embedded_hal::Pwm;
use num_traits::{Float, FromPrimitive, ToPrimitive};

/// Consumer of the per-cycle phase duty ratios.
pub trait GateDrive {
    fn drive(&mut self, duty_cycle_ratios: [f32; 3]);
}

/// Three PWM channels of one timer, one per inverter leg.
pub struct PwmGateDrive<T, C> {
    pub pwm: T,
    pub channels: [C; 3],
}

impl<T, C> PwmGateDrive<T, C> {
    pub fn new(pwm: T, channels: [C; 3]) -> Self {
        Self { pwm, channels }
    }
}

impl<T, C> PwmGateDrive<T, C>
where
    T: Pwm<Channel = C>,
    C: Clone,
{
    pub fn enable(&mut self) {
        for channel in self.channels.iter().cloned() {
            self.pwm.enable(channel);
        }
    }

    pub fn disable(&mut self) {
        for channel in self.channels.iter().cloned() {
            self.pwm.disable(channel);
        }
    }
}

impl<T, C> GateDrive for PwmGateDrive<T, C>
where
    T: Pwm<Channel = C>,
    T::Duty: FromPrimitive + ToPrimitive,
    C: Clone,
{
    fn drive(&mut self, duty_cycle_ratios: [f32; 3]) {
        let Some(max_duty) = self.pwm.get_max_duty().to_f32() else {
            return;
        };

        for (channel, duty_cycle_ratio) in self.channels.iter().cloned().zip(duty_cycle_ratios) {
            let duty = Float::round(max_duty * duty_cycle_ratio.clamp(0., 1.));
            if let Some(duty) = T::Duty::from_f32(duty) {
                self.pwm.set_duty(channel, duty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockPwm {
        duties: [u16; 3],
        enabled: [bool; 3],
    }

    impl Pwm for MockPwm {
        type Channel = usize;
        type Time = u32;
        type Duty = u16;

        fn disable(&mut self, channel: usize) {
            self.enabled[channel] = false;
        }

        fn enable(&mut self, channel: usize) {
            self.enabled[channel] = true;
        }

        fn get_period(&self) -> u32 {
            50
        }

        fn get_duty(&self, channel: usize) -> u16 {
            self.duties[channel]
        }

        fn get_max_duty(&self) -> u16 {
            1000
        }

        fn set_duty(&mut self, channel: usize, duty: u16) {
            self.duties[channel] = duty;
        }

        fn set_period<P>(&mut self, _period: P)
        where
            P: Into<u32>,
        {
        }
    }

    #[test]
    fn converts_ratios_to_counts() {
        let mut drive = PwmGateDrive::new(MockPwm::default(), [0, 1, 2]);
        drive.enable();
        drive.drive([0.5, 0.25, 0.9996]);
        assert_eq!(drive.pwm.duties, [500, 250, 1000]);
        assert_eq!(drive.pwm.enabled, [true; 3]);

        drive.disable();
        assert_eq!(drive.pwm.enabled, [false; 3]);
    }

    #[test]
    fn clamps_out_of_range_ratios() {
        let mut drive = PwmGateDrive::new(MockPwm::default(), [0, 1, 2]);
        drive.drive([-0.2, 1.7, f32::NAN]);
        assert_eq!(drive.pwm.duties[0], 0);
        assert_eq!(drive.pwm.duties[1], 1000);
    }
}
