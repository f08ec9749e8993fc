use crate::{
    error::ModulationError,
    transform::{AlphaBeta, SQRT_3},
};

const HALF_SQRT_3: f32 = 0.866_025_4;

/// Lowest bus voltage the modulator will normalise by.
pub const MIN_BUS_VOLTAGE: f32 = 1.;

/// Duty ratio of every phase when the zero vector is applied.
pub const MIDPOINT: [f32; 3] = [0.5; 3];

/// One of the six 60° sectors between adjacent active switching vectors.
///
/// Sector I spans 0°..60° (between 100 and 110), counting counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sector {
    I,
    II,
    III,
    IV,
    V,
    VI,
}

impl Sector {
    /// Decode the 3-bit sign code `u1 > 0 | (u2 > 0) << 1 | (u3 > 0) << 2`.
    ///
    /// Codes 0 and 7 cannot come from a non-zero vector.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(Self::I),
            1 => Some(Self::II),
            5 => Some(Self::III),
            4 => Some(Self::IV),
            6 => Some(Self::V),
            2 => Some(Self::VI),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::I => 3,
            Self::II => 1,
            Self::III => 5,
            Self::IV => 4,
            Self::V => 6,
            Self::VI => 2,
        }
    }

    /// Dwell fractions of the leading and trailing active vector.
    fn dwell(self, x: f32, y: f32, z: f32) -> (f32, f32) {
        match self {
            Self::I => (-z, x),
            Self::II => (y, z),
            Self::III => (x, -y),
            Self::IV => (z, -x),
            Self::V => (-y, -z),
            Self::VI => (-x, y),
        }
    }

    /// Seven-segment (V0-Vk-Vk+1-V7-Vk+1-Vk-V0) on-time of each phase.
    fn duties(self, t0_half: f32, t1: f32, t2: f32) -> [f32; 3] {
        let h = t0_half;
        match self {
            Self::I => [h + t1 + t2, h + t2, h],
            Self::II => [h + t1, h + t1 + t2, h],
            Self::III => [h, h + t1 + t2, h + t2],
            Self::IV => [h, h + t1, h + t1 + t2],
            Self::V => [h + t2, h, h + t1 + t2],
            Self::VI => [h + t1 + t2, h, h + t1],
        }
    }
}

/// Duty ratios for one switching period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulation {
    /// Phase a, b, c duty ratios in `[0, 1]`
    pub duties: [f32; 3],
    /// `None` when the zero vector was commanded
    pub sector: Option<Sector>,
    /// Whether the active vector times were scaled down to fit the period
    pub overmodulated: bool,
}

impl Modulation {
    pub const ZERO_VECTOR: Self = Self {
        duties: MIDPOINT,
        sector: None,
        overmodulated: false,
    };
}

/// Space vector modulation of a stationary-frame voltage command.
///
/// Over-modulated commands keep their angle and are scaled onto the hexagon
/// boundary, leaving no zero-vector time.
pub fn space_vector(v: AlphaBeta, v_dc: f32) -> Result<Modulation, ModulationError> {
    if !(v_dc >= MIN_BUS_VOLTAGE && v_dc.is_finite()) {
        return Err(ModulationError::BusVoltageTooLow(v_dc));
    }

    let alpha = v.alpha / v_dc;
    let beta = v.beta / v_dc;

    let u1 = beta;
    let u2 = HALF_SQRT_3 * alpha - 0.5 * beta;
    let u3 = -HALF_SQRT_3 * alpha - 0.5 * beta;
    let code = (u1 > 0.) as u8 | ((u2 > 0.) as u8) << 1 | ((u3 > 0.) as u8) << 2;

    let Some(sector) = Sector::from_code(code) else {
        return Ok(Modulation::ZERO_VECTOR);
    };

    let x = SQRT_3 * beta;
    let y = HALF_SQRT_3 * beta + 1.5 * alpha;
    let z = HALF_SQRT_3 * beta - 1.5 * alpha;

    let (mut t1, mut t2) = sector.dwell(x, y, z);
    let sum = t1 + t2;
    let overmodulated = sum > 1.;
    if overmodulated {
        t1 /= sum;
        t2 /= sum;
    }
    let t0 = 1. - t1 - t2;

    Ok(Modulation {
        duties: sector.duties(0.5 * t0, t1, t2).map(|d| d.clamp(0., 1.)),
        sector: Some(sector),
        overmodulated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{inverse_clarke, Abc};
    use core::f32::consts::PI;
    use proptest::prelude::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn polar(magnitude: f32, degrees: f32) -> AlphaBeta {
        let angle = degrees * PI / 180.;
        AlphaBeta::new(magnitude * angle.cos(), magnitude * angle.sin())
    }

    /// Carrier-based equivalent: phase voltages with min-max zero-sequence
    /// injection, offset to the middle of the bus.
    fn symmetric_duty_ratios(v: AlphaBeta, v_dc: f32) -> [f32; 3] {
        let Abc { a, b, c } = inverse_clarke(v);
        let u_0 = 0.5 * (a.max(b).max(c) + a.min(b).min(c));
        [a, b, c].map(|u| (u - u_0) / v_dc + 0.5)
    }

    #[test]
    fn sector_codes_follow_angle() {
        let expected = [
            (30., Sector::I),
            (90., Sector::II),
            (150., Sector::III),
            (210., Sector::IV),
            (270., Sector::V),
            (330., Sector::VI),
        ];
        for (degrees, sector) in expected {
            let m = space_vector(polar(100., degrees), 700.).unwrap();
            assert_eq!(m.sector, Some(sector), "{degrees} degrees");
            assert_eq!(Sector::from_code(sector.code()), Some(sector));
        }
    }

    #[test]
    fn zero_vector_gives_midpoint() {
        let m = space_vector(AlphaBeta::ZERO, 700.).unwrap();
        assert_eq!(m, Modulation::ZERO_VECTOR);
    }

    #[test]
    fn codes_zero_and_seven_are_not_sectors() {
        assert_eq!(Sector::from_code(0), None);
        assert_eq!(Sector::from_code(7), None);
    }

    #[test]
    fn sector_one_layout() {
        // 30 degrees: equal dwell on 100 and 110, phase b sits on the midpoint
        let m = space_vector(polar(200., 30.), 700.).unwrap();
        let [a, b, c] = m.duties;
        assert!(approx_eq(b, 0.5), "b = {b}");
        assert!(approx_eq(a - 0.5, 0.5 - c));
        assert!(a > b && b > c);
    }

    #[test]
    fn matches_min_max_injection_in_linear_region() {
        for degrees in (0..360).step_by(7) {
            let v = polar(350., degrees as f32);
            let m = space_vector(v, 700.).unwrap();
            let reference = symmetric_duty_ratios(v, 700.);
            for (d, r) in m.duties.iter().zip(reference) {
                assert!(approx_eq(*d, r), "{degrees}: {:?} vs {reference:?}", m.duties);
            }
            assert!(!m.overmodulated);
        }
    }

    #[test]
    fn overmodulation_rescales_onto_hexagon() {
        let m = space_vector(polar(2000., 20.), 700.).unwrap();
        assert!(m.overmodulated);
        assert_eq!(m.sector, Some(Sector::I));
        // No zero-vector time left: one phase fully on, one fully off
        let [a, _, c] = m.duties;
        assert!(approx_eq(a, 1.));
        assert!(approx_eq(c, 0.));
    }

    #[test]
    fn rejects_collapsed_bus() {
        let v = polar(100., 45.);
        assert_eq!(
            space_vector(v, 0.),
            Err(ModulationError::BusVoltageTooLow(0.))
        );
        assert!(space_vector(v, f32::NAN).is_err());
        assert!(space_vector(v, f32::INFINITY).is_err());
        assert!(space_vector(v, 0.5).is_err());
    }

    proptest! {
        #[test]
        fn duties_stay_in_unit_interval(
            alpha in -5000f32..5000.,
            beta in -5000f32..5000.,
            v_dc in 1f32..2000.,
        ) {
            let m = space_vector(AlphaBeta::new(alpha, beta), v_dc).unwrap();
            for d in m.duties {
                prop_assert!((0. ..=1.).contains(&d));
            }
            if alpha != 0. || beta != 0. {
                let sector = m.sector.map(Sector::code);
                prop_assert!(matches!(sector, Some(1..=6)));
            }
        }
    }
}
