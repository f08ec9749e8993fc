//! Fault taxonomy and the debounced, latching protection manager.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};
use num_traits::Float;

/// Every fault the inverter can report.
///
/// The first four are derived from measurements by [`Protection::update`];
/// the rest are raised by the supervisor or by external collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum FaultKind {
    OverCurrent = 0,
    OverVoltage = 1,
    UnderVoltage = 2,
    OverTemperature = 3,
    IgbtFault = 4,
    GridLost = 5,
    PllUnlock = 6,
    EmergencyStop = 7,
}

impl FaultKind {
    pub const COUNT: usize = 8;

    pub const ALL: [FaultKind; Self::COUNT] = [
        Self::OverCurrent,
        Self::OverVoltage,
        Self::UnderVoltage,
        Self::OverTemperature,
        Self::IgbtFault,
        Self::GridLost,
        Self::PllUnlock,
        Self::EmergencyStop,
    ];

    pub const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of fault kinds, stored as a bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaultSet(u8);

impl FaultSet {
    pub const EMPTY: Self = Self(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, kind: FaultKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Whether every kind in `other` is also in `self`.
    pub const fn is_superset(self, other: FaultSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, kind: FaultKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: FaultKind) {
        self.0 &= !kind.bit();
    }

    pub const fn union(self, other: FaultSet) -> Self {
        Self(self.0 | other.0)
    }

    /// Kinds in `self` that are not in `other`.
    pub const fn difference(self, other: FaultSet) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = FaultKind> {
        FaultKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl From<FaultKind> for FaultSet {
    fn from(kind: FaultKind) -> Self {
        Self(kind.bit())
    }
}

impl FromIterator<FaultKind> for FaultSet {
    fn from_iter<I: IntoIterator<Item = FaultKind>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl BitOr for FaultSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOr<FaultKind> for FaultSet {
    type Output = Self;

    fn bitor(self, rhs: FaultKind) -> Self {
        self.union(rhs.into())
    }
}

impl BitOrAssign for FaultSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FaultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Receives confirmed faults for non-volatile storage or telemetry.
pub trait FaultLog {
    fn record(&mut self, faults: FaultSet, cycle: u32);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaultLog;

impl FaultLog for NoFaultLog {
    fn record(&mut self, _faults: FaultSet, _cycle: u32) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Thresholds {
    /// Peak phase current (A)
    pub i_max: f32,
    /// DC bus over-voltage (V)
    pub v_dc_max: f32,
    /// DC bus under-voltage (V)
    pub v_dc_min: f32,
    /// IGBT over-temperature (°C)
    pub temp_max: f32,
    /// Consecutive violating samples before a fault is confirmed
    pub debounce_cycles: u16,
}

#[derive(Debug, Clone)]
pub struct Protection {
    thresholds: Thresholds,
    counters: [u16; FaultKind::COUNT],
    active: FaultSet,
    latched: FaultSet,
    triggered: bool,
}

impl Protection {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            counters: [0; FaultKind::COUNT],
            active: FaultSet::EMPTY,
            latched: FaultSet::EMPTY,
            triggered: false,
        }
    }

    /// Check one set of measurements and return the confirmed faults.
    ///
    /// A non-finite measurement counts as a violation of every threshold it
    /// is compared with.
    pub fn update(&mut self, i_a: f32, i_b: f32, i_c: f32, v_dc: f32, temp: f32) -> FaultSet {
        let t = &self.thresholds;
        let peak = Float::abs(i_a).max(Float::abs(i_b)).max(Float::abs(i_c));
        let currents_finite = i_a.is_finite() && i_b.is_finite() && i_c.is_finite();

        let mut candidates = FaultSet::EMPTY;
        if !(currents_finite && peak <= t.i_max) {
            candidates.insert(FaultKind::OverCurrent);
        }
        if !(v_dc <= t.v_dc_max) {
            candidates.insert(FaultKind::OverVoltage);
        }
        if !(v_dc >= t.v_dc_min) {
            candidates.insert(FaultKind::UnderVoltage);
        }
        if !(temp <= t.temp_max) {
            candidates.insert(FaultKind::OverTemperature);
        }

        let mut confirmed = FaultSet::EMPTY;
        for kind in FaultKind::ALL {
            let counter = &mut self.counters[kind as usize];
            if candidates.contains(kind) {
                if *counter < self.thresholds.debounce_cycles {
                    *counter += 1;
                } else {
                    confirmed.insert(kind);
                }
            } else {
                *counter = 0;
            }
        }

        self.active = confirmed;
        self.latched |= confirmed;
        if !confirmed.is_empty() {
            self.triggered = true;
        }

        confirmed
    }

    /// Record faults detected outside this manager.
    ///
    /// They stay active until the next [`update`](Self::update) and latched
    /// until [`clear`](Self::clear).
    pub fn raise(&mut self, faults: FaultSet) {
        if faults.is_empty() {
            return;
        }
        self.active |= faults;
        self.latched |= faults;
        self.triggered = true;
    }

    /// Forget every fault and debounce count. Thresholds are kept.
    pub fn clear(&mut self) {
        self.active = FaultSet::EMPTY;
        self.latched = FaultSet::EMPTY;
        self.triggered = false;
        self.counters = [0; FaultKind::COUNT];
    }

    pub fn is_safe(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active(&self) -> FaultSet {
        self.active
    }

    pub fn latched(&self) -> FaultSet {
        self.latched
    }

    pub fn triggered(&self) -> bool {
        self.triggered
    }

    pub fn counter(&self, kind: FaultKind) -> u16 {
        self.counters[kind as usize]
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}
