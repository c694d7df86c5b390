//! Intersection classes: which compass directions exist at an intersection
//! and which of them may be entered from a given approach.

use super::ConnectedRoad;

/// Width of one discrete bearing sector in degrees
pub const DISCRETE_BEARING_STEP: f64 = 15.0;
const DISCRETE_BEARINGS: u16 = 24;

/// Sorted bearings (whole degrees) of all roads at an intersection
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BearingClass {
    bearings: Vec<u16>,
}

impl BearingClass {
    pub fn new(mut bearings: Vec<u16>) -> Self {
        bearings.sort_unstable();
        Self { bearings }
    }

    pub fn bearings(&self) -> &[u16] {
        &self.bearings
    }
}

/// 32-bit mask: bit `i` set when road `i` (in turn order, road 0 being the
/// road back) can be entered. Roads from [`EntryClass::MAX_ROADS`] on have no
/// bit and are never enterable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EntryClass {
    enabled: u32,
}

impl EntryClass {
    pub const MAX_ROADS: usize = u32::BITS as usize;

    pub fn from_bits(enabled: u32) -> Self {
        Self { enabled }
    }

    pub fn bits(&self) -> u32 {
        self.enabled
    }

    /// Returns false when `index` does not fit the class.
    pub fn activate(&mut self, index: usize) -> bool {
        if index >= Self::MAX_ROADS {
            return false;
        }
        self.enabled |= 1 << index;
        true
    }

    pub fn allows_entry(&self, index: usize) -> bool {
        index < Self::MAX_ROADS && self.enabled & (1 << index) != 0
    }
}

fn discrete_bearing(bearing: f64) -> u16 {
    ((bearing / DISCRETE_BEARING_STEP).round() as u16) % DISCRETE_BEARINGS
}

/// Builds both classes for an intersection view.
///
/// Bearings snap to 15° sectors when no two roads collide in the same
/// sector, otherwise whole degrees are kept. Roads past
/// [`EntryClass::MAX_ROADS`] are never marked as enterable.
pub fn classify_intersection(roads: &[ConnectedRoad]) -> (EntryClass, BearingClass) {
    let mut entry_class = EntryClass::default();
    for (index, road) in roads.iter().enumerate() {
        if road.entry_allowed {
            entry_class.activate(index);
        }
    }

    let mut sectors: Vec<u16> = roads.iter().map(|r| discrete_bearing(r.bearing)).collect();
    sectors.sort_unstable();
    sectors.dedup();

    let bearings = if sectors.len() == roads.len() {
        sectors
            .iter()
            .map(|&s| (s as f64 * DISCRETE_BEARING_STEP) as u16)
            .collect()
    } else {
        roads
            .iter()
            .map(|r| (r.bearing.round() as u16) % 360)
            .collect()
    };

    (entry_class, BearingClass::new(bearings))
}
