//! Guidance data attached to turns: instructions, bearings, intersection
//! classes, and the turn analysis service that produces them.

pub mod analysis;
pub mod classification;
pub mod interning;

pub use analysis::{GeometricTurnAnalysis, IncomingEdge, OutgoingEdge, TurnAnalysis, TurnVerdict};
pub use classification::{classify_intersection, BearingClass, EntryClass};
pub use interning::ConcurrentIdMap;

use butterfly_common::{EdgeId, LaneDataId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TurnType {
    #[default]
    Invalid = 0,
    /// Nothing to announce, e.g. the road just bends
    NoTurn = 1,
    Continue = 2,
    Turn = 3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DirectionModifier {
    UTurn = 0,
    SharpRight = 1,
    Right = 2,
    SlightRight = 3,
    #[default]
    Straight = 4,
    SlightLeft = 5,
    Left = 6,
    SharpLeft = 7,
}

impl DirectionModifier {
    /// Buckets a turn angle (0 = road back, 90 = right, 180 = straight,
    /// 270 = left).
    pub fn from_angle(angle: f64) -> Self {
        if angle > 0.0 && angle < 60.0 {
            DirectionModifier::SharpRight
        } else if (60.0..140.0).contains(&angle) {
            DirectionModifier::Right
        } else if (140.0..160.0).contains(&angle) {
            DirectionModifier::SlightRight
        } else if (160.0..=200.0).contains(&angle) {
            DirectionModifier::Straight
        } else if angle > 200.0 && angle <= 220.0 {
            DirectionModifier::SlightLeft
        } else if angle > 220.0 && angle <= 300.0 {
            DirectionModifier::Left
        } else if angle > 300.0 && angle < 360.0 {
            DirectionModifier::SharpLeft
        } else {
            DirectionModifier::UTurn
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TurnInstruction {
    pub turn_type: TurnType,
    pub direction_modifier: DirectionModifier,
}

impl TurnInstruction {
    pub fn new(turn_type: TurnType, direction_modifier: DirectionModifier) -> Self {
        Self {
            turn_type,
            direction_modifier,
        }
    }

    pub fn is_uturn(&self) -> bool {
        self.turn_type != TurnType::NoTurn && self.direction_modifier == DirectionModifier::UTurn
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.turn_type as u8, self.direction_modifier as u8]
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        let turn_type = match bytes[0] {
            0 => TurnType::Invalid,
            1 => TurnType::NoTurn,
            2 => TurnType::Continue,
            3 => TurnType::Turn,
            _ => return None,
        };
        let direction_modifier = match bytes[1] {
            0 => DirectionModifier::UTurn,
            1 => DirectionModifier::SharpRight,
            2 => DirectionModifier::Right,
            3 => DirectionModifier::SlightRight,
            4 => DirectionModifier::Straight,
            5 => DirectionModifier::SlightLeft,
            6 => DirectionModifier::Left,
            7 => DirectionModifier::SharpLeft,
            _ => return None,
        };
        Some(Self::new(turn_type, direction_modifier))
    }
}

/// Compass bearing in deci-degrees (0-3599, 0 = North)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TurnBearing(pub u16);

impl TurnBearing {
    pub fn from_degrees(degrees: f64) -> Self {
        let normalized = degrees.rem_euclid(360.0);
        let deci = (normalized * 10.0).round() as u16;
        Self(deci % 3600)
    }

    pub fn degrees(&self) -> f64 {
        self.0 as f64 / 10.0
    }

    pub fn reverse(&self) -> Self {
        Self((self.0 + 1800) % 3600)
    }
}

/// One road at an intersection as seen from a given approach
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectedRoad {
    /// Edge leaving the intersection along this road
    pub eid: EdgeId,
    pub entry_allowed: bool,
    /// Absolute bearing leaving the intersection, degrees
    pub bearing: f64,
    /// Turn angle from the approach: 0 = road back, 90 = right,
    /// 180 = straight, 270 = left
    pub angle: f64,
    pub instruction: TurnInstruction,
    pub lane_data_id: LaneDataId,
}
