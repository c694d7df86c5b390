///! Turn cost model - sigmoid-based turn costs
///!
///! The expansion asks a `TurnCostEvaluator` for the cost of every turn it
///! keeps. `SigmoidTurnCost` follows the turn function of the stock car profile:
///! - Sigmoid function mapping the signed turn angle to a penalty
///! - turn_penalty = 7.5 seconds (max)
///! - turn_bias = 1.075 (right-turn preference for right-hand traffic)
///! - u_turn_penalty = 20 seconds additional

use crate::graph::TravelMode;

/// Everything the cost model sees about one turn (a → b at an intersection)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnContext {
    /// Signed turn angle (-180 to +180), positive = right
    pub angle: f64,
    /// Roads at the intersection
    pub number_of_roads: u32,
    pub is_u_turn: bool,
    pub has_traffic_light: bool,
    pub source_restricted: bool,
    pub target_restricted: bool,
    pub is_left_hand_driving: bool,
    pub source_mode: TravelMode,
    pub target_mode: TravelMode,
}

impl TurnContext {
    /// Converts an intersection angle (0 = road back, 180 = straight on,
    /// 90 = right) to the signed angle the cost model works with.
    pub fn signed_angle(intersection_angle: f64) -> f64 {
        180.0 - intersection_angle
    }
}

/// Turn cost in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TurnCost {
    pub weight: f64,
    pub duration: f64,
}

/// Profile hook evaluated concurrently for every generated turn.
pub trait TurnCostEvaluator: Sync {
    fn evaluate(&self, turn: &TurnContext) -> TurnCost;
}

/// Turn penalty configuration (mode-specific)
#[derive(Debug, Clone)]
pub struct TurnPenaltyConfig {
    /// Maximum angle penalty in seconds (car: 7.5s)
    pub turn_penalty_s: f64,

    /// Turn bias for asymmetric left/right costs (car: 1.075)
    /// >1.0 = prefer right turns (right-hand traffic countries)
    pub turn_bias: f64,

    /// Additional U-turn penalty in seconds (car: 20s)
    pub u_turn_penalty_s: f64,

    /// Minimum number of roads at the intersection for the angle penalty
    /// (cars only pay it at intersections with >2 roads)
    pub min_roads_for_penalty: u32,

    /// Traffic signal delay in seconds
    pub signal_delay_s: f64,

    /// Weight added when a turn enters an access-restricted road from an
    /// unrestricted one
    pub restricted_turn_penalty_s: f64,
}

impl TurnPenaltyConfig {
    /// Car mode turn penalties
    pub fn car() -> Self {
        Self {
            turn_penalty_s: 7.5,
            turn_bias: 1.075,
            u_turn_penalty_s: 20.0,
            min_roads_for_penalty: 3,
            signal_delay_s: 8.0,             // average signal wait
            restricted_turn_penalty_s: 1800.0, // destination-only roads
        }
    }

    /// Bike mode turn penalties
    pub fn bike() -> Self {
        Self {
            turn_penalty_s: 4.0,
            turn_bias: 1.4, // Bikes prefer right turns more
            u_turn_penalty_s: 5.0,
            min_roads_for_penalty: 3,
            signal_delay_s: 5.0, // bikes often filter
            restricted_turn_penalty_s: 0.0,
        }
    }

    /// Foot mode turn penalties
    /// Pedestrians don't get angle-based turn penalties but do get a small
    /// fixed crossing cost at complex intersections
    pub fn foot() -> Self {
        Self {
            turn_penalty_s: 2.0,
            turn_bias: 1.0, // Symmetric - no left/right preference
            u_turn_penalty_s: 0.0,
            min_roads_for_penalty: 4,
            signal_delay_s: 4.0,
            restricted_turn_penalty_s: 0.0,
        }
    }
}

/// Compute a turn cost with the sigmoid formula
///
/// From the car profile:
/// ```lua
/// if turn.angle >= 0 then
///   penalty = turn_penalty / (1 + math.exp( -((13 / turn_bias) *  turn.angle/180 - 6.5*turn_bias)))
/// else
///   penalty = turn_penalty / (1 + math.exp( -((13 * turn_bias) * -turn.angle/180 - 6.5/turn_bias)))
/// end
/// ```
/// The bias is inverted in left-hand traffic. For pedestrians
/// (turn_bias == 1.0) a flat crossing penalty is used instead.
pub fn compute_turn_penalty(turn: &TurnContext, config: &TurnPenaltyConfig) -> TurnCost {
    let mut duration = 0.0;

    if turn.has_traffic_light {
        duration = config.signal_delay_s;
    }

    let is_intersection = turn.number_of_roads >= config.min_roads_for_penalty
        || turn.source_mode != turn.target_mode
        || turn.is_u_turn;

    if is_intersection {
        if (config.turn_bias - 1.0).abs() < 0.001 {
            duration += config.turn_penalty_s;
        } else if config.turn_penalty_s > 0.0 {
            let turn_bias = if turn.is_left_hand_driving {
                1.0 / config.turn_bias
            } else {
                config.turn_bias
            };

            let angle = turn.angle;
            let exponent = if angle >= 0.0 {
                -((13.0 / turn_bias) * angle / 180.0 - 6.5 * turn_bias)
            } else {
                -((13.0 * turn_bias) * -angle / 180.0 - 6.5 / turn_bias)
            };
            duration += config.turn_penalty_s / (1.0 + exponent.exp());
        }

        if turn.is_u_turn {
            duration += config.u_turn_penalty_s;
        }
    }

    let mut weight = duration;
    if !turn.source_restricted && turn.target_restricted {
        weight += config.restricted_turn_penalty_s;
    }

    TurnCost { weight, duration }
}

/// Default evaluator: the sigmoid model with a fixed configuration
#[derive(Debug, Clone)]
pub struct SigmoidTurnCost {
    config: TurnPenaltyConfig,
}

impl SigmoidTurnCost {
    pub fn new(config: TurnPenaltyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TurnPenaltyConfig {
        &self.config
    }
}

impl TurnCostEvaluator for SigmoidTurnCost {
    fn evaluate(&self, turn: &TurnContext) -> TurnCost {
        compute_turn_penalty(turn, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(angle: f64, number_of_roads: u32) -> TurnContext {
        TurnContext {
            angle,
            number_of_roads,
            is_u_turn: false,
            has_traffic_light: false,
            source_restricted: false,
            target_restricted: false,
            is_left_hand_driving: false,
            source_mode: TravelMode::Driving,
            target_mode: TravelMode::Driving,
        }
    }

    #[test]
    fn test_car_sigmoid_penalties() {
        let config = TurnPenaltyConfig::car();

        // Straight: ~0 penalty
        let cost = compute_turn_penalty(&turn(0.0, 4), &config);
        assert!(cost.duration < 0.1, "straight should be ~0, got {}s", cost.duration);

        // 90 degree right turn: ~2s
        let cost = compute_turn_penalty(&turn(90.0, 4), &config);
        assert!(
            cost.duration > 1.5 && cost.duration < 2.5,
            "90° right should be ~2s, got {}s",
            cost.duration
        );

        // 90 degree left turn: ~5.4s (crossing traffic)
        let cost = compute_turn_penalty(&turn(-90.0, 4), &config);
        assert!(
            cost.duration > 5.0 && cost.duration < 6.0,
            "90° left should be ~5.4s, got {}s",
            cost.duration
        );

        // U-turn: ~7.5s + 20s
        let mut u_turn = turn(180.0, 4);
        u_turn.is_u_turn = true;
        let cost = compute_turn_penalty(&u_turn, &config);
        assert!(cost.duration >= 27.0, "U-turn should be ~27.5s, got {}s", cost.duration);

        // No penalty along a simple road
        let cost = compute_turn_penalty(&turn(90.0, 2), &config);
        assert_eq!(cost, TurnCost::default(), "no penalty at simple road continuation");
    }

    #[test]
    fn test_left_right_asymmetry() {
        let config = TurnPenaltyConfig::car();
        let right = compute_turn_penalty(&turn(90.0, 4), &config);
        let left = compute_turn_penalty(&turn(-90.0, 4), &config);
        assert!(
            left.duration > right.duration,
            "left turn ({}s) should cost more than right turn ({}s)",
            left.duration,
            right.duration
        );

        // Mirrored in left-hand traffic
        let mut right_lhd = turn(90.0, 4);
        right_lhd.is_left_hand_driving = true;
        let mut left_lhd = turn(-90.0, 4);
        left_lhd.is_left_hand_driving = true;
        let right_lhd = compute_turn_penalty(&right_lhd, &config);
        let left_lhd = compute_turn_penalty(&left_lhd, &config);
        assert!(right_lhd.duration > left_lhd.duration);
        assert!((right_lhd.duration - left.duration).abs() < 1e-9);
    }

    #[test]
    fn test_traffic_signal_delay() {
        let config = TurnPenaltyConfig::car();

        let plain = compute_turn_penalty(&turn(-90.0, 4), &config);
        let mut signalled = turn(-90.0, 4);
        signalled.has_traffic_light = true;
        let signalled = compute_turn_penalty(&signalled, &config);

        assert!((signalled.duration - plain.duration - config.signal_delay_s).abs() < 1e-9);

        // Signals count even without an intersection
        let mut through = turn(0.0, 2);
        through.has_traffic_light = true;
        assert_eq!(compute_turn_penalty(&through, &config).duration, config.signal_delay_s);
    }

    #[test]
    fn test_entering_restricted_road_costs_weight_only() {
        let config = TurnPenaltyConfig::car();
        let mut entering = turn(0.0, 2);
        entering.target_restricted = true;
        let cost = compute_turn_penalty(&entering, &config);
        assert_eq!(cost.duration, 0.0);
        assert_eq!(cost.weight, config.restricted_turn_penalty_s);

        // Already inside the restricted area
        entering.source_restricted = true;
        assert_eq!(compute_turn_penalty(&entering, &config).weight, 0.0);
    }

    #[test]
    fn test_foot_crossing_penalty() {
        let config = TurnPenaltyConfig::foot();
        let evaluator = SigmoidTurnCost::new(config.clone());

        let cost = evaluator.evaluate(&turn(90.0, 5));
        assert_eq!(cost.duration, config.turn_penalty_s);
        assert_eq!(evaluator.evaluate(&turn(90.0, 3)).duration, 0.0);
    }

    #[test]
    fn test_mode_change_counts_as_intersection() {
        let config = TurnPenaltyConfig::car();
        let mut boarding = turn(-90.0, 2);
        boarding.target_mode = TravelMode::Ferry;
        assert!(compute_turn_penalty(&boarding, &config).duration > 5.0);
    }

    #[test]
    fn test_signed_angle() {
        assert_eq!(TurnContext::signed_angle(180.0), 0.0);
        assert_eq!(TurnContext::signed_angle(90.0), 90.0);
        assert_eq!(TurnContext::signed_angle(270.0), -90.0);
    }
}
