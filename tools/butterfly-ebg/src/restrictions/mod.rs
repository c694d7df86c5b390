//! Turn restrictions folded into the turn expansion
//!
//! - [`RestrictionMap`]: node restrictions `from -> via -> to`, split into an
//!   unconditional map (consulted by the legality service) and a conditional
//!   one (turned into time-dependent penalties).
//! - [`WayRestrictionMap`]: restrictions over a via way, which need
//!   duplicated turn vertices to remember that the way was entered from the
//!   restricted approach.

mod node;
mod way;

pub use node::{NodeRestriction, RestrictionMap};
pub use way::{DuplicatedNodeId, ViaWay, WayRestriction, WayRestrictionMap};

use butterfly_common::NodeId;

/// Common view of a restriction's target side
pub(crate) trait TargetRule {
    fn to(&self) -> NodeId;
    fn is_only(&self) -> bool;
}

/// Picks the restriction forbidding a move towards `to` among the rules that
/// share a start.
///
/// A `no_*` rule naming `to` wins outright. Otherwise `only_*` rules forbid
/// every target but their own; the first such rule is reported.
pub(crate) fn blocking_rule<'a, R, I>(candidates: I, to: NodeId) -> Option<&'a R>
where
    R: TargetRule + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut first_only = None;
    let mut only_allows = false;

    for rule in candidates {
        if rule.is_only() {
            if rule.to() == to {
                only_allows = true;
            } else if first_only.is_none() {
                first_only = Some(rule);
            }
        } else if rule.to() == to {
            return Some(rule);
        }
    }

    if only_allows {
        None
    } else {
        first_only
    }
}
