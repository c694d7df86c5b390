//! Resolves pending conditional penalties to the turn ids of their edges

use butterfly_common::NodeId;
use rustc_hash::FxHashMap;

use crate::error::{EbgError, Result};
use crate::formats::{ConditionalTurnPenalty, EdgeBasedEdge};

/// A conditional penalty waiting for the turn `from -> to` to get its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingConditional {
    pub from: NodeId,
    pub to: NodeId,
    pub penalty: ConditionalTurnPenalty,
}

/// Stamps every pending penalty with the turn id of each edge
/// `from -> to`, in edge order. A penalty without any edge is an error.
pub(crate) fn index_conditional_penalties(
    edges: &[EdgeBasedEdge],
    pending: Vec<PendingConditional>,
) -> Result<Vec<ConditionalTurnPenalty>> {
    let mut by_turn: FxHashMap<(NodeId, NodeId), Vec<usize>> = FxHashMap::default();
    for (index, conditional) in pending.iter().enumerate() {
        by_turn
            .entry((conditional.from, conditional.to))
            .or_default()
            .push(index);
    }

    let mut matched = vec![false; pending.len()];
    let mut indexed = Vec::with_capacity(pending.len());
    for edge in edges {
        let Some(indices) = by_turn.get(&(edge.source, edge.target)) else {
            continue;
        };
        for &index in indices {
            let mut penalty = pending[index].penalty.clone();
            penalty.turn_id = edge.turn_id;
            indexed.push(penalty);
            matched[index] = true;
        }
    }

    if let Some(index) = matched.iter().position(|&m| !m) {
        return Err(EbgError::UnresolvedConditional {
            from: pending[index].from,
            to: pending[index].to,
        });
    }

    Ok(indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use butterfly_common::Coordinate;

    fn pending(from: NodeId, to: NodeId, condition: &str) -> PendingConditional {
        PendingConditional {
            from,
            to,
            penalty: ConditionalTurnPenalty::unassigned(Coordinate::default(), condition.to_string()),
        }
    }

    fn edges() -> Vec<EdgeBasedEdge> {
        [(0, 1), (1, 2), (0, 2)]
            .iter()
            .enumerate()
            .map(|(id, &(source, target))| {
                let mut edge = EdgeBasedEdge::new(source, target, 1, 1);
                edge.turn_id = id as u32;
                edge
            })
            .collect()
    }

    #[test]
    fn test_penalties_follow_edge_order() {
        let indexed = index_conditional_penalties(
            &edges(),
            vec![pending(0, 2, "Sa-Su"), pending(1, 2, "Mo-Fr"), pending(1, 2, "22:00-06:00")],
        )
        .unwrap();

        let stamped: Vec<(u32, &str)> = indexed
            .iter()
            .map(|p| (p.turn_id, p.condition.as_str()))
            .collect();
        assert_eq!(stamped, vec![(1, "Mo-Fr"), (1, "22:00-06:00"), (2, "Sa-Su")]);
    }

    #[test]
    fn test_unmatched_penalty_is_fatal() {
        let result = index_conditional_penalties(&edges(), vec![pending(2, 0, "Mo")]);
        assert!(matches!(
            result,
            Err(EbgError::UnresolvedConditional { from: 2, to: 0 })
        ));
    }

    #[test]
    fn test_nothing_pending() {
        assert!(index_conditional_penalties(&edges(), Vec::new()).unwrap().is_empty());
    }
}
