use butterfly_common::NodeId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::{blocking_rule, TargetRule};
use crate::ebg::TurnVertex;

/// `from -> via_from -> ... -> via_to -> to` where the middle part is a
/// single compressed segment (the via way)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WayRestriction {
    pub from: NodeId,
    pub via_from: NodeId,
    pub via_to: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub is_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl TargetRule for WayRestriction {
    fn to(&self) -> NodeId {
        self.to
    }

    fn is_only(&self) -> bool {
        self.is_only
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViaWay {
    pub from: NodeId,
    pub to: NodeId,
}

/// Index of a duplicated turn vertex, `0..number_of_duplicated_nodes()`
pub type DuplicatedNodeId = u32;

#[derive(Debug, Clone)]
struct DuplicatedNode {
    via: ViaWay,
    rules: Range<usize>,
}

/// Via-way restrictions and the duplicated turn vertices they require.
///
/// Restrictions sharing the same approach and via way (`from`, `via_from`,
/// `via_to`) share one duplicate. Duplicates are numbered in ascending order
/// of that key, so the numbering only depends on the restriction content.
#[derive(Debug, Clone, Default)]
pub struct WayRestrictionMap {
    restrictions: Vec<WayRestriction>,
    duplicates: Vec<DuplicatedNode>,
    by_via_way: FxHashMap<(NodeId, NodeId), Vec<DuplicatedNodeId>>,
    by_entry: FxHashMap<(NodeId, NodeId, NodeId), DuplicatedNodeId>,
}

impl WayRestrictionMap {
    pub fn new(mut restrictions: Vec<WayRestriction>) -> Self {
        restrictions.sort_by(|a, b| {
            (a.from, a.via_from, a.via_to, a.to, a.is_only, &a.condition).cmp(&(
                b.from,
                b.via_from,
                b.via_to,
                b.to,
                b.is_only,
                &b.condition,
            ))
        });
        restrictions.dedup();

        let mut duplicates = Vec::new();
        let mut by_via_way: FxHashMap<(NodeId, NodeId), Vec<DuplicatedNodeId>> =
            FxHashMap::default();
        let mut by_entry = FxHashMap::default();

        let mut start = 0;
        while start < restrictions.len() {
            let head = &restrictions[start];
            let key = (head.from, head.via_from, head.via_to);
            let end = start
                + restrictions[start..]
                    .iter()
                    .take_while(|r| (r.from, r.via_from, r.via_to) == key)
                    .count();

            let id = duplicates.len() as DuplicatedNodeId;
            duplicates.push(DuplicatedNode {
                via: ViaWay {
                    from: head.via_from,
                    to: head.via_to,
                },
                rules: start..end,
            });
            by_via_way
                .entry((head.via_from, head.via_to))
                .or_default()
                .push(id);
            by_entry.insert(key, id);

            start = end;
        }

        Self {
            restrictions,
            duplicates,
            by_via_way,
            by_entry,
        }
    }

    pub fn number_of_duplicated_nodes(&self) -> usize {
        self.duplicates.len()
    }

    pub fn len(&self) -> usize {
        self.restrictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restrictions.is_empty()
    }

    /// The via way each duplicate stands for, in duplicate order.
    pub fn duplicated_node_representatives(&self) -> impl Iterator<Item = ViaWay> + '_ {
        self.duplicates.iter().map(|d| d.via)
    }

    pub fn is_via_way(&self, from: NodeId, to: NodeId) -> bool {
        self.by_via_way.contains_key(&(from, to))
    }

    /// All duplicates of the via way `from -> to`.
    pub fn duplicated_node_ids(&self, from: NodeId, to: NodeId) -> &[DuplicatedNodeId] {
        self.by_via_way
            .get(&(from, to))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The restriction that forbids leaving `duplicated_node` towards `to`.
    pub fn get_restriction(
        &self,
        duplicated_node: DuplicatedNodeId,
        to: NodeId,
    ) -> Option<&WayRestriction> {
        let duplicate = self.duplicates.get(duplicated_node as usize)?;
        blocking_rule(&self.restrictions[duplicate.rules.clone()], to)
    }

    pub fn is_restricted(&self, duplicated_node: DuplicatedNodeId, to: NodeId) -> bool {
        self.get_restriction(duplicated_node, to).is_some()
    }

    /// Redirects a turn `from -> via -> to` onto the duplicate of the via way
    /// `via -> to` when it enters that way from a restricted approach.
    pub fn remap_if_restricted(
        &self,
        target: TurnVertex,
        from: NodeId,
        via: NodeId,
        to: NodeId,
    ) -> TurnVertex {
        match (target, self.by_entry.get(&(from, via, to))) {
            (TurnVertex::Ordinary(base), Some(&duplicate_index)) => TurnVertex::ViaDuplicate {
                base,
                duplicate_index,
            },
            _ => target,
        }
    }
}
