//! Load-order preferences and the effective order
//!
//! The target game applies conflicting resources in load order and the
//! last-loaded mod wins. Users can override that with explicit
//! winner → loser edges.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{GameId, ModId};

/// A persisted user decision: `winner` beats `loser` for this game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOrderPreference {
    /// Insertion sequence; larger means more recent
    pub seq: i64,
    pub game_id: GameId,
    pub winner_mod_id: ModId,
    pub loser_mod_id: ModId,
    pub created_at: DateTime<Utc>,
}

/// Resolved ordering of enabled mods plus the explicit edges that apply to it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveOrder {
    sequence: Vec<ModId>,
    positions: HashMap<ModId, usize>,
    /// (winner, loser) → recency rank
    edges: HashMap<(ModId, ModId), i64>,
}

impl EffectiveOrder {
    /// Builds an order from a final mod sequence (first loaded first)
    pub fn new(sequence: Vec<ModId>, preferences: &[LoadOrderPreference]) -> Self {
        let positions = sequence
            .iter()
            .enumerate()
            .map(|(pos, id)| (*id, pos))
            .collect();
        let edges = preferences
            .iter()
            .map(|p| ((p.winner_mod_id, p.loser_mod_id), p.seq))
            .collect();
        Self {
            sequence,
            positions,
            edges,
        }
    }

    pub fn sequence(&self) -> &[ModId] {
        &self.sequence
    }

    pub fn position(&self, id: ModId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Winner dictated by an explicit edge between `a` and `b`, if any.
    /// When both directions exist the more recent edge wins.
    pub fn explicit_winner(&self, a: ModId, b: ModId) -> Option<ModId> {
        match (self.edges.get(&(a, b)), self.edges.get(&(b, a))) {
            (Some(ab), Some(ba)) => Some(if ab >= ba { a } else { b }),
            (Some(_), None) => Some(a),
            (None, Some(_)) => Some(b),
            (None, None) => None,
        }
    }

    /// Pairwise resolution: explicit edge first, then last-loaded wins.
    /// Mods missing from the order load before every ordered mod; ties fall
    /// back to the larger id so the result never depends on argument order.
    pub fn pick_winner(&self, a: ModId, b: ModId) -> ModId {
        if let Some(w) = self.explicit_winner(a, b) {
            return w;
        }
        let rank = |id: ModId| (self.position(id).map_or(0, |p| p + 1), id);
        if rank(a) >= rank(b) {
            a
        } else {
            b
        }
    }

    /// Winner of a conflict among several mods
    ///
    /// Candidates that lose an explicit edge to another candidate are out;
    /// the last-loaded survivor wins. When edges eliminate everyone (a cycle)
    /// the candidates are folded pairwise with [`EffectiveOrder::pick_winner`].
    pub fn winner_among(&self, candidates: &[ModId]) -> Option<ModId> {
        let first = *candidates.first()?;
        let beaten = |id: ModId| {
            candidates
                .iter()
                .any(|&other| other != id && self.explicit_winner(id, other) == Some(other))
        };
        let survivor = candidates
            .iter()
            .copied()
            .filter(|&id| !beaten(id))
            .max_by_key(|&id| self.sort_key(id));
        Some(survivor.unwrap_or_else(|| {
            candidates[1..]
                .iter()
                .fold(first, |champion, &challenger| self.pick_winner(champion, challenger))
        }))
    }

    /// Sort key that places mods in load order (unordered mods first, by id)
    pub fn sort_key(&self, id: ModId) -> (usize, ModId) {
        (self.position(id).map_or(0, |p| p + 1), id)
    }
}
