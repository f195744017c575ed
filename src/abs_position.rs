//! `AbsPosition`: a self-contained encoding of a [`Position`] that inlines its full ancestor
//! chain, so it can be used (compared, stored) before those ancestors' [`BunchMeta`]s have
//! separately reached [`Order::add_metas`].
//!
//! The distilled spec's external-interface description represents the ancestor chain as four
//! deduplicated parallel arrays (splitting each bunch id into a replica-id/counter pair to
//! dedup repeated replica prefixes). That split only round-trips for ids the default factory
//! produces; a caller-supplied `new_bunch_id` hook can return arbitrary strings, so this
//! inlines the ancestor chain as `Vec<BunchMeta>` directly instead — functionally identical
//! (self-contained, install-before-use) without assuming a particular id shape.

use crate::bunch_id::BunchId;
use crate::error::OrderError;
use crate::order::Order;
use crate::position::{BunchMeta, Position};

/// A [`Position`] with its ancestor chain inlined, root-to-leaf.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbsPosition {
    /// `bunch_metas[0]`'s parent is the root bunch; each subsequent entry's parent is the
    /// previous entry's bunch; the last entry is the position's own bunch. Empty for a
    /// position on the root bunch (`MIN_POSITION`/`MAX_POSITION`).
    pub bunch_metas: Vec<BunchMeta>,
    pub inner_index: u32,
}

impl AbsPosition {
    pub fn min() -> Self {
        Self { bunch_metas: Vec::new(), inner_index: 0 }
    }

    pub fn max() -> Self {
        Self { bunch_metas: Vec::new(), inner_index: 1 }
    }

    /// Walk `pos`'s bunch up to the root via `order`, capturing every ancestor's metadata.
    pub fn from_position(pos: &Position, order: &Order) -> Result<Self, OrderError> {
        if pos.bunch_id.is_root() {
            return Ok(Self { bunch_metas: Vec::new(), inner_index: pos.inner_index });
        }
        let mut node = order.node_of(&pos.bunch_id)?;
        let mut chain = Vec::new();
        loop {
            let parent = order.parent(node).expect("non-root node always has a parent");
            let parent_id = order.bunch_id(parent).clone();
            let bunch_id = order.bunch_id(node).clone();
            let offset = order.offset(node);
            chain.push(BunchMeta { bunch_id, parent_id, offset });
            if parent == order.root() {
                break;
            }
            node = parent;
        }
        chain.reverse();
        Ok(Self { bunch_metas: chain, inner_index: pos.inner_index })
    }

    /// Install any ancestors `order` doesn't already know, then return the plain [`Position`].
    pub fn to_position(&self, order: &mut Order) -> Result<Position, OrderError> {
        if self.bunch_metas.is_empty() {
            return Ok(Position { bunch_id: BunchId::root(), inner_index: self.inner_index });
        }
        order.add_metas(self.bunch_metas.clone())?;
        let bunch_id = self.bunch_metas.last().expect("checked non-empty").bunch_id.clone();
        Ok(Position { bunch_id, inner_index: self.inner_index })
    }
}
