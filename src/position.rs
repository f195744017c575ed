//! The value-typed [`Position`] and the metadata that anchors a bunch into an [`Order`](crate::order::Order) tree.

use crate::bunch_id::BunchId;

/// A globally comparable location in a list, independent of any particular replica's state.
///
/// Two positions compare consistently everywhere they're both known, without needing to
/// consult the document they came from — this is the whole point of the library. A `Position`
/// by itself doesn't carry a value; it's paired with content in [`crate::item_list::ItemList`]
/// or one of the typed wrappers.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub bunch_id: BunchId,
    pub inner_index: u32,
}

impl Position {
    pub fn new(bunch_id: BunchId, inner_index: u32) -> Self {
        Self { bunch_id, inner_index }
    }
}

/// The sentinel position before every other position in every [`Order`](crate::order::Order).
pub fn min_position() -> Position {
    Position { bunch_id: BunchId::root(), inner_index: 0 }
}

/// The sentinel position after every other position in every [`Order`](crate::order::Order).
pub fn max_position() -> Position {
    Position { bunch_id: BunchId::root(), inner_index: 1 }
}

/// The information needed to attach a bunch into the tree: which bunch, where its parent is,
/// and the offset describing its sibling order and left/right attachment side.
///
/// `offset = 2*k` attaches as a left child of the parent's `k`-th implied value (sorting
/// before it); `offset = 2*k + 1` attaches as a right child (sorting after it, before `k+1`).
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BunchMeta {
    pub bunch_id: BunchId,
    pub parent_id: BunchId,
    pub offset: u32,
}

/// The parent's implied inner_index an attachment at `offset` sits relative to (`offset / 2`,
/// valid for both left and right attachments since integer division floors).
pub(crate) fn parent_k(offset: u32) -> u32 {
    offset / 2
}

/// True if an attachment at `offset` is a right child (sorts strictly after `parent_k`).
pub(crate) fn is_right_child(offset: u32) -> bool {
    offset % 2 == 1
}
