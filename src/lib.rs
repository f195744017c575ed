//! Replicated list positions: a CRDT data structure for collaborative lists and text.
//!
//! Three subsystems do the work — [`order::Order`] (the bunch tree and position algebra),
//! [`item_list::ItemList`] (per-bunch content plus cached tree aggregates), and
//! [`sparse_items::SparseItems`] (the run-length-encoded sparse array each bunch uses) — and a
//! handful of thin typed facades ([`list::List`], [`text::Text`], [`outline::Outline`],
//! [`abs_position::AbsPosition`], [`position_set::PositionSet`], [`position_map::PositionMap`])
//! sit on top for callers who just want a collaborative array, string, or set.

pub mod abs_position;
pub mod bunch_id;
pub mod error;
pub mod item_list;
pub mod item_manager;
pub mod list;
pub mod order;
pub mod outline;
pub mod position;
pub mod position_map;
pub mod position_set;
pub mod sparse_items;
pub mod text;

pub use abs_position::AbsPosition;
pub use bunch_id::BunchId;
pub use error::{CharShapeError, Error, InvalidBunchId, ItemListError, OrderBoundary, OrderError, RangeError};
pub use item_list::{ItemList, OrderHandle, SearchDir};
pub use item_manager::{CountManager, ItemManager, StringManager, VecManager};
pub use list::List;
pub use order::{NodeHandle, Order, OrderConfig, SavedBunchMeta};
pub use outline::Outline;
pub use position::{max_position, min_position, BunchMeta, Position};
pub use position_map::{PositionMap, PositionMapSavedState};
pub use position_set::PositionSet;
pub use sparse_items::{Entry, SparseItems};
pub use text::Text;

use std::cell::RefCell;
use std::rc::Rc;

/// Construct a fresh, empty [`Order`] wrapped for sharing across multiple
/// [`ItemList`]s/wrappers, per the `Rc<RefCell<Order>>` sharing convention used throughout
/// this crate.
pub fn new_order(config: OrderConfig) -> OrderHandle {
    Rc::new(RefCell::new(Order::new(config)))
}
