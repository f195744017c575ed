//! `PositionSet`: a set of [`Position`]s with no associated value, backed by
//! `ItemList<CountManager>` where presence *is* the value.

use crate::bunch_id::BunchId;
use crate::error::Error;
use crate::item_list::{ItemList, OrderHandle, SearchDir};
use crate::item_manager::CountManager;
use crate::position::{BunchMeta, Position};
use crate::sparse_items::Entry;
use std::collections::HashMap;

pub struct PositionSet {
    order: OrderHandle,
    items: ItemList<CountManager>,
}

impl PositionSet {
    pub fn new(order: OrderHandle) -> Self {
        Self { items: ItemList::new(order.clone()), order }
    }

    pub fn order(&self) -> &OrderHandle {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, pos: &Position) -> Result<bool, Error> {
        Ok(self.items.has(pos)?)
    }

    pub fn index_of(&self, pos: &Position, dir: SearchDir) -> Result<usize, Error> {
        Ok(self.items.index_of_position(pos, dir)?)
    }

    /// Add a new member at list index `index`.
    pub fn insert_at(&mut self, index: usize) -> Result<(Position, Option<BunchMeta>), Error> {
        let (prev, next) = self.items.neighbors(index)?;
        let (pos, meta) = self.order.borrow_mut().create_positions(&prev, &next, 1)?;
        self.items.set_values(&pos, 1)?;
        Ok((pos, meta))
    }

    pub fn remove_at(&mut self, index: usize) -> Result<(), Error> {
        let pos = self.items.position_at(index)?;
        self.items.delete_values(&pos, 1)?;
        Ok(())
    }

    pub fn remove(&mut self, pos: &Position) -> Result<(), Error> {
        self.items.delete_values(pos, 1)?;
        Ok(())
    }

    /// Every member position, in list order. `ItemList::items` coalesces consecutive members
    /// of one bunch into a single `(start_pos, run_length)` pair (the same run-length-encoding
    /// that makes `List`/`Text` content compact), so each run is expanded back into its
    /// individual member positions here.
    pub fn positions(&self) -> Vec<Position> {
        self.items
            .items(0, self.items.len())
            .into_iter()
            .flat_map(|(pos, count)| {
                (0..count).map(move |k| Position { bunch_id: pos.bunch_id.clone(), inner_index: pos.inner_index + k })
            })
            .collect()
    }

    pub fn save(&self) -> HashMap<BunchId, Vec<Entry<CountManager>>> {
        self.items.save()
    }

    pub fn load(order: OrderHandle, saved: HashMap<BunchId, Vec<Entry<CountManager>>>) -> Result<Self, Error> {
        Ok(Self { order: order.clone(), items: ItemList::load(order, saved)? })
    }
}
