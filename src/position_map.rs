//! `PositionMap<V>`: like [`crate::position_set::PositionSet`] but with an attached `V` per
//! member, held in an auxiliary side-table keyed by [`Position`] rather than index, since map
//! members need not be contiguous in list order.

use crate::bunch_id::BunchId;
use crate::error::Error;
use crate::item_list::{ItemList, OrderHandle, SearchDir};
use crate::item_manager::CountManager;
use crate::position::{BunchMeta, Position};
use crate::sparse_items::Entry;
use std::collections::HashMap;

pub struct PositionMap<V> {
    order: OrderHandle,
    items: ItemList<CountManager>,
    values: HashMap<Position, V>,
}

impl<V> PositionMap<V> {
    pub fn new(order: OrderHandle) -> Self {
        Self { items: ItemList::new(order.clone()), order, values: HashMap::new() }
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

    pub fn get(&self, pos: &Position) -> Option<&V> {
        self.values.get(pos)
    }

    pub fn index_of(&self, pos: &Position, dir: SearchDir) -> Result<usize, Error> {
        Ok(self.items.index_of_position(pos, dir)?)
    }

    pub fn insert_at(&mut self, index: usize, value: V) -> Result<(Position, Option<BunchMeta>), Error> {
        let (prev, next) = self.items.neighbors(index)?;
        let (pos, meta) = self.order.borrow_mut().create_positions(&prev, &next, 1)?;
        self.items.set_values(&pos, 1)?;
        self.values.insert(pos.clone(), value);
        Ok((pos, meta))
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Option<V>, Error> {
        let pos = self.items.position_at(index)?;
        self.items.delete_values(&pos, 1)?;
        Ok(self.values.remove(&pos))
    }

    pub fn remove(&mut self, pos: &Position) -> Result<Option<V>, Error> {
        self.items.delete_values(pos, 1)?;
        Ok(self.values.remove(pos))
    }

    /// `(position, value)` pairs in list order. `ItemList::items` coalesces consecutive
    /// members of one bunch into a single `(start_pos, run_length)` pair, so each run is
    /// expanded back into its individual member positions before the side-table lookup.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &V)> {
        self.items
            .items(0, self.items.len())
            .into_iter()
            .flat_map(|(pos, count)| {
                (0..count).map(move |k| Position { bunch_id: pos.bunch_id.clone(), inner_index: pos.inner_index + k })
            })
            .filter_map(move |pos| self.values.get(&pos).map(|v| (pos.clone(), v)))
    }

    pub fn save(&self) -> PositionMapSavedState<V>
    where
        V: Clone,
    {
        PositionMapSavedState {
            presence: self.items.save(),
            values: self.values.iter().map(|(p, v)| (p.clone(), v.clone())).collect(),
        }
    }

    pub fn load(order: OrderHandle, saved: PositionMapSavedState<V>) -> Result<Self, Error> {
        let items = ItemList::load(order.clone(), saved.presence)?;
        let values = saved.values.into_iter().collect();
        Ok(Self { order, items, values })
    }
}

/// Saved form of a [`PositionMap`]: presence/ordering (a plain `ItemList` save) plus the
/// value side-table as a flat `Vec` of pairs, since `Position` isn't a string and so can't be
/// a JSON object key the way `serde_json::Map` requires.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionMapSavedState<V> {
    pub presence: HashMap<BunchId, Vec<Entry<CountManager>>>,
    pub values: Vec<(Position, V)>,
}
