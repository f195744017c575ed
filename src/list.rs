//! `List<T>`: a thin typed facade over `ItemList<VecManager<T>>`.

use crate::error::{Error, RangeError};
use crate::item_list::{ItemList, OrderHandle, SearchDir};
use crate::item_manager::VecManager;
use crate::position::{BunchMeta, Position};
use std::collections::HashMap;
use std::fmt::Debug;

/// A collaborative array of `T`, ordered by the shared [`Order`](crate::order::Order).
pub struct List<T: Clone + Debug> {
    order: OrderHandle,
    items: ItemList<VecManager<T>>,
}

impl<T: Clone + Debug> List<T> {
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

    pub fn get(&self, index: usize) -> Result<T, Error> {
        let pos = self.items.position_at(index)?;
        Ok(self.items.get(&pos)?.expect("position_at only returns present positions"))
    }

    pub fn position_at(&self, index: usize) -> Result<Position, RangeError> {
        self.items.position_at(index)
    }

    pub fn index_of_position(&self, pos: &Position, dir: SearchDir) -> Result<usize, Error> {
        Ok(self.items.index_of_position(pos, dir)?)
    }

    /// Whether `pos` currently holds a value (false for a deleted or never-written slot).
    pub fn has(&self, pos: &Position) -> Result<bool, Error> {
        Ok(self.items.has(pos)?)
    }

    pub fn insert(&mut self, index: usize, value: T) -> Result<(Position, Option<BunchMeta>), Error> {
        self.insert_all(index, vec![value])
    }

    /// Insert `values` as one contiguous bunch starting at list index `index`.
    pub fn insert_all(&mut self, index: usize, values: Vec<T>) -> Result<(Position, Option<BunchMeta>), Error> {
        if values.is_empty() {
            return Err(Error::Range(RangeError::EmptyBulk));
        }
        let (prev, next) = self.items.neighbors(index)?;
        let count = values.len() as u32;
        let (start_pos, meta) = self.order.borrow_mut().create_positions(&prev, &next, count)?;
        self.items.set_values(&start_pos, values)?;
        Ok((start_pos, meta))
    }

    /// Delete `count` values starting at list index `index`, one position at a time. Each
    /// deletion shifts everything after it left by one, so repeatedly deleting at the same
    /// `index` walks through the requested run regardless of how many bunches it spans.
    pub fn delete(&mut self, index: usize, count: usize) -> Result<(), Error> {
        for _ in 0..count {
            let pos = self.items.position_at(index)?;
            self.items.delete_values(&pos, 1)?;
        }
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items
            .items(0, self.items.len())
            .into_iter()
            .flat_map(|(_, run)| run)
            .collect()
    }

    /// `(start_pos, run)` pairs covering `[start, end)` in list order.
    pub fn items(&self, start: usize, end: usize) -> Vec<(Position, Vec<T>)> {
        self.items.items(start, end)
    }

    pub fn save(&self) -> HashMap<crate::bunch_id::BunchId, Vec<crate::sparse_items::Entry<VecManager<T>>>> {
        self.items.save()
    }

    pub fn load(order: OrderHandle, saved: HashMap<crate::bunch_id::BunchId, Vec<crate::sparse_items::Entry<VecManager<T>>>>) -> Result<Self, Error> {
        Ok(Self { order: order.clone(), items: ItemList::load(order, saved)? })
    }
}
