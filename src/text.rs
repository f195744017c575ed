//! `Text`: a thin typed facade over `ItemList<StringManager>`, UTF-16-code-unit indexed to
//! match the saved-state contract shared with other ecosystem implementations.

use crate::bunch_id::BunchId;
use crate::error::{CharShapeError, Error, RangeError};
use crate::item_list::{ItemList, OrderHandle, SearchDir};
use crate::item_manager::StringManager;
use crate::position::{BunchMeta, Position};
use crate::sparse_items::Entry;
use std::collections::HashMap;

pub struct Text {
    order: OrderHandle,
    items: ItemList<StringManager>,
}

impl Text {
    pub fn new(order: OrderHandle) -> Self {
        Self { items: ItemList::new(order.clone()), order }
    }

    pub fn order(&self) -> &OrderHandle {
        &self.order
    }

    /// Length in UTF-16 code units, matching the index space every other method uses.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position_at(&self, index: usize) -> Result<Position, RangeError> {
        self.items.position_at(index)
    }

    pub fn index_of_position(&self, pos: &Position, dir: SearchDir) -> Result<usize, Error> {
        Ok(self.items.index_of_position(pos, dir)?)
    }

    /// Whether `pos` currently holds a character (false for a deleted or never-written slot).
    pub fn has(&self, pos: &Position) -> Result<bool, Error> {
        Ok(self.items.has(pos)?)
    }

    /// Insert a single character at `index`. Rejects multi-code-unit strings; use
    /// [`Self::insert_str`] for bulk text.
    pub fn insert_at(&mut self, index: usize, ch: char) -> Result<(Position, Option<BunchMeta>), Error> {
        let mut buf = [0u16; 2];
        let units = ch.encode_utf16(&mut buf);
        if units.len() != 1 {
            return Err(Error::CharShape(CharShapeError));
        }
        self.insert_str(index, &ch.to_string())
    }

    /// Insert `text` as one contiguous bunch starting at UTF-16 index `index`.
    pub fn insert_str(&mut self, index: usize, text: &str) -> Result<(Position, Option<BunchMeta>), Error> {
        if text.is_empty() {
            return Err(Error::Range(RangeError::EmptyBulk));
        }
        let (prev, next) = self.items.neighbors(index)?;
        let units: Vec<u16> = text.encode_utf16().collect();
        let count = units.len() as u32;
        let (start_pos, meta) = self.order.borrow_mut().create_positions(&prev, &next, count)?;
        self.items.set_values(&start_pos, units)?;
        Ok((start_pos, meta))
    }

    /// Write `ch` directly at an already-known position, minting nothing new. Used to
    /// reconstruct a `Text` from an [`crate::outline::Outline`]'s positions plus externally
    /// supplied content (see `Outline::positions`).
    pub fn set_at(&mut self, pos: &Position, ch: char) -> Result<(), Error> {
        let mut buf = [0u16; 2];
        let units = ch.encode_utf16(&mut buf);
        if units.len() != 1 {
            return Err(Error::CharShape(CharShapeError));
        }
        self.items.set_values(pos, units.to_vec())?;
        Ok(())
    }

    /// Delete `count` UTF-16 code units starting at `index`, one at a time (see
    /// [`crate::list::List::delete`] for why).
    pub fn delete(&mut self, index: usize, count: usize) -> Result<(), Error> {
        for _ in 0..count {
            let pos = self.items.position_at(index)?;
            self.items.delete_values(&pos, 1)?;
        }
        Ok(())
    }

    pub fn to_string(&self) -> String {
        let units: Vec<u16> = self.items.items(0, self.items.len()).into_iter().flat_map(|(_, run)| run).collect();
        String::from_utf16_lossy(&units)
    }

    pub fn items(&self, start: usize, end: usize) -> Vec<(Position, String)> {
        self.items
            .items(start, end)
            .into_iter()
            .map(|(pos, run)| (pos, String::from_utf16_lossy(&run)))
            .collect()
    }

    pub fn save(&self) -> HashMap<BunchId, Vec<Entry<StringManager>>> {
        self.items.save()
    }

    pub fn load(order: OrderHandle, saved: HashMap<BunchId, Vec<Entry<StringManager>>>) -> Result<Self, Error> {
        Ok(Self { order: order.clone(), items: ItemList::load(order, saved)? })
    }
}
