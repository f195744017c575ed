//! `Outline`: positions with no payload at all, for callers tracking content in a side
//! channel (e.g. a rich-text framework that keeps styled runs elsewhere and only needs
//! presence/absence of each slot).

use crate::bunch_id::BunchId;
use crate::error::{Error, RangeError};
use crate::item_list::{ItemList, OrderHandle, SearchDir};
use crate::item_manager::CountManager;
use crate::position::{BunchMeta, Position};
use crate::sparse_items::Entry;
use std::collections::HashMap;

pub struct Outline {
    order: OrderHandle,
    items: ItemList<CountManager>,
}

impl Outline {
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

    pub fn position_at(&self, index: usize) -> Result<Position, RangeError> {
        self.items.position_at(index)
    }

    pub fn index_of_position(&self, pos: &Position, dir: SearchDir) -> Result<usize, Error> {
        Ok(self.items.index_of_position(pos, dir)?)
    }

    /// Mark `count` consecutive new slots present, starting at list index `index`.
    pub fn insert_at(&mut self, index: usize, count: u32) -> Result<(Position, Option<BunchMeta>), Error> {
        if count == 0 {
            return Err(Error::Range(RangeError::EmptyBulk));
        }
        let (prev, next) = self.items.neighbors(index)?;
        let (start_pos, meta) = self.order.borrow_mut().create_positions(&prev, &next, count)?;
        self.items.set_values(&start_pos, count)?;
        Ok((start_pos, meta))
    }

    pub fn delete(&mut self, index: usize, count: usize) -> Result<(), Error> {
        for _ in 0..count {
            let pos = self.items.position_at(index)?;
            self.items.delete_values(&pos, 1)?;
        }
        Ok(())
    }

    /// Every present position, in list order. `ItemList::items` coalesces consecutive present
    /// slots of one bunch into a single `(start_pos, run_length)` pair, the same run-length
    /// encoding that makes `List`/`Text` content compact; since `CountManager` carries no
    /// payload (presence is the only information), each run is expanded back into its
    /// individual member positions here — one per side-channel slot, in the same order the
    /// side channel must be walked to reconcile against it.
    pub fn positions(&self) -> Vec<Position> {
        self.items
            .items(0, self.items.len())
            .into_iter()
            .flat_map(|(pos, count)| (0..count).map(move |k| Position { bunch_id: pos.bunch_id.clone(), inner_index: pos.inner_index + k }))
            .collect()
    }

    pub fn save_outline(&self) -> HashMap<BunchId, Vec<Entry<CountManager>>> {
        self.items.save()
    }

    /// Rebuild an `Outline` from saved presence state. `expected_len`, when given, is checked
    /// against the reconstructed length — useful when the caller also holds an external
    /// side-channel slice that must line up with this outline slot-for-slot. Zip
    /// [`Self::positions`] against that side channel to reconcile actual content back onto the
    /// reloaded positions (e.g. via [`crate::text::Text::set_at`]).
    pub fn load_outline(
        order: OrderHandle,
        saved: HashMap<BunchId, Vec<Entry<CountManager>>>,
        expected_len: Option<usize>,
    ) -> Result<Self, Error> {
        let outline = Self { order: order.clone(), items: ItemList::load(order, saved)? };
        if let Some(expected) = expected_len {
            if outline.len() != expected {
                return Err(Error::Range(RangeError::IndexOutOfBounds));
            }
        }
        Ok(outline)
    }
}
