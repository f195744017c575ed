//! A run-length-encoded sparse array of present/deleted runs for a single bunch.
//!
//! Internally this is a `Vec` of alternating [`Entry::Present`]/[`Entry::Deleted`] runs, built
//! on the same [`rle::SplitableSpan`]/[`rle::AppendRle`] kit the rest of this crate's ancestry
//! uses for every other run-length-encoded sequence (op lists, version spans, ...).

use crate::item_manager::ItemManager;
use rle::{AppendRle, SplitableSpan};

/// One run of a [`SparseItems`]: either present content or a count of deleted slots.
pub enum Entry<M: ItemManager> {
    Present(M::Run),
    Deleted(u32),
}

impl<M: ItemManager> Clone for Entry<M> {
    fn clone(&self) -> Self {
        match self {
            Entry::Present(r) => Entry::Present(r.clone()),
            Entry::Deleted(n) => Entry::Deleted(*n),
        }
    }
}

impl<M: ItemManager> std::fmt::Debug for Entry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entry::Present(r) => f.debug_tuple("Present").field(r).finish(),
            Entry::Deleted(n) => f.debug_tuple("Deleted").field(n).finish(),
        }
    }
}

impl<M: ItemManager> PartialEq for Entry<M>
where
    M::Run: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Entry::Present(a), Entry::Present(b)) => a == b,
            (Entry::Deleted(a), Entry::Deleted(b)) => a == b,
            _ => false,
        }
    }
}

/// Wire shape for [`Entry`]: an ordinary tagged enum over the run type, used only to drive
/// serde through `Entry`'s associated-type indirection (serde can't derive directly on a type
/// whose variant payload is `M::Run` for a trait `M`).
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
enum EntryRepr<R> {
    Present(R),
    Deleted(u32),
}

#[cfg(feature = "serde")]
impl<M: ItemManager> serde::Serialize for Entry<M>
where
    M::Run: serde::Serialize,
{
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Entry::Present(r) => EntryRepr::Present(r).serialize(serializer),
            Entry::Deleted(n) => EntryRepr::<&M::Run>::Deleted(*n).serialize(serializer),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, M: ItemManager> serde::Deserialize<'de> for Entry<M>
where
    M::Run: serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match EntryRepr::<M::Run>::deserialize(deserializer)? {
            EntryRepr::Present(r) => Ok(Entry::Present(r)),
            EntryRepr::Deleted(n) => Ok(Entry::Deleted(n)),
        }
    }
}

impl<M: ItemManager> SplitableSpan for Entry<M> {
    fn len(&self) -> usize {
        match self {
            Entry::Present(r) => M::len(r),
            Entry::Deleted(n) => *n as usize,
        }
    }

    fn truncate(&mut self, at: usize) -> Self {
        match self {
            Entry::Present(r) => {
                let taken = std::mem::replace(r, M::empty());
                let (left, right) = M::split(taken, at);
                *r = left;
                Entry::Present(right)
            }
            Entry::Deleted(n) => {
                let right = *n - at as u32;
                *n = at as u32;
                Entry::Deleted(right)
            }
        }
    }

    fn can_append(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Entry::Present(_), Entry::Present(_)) | (Entry::Deleted(_), Entry::Deleted(_))
        )
    }

    fn append(&mut self, other: Self) {
        match (self, other) {
            (Entry::Present(a), Entry::Present(b)) => M::append(a, b),
            (Entry::Deleted(a), Entry::Deleted(b)) => *a += b,
            _ => unreachable!("can_append guards this"),
        }
    }
}

/// Sparse run-length-encoded content for one bunch.
///
/// Always has at least one entry; a freshly created or fully-trimmed instance is
/// `[Present(empty)]`, never an empty `Vec` — this keeps `locate` simple (there's always
/// something to append a first item into).
pub struct SparseItems<M: ItemManager> {
    entries: Vec<Entry<M>>,
}

impl<M: ItemManager> Clone for SparseItems<M> {
    fn clone(&self) -> Self {
        Self { entries: self.entries.clone() }
    }
}

impl<M: ItemManager> std::fmt::Debug for SparseItems<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseItems").field("entries", &self.entries).finish()
    }
}

impl<M: ItemManager> Default for SparseItems<M> {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl<M: ItemManager> SparseItems<M> {
    pub fn new_empty() -> Self {
        Self { entries: vec![Entry::Present(M::empty())] }
    }

    /// Total index span covered (present + deleted). Absent indices beyond this span are
    /// treated as deleted by [`Self::has`]/[`Self::get`], but don't count toward `len`.
    pub fn len(&self) -> usize {
        self.entries.iter().map(SplitableSpan::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of present slots across the whole sequence.
    pub fn size(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e {
                Entry::Present(r) => M::len(r),
                Entry::Deleted(_) => 0,
            })
            .sum()
    }

    /// Find the entry containing `index`, returning `(entry_index, entry_start)`. If `index`
    /// is `>= self.len()`, returns `(entries.len(), self.len())` (the append point).
    fn locate(&self, index: usize) -> (usize, usize) {
        let mut pos = 0;
        for (i, e) in self.entries.iter().enumerate() {
            let l = e.len();
            if index < pos + l {
                return (i, pos);
            }
            pos += l;
        }
        (self.entries.len(), pos)
    }

    /// Pad the sequence with a trailing deleted run so `self.len() >= target`.
    fn ensure_len(&mut self, target: usize) {
        let cur = self.len();
        if target > cur {
            self.entries.push_rle(Entry::Deleted((target - cur) as u32));
        }
    }

    /// Ensure there's an entry boundary exactly at `index` (splitting a run in two if needed).
    fn split_at(&mut self, index: usize) {
        if index == 0 {
            return;
        }
        let (entry_idx, start) = self.locate(index);
        if entry_idx >= self.entries.len() {
            return; // index == self.len(): already a boundary (the implicit append point)
        }
        let offset = index - start;
        if offset == 0 {
            return;
        }
        let tail = self.entries[entry_idx].truncate(offset);
        self.entries.insert(entry_idx + 1, tail);
    }

    fn coalesce_around(&mut self, idx: usize) {
        if idx + 1 < self.entries.len() && self.entries[idx].can_append(&self.entries[idx + 1]) {
            let next = self.entries.remove(idx + 1);
            self.entries[idx].append(next);
        }
        if idx > 0 && self.entries[idx - 1].can_append(&self.entries[idx]) {
            let cur = self.entries.remove(idx);
            self.entries[idx - 1].append(cur);
        }
    }

    /// Drop the current content over `[start, end)` (which must already span exactly
    /// `new_entry.len()`) and install `new_entry` in its place, returning the displaced content
    /// re-based at index 0.
    fn replace_range(&mut self, start: usize, end: usize, new_entry: Entry<M>) -> SparseItems<M> {
        self.split_at(start);
        self.split_at(end);
        let (start_idx, _) = self.locate(start);
        let end_idx = if end >= self.len() {
            self.entries.len()
        } else {
            self.locate(end).0
        };
        let removed: Vec<Entry<M>> = self.entries.splice(start_idx..end_idx, std::iter::empty()).collect();
        self.entries.insert(start_idx, new_entry);
        self.coalesce_around(start_idx);

        let mut replaced = SparseItems { entries: removed };
        replaced.trim();
        replaced
    }

    /// Overwrite `[start_index, start_index + len(item))` with `item`, extending the sequence
    /// with deleted padding first if needed. Returns the previous content in that range.
    pub fn set(&mut self, start_index: usize, item: M::Run) -> SparseItems<M> {
        let len = M::len(&item);
        if len == 0 {
            return SparseItems::new_empty();
        }
        let end = start_index + len;
        self.ensure_len(end);
        self.replace_range(start_index, end, Entry::Present(item))
    }

    /// Mark `[start_index, start_index + count)` deleted. Returns the previous content there.
    pub fn delete(&mut self, start_index: usize, count: usize) -> SparseItems<M> {
        if count == 0 {
            return SparseItems::new_empty();
        }
        let end = start_index + count;
        self.ensure_len(end);
        self.replace_range(start_index, end, Entry::Deleted(count as u32))
    }

    pub fn get(&self, index: usize) -> Option<M::Item> {
        if index >= self.len() {
            return None;
        }
        let (entry_idx, start) = self.locate(index);
        match &self.entries[entry_idx] {
            Entry::Present(r) => Some(M::get(r, index - start)),
            Entry::Deleted(_) => None,
        }
    }

    pub fn has(&self, index: usize) -> bool {
        if index >= self.len() {
            return false;
        }
        matches!(self.entries[self.locate(index).0], Entry::Present(_))
    }

    /// `(is_present_at_index, count_of_present_slots_strictly_before_index)`.
    pub fn count_present_before(&self, index: usize) -> (bool, usize) {
        let mut pos = 0usize;
        let mut count = 0usize;
        for e in &self.entries {
            let l = e.len();
            if index < pos + l {
                let is_present = matches!(e, Entry::Present(_));
                if is_present {
                    count += index - pos;
                }
                return (is_present, count);
            }
            if let Entry::Present(_) = e {
                count += l;
            }
            pos += l;
        }
        (false, count)
    }

    /// The index of the `k`-th present slot at or after `start_index` (0-indexed).
    pub fn find_nth_present(&self, start_index: usize, k: usize) -> Result<usize, crate::error::RangeError> {
        let (mut entry_idx, entry_start) = self.locate(start_index);
        let mut offset_in_entry = start_index.saturating_sub(entry_start);
        let mut pos = start_index;
        let mut remaining = k;
        while entry_idx < self.entries.len() {
            let e = &self.entries[entry_idx];
            let l = e.len();
            let avail = l - offset_in_entry;
            if let Entry::Present(_) = e {
                if remaining < avail {
                    return Ok(pos + remaining);
                }
                remaining -= avail;
            }
            pos += avail;
            offset_in_entry = 0;
            entry_idx += 1;
        }
        Err(crate::error::RangeError::NotEnoughPresentItems)
    }

    pub fn new_slicer(&self) -> Slicer<'_, M> {
        self.new_slicer_from(0)
    }

    pub fn new_slicer_from(&self, start_index: usize) -> Slicer<'_, M> {
        let (entry_idx, entry_start) = self.locate(start_index);
        let offset = start_index.saturating_sub(entry_start);
        Slicer { items: self, pos: start_index, entry_idx, offset }
    }

    /// Drop trailing deleted runs (deletions past the end of all content carry no information)
    /// and restore the `[Present(empty)]` invariant if everything was trimmed away.
    fn trim(&mut self) {
        while matches!(self.entries.last(), Some(Entry::Deleted(_))) {
            self.entries.pop();
        }
        if self.entries.is_empty() {
            self.entries.push(Entry::Present(M::empty()));
        }
    }

    pub fn serialize(&self) -> Vec<Entry<M>> {
        let mut out = self.clone();
        out.trim();
        out.entries
    }

    pub fn deserialize(entries: Vec<Entry<M>>) -> Self {
        let mut items = SparseItems { entries };
        items.trim();
        items
    }
}

/// A forward cursor over the present runs of a [`SparseItems`], used by
/// [`crate::item_list::ItemList::items`] to emit contiguous slices without re-walking from the
/// start on every call.
pub struct Slicer<'a, M: ItemManager> {
    items: &'a SparseItems<M>,
    pos: usize,
    entry_idx: usize,
    offset: usize,
}

impl<'a, M: ItemManager> Slicer<'a, M> {
    /// Advance to the next present run, clipped to end before `limit` (exclusive). Must be
    /// called with non-decreasing `limit` values across a single cursor's lifetime.
    pub fn next(&mut self, limit: Option<usize>) -> Option<(usize, M::Run)> {
        let limit = limit.unwrap_or_else(|| self.items.len());
        while self.entry_idx < self.items.entries.len() {
            let e = &self.items.entries[self.entry_idx];
            let l = e.len();
            if self.offset >= l {
                self.entry_idx += 1;
                self.offset = 0;
                continue;
            }
            let remaining_in_entry = l - self.offset;
            if self.pos >= limit {
                return None;
            }
            let available = remaining_in_entry.min(limit - self.pos);
            if available == 0 {
                return None;
            }
            match e {
                Entry::Present(r) => {
                    let start_index = self.pos;
                    let slice = M::slice(r, self.offset..self.offset + available);
                    self.pos += available;
                    self.offset += available;
                    if self.offset >= l {
                        self.entry_idx += 1;
                        self.offset = 0;
                    }
                    return Some((start_index, slice));
                }
                Entry::Deleted(_) => {
                    self.pos += available;
                    self.offset += available;
                    if self.offset >= l {
                        self.entry_idx += 1;
                        self.offset = 0;
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_manager::VecManager;

    type VecItems = SparseItems<VecManager<char>>;

    #[test]
    fn set_then_get_roundtrips() {
        let mut items = VecItems::new_empty();
        items.set(0, vec!['a', 'b', 'c']);
        assert_eq!(items.get(0), Some('a'));
        assert_eq!(items.get(2), Some('c'));
        assert_eq!(items.size(), 3);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn delete_then_gaps_are_absent() {
        let mut items = VecItems::new_empty();
        items.set(0, vec!['a', 'b', 'c']);
        let replaced = items.delete(1, 1);
        assert_eq!(items.has(1), false);
        assert_eq!(items.get(1), None);
        assert_eq!(items.size(), 2);
        assert_eq!(replaced.get(0), Some('b'));
    }

    #[test]
    fn count_present_before_skips_gaps() {
        let mut items = VecItems::new_empty();
        items.set(0, vec!['a', 'b', 'c']);
        items.delete(1, 1);
        assert_eq!(items.count_present_before(2), (true, 1));
        assert_eq!(items.count_present_before(1), (false, 1));
        assert_eq!(items.count_present_before(0), (true, 0));
    }

    #[test]
    fn find_nth_present_skips_gaps() {
        let mut items = VecItems::new_empty();
        items.set(0, vec!['a', 'b', 'c', 'd']);
        items.delete(1, 2); // delete b,c -> a _ _ d
        assert_eq!(items.find_nth_present(0, 0).unwrap(), 0);
        assert_eq!(items.find_nth_present(0, 1).unwrap(), 3);
        assert!(items.find_nth_present(0, 2).is_err());
    }

    #[test]
    fn slicer_clips_to_limit_and_skips_deletes() {
        let mut items = VecItems::new_empty();
        items.set(0, vec!['a', 'b', 'c', 'd', 'e']);
        items.delete(2, 1); // a b _ d e
        let mut slicer = items.new_slicer();
        let mut out = Vec::new();
        while let Some((idx, run)) = slicer.next(Some(4)) {
            out.push((idx, run));
        }
        assert_eq!(out, vec![(0, vec!['a', 'b']), (3, vec!['d'])]);
    }

    #[test]
    fn set_overwriting_existing_present_merges_runs() {
        let mut items = VecItems::new_empty();
        items.set(0, vec!['a', 'b']);
        items.set(2, vec!['c', 'd']);
        assert_eq!(items.size(), 4);
        assert_eq!(items.get(1), Some('b'));
        assert_eq!(items.get(2), Some('c'));
    }

    #[test]
    fn serialize_trims_trailing_deletes() {
        let mut items = VecItems::new_empty();
        items.set(0, vec!['a']);
        items.delete(1, 3);
        let ser = items.serialize();
        assert_eq!(ser.len(), 1);
        assert!(matches!(ser[0], Entry::Present(_)));
    }
}
