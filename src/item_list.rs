//! Translates between list indices and [`Position`]s, backed by one [`SparseItems`] per bunch
//! plus cached tree aggregates (`total`, `parent_values_before`) for fast index/position
//! conversion.

use crate::error::{ItemListError, RangeError};
use crate::item_manager::ItemManager;
use crate::order::{NodeHandle, Order};
use crate::position::Position;
use crate::sparse_items::SparseItems;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to an [`Order`]: every [`ItemList`] built against the same document shares one
/// of these, since bunch identity and sibling order are document-wide, not per-content-kind.
pub type OrderHandle = Rc<RefCell<Order>>;

/// How to resolve [`ItemList::index_of_position`] when the position's slot is no longer
/// present (e.g. it was deleted after being recorded as a cursor anchor).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SearchDir {
    /// The position must currently be present; otherwise returns `ItemList::len()` as a
    /// not-found sentinel.
    None,
    /// Resolve to the count of present items before the gap (the same number a present
    /// position there would report).
    Left,
    /// Resolve to the index of the nearest present item strictly before the gap (sticks to the
    /// content that used to precede it).
    Right,
}

struct NodeData<M: ItemManager> {
    /// Present-slot count across this node's own values plus every descendant's.
    total: usize,
    /// Present-slot count in the *parent's* own values at inner_index strictly less than this
    /// node's attachment point (`Order`'s `(offset + 1) / 2`).
    parent_values_before: usize,
    values: SparseItems<M>,
}

/// Per-content-kind index for one bunch tree. Multiple `ItemList`s (e.g. one per `Text`
/// channel) can share one [`Order`] while keeping independent content.
pub struct ItemList<M: ItemManager> {
    order: OrderHandle,
    state: HashMap<NodeHandle, NodeData<M>>,
    /// `(node, before_node)` for the most recently queried node, invalidated whenever a
    /// mutation touches a *different* node (mutations on the cached node itself don't change
    /// counts before it).
    cache: Cell<Option<(NodeHandle, usize)>>,
}

impl<M: ItemManager> ItemList<M> {
    pub fn new(order: OrderHandle) -> Self {
        Self { order, state: HashMap::new(), cache: Cell::new(None) }
    }

    pub fn order(&self) -> &OrderHandle {
        &self.order
    }

    fn next_inner_index(&self, child: NodeHandle) -> u32 {
        (self.order.borrow().offset(child) + 1) / 2
    }

    fn total(&self, node: NodeHandle) -> usize {
        self.state.get(&node).map(|d| d.total).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.total(self.order.borrow().root())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn compute_parent_values_before(&self, node: NodeHandle) -> usize {
        let parent = self.order.borrow().parent(node);
        match parent {
            None => 0,
            Some(parent) => {
                let nii = self.next_inner_index(node) as usize;
                self.state.get(&parent).map(|d| d.values.count_present_before(nii).1).unwrap_or(0)
            }
        }
    }

    /// Present-slot count before `node` itself (not including its own values), walking and
    /// summing every earlier sibling and ancestor-level contribution. Cached per call site.
    fn before_node(&self, node: NodeHandle) -> usize {
        if let Some((cached_node, before)) = self.cache.get() {
            if cached_node == node {
                return before;
            }
        }
        let before = self.compute_before_node(node);
        self.cache.set(Some((node, before)));
        before
    }

    fn compute_before_node(&self, node: NodeHandle) -> usize {
        let order = self.order.borrow();
        if node == order.root() {
            return 0;
        }
        let parent = order.parent(node).expect("non-root node has a parent");
        drop(order);

        let parent_before = self.before_node(parent);
        let parent_own_before = match self.state.get(&node) {
            Some(d) => d.parent_values_before,
            None => self.compute_parent_values_before(node),
        };
        let earlier_siblings_total: usize = {
            let order = self.order.borrow();
            order
                .children(parent)
                .iter()
                .take_while(|&&c| c != node)
                .map(|&c| self.total(c))
                .sum()
        };
        parent_before + parent_own_before + earlier_siblings_total
    }

    fn apply_mutation<F>(&mut self, node: NodeHandle, start_index: usize, affected_len: usize, f: F) -> SparseItems<M>
    where
        F: FnOnce(&mut SparseItems<M>) -> SparseItems<M>,
    {
        let existing_total = self.state.get(&node).map(|d| d.total).unwrap_or(0);
        let existing_pvb = self.state.get(&node).map(|d| d.parent_values_before);
        let mut values = self.state.remove(&node).map(|d| d.values).unwrap_or_else(SparseItems::new_empty);
        let parent_values_before = existing_pvb.unwrap_or_else(|| self.compute_parent_values_before(node));

        let before_present = values.size();
        let replaced = f(&mut values);
        let after_present = values.size();
        let delta = after_present as i64 - before_present as i64;

        let new_before_start = values.count_present_before(start_index).1;
        let children = self.order.borrow().children(node).to_vec();
        let mut child_deltas: Vec<(NodeHandle, i64)> = Vec::new();
        for child in &children {
            if self.state.contains_key(child) {
                let nii = self.next_inner_index(*child) as usize;
                if nii >= start_index && nii < start_index + affected_len {
                    let new_in_range = values.count_present_before(nii).1 - new_before_start;
                    let old_in_range = replaced.count_present_before(nii - start_index).1;
                    let d = new_in_range as i64 - old_in_range as i64;
                    if d != 0 {
                        child_deltas.push((*child, d));
                    }
                }
            }
        }
        for (child, d) in child_deltas {
            if let Some(child_entry) = self.state.get_mut(&child) {
                child_entry.parent_values_before = (child_entry.parent_values_before as i64 + d) as usize;
            }
        }

        let new_total = (existing_total as i64 + delta) as usize;
        if new_total > 0 {
            self.state.insert(node, NodeData { total: new_total, parent_values_before, values });
        }

        if self.cache.get().map(|(n, _)| n) != Some(node) {
            self.cache.set(None);
        }

        let mut cur = self.order.borrow().parent(node);
        while let Some(p) = cur {
            let p_total = self.state.get(&p).map(|d| d.total).unwrap_or(0);
            let new_p_total = (p_total as i64 + delta) as usize;
            if new_p_total > 0 {
                if let Some(d) = self.state.get_mut(&p) {
                    d.total = new_p_total;
                } else {
                    let pvb = self.compute_parent_values_before(p);
                    self.state.insert(p, NodeData { total: new_p_total, parent_values_before: pvb, values: SparseItems::new_empty() });
                }
            } else {
                self.state.remove(&p);
            }
            cur = self.order.borrow().parent(p);
        }

        replaced
    }

    /// Overwrite the values at `pos.bunch_id` starting at `pos.inner_index`, extending the
    /// bunch if necessary. Returns whatever was there before.
    pub fn set_values(&mut self, pos: &Position, item: M::Run) -> Result<SparseItems<M>, ItemListError> {
        let node = self.order.borrow().node_of(&pos.bunch_id).map_err(|_| ItemListError::UnknownBunch)?;
        let len = M::len(&item);
        Ok(self.apply_mutation(node, pos.inner_index as usize, len, |values| values.set(pos.inner_index as usize, item)))
    }

    /// Delete `count` values starting at `pos`. Returns whatever was there before.
    pub fn delete_values(&mut self, pos: &Position, count: usize) -> Result<SparseItems<M>, ItemListError> {
        let node = self.order.borrow().node_of(&pos.bunch_id).map_err(|_| ItemListError::UnknownBunch)?;
        Ok(self.apply_mutation(node, pos.inner_index as usize, count, |values| values.delete(pos.inner_index as usize, count)))
    }

    /// The `(prev, next)` neighbor positions a value inserted at `index` would land between,
    /// using [`Order::min_position`]/[`Order::max_position`] at the ends. Shared by every
    /// typed wrapper's `insert_at`.
    pub fn neighbors(&self, index: usize) -> Result<(Position, Position), RangeError> {
        let len = self.len();
        if index > len {
            return Err(RangeError::IndexOutOfBounds);
        }
        let prev = if index == 0 { self.order.borrow().min_position() } else { self.position_at(index - 1)? };
        let next = if index == len { self.order.borrow().max_position() } else { self.position_at(index)? };
        Ok((prev, next))
    }

    pub fn get(&self, pos: &Position) -> Result<Option<M::Item>, ItemListError> {
        let node = self.order.borrow().node_of(&pos.bunch_id).map_err(|_| ItemListError::UnknownBunch)?;
        Ok(self.state.get(&node).and_then(|d| d.values.get(pos.inner_index as usize)))
    }

    pub fn has(&self, pos: &Position) -> Result<bool, ItemListError> {
        let node = self.order.borrow().node_of(&pos.bunch_id).map_err(|_| ItemListError::UnknownBunch)?;
        Ok(self.state.get(&node).map(|d| d.values.has(pos.inner_index as usize)).unwrap_or(false))
    }

    /// Translate `pos` into its list index. See [`SearchDir`] for how an absent `pos` resolves.
    pub fn index_of_position(&self, pos: &Position, dir: SearchDir) -> Result<usize, ItemListError> {
        let node = self.order.borrow().node_of(&pos.bunch_id).map_err(|_| ItemListError::UnknownBunch)?;
        let before_node = self.before_node(node);
        let in_bunch_before = self.state.get(&node).map(|d| d.values.count_present_before(pos.inner_index as usize).1).unwrap_or(0);
        let children_before: usize = {
            let order = self.order.borrow();
            order
                .children(node)
                .iter()
                .filter(|&&c| (order.offset(c) + 1) / 2 <= pos.inner_index)
                .map(|&c| self.total(c))
                .sum()
        };
        let base = before_node + in_bunch_before + children_before;
        let is_present = self.state.get(&node).map(|d| d.values.has(pos.inner_index as usize)).unwrap_or(false);
        if is_present {
            return Ok(base);
        }
        match dir {
            SearchDir::None => Ok(self.len()),
            SearchDir::Left => Ok(base),
            SearchDir::Right => Ok(base.saturating_sub(1)),
        }
    }

    /// Translate a list index into the [`Position`] of the present value there.
    pub fn position_at(&self, index: usize) -> Result<Position, RangeError> {
        if index >= self.len() {
            return Err(RangeError::IndexOutOfBounds);
        }
        let mut node = self.order.borrow().root();
        let mut remaining = index;
        'descend: loop {
            let children = self.order.borrow().children(node).to_vec();
            let mut consumed_local = 0usize;
            let mut i = 0usize;
            loop {
                let next_child = children.get(i).copied();
                let own_before_next = match next_child {
                    Some(c) => match self.state.get(&c) {
                        Some(cd) => cd.parent_values_before,
                        None => self
                            .state
                            .get(&node)
                            .map(|d| d.values.count_present_before(self.next_inner_index(c) as usize).1)
                            .unwrap_or(0),
                    },
                    None => self.state.get(&node).map(|d| d.values.size()).unwrap_or(0),
                };
                let available_here = own_before_next.saturating_sub(consumed_local);
                if remaining < available_here {
                    let k = consumed_local + remaining;
                    let inner_index = self
                        .state
                        .get(&node)
                        .ok_or(RangeError::IndexOutOfBounds)?
                        .values
                        .find_nth_present(0, k)?;
                    let bunch_id = self.order.borrow().bunch_id(node).clone();
                    return Ok(Position { bunch_id, inner_index: inner_index as u32 });
                }
                remaining -= available_here;
                consumed_local += available_here;

                match next_child {
                    None => return Err(RangeError::IndexOutOfBounds),
                    Some(child) => {
                        let child_total = self.total(child);
                        if remaining < child_total {
                            node = child;
                            continue 'descend;
                        }
                        remaining -= child_total;
                        i += 1;
                    }
                }
            }
        }
    }

    /// Enumerate `(Position, run)` pairs covering present content in `[start, end)`, via an
    /// explicit stack of `(node, children, child_idx, consumed_inner_index)` frames rather than
    /// recursion, so a pathologically deep bunch tree can't blow the call stack.
    pub fn items(&self, start: usize, end: usize) -> Vec<(Position, M::Run)> {
        let mut out = Vec::new();
        let len = self.len();
        if start >= end || start >= len {
            return out;
        }
        let end = end.min(len);

        struct Frame {
            node: NodeHandle,
            children: Vec<NodeHandle>,
            child_idx: usize,
            consumed_inner: usize,
        }

        let root = self.order.borrow().root();
        let root_children = self.order.borrow().children(root).to_vec();
        let mut stack = vec![Frame { node: root, children: root_children, child_idx: 0, consumed_inner: 0 }];
        let mut global = 0usize;

        'walk: while !stack.is_empty() {
            if global >= end {
                break;
            }
            let frame_idx = stack.len() - 1;
            let (node, next_child, consumed_inner) = {
                let frame = &stack[frame_idx];
                (frame.node, frame.children.get(frame.child_idx).copied(), frame.consumed_inner)
            };
            let own_boundary_inner = match next_child {
                Some(c) => self.next_inner_index(c) as usize,
                None => self.state.get(&node).map(|d| d.values.len()).unwrap_or(0),
            };

            if own_boundary_inner > consumed_inner {
                if let Some(data) = self.state.get(&node) {
                    let mut slicer = data.values.new_slicer_from(consumed_inner);
                    while global < end {
                        match slicer.next(Some(own_boundary_inner)) {
                            None => break,
                            Some((inner_start, run)) => {
                                let run_len = M::len(&run);
                                let seg_start_global = global;
                                let clip_start = start.saturating_sub(seg_start_global);
                                let clip_end = run_len.min(end - seg_start_global);
                                if clip_start < clip_end {
                                    let clipped = M::slice(&run, clip_start..clip_end);
                                    let bunch_id = self.order.borrow().bunch_id(node).clone();
                                    out.push((
                                        Position { bunch_id, inner_index: (inner_start + clip_start) as u32 },
                                        clipped,
                                    ));
                                }
                                global += run_len;
                            }
                        }
                    }
                }
                stack[frame_idx].consumed_inner = own_boundary_inner;
            }

            if global >= end {
                break 'walk;
            }

            match next_child {
                Some(child) => {
                    stack[frame_idx].child_idx += 1;
                    let child_total = self.total(child);
                    if global + child_total <= start {
                        global += child_total;
                    } else {
                        let child_children = self.order.borrow().children(child).to_vec();
                        stack.push(Frame { node: child, children: child_children, child_idx: 0, consumed_inner: 0 });
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
        out
    }

    pub fn save(&self) -> HashMap<crate::bunch_id::BunchId, Vec<crate::sparse_items::Entry<M>>>
    where
        M::Run: Clone,
    {
        let order = self.order.borrow();
        self.state
            .iter()
            .map(|(node, data)| (order.bunch_id(*node).clone(), data.values.serialize()))
            .collect()
    }

    pub fn load(order: OrderHandle, saved: HashMap<crate::bunch_id::BunchId, Vec<crate::sparse_items::Entry<M>>>) -> Result<Self, ItemListError> {
        let mut list = ItemList::new(order);
        // Install in an arbitrary order, then recompute every node's total/parent_values_before
        // bottom-up so the cached aggregates are internally consistent regardless of input order.
        let mut values_by_node = Vec::new();
        for (bunch_id, entries) in saved {
            let node = list.order.borrow().node_of(&bunch_id).map_err(|_| ItemListError::UnknownBunch)?;
            values_by_node.push((node, SparseItems::deserialize(entries)));
        }
        for (node, values) in values_by_node {
            let size = values.size();
            if size > 0 {
                list.state.insert(node, NodeData { total: size, parent_values_before: 0, values });
            }
        }
        // Propagate totals up from every node with direct content to the root. Snapshot each
        // node's own direct size up front: the accumulation below mutates ancestors' totals in
        // place, and an ancestor that also carries direct content must not have its own
        // snapshot pick up contributions already added by a descendant processed earlier.
        let own_sizes: Vec<(NodeHandle, usize)> =
            list.state.iter().map(|(node, data)| (*node, data.total)).collect();
        for (node, own_total) in own_sizes {
            let mut cur = list.order.borrow().parent(node);
            while let Some(p) = cur {
                let entry = list.state.entry(p).or_insert_with(|| NodeData { total: 0, parent_values_before: 0, values: SparseItems::new_empty() });
                entry.total += own_total;
                cur = list.order.borrow().parent(p);
            }
        }
        // Recompute parent_values_before now that every ancestor's presence is settled.
        let all_nodes: Vec<NodeHandle> = list.state.keys().copied().collect();
        for node in all_nodes {
            let pvb = list.compute_parent_values_before(node);
            if let Some(d) = list.state.get_mut(&node) {
                d.parent_values_before = pvb;
            }
        }
        Ok(list)
    }
}
