//! The bunch tree: sibling ordering, position comparison, and position minting.

use crate::bunch_id::{compare_with_trailing_comma, BunchId};
use crate::error::OrderError;
use crate::position::{is_right_child, max_position, min_position, parent_k, BunchMeta, Position};
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashMap;

/// An arena index into `Order::nodes`. Stable for the lifetime of the `Order` that produced it
/// (nodes are never removed, only added), and cheap to copy/hash/compare — unlike the
/// reference-equality-keyed maps a garbage-collected implementation of this structure would
/// use, this is the natural identity for a tree node in Rust.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u32);

struct BunchNode {
    bunch_id: BunchId,
    parent: Option<NodeHandle>,
    offset: u32,
    depth: u32,
    /// Children sorted by `(offset, bunch_id + ",")`, ascending.
    children: Vec<NodeHandle>,
}

/// Settings for constructing an [`Order`].
///
/// `new_bunch_id`, when given, entirely replaces the default factory (including the meaning of
/// `replica_id`, which is then ignored) — this lets a caller swap in a deterministic or
/// externally-coordinated id source, e.g. for tests.
pub struct OrderConfig {
    pub replica_id: Option<BunchId>,
    pub new_bunch_id: Option<Box<dyn FnMut() -> BunchId>>,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self { replica_id: None, new_bunch_id: None }
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

fn random_replica_id() -> BunchId {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 8] = rng.gen();
    let s: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    BunchId::from_trusted(s)
}

fn default_factory(replica_id: BunchId) -> Box<dyn FnMut() -> BunchId> {
    let mut counter: u64 = 0;
    Box::new(move || {
        let id = BunchId::from_trusted(format!("{}_{}", replica_id, to_base36(counter)));
        counter += 1;
        id
    })
}

/// The bunch tree shared by every [`crate::item_list::ItemList`] (and typed wrapper) built on
/// top of it: it owns sibling order, position comparison, and the minting of fresh positions.
pub struct Order {
    nodes: Vec<BunchNode>,
    by_bunch_id: HashMap<BunchId, NodeHandle>,
    /// For bunches this process created, the next inner_index available to extend them —
    /// lets `create_positions` append to an existing bunch instead of minting a new one.
    created_counters: HashMap<NodeHandle, u32>,
    /// Bunches this process created, keyed by `(parent, offset)`, so repeated insertions at the
    /// same boundary by this process reuse one bunch instead of minting a new sibling each
    /// time. Populated only by `create_positions`, never by `add_metas` — conflict avoidance
    /// here is deliberately own-process-only; see `DESIGN.md`.
    own_children_by_offset: HashMap<(NodeHandle, u32), NodeHandle>,
    new_bunch_id: Box<dyn FnMut() -> BunchId>,
}

const ROOT: NodeHandle = NodeHandle(0);

impl Order {
    pub fn new(mut config: OrderConfig) -> Self {
        let root_node = BunchNode {
            bunch_id: BunchId::root(),
            parent: None,
            offset: 0,
            depth: 0,
            children: Vec::new(),
        };
        let mut by_bunch_id = HashMap::new();
        by_bunch_id.insert(BunchId::root(), ROOT);

        let new_bunch_id = config.new_bunch_id.take().unwrap_or_else(|| {
            let replica_id = config.replica_id.clone().unwrap_or_else(random_replica_id);
            default_factory(replica_id)
        });

        Self {
            nodes: vec![root_node],
            by_bunch_id,
            created_counters: HashMap::new(),
            own_children_by_offset: HashMap::new(),
            new_bunch_id,
        }
    }

    pub fn root(&self) -> NodeHandle {
        ROOT
    }

    pub fn min_position(&self) -> Position {
        min_position()
    }

    pub fn max_position(&self) -> Position {
        max_position()
    }

    pub fn node_of(&self, bunch_id: &BunchId) -> Result<NodeHandle, OrderError> {
        self.by_bunch_id.get(bunch_id).copied().ok_or(OrderError::UnknownBunch)
    }

    pub fn bunch_id(&self, node: NodeHandle) -> &BunchId {
        &self.nodes[node.0 as usize].bunch_id
    }

    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes[node.0 as usize].parent
    }

    pub fn offset(&self, node: NodeHandle) -> u32 {
        self.nodes[node.0 as usize].offset
    }

    fn depth(&self, node: NodeHandle) -> u32 {
        self.nodes[node.0 as usize].depth
    }

    pub fn children(&self, node: NodeHandle) -> &[NodeHandle] {
        &self.nodes[node.0 as usize].children
    }

    fn offset_and_parent(&self, node: NodeHandle) -> (u32, NodeHandle) {
        let n = &self.nodes[node.0 as usize];
        (n.offset, n.parent.expect("non-root node always has a parent"))
    }

    /// Ordering of a bunch attached at `offset` relative to its parent's implied value
    /// `other_idx`: `offset = 2k` sorts strictly before `k`, `offset = 2k+1` sorts strictly
    /// after `k` (and, in both cases, after every value `< k` / at-or-before `k` respectively).
    fn ancestor_cmp_parent_value(offset: u32, other_idx: u32) -> Ordering {
        let k = parent_k(offset);
        if is_right_child(offset) {
            if other_idx <= k { Ordering::Greater } else { Ordering::Less }
        } else if other_idx < k {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }

    fn compare_siblings(&self, a_off: u32, a_id: &BunchId, b_off: u32, b_id: &BunchId) -> Ordering {
        a_off.cmp(&b_off).then_with(|| compare_with_trailing_comma(a_id.as_str(), b_id.as_str()))
    }

    /// Compare two positions, consistently regardless of which replica produced them, as long
    /// as both bunches are known to this `Order`.
    pub fn compare(&self, a: &Position, b: &Position) -> Result<Ordering, OrderError> {
        let a_node = self.node_of(&a.bunch_id)?;
        let b_node = self.node_of(&b.bunch_id)?;
        if a_node == b_node {
            return Ok(a.inner_index.cmp(&b.inner_index));
        }

        let mut a_anc = a_node;
        let mut a_depth = self.depth(a_anc);
        let mut b_anc = b_node;
        let mut b_depth = self.depth(b_anc);

        while a_depth > b_depth {
            let (offset, parent) = self.offset_and_parent(a_anc);
            if parent == b_anc {
                return Ok(Self::ancestor_cmp_parent_value(offset, b.inner_index));
            }
            a_anc = parent;
            a_depth -= 1;
        }
        while b_depth > a_depth {
            let (offset, parent) = self.offset_and_parent(b_anc);
            if parent == a_anc {
                return Ok(Self::ancestor_cmp_parent_value(offset, a.inner_index).reverse());
            }
            b_anc = parent;
            b_depth -= 1;
        }
        loop {
            let (a_off, a_parent) = self.offset_and_parent(a_anc);
            let (b_off, b_parent) = self.offset_and_parent(b_anc);
            if a_parent == b_parent {
                let a_id = self.bunch_id(a_anc).clone();
                let b_id = self.bunch_id(b_anc).clone();
                return Ok(self.compare_siblings(a_off, &a_id, b_off, &b_id));
            }
            a_anc = a_parent;
            b_anc = b_parent;
        }
    }

    /// `p` lies within `q`'s walked-order subtree: the chain from `p`'s node up to `q`'s node
    /// attaches at exactly `q`'s inner_index (on either side), and everything further down that
    /// attachment stays within the same region.
    fn is_descendant(&self, mut p_node: NodeHandle, q_node: NodeHandle, q_idx: u32) -> bool {
        if p_node == q_node {
            return false;
        }
        loop {
            let n = &self.nodes[p_node.0 as usize];
            match n.parent {
                None => return false,
                Some(parent) => {
                    if parent == q_node {
                        return parent_k(n.offset) == q_idx;
                    }
                    p_node = parent;
                }
            }
        }
    }

    fn insert_sorted_child(&mut self, parent: NodeHandle, child: NodeHandle) {
        let (child_off, child_id) = {
            let n = &self.nodes[child.0 as usize];
            (n.offset, n.bunch_id.clone())
        };
        let siblings = &self.nodes[parent.0 as usize].children;
        let pos = siblings
            .binary_search_by(|&s| {
                let s_off = self.nodes[s.0 as usize].offset;
                let s_id = &self.nodes[s.0 as usize].bunch_id;
                self.compare_siblings(s_off, s_id, child_off, &child_id)
            })
            .unwrap_or_else(|i| i);
        self.nodes[parent.0 as usize].children.insert(pos, child);
    }

    fn install_bunch_under(&mut self, meta: BunchMeta, parent: NodeHandle) -> NodeHandle {
        let depth = self.depth(parent) + 1;
        let handle = NodeHandle(self.nodes.len() as u32);
        self.nodes.push(BunchNode {
            bunch_id: meta.bunch_id.clone(),
            parent: Some(parent),
            offset: meta.offset,
            depth,
            children: Vec::new(),
        });
        self.by_bunch_id.insert(meta.bunch_id, handle);
        self.insert_sorted_child(parent, handle);
        handle
    }

    fn install_bunch(&mut self, meta: BunchMeta) -> Result<NodeHandle, OrderError> {
        let parent = self.node_of(&meta.parent_id)?;
        Ok(self.install_bunch_under(meta, parent))
    }

    /// Mint `count` consecutive fresh positions strictly between `prev_pos` and `next_pos`
    /// (which must already satisfy `prev_pos < next_pos`), returning the first one and, if a
    /// new bunch had to be minted, its metadata to broadcast to other replicas.
    pub fn create_positions(
        &mut self,
        prev_pos: &Position,
        next_pos: &Position,
        count: u32,
    ) -> Result<(Position, Option<BunchMeta>), OrderError> {
        debug_assert!(count >= 1);
        if self.compare(prev_pos, next_pos)? != Ordering::Less {
            return Err(OrderError::Boundary);
        }
        let prev_node = self.node_of(&prev_pos.bunch_id)?;
        let next_node = self.node_of(&next_pos.bunch_id)?;

        let next_is_descendant = self.is_descendant(next_node, prev_node, prev_pos.inner_index);

        let (anchor_right, parent_node, parent_idx) = if !next_is_descendant {
            (true, prev_node, prev_pos.inner_index)
        } else {
            (false, next_node, next_pos.inner_index)
        };

        if anchor_right {
            if let Some(&counter) = self.created_counters.get(&prev_node) {
                if counter == prev_pos.inner_index + 1 {
                    let bunch_id = self.bunch_id(prev_node).clone();
                    self.created_counters.insert(prev_node, counter + count);
                    return Ok((Position { bunch_id, inner_index: counter }, None));
                }
            }
        }

        let offset = if anchor_right { 2 * parent_idx + 1 } else { 2 * parent_idx };

        if let Some(&existing) = self.own_children_by_offset.get(&(parent_node, offset)) {
            let counter = self.created_counters[&existing];
            let bunch_id = self.bunch_id(existing).clone();
            self.created_counters.insert(existing, counter + count);
            return Ok((Position { bunch_id, inner_index: counter }, None));
        }

        let new_id = (self.new_bunch_id)();
        let parent_bunch_id = self.bunch_id(parent_node).clone();
        let meta = BunchMeta { bunch_id: new_id.clone(), parent_id: parent_bunch_id, offset };
        let handle = self.install_bunch_under(meta.clone(), parent_node);
        self.created_counters.insert(handle, count);
        self.own_children_by_offset.insert((parent_node, offset), handle);
        Ok((Position { bunch_id: new_id, inner_index: 0 }, Some(meta)))
    }

    /// Install metadata for bunches received from other replicas. Order-independent: a batch
    /// can reference its own bunches' parents in any order, and metas already known (exactly
    /// matching what's installed) are silently accepted as duplicates.
    pub fn add_metas(&mut self, metas: Vec<BunchMeta>) -> Result<(), OrderError> {
        let mut by_id: HashMap<BunchId, BunchMeta> = HashMap::new();
        for m in metas {
            if m.bunch_id.is_root() {
                return Err(OrderError::RootMeta);
            }
            if let Some(&handle) = self.by_bunch_id.get(&m.bunch_id) {
                let n = &self.nodes[handle.0 as usize];
                let parent_matches = *self.bunch_id(n.parent.expect("non-root")) == m.parent_id;
                if parent_matches && n.offset == m.offset {
                    continue;
                }
                return Err(OrderError::MetaConflict);
            }
            by_id.insert(m.bunch_id.clone(), m);
        }

        enum Visit {
            InProgress,
            Done,
        }
        let mut state: HashMap<BunchId, Visit> = HashMap::new();
        let mut order: Vec<BunchId> = Vec::new();

        fn visit(
            id: &BunchId,
            by_id: &HashMap<BunchId, BunchMeta>,
            state: &mut HashMap<BunchId, Visit>,
            known: &HashMap<BunchId, NodeHandle>,
            out: &mut Vec<BunchId>,
        ) -> Result<(), OrderError> {
            if id.is_root() || known.contains_key(id) {
                return Ok(());
            }
            match state.get(id) {
                Some(Visit::Done) => return Ok(()),
                Some(Visit::InProgress) => return Err(OrderError::MetaCycle),
                None => {}
            }
            let meta = by_id.get(id).ok_or(OrderError::MetaMissingParent)?;
            state.insert(id.clone(), Visit::InProgress);
            visit(&meta.parent_id, by_id, state, known, out)?;
            state.insert(id.clone(), Visit::Done);
            out.push(id.clone());
            Ok(())
        }

        let ids: Vec<BunchId> = by_id.keys().cloned().collect();
        for id in ids {
            visit(&id, &by_id, &mut state, &self.by_bunch_id, &mut order)?;
        }

        for id in order {
            if let Some(meta) = by_id.remove(&id) {
                self.install_bunch(meta)?;
            }
        }
        Ok(())
    }

    pub fn save(&self) -> std::collections::BTreeMap<BunchId, SavedBunchMeta> {
        let mut out = std::collections::BTreeMap::new();
        for node in &self.nodes {
            if let Some(parent) = node.parent {
                out.insert(
                    node.bunch_id.clone(),
                    SavedBunchMeta { parent_id: self.bunch_id(parent).clone(), offset: node.offset },
                );
            }
        }
        out
    }

    pub fn load(
        saved: std::collections::BTreeMap<BunchId, SavedBunchMeta>,
        config: OrderConfig,
    ) -> Result<Order, OrderError> {
        let mut order = Order::new(config);
        let metas = saved
            .into_iter()
            .map(|(bunch_id, m)| BunchMeta { bunch_id, parent_id: m.parent_id, offset: m.offset })
            .collect();
        order.add_metas(metas)?;
        Ok(order)
    }
}

/// The saved form of a [`BunchMeta`] (bunch id is the map key, not repeated in the value).
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SavedBunchMeta {
    pub parent_id: BunchId,
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_factory(tag: &'static str) -> OrderConfig {
        OrderConfig { replica_id: Some(BunchId::new(tag).unwrap()), new_bunch_id: None }
    }

    #[test]
    fn min_less_than_max() {
        let order = Order::new(OrderConfig::default());
        assert_eq!(order.compare(&min_position(), &max_position()).unwrap(), Ordering::Less);
    }

    #[test]
    fn sequential_inserts_stay_ordered() {
        let mut order = Order::new(fixed_factory("a"));
        let mut prev = min_position();
        let next = max_position();
        let mut positions = Vec::new();
        for _ in 0..5 {
            let (pos, _meta) = order.create_positions(&prev, &next, 1).unwrap();
            positions.push(pos.clone());
            prev = pos;
        }
        for w in positions.windows(2) {
            assert_eq!(order.compare(&w[0], &w[1]).unwrap(), Ordering::Less);
        }
    }

    #[test]
    fn two_replicas_concurrent_inserts_are_total_order() {
        let mut order = Order::new(fixed_factory("x"));
        let min = min_position();
        let max = max_position();
        let (pos_a, meta_a) = order.create_positions(&min, &max, 1).unwrap();
        assert!(meta_a.is_some());

        // Simulate a second replica inserting concurrently at the same boundary.
        let mut order2 = Order::new(fixed_factory("y"));
        let (pos_b, meta_b) = order2.create_positions(&min, &max, 1).unwrap();
        assert!(meta_b.is_some());

        order.add_metas(vec![meta_b.unwrap()]).unwrap();
        let ord1 = order.compare(&pos_a, &pos_b).unwrap();

        order2.add_metas(vec![meta_a.unwrap()]).unwrap();
        let ord2 = order2.compare(&pos_a, &pos_b).unwrap();

        assert_eq!(ord1, ord2);
        assert_ne!(ord1, Ordering::Equal);
    }

    #[test]
    fn backward_typing_mints_a_new_bunch_each_time() {
        // The extend-own-bunch shortcut only fires for the right-anchored (forward-typing)
        // case; repeatedly inserting to the left of the previous insertion anchors on a fresh
        // `next_node` each time (the bunch minted on the prior iteration), so every call mints
        // its own bunch, chained off the one before it. Ordering still comes out strictly
        // descending as each new position is required to sort before the one it displaced.
        let mut order = Order::new(fixed_factory("z"));
        let min = min_position();
        let mut next = max_position();
        let mut positions = Vec::new();
        let mut metas = Vec::new();
        for _ in 0..4 {
            let (pos, meta) = order.create_positions(&min, &next, 1).unwrap();
            positions.push(pos.clone());
            metas.push(meta);
            next = pos;
        }
        assert!(metas.iter().all(Option::is_some), "each backward insert mints its own bunch");
        let distinct: std::collections::HashSet<_> = positions.iter().map(|p| p.bunch_id.clone()).collect();
        assert_eq!(distinct.len(), positions.len(), "backward typing does not share one bunch");
        for w in positions.windows(2) {
            assert_eq!(order.compare(&w[1], &w[0]).unwrap(), Ordering::Less);
        }
    }

    #[test]
    fn create_positions_rejects_inverted_boundary() {
        let mut order = Order::new(fixed_factory("w"));
        let min = min_position();
        let max = max_position();
        assert_eq!(order.create_positions(&max, &min, 1).unwrap_err(), OrderError::Boundary);
        assert_eq!(order.create_positions(&min, &min, 1).unwrap_err(), OrderError::Boundary);
    }
}
