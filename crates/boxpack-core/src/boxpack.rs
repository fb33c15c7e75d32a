//! Binary-tree rectangle packer.
//!
//! Every node owns a rectangle of the atlas. Leaves are either free or hold exactly one
//! inserted rectangle; branches own two children that tile their rectangle exactly.
//! Inserting into a free leaf that is larger than the request splits it along the axis
//! with more slack, so the first child is exactly as wide (or tall) as the request.
//!
//! References:
//! - http://blackpawn.com/texts/lightmaps/
//!
//! Removal never merges siblings back together. Fragmentation builds up over the life of
//! a packer and is cleared with [`BoxPack::reset`].

use crate::config::ReclaimPolicy;
use crate::model::{AtlasStats, NodeId, PackId, Rect, Size};
use std::collections::HashMap;
use tracing::{debug, trace};

/// One node of the packing tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackNode {
    /// Region of the atlas owned by this node.
    pub rect: Rect,
    /// Id of the rectangle stored here; `None` for free leaves and branches.
    pub id: Option<PackId>,
    /// Packer clock value when the node was last assigned, traversed or looked up.
    pub timestamp: u64,
    /// Children partitioning `rect`, set once the node has been split.
    pub children: Option<[NodeId; 2]>,
}

impl PackNode {
    fn free(rect: Rect) -> Self {
        Self {
            rect,
            id: None,
            timestamp: 0,
            children: None,
        }
    }

    pub fn is_branch(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn is_occupied(&self) -> bool {
        self.id.is_some()
    }
}

/// Packs rectangles into a fixed `size` area.
///
/// Nodes live in an arena and refer to each other by [`NodeId`]. Slots of collapsed
/// subtrees are recycled, so a `NodeId` is only valid until the node it names is reclaimed
/// or the packer is reset.
#[derive(Debug, Clone)]
pub struct BoxPack {
    size: Size,
    border: u32,
    policy: ReclaimPolicy,
    nodes: Vec<PackNode>,
    vacant: Vec<NodeId>,
    root: NodeId,
    next_id: u64,
    clock: u64,
    index: HashMap<PackId, NodeId>,
}

impl BoxPack {
    /// Create a packer with a single free leaf covering `size`.
    ///
    /// `border` is the padding the caller adds around every rectangle; `insert` expects
    /// sizes that already include it.
    pub fn new(size: Size, border: u32) -> Self {
        Self::with_policy(size, border, ReclaimPolicy::Never)
    }

    pub fn with_policy(size: Size, border: u32, policy: ReclaimPolicy) -> Self {
        debug!(w = size.w, h = size.h, border, ?policy, "create box pack");
        Self {
            size,
            border,
            policy,
            nodes: vec![PackNode::free(Rect::new(0, 0, size.w, size.h))],
            vacant: Vec::new(),
            root: NodeId(0),
            next_id: 0,
            clock: 0,
            index: HashMap::new(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn border(&self) -> u32 {
        self.border
    }

    pub fn policy(&self) -> ReclaimPolicy {
        self.policy
    }

    /// Current value of the logical clock. Advances on every stamp.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Number of live (inserted, not removed or reclaimed) rectangles.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node by handle.
    ///
    /// Panics if `node` did not come from this packer.
    pub fn node(&self, node: NodeId) -> &PackNode {
        &self.nodes[node.0]
    }

    /// Node rectangle without the border padding.
    pub fn interior(&self, node: NodeId) -> Rect {
        self.nodes[node.0].rect.inset(self.border)
    }

    /// All nodes reachable from the root, branches included, in pre-order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len() - self.vacant.len());
        let mut stack = vec![self.root];
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some([first, second]) = self.nodes[n.0].children {
                stack.push(second);
                stack.push(first);
            }
        }
        out
    }

    /// Look up the node holding `id` and mark it as recently used.
    pub fn get_node(&mut self, id: PackId) -> Option<&PackNode> {
        let n = *self.index.get(&id)?;
        let t = self.stamp();
        let node = &mut self.nodes[n.0];
        node.timestamp = t;
        Some(&*node)
    }

    /// Look up the node holding `id` without touching its timestamp.
    pub fn peek(&self, id: PackId) -> Option<&PackNode> {
        self.index.get(&id).map(|n| &self.nodes[n.0])
    }

    /// Handle of the leaf holding `id`.
    pub fn find(&self, id: PackId) -> Option<NodeId> {
        self.index.get(&id).copied()
    }

    /// Insert a rectangle of exactly `size` (border included).
    ///
    /// Returns the leaf now holding it, or `None` when nothing fits. Under
    /// [`ReclaimPolicy::LeastRecentlyUsed`] a failed walk collapses the oldest node large
    /// enough for the request and inserts there, invalidating every id below it.
    pub fn insert(&mut self, size: Size) -> Option<NodeId> {
        if size.is_empty() {
            debug!(w = size.w, h = size.h, "rejecting empty insert");
            return None;
        }
        if let Some(n) = self.insert_from(self.root, size) {
            return Some(n);
        }
        match self.policy {
            ReclaimPolicy::Never => {
                trace!(w = size.w, h = size.h, "no free region");
                None
            }
            ReclaimPolicy::LeastRecentlyUsed => self.reclaim(size),
        }
    }

    /// Free the leaf holding `id` and return its rectangle.
    ///
    /// The leaf stays split from its siblings; only an equal or smaller request can reuse it.
    pub fn remove(&mut self, id: PackId) -> Option<Rect> {
        let n = self.index.remove(&id)?;
        let node = &mut self.nodes[n.0];
        node.id = None;
        node.timestamp = 0;
        trace!(%id, "removed");
        Some(node.rect)
    }

    /// Drop every node and start again from one free root. Ids keep counting up.
    pub fn reset(&mut self) {
        debug!(live = self.index.len(), nodes = self.nodes.len(), "reset box pack");
        self.nodes.clear();
        self.vacant.clear();
        self.index.clear();
        self.nodes
            .push(PackNode::free(Rect::new(0, 0, self.size.w, self.size.h)));
        self.root = NodeId(0);
    }

    /// Total area of occupied leaves, border padding included.
    pub fn occupied_area(&self) -> u64 {
        self.nodes()
            .into_iter()
            .map(|n| &self.nodes[n.0])
            .filter(|node| node.is_occupied())
            .map(|node| node.rect.area())
            .sum()
    }

    pub fn stats(&self) -> AtlasStats {
        let mut num_nodes = 0;
        let mut num_branches = 0;
        let mut num_occupied = 0;
        let mut num_free = 0;
        let mut used_area = 0u64;
        let mut largest_free: Option<Size> = None;
        for n in self.nodes() {
            let node = &self.nodes[n.0];
            num_nodes += 1;
            if node.is_branch() {
                num_branches += 1;
            } else if node.is_occupied() {
                num_occupied += 1;
                used_area += node.rect.area();
            } else {
                num_free += 1;
                let s = node.rect.size();
                if largest_free.is_none_or(|l| s.area() > l.area()) {
                    largest_free = Some(s);
                }
            }
        }
        let total_area = self.size.area();
        let occupancy = if total_area > 0 {
            used_area as f64 / total_area as f64
        } else {
            0.0
        };
        AtlasStats {
            num_nodes,
            num_branches,
            num_leaves: num_occupied + num_free,
            num_occupied,
            num_free,
            used_area,
            total_area,
            occupancy,
            largest_free,
        }
    }

    fn stamp(&mut self) -> u64 {
        let t = self.clock;
        self.clock += 1;
        t
    }

    fn alloc(&mut self, rect: Rect) -> NodeId {
        match self.vacant.pop() {
            Some(n) => {
                self.nodes[n.0] = PackNode::free(rect);
                n
            }
            None => {
                self.nodes.push(PackNode::free(rect));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    // Depth-first, first child before second, so placement order is deterministic.
    fn insert_from(&mut self, start: NodeId, size: Size) -> Option<NodeId> {
        let mut stack = vec![start];
        while let Some(n) = stack.pop() {
            if let Some([first, second]) = self.nodes[n.0].children {
                let t = self.stamp();
                self.nodes[n.0].timestamp = t;
                stack.push(second);
                stack.push(first);
                continue;
            }
            let node = &self.nodes[n.0];
            if node.is_occupied() || !size.fits_in(node.rect.size()) {
                continue;
            }
            return Some(self.place(n, size));
        }
        None
    }

    // `n` is a free leaf at least `size` on both axes.
    fn place(&mut self, mut n: NodeId, size: Size) -> NodeId {
        loop {
            let rect = self.nodes[n.0].rect;
            if rect.size() == size {
                let id = PackId(self.next_id);
                self.next_id += 1;
                let t = self.stamp();
                let node = &mut self.nodes[n.0];
                node.id = Some(id);
                node.timestamp = t;
                self.index.insert(id, n);
                trace!(%id, x = rect.x, y = rect.y, w = rect.w, h = rect.h, "placed");
                return n;
            }
            let (first, second) = split(rect, size);
            trace!(?rect, ?first, ?second, "split");
            let a = self.alloc(first);
            let b = self.alloc(second);
            let t = self.stamp();
            let node = &mut self.nodes[n.0];
            node.children = Some([a, b]);
            node.timestamp = t;
            n = a;
        }
    }

    fn reclaim(&mut self, size: Size) -> Option<NodeId> {
        let mut order = self.nodes();
        order.sort_by_key(|n| self.nodes[n.0].timestamp);
        let victim = order
            .into_iter()
            .find(|n| size.fits_in(self.nodes[n.0].rect.size()))?;
        let evicted = self.collapse(victim);
        debug!(
            w = size.w,
            h = size.h,
            rect = ?self.nodes[victim.0].rect,
            evicted,
            "reclaimed least recently used node"
        );
        self.insert_from(victim, size)
    }

    // Turn `n` back into a free leaf, dropping the ids of its whole subtree.
    fn collapse(&mut self, n: NodeId) -> usize {
        let mut evicted = 0;
        let mut stack = vec![n];
        while let Some(c) = stack.pop() {
            let node = &mut self.nodes[c.0];
            if let Some(id) = node.id.take() {
                self.index.remove(&id);
                evicted += 1;
            }
            if let Some([first, second]) = node.children.take() {
                stack.push(first);
                stack.push(second);
            }
            node.timestamp = 0;
            if c != n {
                self.vacant.push(c);
            }
        }
        evicted
    }
}

/// Split `rect` so that the first part starts fitting `size` along the axis with more slack.
/// Equal slack cuts across the full width.
fn split(rect: Rect, size: Size) -> (Rect, Rect) {
    let dw = rect.w - size.w;
    let dh = rect.h - size.h;
    if dw > dh {
        (
            Rect::new(rect.x, rect.y, size.w, rect.h),
            Rect::new(rect.x + size.w, rect.y, dw, rect.h),
        )
    } else {
        (
            Rect::new(rect.x, rect.y, rect.w, size.h),
            Rect::new(rect.x, rect.y + size.h, rect.w, dh),
        )
    }
}
