use std::sync::Arc;

use glam::{Mat4, Vec3};
use parking_lot::{RwLock, RwLockReadGuard};

use super::leaf::next_revision;
use super::Shape;
use crate::batch::{Batch, CompiledBatch};

/// Either arm of the shape tree.
#[derive(Debug)]
pub enum Node {
    Shape(Shape),
    Group(Group),
}

/// Ordered children plus a transform applied on top of theirs.
#[derive(Debug)]
pub struct Group {
    children: Vec<ShapeNode>,
    transform: Mat4,
    retained: bool,
    revision: u64,
    compiled: Option<CompiledBatch>,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            transform: Mat4::IDENTITY,
            retained: false,
            revision: next_revision(),
            compiled: None,
        }
    }
}

impl Group {
    #[inline]
    pub fn children(&self) -> &[ShapeNode] {
        &self.children
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn remove_child(&mut self, index: usize) -> ShapeNode {
        let child = self.children.remove(index);
        self.touch();
        child
    }

    #[inline]
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, m: Mat4) {
        self.transform = m;
        self.touch();
    }

    pub fn translate(&mut self, t: Vec3) {
        self.set_transform(self.transform * Mat4::from_translation(t));
    }

    pub fn rotate(&mut self, angle: f32) {
        self.set_transform(self.transform * Mat4::from_rotation_z(angle));
    }

    pub fn scale(&mut self, s: Vec3) {
        self.set_transform(self.transform * Mat4::from_scale(s));
    }

    /// A retained group is drawn through its compiled batch.
    pub fn set_retained(&mut self, retained: bool) {
        self.retained = retained;
        if !retained {
            self.compiled = None;
        }
    }

    #[inline]
    pub fn is_retained(&self) -> bool {
        self.retained
    }

    fn touch(&mut self) {
        self.revision = next_revision();
    }
}

/// Shared handle to a node of the shape tree.
///
/// Clones share the node. Groups own their children by handle and there are
/// no parent links; [`ShapeNode::add_child`] rejects cycles.
#[derive(Debug, Clone)]
pub struct ShapeNode {
    inner: Arc<RwLock<Node>>,
}

impl From<Shape> for ShapeNode {
    fn from(shape: Shape) -> Self {
        Self::shape(shape)
    }
}

impl ShapeNode {
    pub fn shape(shape: Shape) -> Self {
        Self { inner: Arc::new(RwLock::new(Node::Shape(shape))) }
    }

    pub fn group() -> Self {
        Self { inner: Arc::new(RwLock::new(Node::Group(Group::default()))) }
    }

    /// Read access. Recursive so a node shared at several places in a tree
    /// can be visited while an ancestor is also read-locked.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Node> {
        self.inner.read_recursive()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ShapeNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_group(&self) -> bool {
        matches!(&*self.read(), Node::Group(_))
    }

    /// Mutates a leaf shape. Returns `None` for groups.
    pub fn edit_shape<R>(&self, f: impl FnOnce(&mut Shape) -> R) -> Option<R> {
        match &mut *self.inner.write() {
            Node::Shape(s) => Some(f(s)),
            Node::Group(_) => None,
        }
    }

    /// Mutates a group. Returns `None` for leaf shapes.
    pub fn edit_group<R>(&self, f: impl FnOnce(&mut Group) -> R) -> Option<R> {
        match &mut *self.inner.write() {
            Node::Group(g) => Some(f(g)),
            Node::Shape(_) => None,
        }
    }

    /// Appends `child` to this group.
    ///
    /// Panics if this node is a leaf shape or if `child` already contains this
    /// node (the tree would become cyclic).
    pub fn add_child(&self, child: impl Into<ShapeNode>) {
        let child = child.into();
        assert!(
            !child.contains(self),
            "adding this child would make the shape tree cyclic"
        );
        let added = self.edit_group(|g| {
            g.children.push(child);
            g.touch();
        });
        assert!(added.is_some(), "add_child called on a leaf shape");
    }

    /// True if `other` is this node or one of its descendants.
    pub fn contains(&self, other: &ShapeNode) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match &*self.read() {
            Node::Shape(_) => false,
            Node::Group(g) => g.children.iter().any(|c| c.contains(other)),
        }
    }

    pub fn set_transform(&self, m: Mat4) {
        match &mut *self.inner.write() {
            Node::Shape(s) => s.set_transform(m),
            Node::Group(g) => g.set_transform(m),
        }
    }

    pub fn transform(&self) -> Mat4 {
        match &*self.read() {
            Node::Shape(s) => s.transform(),
            Node::Group(g) => g.transform(),
        }
    }

    /// Newest mutation stamp in this subtree.
    pub fn revision(&self) -> u64 {
        match &*self.read() {
            Node::Shape(s) => s.revision(),
            Node::Group(g) => g.children.iter().map(ShapeNode::revision).fold(g.revision, u64::max),
        }
    }

    pub fn is_retained(&self) -> bool {
        matches!(&*self.read(), Node::Group(g) if g.retained)
    }

    /// Compiled batch of a group subtree, rebuilt if any descendant changed
    /// since the cached one was made. Transforms (including the group's own)
    /// are baked into the vertices. Returns `None` for leaf shapes.
    pub fn compile(&self) -> Option<CompiledBatch> {
        let revision = self.revision();
        match &*self.read() {
            Node::Shape(_) => return None,
            Node::Group(g) => {
                if let Some(c) = g.compiled.as_ref().filter(|c| c.revision() >= revision) {
                    return Some(c.clone());
                }
            }
        }

        let mut batch = Batch::new();
        batch.flatten(self, Mat4::IDENTITY, true);
        let compiled = CompiledBatch::new(batch, revision);
        log::debug!(
            "compiled group: {} vertices in {} buffer groups (revision {revision})",
            compiled.batch().vertex_count(),
            compiled.batch().group_count()
        );

        if let Node::Group(g) = &mut *self.inner.write() {
            g.compiled = Some(compiled.clone());
        }
        Some(compiled)
    }

    /// The cached compiled batch, stale or not.
    pub fn cached_compiled(&self) -> Option<CompiledBatch> {
        match &*self.read() {
            Node::Group(g) => g.compiled.clone(),
            Node::Shape(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    fn square(x: f32) -> ShapeNode {
        ShapeNode::shape(Shape::rect(x, 0.0, 10.0, 10.0))
    }

    // ── tree ──────────────────────────────────────────────────────────────

    #[test]
    fn group_keeps_child_order() {
        let g = ShapeNode::group();
        let a = square(0.0);
        let b = square(20.0);
        g.add_child(a.clone());
        g.add_child(b.clone());

        let node = g.read();
        let Node::Group(group) = &*node else { panic!("expected a group") };
        assert!(group.children()[0].ptr_eq(&a));
        assert!(group.children()[1].ptr_eq(&b));
    }

    #[test]
    #[should_panic(expected = "cyclic")]
    fn cycles_are_rejected() {
        let outer = ShapeNode::group();
        let inner = ShapeNode::group();
        outer.add_child(inner.clone());
        inner.add_child(outer.clone());
    }

    #[test]
    #[should_panic(expected = "leaf shape")]
    fn leaves_have_no_children() {
        square(0.0).add_child(square(1.0));
    }

    #[test]
    fn subtree_revision_tracks_descendants() {
        let root = ShapeNode::group();
        let mid = ShapeNode::group();
        let leaf = square(0.0);
        mid.add_child(leaf.clone());
        root.add_child(mid);

        let before = root.revision();
        leaf.edit_shape(|s| s.fill(crate::paint::Color::BLACK));
        assert!(root.revision() > before);
    }

    // ── compile ───────────────────────────────────────────────────────────

    #[test]
    fn compile_is_cached_until_a_descendant_changes() {
        let g = ShapeNode::group();
        let leaf = square(0.0);
        g.add_child(leaf.clone());

        let first = g.compile().expect("group compiles");
        let again = g.compile().expect("group compiles");
        assert!(first.ptr_eq(&again));

        leaf.edit_shape(|s| s.translate(Vec3::new(5.0, 0.0, 0.0)));
        let rebuilt = g.compile().expect("group compiles");
        assert!(!first.ptr_eq(&rebuilt));
        assert!(rebuilt.revision() > first.revision());
    }

    #[test]
    fn leaves_do_not_compile() {
        assert!(square(0.0).compile().is_none());
    }

    #[test]
    fn shared_child_can_appear_twice() {
        let g = ShapeNode::group();
        let leaf = square(0.0);
        g.add_child(leaf.clone());
        g.add_child(leaf);
        let compiled = g.compile().expect("group compiles");
        assert_eq!(compiled.batch().vertex_count(), 2 * (4 + 8));
    }

    #[test]
    fn removing_a_child_bumps_the_group() {
        let g = ShapeNode::group();
        g.add_child(square(0.0));
        g.add_child(square(20.0));
        let before = g.revision();

        let removed = g.edit_group(|grp| grp.remove_child(0)).unwrap();
        assert!(!removed.is_group());
        assert!(g.is_group());
        assert_eq!(g.edit_group(|grp| grp.child_count()), Some(1));
        assert!(g.revision() > before);
    }
}
