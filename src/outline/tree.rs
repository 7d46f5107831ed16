//! Forest view over a flat, level-tagged outline.

use crate::model::{EntryId, OutlineEntry};

/// Immutable forest built from an ordered outline.
///
/// Only parent-to-children edges are stored. Parents and siblings are
/// answered by lookups over those edges and the entry order.
#[derive(Debug, Clone, Default)]
pub struct OutlineTree {
    entries: Vec<OutlineEntry>,
    roots: Vec<EntryId>,
    children: Vec<Vec<EntryId>>,
}

impl OutlineTree {
    /// Build the forest.
    ///
    /// Entries with no shallower predecessor (for example an outline that
    /// opens at level 3) become roots.
    pub fn build(entries: Vec<OutlineEntry>) -> Self {
        let mut roots = Vec::new();
        let mut children = vec![Vec::new(); entries.len()];
        // (level, id); `None` is the level-0 sentinel.
        let mut stack: Vec<(u8, Option<EntryId>)> = vec![(0, None)];

        for (index, entry) in entries.iter().enumerate() {
            let id = EntryId(index);
            while stack.len() > 1 && stack.last().is_some_and(|(level, _)| *level >= entry.level) {
                stack.pop();
            }
            match stack.last() {
                Some((_, Some(parent))) => children[parent.index()].push(id),
                _ => roots.push(id),
            }
            stack.push((entry.level, Some(id)));
        }

        Self {
            entries,
            roots,
            children,
        }
    }

    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&OutlineEntry> {
        self.entries.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level entries in order.
    pub fn roots(&self) -> &[EntryId] {
        &self.roots
    }

    /// Direct children in order.
    pub fn children(&self, id: EntryId) -> &[EntryId] {
        self.children.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parent of an entry, found by searching the forest.
    pub fn parent(&self, id: EntryId) -> Option<EntryId> {
        let mut pending: Vec<EntryId> = self.roots.clone();
        while let Some(node) = pending.pop() {
            let kids = self.children(node);
            if kids.contains(&id) {
                return Some(node);
            }
            pending.extend_from_slice(kids);
        }
        None
    }

    /// Ancestors from the parent upwards.
    pub fn ancestors(&self, id: EntryId) -> Vec<EntryId> {
        let mut chain = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// The following entries whose level is strictly greater.
    pub fn descendants(&self, id: EntryId) -> Vec<EntryId> {
        let Some(entry) = self.entry(id) else {
            return Vec::new();
        };
        self.entries[id.index() + 1..]
            .iter()
            .take_while(|e| e.level > entry.level)
            .enumerate()
            .map(|(offset, _)| EntryId(id.index() + 1 + offset))
            .collect()
    }

    /// The first later entry at the same or a shallower level.
    pub fn next_sibling(&self, id: EntryId) -> Option<EntryId> {
        let entry = self.entry(id)?;
        self.entries[id.index() + 1..]
            .iter()
            .position(|e| e.level <= entry.level)
            .map(|offset| EntryId(id.index() + 1 + offset))
    }

    /// First entry whose title equals `title`, ignoring case.
    pub fn find_by_title(&self, title: &str) -> Option<EntryId> {
        let wanted = title.trim().to_lowercase();
        self.entries
            .iter()
            .position(|e| e.title.trim().to_lowercase() == wanted)
            .map(EntryId)
    }
}
