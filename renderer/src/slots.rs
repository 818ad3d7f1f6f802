use std::collections::HashMap;

use stencil::{Slot, SlotId};

/// Text another pack contributes to a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributedSource {
    /// The contributing pack, reported when a single-target slot is
    /// over-subscribed.
    pub pack_id: String,
    pub text: String,
}

impl ContributedSource {
    pub fn new(pack_id: impl Into<String>, text: impl Into<String>) -> Self {
        ContributedSource {
            pack_id: pack_id.into(),
            text: text.into(),
        }
    }
}

/// Resolves the contributions for a slot directive.
///
/// `pack_id` is the pack whose template is being rendered.
pub trait SlotLookup {
    fn lookup(&self, pack_id: &str, slot: &Slot) -> Vec<ContributedSource>;
}

impl<F> SlotLookup for F
where
    F: Fn(&str, &Slot) -> Vec<ContributedSource>,
{
    fn lookup(&self, pack_id: &str, slot: &Slot) -> Vec<ContributedSource> {
        self(pack_id, slot)
    }
}

/// In-memory contributions keyed by slot address.
#[derive(Debug, Clone, Default)]
pub struct SlotRegistry {
    slots: HashMap<SlotId, Vec<ContributedSource>>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        SlotRegistry::default()
    }

    /// Append a contribution; contributions keep their registration order.
    pub fn contribute(&mut self, target: SlotId, source: ContributedSource) {
        self.slots.entry(target).or_default().push(source);
    }

    pub fn contributions(&self, target: &SlotId) -> &[ContributedSource] {
        self.slots.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of slots with at least one contribution.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl SlotLookup for SlotRegistry {
    fn lookup(&self, _pack_id: &str, slot: &Slot) -> Vec<ContributedSource> {
        self.contributions(&slot.target).to_vec()
    }
}

/// A lookup with no contributions at all.
pub fn no_slots(_pack_id: &str, _slot: &Slot) -> Vec<ContributedSource> {
    Vec::new()
}
