use std::collections::HashMap;

use waymark_common::Rgba;

use crate::backend::DrawBackend;
use crate::pool::SlotKey;
use crate::primitives::{
    BoxHandle, BoxPrimitive, LineHandle, LinePrimitive, PrimitivePools, TextHandle, TextPrimitive,
};

/// Visual state shared by every primitive in one batch.
///
/// Floats are keyed by their bit pattern so the key can be hashed; callers
/// quantize values (alpha in particular) before building keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKey {
    /// Boxes and lines share stroke state.
    Stroke { color: Rgba, thickness_bits: u32 },
    Text { color: Rgba, font_size_bits: u32 },
}

impl BatchKey {
    pub fn stroke(color: Rgba, thickness: f32) -> Self {
        BatchKey::Stroke {
            color,
            thickness_bits: normalized_bits(thickness),
        }
    }

    pub fn text(color: Rgba, font_size: f32) -> Self {
        BatchKey::Text {
            color,
            font_size_bits: normalized_bits(font_size),
        }
    }

    pub fn color(&self) -> Rgba {
        match *self {
            BatchKey::Stroke { color, .. } | BatchKey::Text { color, .. } => color,
        }
    }

    pub fn thickness(&self) -> Option<f32> {
        match *self {
            BatchKey::Stroke { thickness_bits, .. } => Some(f32::from_bits(thickness_bits)),
            BatchKey::Text { .. } => None,
        }
    }

    pub fn font_size(&self) -> Option<f32> {
        match *self {
            BatchKey::Text { font_size_bits, .. } => Some(f32::from_bits(font_size_bits)),
            BatchKey::Stroke { .. } => None,
        }
    }
}

/// `-0.0` and `0.0` batch together.
fn normalized_bits(value: f32) -> u32 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

#[derive(Debug, Clone, Copy)]
enum Member {
    Box(SlotKey),
    Line(SlotKey),
    Text(SlotKey),
}

#[derive(Debug)]
struct Group {
    key: BatchKey,
    members: Vec<Member>,
}

/// Counters for one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Style changes issued, one per non-empty group.
    pub groups: usize,
    pub primitives: usize,
}

/// Groups visible primitives by `BatchKey` and issues one style change per
/// group at flush.
///
/// Groups are flushed in the order their key was first seen this frame.
/// Group storage is kept between frames.
#[derive(Debug, Default)]
pub struct BatchCompositor {
    groups: Vec<Group>,
    active: usize,
    lookup: HashMap<BatchKey, usize>,
    pending: usize,
}

impl BatchCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a box. Returns false when the box is not visible.
    pub fn add_box(&mut self, pools: &PrimitivePools, handle: &BoxHandle) -> bool {
        let primitive = pools.get(handle);
        if !primitive.visible {
            return false;
        }
        let key = BatchKey::stroke(primitive.color, primitive.thickness);
        self.push(key, Member::Box(handle.key()));
        true
    }

    pub fn add_line(&mut self, pools: &PrimitivePools, handle: &LineHandle) -> bool {
        let primitive = pools.get(handle);
        if !primitive.visible {
            return false;
        }
        let key = BatchKey::stroke(primitive.color, primitive.thickness);
        self.push(key, Member::Line(handle.key()));
        true
    }

    pub fn add_text(&mut self, pools: &PrimitivePools, handle: &TextHandle) -> bool {
        let primitive = pools.get(handle);
        if !primitive.visible || primitive.text.is_empty() {
            return false;
        }
        let key = BatchKey::text(primitive.color, primitive.font_size);
        self.push(key, Member::Text(handle.key()));
        true
    }

    fn push(&mut self, key: BatchKey, member: Member) {
        let slot = match self.lookup.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.active;
                if slot < self.groups.len() {
                    let group = &mut self.groups[slot];
                    group.key = key;
                    group.members.clear();
                } else {
                    self.groups.push(Group {
                        key,
                        members: Vec::new(),
                    });
                }
                self.active += 1;
                self.lookup.insert(key, slot);
                slot
            }
        };
        self.groups[slot].members.push(member);
        self.pending += 1;
    }

    /// Primitives queued since the last flush.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Distinct keys queued since the last flush.
    pub fn group_count(&self) -> usize {
        self.active
    }

    /// Draw every queued primitive and empty the queue.
    ///
    /// Primitives released after being queued are skipped, even when their
    /// slot has been checked out again since.
    pub fn flush<B: DrawBackend + ?Sized>(
        &mut self,
        pools: &PrimitivePools,
        backend: &mut B,
    ) -> FlushStats {
        let _span = tracing::debug_span!("batch_flush", groups = self.active).entered();
        let mut stats = FlushStats::default();
        for group in &self.groups[..self.active] {
            if group.members.is_empty() {
                continue;
            }
            backend.set_style(&group.key);
            stats.groups += 1;
            for member in &group.members {
                let drawn = match *member {
                    Member::Box(key) => pools
                        .pool::<BoxPrimitive>()
                        .get_live(key)
                        .map(|primitive| backend.draw_box(primitive))
                        .is_some(),
                    Member::Line(key) => pools
                        .pool::<LinePrimitive>()
                        .get_live(key)
                        .map(|primitive| backend.draw_line(primitive))
                        .is_some(),
                    Member::Text(key) => pools
                        .pool::<TextPrimitive>()
                        .get_live(key)
                        .map(|primitive| backend.draw_text(primitive))
                        .is_some(),
                };
                if drawn {
                    stats.primitives += 1;
                }
            }
        }
        self.clear();
        stats
    }

    /// Drop queued primitives without drawing them.
    pub fn clear(&mut self) {
        for group in &mut self.groups[..self.active] {
            group.members.clear();
        }
        self.active = 0;
        self.lookup.clear();
        self.pending = 0;
    }
}
