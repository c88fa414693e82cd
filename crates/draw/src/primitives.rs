use glam::Vec2;
use waymark_common::{Rect, Rgba};

use crate::pool::{Handle, Pool, PoolStats, Reset};

/// Default text size in pixels.
const DEFAULT_FONT_SIZE: f32 = 13.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Box,
    Line,
    Text,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Box => "box",
            PrimitiveKind::Line => "line",
            PrimitiveKind::Text => "text",
        }
    }
}

/// Outlined rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxPrimitive {
    pub rect: Rect,
    pub color: Rgba,
    pub thickness: f32,
    pub visible: bool,
}

impl Default for BoxPrimitive {
    fn default() -> Self {
        Self {
            rect: Rect::ZERO,
            color: Rgba::TRANSPARENT,
            thickness: 1.0,
            visible: false,
        }
    }
}

impl Reset for BoxPrimitive {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Straight line segment.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePrimitive {
    pub from: Vec2,
    pub to: Vec2,
    pub color: Rgba,
    pub thickness: f32,
    pub visible: bool,
}

impl Default for LinePrimitive {
    fn default() -> Self {
        Self {
            from: Vec2::ZERO,
            to: Vec2::ZERO,
            color: Rgba::TRANSPARENT,
            thickness: 1.0,
            visible: false,
        }
    }
}

impl Reset for LinePrimitive {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Text label anchored at `position`; horizontally centred when `centered`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPrimitive {
    pub text: String,
    pub position: Vec2,
    pub color: Rgba,
    pub font_size: f32,
    pub centered: bool,
    pub visible: bool,
}

impl Default for TextPrimitive {
    fn default() -> Self {
        Self {
            text: String::new(),
            position: Vec2::ZERO,
            color: Rgba::TRANSPARENT,
            font_size: DEFAULT_FONT_SIZE,
            centered: true,
            visible: false,
        }
    }
}

impl Reset for TextPrimitive {
    fn reset(&mut self) {
        // Keep the string buffer so labels do not reallocate every frame.
        self.text.clear();
        self.position = Vec2::ZERO;
        self.color = Rgba::TRANSPARENT;
        self.font_size = DEFAULT_FONT_SIZE;
        self.centered = true;
        self.visible = false;
    }
}

pub type BoxHandle = Handle<BoxPrimitive>;
pub type LineHandle = Handle<LinePrimitive>;
pub type TextHandle = Handle<TextPrimitive>;

/// Primitive types stored in `PrimitivePools`.
pub trait Pooled: Default + Reset + Sized {
    const KIND: PrimitiveKind;

    fn pool(pools: &PrimitivePools) -> &Pool<Self>;

    fn pool_mut(pools: &mut PrimitivePools) -> &mut Pool<Self>;
}

impl Pooled for BoxPrimitive {
    const KIND: PrimitiveKind = PrimitiveKind::Box;

    fn pool(pools: &PrimitivePools) -> &Pool<Self> {
        &pools.boxes
    }

    fn pool_mut(pools: &mut PrimitivePools) -> &mut Pool<Self> {
        &mut pools.boxes
    }
}

impl Pooled for LinePrimitive {
    const KIND: PrimitiveKind = PrimitiveKind::Line;

    fn pool(pools: &PrimitivePools) -> &Pool<Self> {
        &pools.lines
    }

    fn pool_mut(pools: &mut PrimitivePools) -> &mut Pool<Self> {
        &mut pools.lines
    }
}

impl Pooled for TextPrimitive {
    const KIND: PrimitiveKind = PrimitiveKind::Text;

    fn pool(pools: &PrimitivePools) -> &Pool<Self> {
        &pools.texts
    }

    fn pool_mut(pools: &mut PrimitivePools) -> &mut Pool<Self> {
        &mut pools.texts
    }
}

/// Warm sizes for the three pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCapacities {
    pub boxes: usize,
    pub lines: usize,
    pub texts: usize,
    /// Sanity ceiling as a multiple of each pool's warm capacity.
    pub ceiling_factor: usize,
}

impl PoolCapacities {
    /// Warm capacity for one kind.
    pub fn get(&self, kind: PrimitiveKind) -> usize {
        match kind {
            PrimitiveKind::Box => self.boxes,
            PrimitiveKind::Line => self.lines,
            PrimitiveKind::Text => self.texts,
        }
    }

    fn ceiling(&self, kind: PrimitiveKind) -> usize {
        self.get(kind) * self.ceiling_factor.max(1)
    }
}

impl Default for PoolCapacities {
    fn default() -> Self {
        Self {
            boxes: 50,
            lines: 200,
            texts: 100,
            ceiling_factor: 4,
        }
    }
}

/// Utilization of every primitive pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimitiveStats {
    pub boxes: PoolStats,
    pub lines: PoolStats,
    pub texts: PoolStats,
}

impl PrimitiveStats {
    pub fn get(&self, kind: PrimitiveKind) -> &PoolStats {
        match kind {
            PrimitiveKind::Box => &self.boxes,
            PrimitiveKind::Line => &self.lines,
            PrimitiveKind::Text => &self.texts,
        }
    }
}

fn warm_pool<P: Pooled>(capacities: &PoolCapacities) -> Pool<P> {
    Pool::new(
        P::KIND.name(),
        capacities.get(P::KIND),
        capacities.ceiling(P::KIND),
    )
}

/// The box, line and text pools behind one typed checkout API.
#[derive(Debug)]
pub struct PrimitivePools {
    boxes: Pool<BoxPrimitive>,
    lines: Pool<LinePrimitive>,
    texts: Pool<TextPrimitive>,
}

impl Default for PrimitivePools {
    fn default() -> Self {
        Self::new(PoolCapacities::default())
    }
}

impl PrimitivePools {
    pub fn new(capacities: PoolCapacities) -> Self {
        Self {
            boxes: warm_pool(&capacities),
            lines: warm_pool(&capacities),
            texts: warm_pool(&capacities),
        }
    }

    /// Grow pools to new capacities; existing objects are kept.
    pub fn reserve(&mut self, capacities: PoolCapacities) {
        self.reserve_kind::<BoxPrimitive>(&capacities);
        self.reserve_kind::<LinePrimitive>(&capacities);
        self.reserve_kind::<TextPrimitive>(&capacities);
    }

    fn reserve_kind<P: Pooled>(&mut self, capacities: &PoolCapacities) {
        let pool = P::pool_mut(self);
        pool.reserve_to(capacities.get(P::KIND));
        pool.set_ceiling(capacities.ceiling(P::KIND));
    }

    pub fn checkout<P: Pooled>(&mut self) -> Handle<P> {
        P::pool_mut(self).checkout()
    }

    pub fn release<P: Pooled>(&mut self, handle: Handle<P>) {
        P::pool_mut(self).release(handle);
    }

    pub fn get<P: Pooled>(&self, handle: &Handle<P>) -> &P {
        P::pool(self).get(handle)
    }

    pub fn get_mut<P: Pooled>(&mut self, handle: &Handle<P>) -> &mut P {
        P::pool_mut(self).get_mut(handle)
    }

    pub fn pool<P: Pooled>(&self) -> &Pool<P> {
        P::pool(self)
    }

    pub fn utilization(&self) -> PrimitiveStats {
        PrimitiveStats {
            boxes: self.boxes.stats(),
            lines: self.lines.stats(),
            texts: self.texts.stats(),
        }
    }

    /// Primitives currently checked out across all pools.
    pub fn in_use(&self) -> usize {
        self.boxes.in_use() + self.lines.in_use() + self.texts.in_use()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacities() {
        let pools = PrimitivePools::default();
        let stats = pools.utilization();
        assert_eq!(stats.boxes.allocated, 50);
        assert_eq!(stats.texts.allocated, 100);
        assert_eq!(stats.lines.allocated, 200);
        assert_eq!(stats.get(PrimitiveKind::Line).capacity, 200);
    }

    #[test]
    fn pools_are_labelled_and_sized_by_kind() {
        let capacities = PoolCapacities {
            boxes: 3,
            lines: 5,
            texts: 7,
            ceiling_factor: 2,
        };
        let mut pools = PrimitivePools::new(capacities);
        assert_eq!(pools.pool::<BoxPrimitive>().label(), "box");
        assert_eq!(pools.pool::<LinePrimitive>().label(), "line");
        assert_eq!(pools.pool::<TextPrimitive>().label(), "text");
        assert_eq!(pools.utilization().get(TextPrimitive::KIND).capacity, 7);

        pools.reserve(PoolCapacities {
            lines: 9,
            ..capacities
        });
        let stats = pools.utilization();
        assert_eq!(stats.get(LinePrimitive::KIND).capacity, 9);
        assert_eq!(stats.get(BoxPrimitive::KIND).capacity, 3);
    }

    #[test]
    fn sixty_boxes_from_fifty_warm() {
        let mut pools = PrimitivePools::default();
        let handles: Vec<BoxHandle> = (0..60).map(|_| pools.checkout()).collect();
        let stats = pools.utilization().boxes;
        assert_eq!(stats.in_use, 60);
        assert_eq!(stats.overflow_allocations, 10);
        assert_eq!(stats.allocated, 60);
        for h in handles {
            pools.release(h);
        }
        assert_eq!(pools.in_use(), 0);
    }

    #[test]
    fn text_reset_keeps_buffer() {
        let mut pools = PrimitivePools::default();
        let h: TextHandle = pools.checkout();
        {
            let t = pools.get_mut(&h);
            t.text.push_str("Enemy-12 / 40m");
            t.font_size = 20.0;
            t.visible = true;
        }
        let key = h.key();
        pools.release(h);
        let pool = pools.pool::<TextPrimitive>();
        assert!(pool.get_live(key).is_none());
        assert!(pool.iter_free().all(|t| *t == TextPrimitive::default()));
    }

    #[test]
    fn reserve_grows_each_pool() {
        let mut pools = PrimitivePools::default();
        pools.reserve(PoolCapacities {
            boxes: 80,
            lines: 10,
            texts: 100,
            ceiling_factor: 2,
        });
        let stats = pools.utilization();
        assert_eq!(stats.boxes.capacity, 80);
        // Never shrinks.
        assert_eq!(stats.lines.capacity, 200);
    }
}
