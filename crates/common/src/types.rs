use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Stable identity of a host entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind tag of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Enemy,
    Player,
    Animal,
    Item,
    Npc,
}

impl EntityKind {
    pub const COUNT: usize = 5;

    pub const ALL: [EntityKind; Self::COUNT] = [
        EntityKind::Enemy,
        EntityKind::Player,
        EntityKind::Animal,
        EntityKind::Item,
        EntityKind::Npc,
    ];

    /// Slot of this kind in a `PerKind` table.
    pub const fn index(self) -> usize {
        match self {
            EntityKind::Enemy => 0,
            EntityKind::Player => 1,
            EntityKind::Animal => 2,
            EntityKind::Item => 3,
            EntityKind::Npc => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Enemy => "Enemy",
            EntityKind::Player => "Player",
            EntityKind::Animal => "Animal",
            EntityKind::Item => "Item",
            EntityKind::Npc => "NPC",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compact set of entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KindSet(u8);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);
    pub const ALL: KindSet = KindSet((1 << EntityKind::COUNT) - 1);

    pub fn only(kind: EntityKind) -> Self {
        Self(1 << kind.index())
    }

    pub fn insert(&mut self, kind: EntityKind) {
        self.0 |= 1 << kind.index();
    }

    pub fn remove(&mut self, kind: EntityKind) {
        self.0 &= !(1 << kind.index());
    }

    pub fn contains(self, kind: EntityKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = EntityKind> {
        EntityKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<EntityKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = EntityKind>>(iter: I) -> Self {
        let mut set = KindSet::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Fixed table with one slot per `EntityKind`.
///
/// Serializes as a map keyed by kind name so settings files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerKind<T>([T; EntityKind::COUNT]);

impl<T> PerKind<T> {
    pub fn from_fn(mut f: impl FnMut(EntityKind) -> T) -> Self {
        Self(EntityKind::ALL.map(&mut f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &T)> {
        EntityKind::ALL.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityKind, &mut T)> {
        EntityKind::ALL.into_iter().zip(self.0.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(EntityKind, &T) -> U) -> PerKind<U> {
        PerKind::from_fn(|k| f(k, &self.0[k.index()]))
    }
}

impl<T> Index<EntityKind> for PerKind<T> {
    type Output = T;

    fn index(&self, kind: EntityKind) -> &T {
        &self.0[kind.index()]
    }
}

impl<T> IndexMut<EntityKind> for PerKind<T> {
    fn index_mut(&mut self, kind: EntityKind) -> &mut T {
        &mut self.0[kind.index()]
    }
}

impl<T: Serialize> Serialize for PerKind<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(EntityKind::COUNT))?;
        for (kind, value) in self.iter() {
            map.serialize_entry(&kind, value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de> + Default> Deserialize<'de> for PerKind<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = std::collections::BTreeMap::<EntityKind, T>::deserialize(deserializer)?;
        let mut table = PerKind::<T>::from_fn(|_| T::default());
        for (kind, value) in entries {
            table[kind] = value;
        }
        Ok(table)
    }
}

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub fn alpha(self) -> u8 {
        self.0[3]
    }

    /// Same color with alpha set from a 0..=1 opacity.
    pub fn with_opacity(self, opacity: f32) -> Self {
        let [r, g, b, _] = self.0;
        let a = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self([r, g, b, a])
    }
}

/// Axis-aligned screen rectangle in pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        min: Vec2::ZERO,
        max: Vec2::ZERO,
    };

    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

/// Result of projecting a world point onto the screen.
///
/// `depth` is the camera-space distance along the view axis; points behind
/// the camera have `depth <= 0` and their `position` is meaningless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenProjection {
    pub position: Vec2,
    pub depth: f32,
}

impl ScreenProjection {
    pub fn in_front(&self) -> bool {
        self.depth > 0.0
    }

    pub fn within(&self, screen: Vec2) -> bool {
        let p = self.position;
        p.x >= 0.0 && p.y >= 0.0 && p.x <= screen.x && p.y <= screen.y
    }
}

/// Observer camera position and unit forward vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub forward: Vec3,
}

impl CameraPose {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward: forward.normalize_or_zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_indices_are_dense() {
        for (i, kind) in EntityKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn kind_set_ops() {
        let mut set = KindSet::EMPTY;
        assert!(set.is_empty());
        set.insert(EntityKind::Animal);
        set.insert(EntityKind::Enemy);
        assert!(set.contains(EntityKind::Animal));
        assert!(!set.contains(EntityKind::Item));
        assert_eq!(set.len(), 2);
        set.remove(EntityKind::Animal);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![EntityKind::Enemy]);
        assert_eq!(KindSet::ALL.len(), EntityKind::COUNT);
    }

    #[test]
    fn per_kind_indexing() {
        let mut table = PerKind::from_fn(|k| k.index() * 10);
        assert_eq!(table[EntityKind::Item], 30);
        table[EntityKind::Item] = 7;
        assert_eq!(table[EntityKind::Item], 7);
        let doubled = table.map(|_, v| v * 2);
        assert_eq!(doubled[EntityKind::Player], 20);
    }

    #[test]
    fn per_kind_serde_uses_kind_names() {
        let table = PerKind::from_fn(|k| k == EntityKind::Npc);
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("\"Npc\":true"));

        let partial: PerKind<bool> = serde_json::from_str(r#"{"Enemy":true}"#).unwrap();
        assert!(partial[EntityKind::Enemy]);
        assert!(!partial[EntityKind::Player]);
    }

    #[test]
    fn opacity_sets_alpha_only() {
        let c = Rgba::rgb(10, 20, 30).with_opacity(0.5);
        assert_eq!(c.0, [10, 20, 30, 128]);
        assert_eq!(Rgba::WHITE.with_opacity(3.0).alpha(), 255);
    }

    #[test]
    fn rect_from_center() {
        let r = Rect::from_center_size(Vec2::new(10.0, 10.0), Vec2::new(4.0, 2.0));
        assert_eq!(r.width(), 4.0);
        assert_eq!(r.height(), 2.0);
        assert_eq!(r.center(), Vec2::new(10.0, 10.0));
    }

    #[test]
    fn projection_bounds() {
        let p = ScreenProjection {
            position: Vec2::new(1920.0, 0.0),
            depth: 1.0,
        };
        assert!(p.in_front());
        assert!(p.within(Vec2::new(1920.0, 1080.0)));
        assert!(!p.within(Vec2::new(1000.0, 1080.0)));
    }
}
