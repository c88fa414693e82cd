use glam::Vec3;
use std::collections::{HashMap, HashSet};
use waymark_common::EntityId;

/// Default edge length of a grid cell, in world units.
pub const DEFAULT_CELL_SIZE: f32 = 50.0;

/// Empty cell sets are kept for reuse until they outnumber occupied cells by this factor.
const EMPTY_CELL_SLACK: usize = 2;

/// A 2D cell coordinate in the world grid (ignoring Y axis for partitioning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpatialError {
    #[error("entity {id} has non-finite position ({x}, {y}, {z})")]
    NonFinitePosition { id: EntityId, x: f32, y: f32, z: f32 },
}

/// Outcome of a full rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub inserted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    cell: CellCoord,
    position: Vec3,
}

/// Fixed-size grid partitioning of tracked entities.
///
/// Entities are assigned to cells based on their XZ position divided by
/// `cell_size`. Insert and remove are O(1); a range query visits only the
/// cells overlapping the query square.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<CellCoord, HashSet<EntityId>>,
    placements: HashMap<EntityId, Placement>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialIndex {
    /// Create a new index with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "cell_size must be positive and finite"
        );
        Self {
            cell_size,
            cells: HashMap::new(),
            placements: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Change the cell size. Existing placements are redistributed.
    pub fn set_cell_size(&mut self, cell_size: f32) {
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "cell_size must be positive and finite"
        );
        if cell_size == self.cell_size {
            return;
        }
        self.cell_size = cell_size;
        let placements: Vec<(EntityId, Vec3)> = self
            .placements
            .iter()
            .map(|(id, p)| (*id, p.position))
            .collect();
        self.rebuild(placements);
    }

    /// Convert a world position to a cell coordinate.
    pub fn position_to_cell(&self, pos: Vec3) -> CellCoord {
        CellCoord {
            x: (pos.x / self.cell_size).floor() as i32,
            z: (pos.z / self.cell_size).floor() as i32,
        }
    }

    /// Place `id` at `pos`, moving it if it is already indexed.
    pub fn insert(&mut self, id: EntityId, pos: Vec3) -> Result<CellCoord, SpatialError> {
        if !pos.is_finite() {
            return Err(SpatialError::NonFinitePosition {
                id,
                x: pos.x,
                y: pos.y,
                z: pos.z,
            });
        }
        let cell = self.position_to_cell(pos);
        match self.placements.insert(id, Placement { cell, position: pos }) {
            Some(old) if old.cell == cell => {}
            Some(old) => {
                if let Some(set) = self.cells.get_mut(&old.cell) {
                    set.remove(&id);
                }
                self.cells.entry(cell).or_default().insert(id);
            }
            None => {
                self.cells.entry(cell).or_default().insert(id);
            }
        }
        Ok(cell)
    }

    /// Remove `id`. Returns false if it was not indexed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        match self.placements.remove(&id) {
            Some(old) => {
                if let Some(set) = self.cells.get_mut(&old.cell) {
                    set.remove(&id);
                }
                true
            }
            None => false,
        }
    }

    /// Drop every placement, keeping cell allocations for reuse.
    pub fn clear(&mut self) {
        for set in self.cells.values_mut() {
            set.clear();
        }
        self.placements.clear();
    }

    /// Rebuild the index from a full set of positions.
    ///
    /// Cell sets are cleared in place rather than reallocated. Non-finite
    /// positions are skipped and counted.
    pub fn rebuild<I>(&mut self, entities: I) -> RebuildStats
    where
        I: IntoIterator<Item = (EntityId, Vec3)>,
    {
        self.clear();
        let mut stats = RebuildStats::default();
        for (id, pos) in entities {
            match self.insert(id, pos) {
                Ok(_) => stats.inserted += 1,
                Err(err) => {
                    tracing::warn!(%err, "rejected entity during index rebuild");
                    stats.rejected += 1;
                }
            }
        }
        let occupied = self.cell_count();
        if self.cells.len() > occupied * EMPTY_CELL_SLACK + 64 {
            self.cells.retain(|_, set| !set.is_empty());
        }
        stats
    }

    /// Append every entity whose cell overlaps the square `center ± radius`
    /// to `out`.
    ///
    /// The result is a superset of the entities within `radius` of `center`.
    pub fn query_range(&self, center: Vec3, radius: f32, out: &mut Vec<EntityId>) {
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
            return;
        }
        // Pad slightly so float rounding at cell edges cannot drop a true hit.
        let reach = radius * (1.0 + 1e-5) + 1e-3;
        let lo = self.position_to_cell(center - Vec3::new(reach, 0.0, reach));
        let hi = self.position_to_cell(center + Vec3::new(reach, 0.0, reach));

        let span_x = i64::from(hi.x) - i64::from(lo.x) + 1;
        let span_z = i64::from(hi.z) - i64::from(lo.z) + 1;
        let covered = span_x.saturating_mul(span_z);

        if covered > self.cells.len() as i64 {
            // Query square is larger than the occupied area; walk occupied cells.
            for (coord, set) in &self.cells {
                if (lo.x..=hi.x).contains(&coord.x) && (lo.z..=hi.z).contains(&coord.z) {
                    out.extend(set.iter().copied());
                }
            }
            return;
        }

        for x in lo.x..=hi.x {
            for z in lo.z..=hi.z {
                if let Some(set) = self.cells.get(&CellCoord::new(x, z)) {
                    out.extend(set.iter().copied());
                }
            }
        }
    }

    /// Allocating form of `query_range`.
    pub fn query_range_set(&self, center: Vec3, radius: f32) -> HashSet<EntityId> {
        let mut out = Vec::new();
        self.query_range(center, radius, &mut out);
        out.into_iter().collect()
    }

    /// Cell currently holding `id`.
    pub fn cell_of(&self, id: EntityId) -> Option<CellCoord> {
        self.placements.get(&id).map(|p| p.cell)
    }

    /// Position `id` was last indexed at.
    pub fn position_of(&self, id: EntityId) -> Option<Vec3> {
        self.placements.get(&id).map(|p| p.position)
    }

    /// Get all entity IDs in a specific cell.
    pub fn entities_in_cell(&self, coord: CellCoord) -> HashSet<EntityId> {
        self.cells.get(&coord).cloned().unwrap_or_default()
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.values().filter(|s| !s.is_empty()).count()
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> EntityId {
        EntityId(n)
    }

    #[test]
    fn position_to_cell_basic() {
        let grid = SpatialIndex::new(16.0);
        let coord = grid.position_to_cell(Vec3::new(10.0, 0.0, 10.0));
        assert_eq!(coord, CellCoord::new(0, 0));

        let coord = grid.position_to_cell(Vec3::new(20.0, 0.0, -5.0));
        assert_eq!(coord, CellCoord::new(1, -1));
    }

    #[test]
    fn insert_and_remove() {
        let mut grid = SpatialIndex::new(50.0);
        let cell = grid.insert(id(1), Vec3::new(10.0, 0.0, 60.0)).unwrap();
        assert_eq!(cell, CellCoord::new(0, 1));
        assert!(grid.entities_in_cell(cell).contains(&id(1)));
        assert_eq!(grid.len(), 1);

        assert!(grid.remove(id(1)));
        assert!(!grid.remove(id(1)));
        assert!(grid.entities_in_cell(cell).is_empty());
        assert!(grid.is_empty());
    }

    #[test]
    fn reinsert_moves_between_cells() {
        let mut grid = SpatialIndex::new(50.0);
        grid.insert(id(1), Vec3::ZERO).unwrap();
        grid.insert(id(1), Vec3::new(120.0, 0.0, 0.0)).unwrap();

        assert!(grid.entities_in_cell(CellCoord::new(0, 0)).is_empty());
        assert!(grid.entities_in_cell(CellCoord::new(2, 0)).contains(&id(1)));
        assert_eq!(grid.cell_count(), 1);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn non_finite_insert_is_rejected() {
        let mut grid = SpatialIndex::new(50.0);
        grid.insert(id(1), Vec3::ZERO).unwrap();

        let err = grid.insert(id(1), Vec3::new(f32::NAN, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, SpatialError::NonFinitePosition { .. }));
        assert!(grid.insert(id(2), Vec3::new(0.0, 0.0, f32::INFINITY)).is_err());

        // The earlier placement is untouched.
        assert_eq!(grid.cell_of(id(1)), Some(CellCoord::new(0, 0)));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn rebuild_reuses_and_counts() {
        let mut grid = SpatialIndex::new(16.0);
        grid.insert(id(9), Vec3::new(500.0, 0.0, 500.0)).unwrap();

        let stats = grid.rebuild([
            (id(1), Vec3::ZERO),
            (id(2), Vec3::new(20.0, 0.0, 0.0)),
            (id(3), Vec3::new(f32::NAN, 0.0, 0.0)),
        ]);

        assert_eq!(stats, RebuildStats { inserted: 2, rejected: 1 });
        assert_eq!(grid.cell_count(), 2);
        assert_eq!(grid.len(), 2);
        assert!(grid.cell_of(id(9)).is_none());
    }

    #[test]
    fn query_range_covers_neighbouring_cells() {
        let mut grid = SpatialIndex::new(50.0);
        grid.insert(id(1), Vec3::new(49.0, 0.0, 0.0)).unwrap();
        grid.insert(id(2), Vec3::new(51.0, 0.0, 0.0)).unwrap();
        grid.insert(id(3), Vec3::new(400.0, 0.0, 400.0)).unwrap();

        let found = grid.query_range_set(Vec3::new(45.0, 0.0, 0.0), 10.0);
        assert!(found.contains(&id(1)));
        assert!(found.contains(&id(2)));
        assert!(!found.contains(&id(3)));
    }

    #[test]
    fn query_range_includes_boundary_false_positives() {
        let mut grid = SpatialIndex::new(50.0);
        // Same cell as the center but 45 units away.
        grid.insert(id(1), Vec3::new(49.0, 0.0, 49.0)).unwrap();
        let found = grid.query_range_set(Vec3::new(1.0, 0.0, 1.0), 5.0);
        assert!(found.contains(&id(1)));
    }

    #[test]
    fn query_range_handles_degenerate_input() {
        let mut grid = SpatialIndex::new(50.0);
        grid.insert(id(1), Vec3::ZERO).unwrap();
        assert!(grid.query_range_set(Vec3::ZERO, -1.0).is_empty());
        assert!(grid.query_range_set(Vec3::ZERO, f32::NAN).is_empty());
        assert!(grid.query_range_set(Vec3::splat(f32::INFINITY), 1.0).is_empty());
        // Huge radius falls back to walking occupied cells.
        assert!(grid.query_range_set(Vec3::ZERO, 1.0e9).contains(&id(1)));
    }

    #[test]
    fn set_cell_size_redistributes() {
        let mut grid = SpatialIndex::new(10.0);
        grid.insert(id(1), Vec3::new(25.0, 0.0, 0.0)).unwrap();
        assert_eq!(grid.cell_of(id(1)), Some(CellCoord::new(2, 0)));
        grid.set_cell_size(50.0);
        assert_eq!(grid.cell_of(id(1)), Some(CellCoord::new(0, 0)));
        assert_eq!(grid.position_of(id(1)), Some(Vec3::new(25.0, 0.0, 0.0)));
    }

    #[test]
    fn empty_cell_returns_empty_set() {
        let grid = SpatialIndex::new(16.0);
        assert!(grid.entities_in_cell(CellCoord::new(99, 99)).is_empty());
    }
}
