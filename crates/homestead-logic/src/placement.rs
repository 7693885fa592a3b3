//! Placement validation on the shared map grid.
//!
//! Boxes are inclusive cell ranges: `(x1, y1, x2, y2)` covers every cell
//! with `x1 <= x <= x2` and `y1 <= y <= y2`. Two boxes collide unless one
//! lies strictly to the side of the other, so boxes in neighbouring cells
//! (sharing only an edge) can sit next to each other.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::model::{GameMap, Placement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Rect {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box anchored at `(x, y)` extending `size` cells right and down.
    pub fn square(x: u32, y: u32, size: u32) -> Self {
        Self::new(x, y, x.saturating_add(size), y.saturating_add(size))
    }

    pub fn is_well_formed(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.x2 < other.x1 || other.x2 < self.x1 || self.y2 < other.y1 || other.y2 < self.y1)
    }
}

/// Reject boxes that are malformed or reach past the map edge.
pub fn check_bounds(map: &GameMap, rect: &Rect) -> EngineResult<()> {
    if !rect.is_well_formed() {
        return Err(EngineError::precondition(format!(
            "malformed box ({},{})→({},{})",
            rect.x1, rect.y1, rect.x2, rect.y2
        )));
    }
    if rect.x2 > map.width || rect.y2 > map.height {
        return Err(EngineError::out_of_bounds(format!(
            "box ({},{})→({},{}) exceeds map #{} ({}×{})",
            rect.x1, rect.y1, rect.x2, rect.y2, map.id, map.width, map.height
        )));
    }
    Ok(())
}

/// First existing placement colliding with `rect`, if any.
pub fn first_collision<'a>(existing: &'a [Placement], rect: &Rect) -> Option<&'a Placement> {
    existing.iter().find(|p| p.rect.overlaps(rect))
}

/// True when no object in `existing` overlaps `rect`.
///
/// `existing` must hold the placements of `map` only; callers load them with
/// [`crate::store::Store::placements_on`].
pub fn area_is_free(map: &GameMap, existing: &[Placement], rect: &Rect) -> EngineResult<bool> {
    check_bounds(map, rect)?;
    Ok(first_collision(existing, rect).is_none())
}
