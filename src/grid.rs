use crate::error::{EmbedError, GridField, Result};

/// Distance between grid lines, in page points.
pub const PITCH: f64 = 44.5;
const ANCHOR_X: f64 = 62.5;
const FIRST_ANCHOR_Y: f64 = 83.5;

pub const MIN_CELLS: i64 = 1;
pub const MAX_CELLS: i64 = 20;

/// A crop rectangle addressed by grid row plus width/height in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorRect {
    pub anchor: i64,
    pub width_cells: i64,
    pub height_cells: i64,
}

impl AnchorRect {
    /// Validate each value against [1, 20], reporting the first offending field.
    pub fn new(anchor: i64, width_cells: i64, height_cells: i64) -> Result<Self> {
        check(anchor, GridField::Anchor)?;
        check(width_cells, GridField::Width)?;
        check(height_cells, GridField::Height)?;
        Ok(Self {
            anchor,
            width_cells,
            height_cells,
        })
    }

    /// `[x, y, width, height]` in page points.
    pub fn to_rect(self) -> [f64; 4] {
        let anchor_y = FIRST_ANCHOR_Y + (self.anchor - 1) as f64 * PITCH;
        [
            ANCHOR_X,
            anchor_y,
            (self.width_cells - 1) as f64 * PITCH,
            (self.height_cells - 1) as f64 * PITCH,
        ]
    }
}

fn check(value: i64, field: GridField) -> Result<()> {
    if (MIN_CELLS..=MAX_CELLS).contains(&value) {
        Ok(())
    } else {
        Err(EmbedError::Validation { field })
    }
}
