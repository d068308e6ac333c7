//! Visible slice of a fixed-height virtualized list
//!
//! Lists that render only the rows in view pair the controller with this
//! calculation: which rows to mount, how tall the full list is and how far
//! down the mounted slice starts.

use serde::Serialize;

/// Geometry of a list with uniform row height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualList {
    pub item_height: f64,
    pub container_height: f64,
}

/// Rows to render for one scroll position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisibleWindow {
    /// First visible row
    pub start: usize,
    /// One past the last visible row, never beyond the item count
    pub end: usize,
    /// Height of the whole list
    pub total_height: f64,
    /// Offset of row `start` from the top of the list
    pub offset_y: f64,
}

impl VisibleWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl VirtualList {
    pub fn new(item_height: f64, container_height: f64) -> Self {
        Self {
            item_height,
            container_height,
        }
    }

    /// Rows visible at `scroll_top` out of `item_count` loaded rows
    ///
    /// A non-positive row height yields an empty window at the top.
    pub fn window(&self, scroll_top: f64, item_count: usize) -> VisibleWindow {
        if self.item_height.is_nan() || self.item_height <= 0.0 {
            return VisibleWindow {
                start: 0,
                end: 0,
                total_height: 0.0,
                offset_y: 0.0,
            };
        }

        let scroll_top = scroll_top.max(0.0);
        let end = ((scroll_top + self.container_height.max(0.0)) / self.item_height).ceil() as usize;
        let end = end.min(item_count);
        let start = ((scroll_top / self.item_height).floor() as usize).min(end);

        VisibleWindow {
            start,
            end,
            total_height: item_count as f64 * self.item_height,
            offset_y: start as f64 * self.item_height,
        }
    }
}
