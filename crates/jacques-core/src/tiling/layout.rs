//! Smart-grid computation.
//!
//! Given a display work-area and a window count, produce non-overlapping
//! sub-rectangles that tile the area with a deterministic distribution.

use crate::window::Rect;

/// Geometry assigned to one grid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGeometry {
    pub rect: Rect,
    pub column: usize,
    pub row: usize,
}

/// Grid shape for `n` windows as columns per row.
///
/// Fixed shapes through 9; beyond that, ceil(√n) rows filled as evenly as
/// possible with the extra windows on the later rows.
pub fn columns_per_row(n: usize) -> Vec<usize> {
    match n {
        0 => Vec::new(),
        1 => vec![1],
        2 => vec![2],
        3 => vec![3],
        4 => vec![2, 2],
        5 => vec![2, 3],
        6 => vec![3, 3],
        7 => vec![3, 4],
        8 => vec![4, 4],
        9 => vec![3, 3, 3],
        n => {
            let rows = (n as f64).sqrt().ceil() as usize;
            let base = n / rows;
            let extra = n % rows;
            (0..rows)
                .map(|row| base + usize::from(row >= rows - extra))
                .collect()
        }
    }
}

/// Compute slot geometries for `n` windows on `work_area`.
///
/// Row heights are equal with the last row absorbing the remainder; within
/// each row, widths are floored with the last column absorbing, so the
/// slots exactly cover the work-area.
pub fn compute_grid(work_area: &Rect, n: usize) -> Vec<SlotGeometry> {
    let shape = columns_per_row(n);
    let rows = shape.len();
    if rows == 0 {
        return Vec::new();
    }

    let row_height = work_area.height / rows as i32;
    let mut slots = Vec::with_capacity(n);
    for (row, &columns) in shape.iter().enumerate() {
        let y = work_area.y + row_height * row as i32;
        let height = if row == rows - 1 {
            work_area.height - row_height * (rows as i32 - 1)
        } else {
            row_height
        };
        let column_width = work_area.width / columns as i32;
        for column in 0..columns {
            let x = work_area.x + column_width * column as i32;
            let width = if column == columns - 1 {
                work_area.width - column_width * (columns as i32 - 1)
            } else {
                column_width
            };
            slots.push(SlotGeometry {
                rect: Rect::new(x, y, width, height),
                column,
                row,
            });
        }
    }
    slots
}
