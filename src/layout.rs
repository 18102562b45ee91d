//! Split-pane geometry
//!
//! Rebuilds a dense 2D grid from a tab's recursive split tree, then
//! classifies each pane's row/column into edge/center vocabulary so that
//! spoken positions ("upper left", "bottom") can be matched against real
//! panes. The tree is a point-in-time snapshot; callers re-fetch it from
//! the backend on every resolution because panes open and close under us.

use crate::backend::SessionId;
use crate::position::{HorizontalPos, PanePosition, VerticalPos};

/// Which way a split node divides its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    /// Children sit side by side, left to right.
    Horizontal,
    /// Children stack top to bottom.
    Vertical,
}

/// One tab's split layout: a session leaf or an axis-aligned split.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutNode {
    Leaf(SessionId),
    Split {
        axis: SplitAxis,
        children: Vec<LayoutNode>,
    },
}

/// Where one pane landed in the resolved grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PanePlacement {
    pub session: SessionId,
    pub horizontal: HorizontalPos,
    pub vertical: VerticalPos,
    pub row: usize,
    pub col: usize,
}

impl PanePlacement {
    pub fn position(&self) -> PanePosition {
        PanePosition::new(self.horizontal, self.vertical)
    }
}

type Grid = Vec<Vec<Option<SessionId>>>;

/// Resolve every pane in the tree to a classified grid position.
///
/// Returns exactly one placement per distinct session in the tree: a pane
/// spanning several cells (from merging ragged sub-splits) is reported once,
/// at its first occurrence in row-major order.
pub fn compute_positions(root: &LayoutNode) -> Vec<PanePlacement> {
    match root {
        LayoutNode::Leaf(session) => vec![PanePlacement {
            session: session.clone(),
            horizontal: HorizontalPos::Center,
            vertical: VerticalPos::Middle,
            row: 0,
            col: 0,
        }],
        LayoutNode::Split { .. } => {
            let grid = build_grid(root);
            grid_to_placements(&grid)
        }
    }
}

fn build_grid(node: &LayoutNode) -> Grid {
    match node {
        LayoutNode::Leaf(session) => vec![vec![Some(session.clone())]],
        LayoutNode::Split { axis, children } => {
            let grids: Vec<Grid> = children.iter().map(build_grid).collect();
            match axis {
                SplitAxis::Horizontal => merge_side_by_side(grids),
                SplitAxis::Vertical => merge_stacked(grids),
            }
        }
    }
}

/// Place child grids next to each other. The merged grid is as tall as the
/// tallest child; shorter children contribute empty cells in their missing
/// rows so nested ragged splits stay column-aligned.
fn merge_side_by_side(grids: Vec<Grid>) -> Grid {
    if grids.is_empty() {
        return Vec::new();
    }

    let max_rows = grids.iter().map(|g| g.len()).max().unwrap_or(0);

    let mut result = Vec::with_capacity(max_rows);
    for row_idx in 0..max_rows {
        let mut row = Vec::new();
        for grid in &grids {
            if let Some(grid_row) = grid.get(row_idx) {
                row.extend(grid_row.iter().cloned());
            } else {
                let cols = grid.first().map_or(1, |r| r.len());
                row.extend(std::iter::repeat_n(None, cols));
            }
        }
        result.push(row);
    }
    result
}

/// Stack child grids on top of each other, right-padding every row to the
/// widest child so the result stays rectangular.
fn merge_stacked(grids: Vec<Grid>) -> Grid {
    if grids.is_empty() {
        return Vec::new();
    }

    let max_cols = grids
        .iter()
        .map(|g| g.first().map_or(1, |r| r.len()))
        .max()
        .unwrap_or(1);

    let mut result = Vec::new();
    for grid in grids {
        for mut row in grid {
            row.resize(max_cols, None);
            result.push(row);
        }
    }
    result
}

fn grid_to_placements(grid: &Grid) -> Vec<PanePlacement> {
    let num_rows = grid.len();
    let num_cols = grid.first().map_or(0, |r| r.len());
    if num_rows == 0 || num_cols == 0 {
        return Vec::new();
    }

    let mut placements = Vec::new();
    let mut seen: Vec<&SessionId> = Vec::new();

    for (row_idx, row) in grid.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            let Some(session) = cell else { continue };
            if seen.contains(&session) {
                continue;
            }
            seen.push(session);

            let horizontal = if num_cols == 1 {
                HorizontalPos::Center
            } else if col_idx == 0 {
                HorizontalPos::Left
            } else if col_idx == num_cols - 1 {
                HorizontalPos::Right
            } else {
                HorizontalPos::Center
            };

            let vertical = if num_rows == 1 {
                VerticalPos::Middle
            } else if row_idx == 0 {
                VerticalPos::Upper
            } else if row_idx == num_rows - 1 {
                VerticalPos::Lower
            } else {
                VerticalPos::Middle
            };

            placements.push(PanePlacement {
                session: session.clone(),
                horizontal,
                vertical,
                row: row_idx,
                col: col_idx,
            });
        }
    }

    placements
}

/// Find the pane matching a spoken target position.
///
/// Exact cell match first. A purely-horizontal command ("go to left", i.e.
/// vertical defaulted to middle) then matches by column alone, and a
/// purely-vertical one by row alone, so a two-row layout still answers
/// "go to the left pane".
pub fn find_pane_by_position(
    placements: &[PanePlacement],
    target: PanePosition,
) -> Option<SessionId> {
    for p in placements {
        if p.horizontal == target.horizontal && p.vertical == target.vertical {
            return Some(p.session.clone());
        }
    }

    if target.vertical == VerticalPos::Middle {
        for p in placements {
            if p.horizontal == target.horizontal {
                return Some(p.session.clone());
            }
        }
    }

    if target.horizontal == HorizontalPos::Center {
        for p in placements {
            if p.vertical == target.vertical {
                return Some(p.session.clone());
            }
        }
    }

    log::warn!("no pane found at position {target}");
    None
}
