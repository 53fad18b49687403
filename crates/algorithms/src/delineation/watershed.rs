//! Marker-controlled watershed crown delineation
//!
//! Treats the inverted CHM as a topographic surface with the tree tops as
//! flood sources. Pixels are flooded outward in order of decreasing canopy
//! height (a max-heap worklist, never recursion); each pixel joins the
//! basin of whichever seed reaches it first. Pixels below `th_tree` are
//! background and are never flooded. Ordering ties are broken by tree id,
//! then by insertion sequence, so the partition is fully deterministic.

use super::{DelineationParams, Seed};
use crownseg_core::GridSurface;
use ndarray::Array2;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const NEIGHBORS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Flooding worklist entry. Max-heap: highest canopy pixel first, ties to
/// the lower tree id, then the earlier insertion.
#[derive(Debug)]
struct FloodItem {
    height: f64,
    id: u32,
    row: usize,
    col: usize,
    seq: u64,
}

impl PartialEq for FloodItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for FloodItem {}

impl PartialOrd for FloodItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloodItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.height
            .partial_cmp(&other.height)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.id.cmp(&self.id))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub(crate) fn flood(
    chm: &GridSurface<f64>,
    seeds: &[Seed],
    params: &DelineationParams,
) -> Array2<u32> {
    let (rows, cols) = chm.shape();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut heap: BinaryHeap<FloodItem> = BinaryHeap::with_capacity(seeds.len());
    let mut seq: u64 = 0;

    for seed in seeds {
        labels[(seed.row, seed.col)] = seed.id;
        heap.push(FloodItem {
            height: seed.height,
            id: seed.id,
            row: seed.row,
            col: seed.col,
            seq,
        });
        seq += 1;
    }

    while let Some(item) = heap.pop() {
        for (dr, dc) in NEIGHBORS {
            let nr = item.row as isize + dr;
            let nc = item.col as isize + dc;
            if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if labels[(nr, nc)] != 0 {
                continue;
            }

            let h = unsafe { chm.get_unchecked(nr, nc) };
            if !h.is_finite() || h < params.th_tree {
                continue;
            }

            labels[(nr, nc)] = item.id;
            heap.push(FloodItem {
                height: h,
                id: item.id,
                row: nr,
                col: nc,
                seq,
            });
            seq += 1;
        }
    }

    labels
}
