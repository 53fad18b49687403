//! Region-growing crown delineation
//!
//! Grows every crown outward from its seed in synchronous rounds over a
//! 4-connected worklist (no recursion, so raster size never threatens the
//! stack). A pixel is eligible for a tree when it clears the global
//! `th_tree` floor and a height threshold that relaxes linearly from
//! `th_seed` of the top height at the seed to `th_crown` at the `max_crown`
//! radius. When two crowns claim a pixel in the same round, the tree whose
//! expected profile is closest to the pixel's height wins; exact ties go to
//! the lower tree id. Resolving claims per round by value makes the result
//! independent of worklist order.

use super::{DelineationParams, Seed};
use crownseg_core::GridSurface;
use ndarray::Array2;
use std::collections::{BTreeMap, HashMap};

const NEIGHBORS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Pixels taller than the seed by more than this factor belong to another
/// tree even when unclaimed.
const OVERSHOOT: f64 = 1.05;

pub(crate) fn grow(
    chm: &GridSurface<f64>,
    seeds: &[Seed],
    params: &DelineationParams,
) -> Array2<u32> {
    let (rows, cols) = chm.shape();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let max_crown_px = (params.max_crown / chm.cell_size()).max(1.0);

    let seed_by_id: HashMap<u32, &Seed> = seeds.iter().map(|s| (s.id, s)).collect();

    let mut frontier: Vec<(usize, usize)> = Vec::with_capacity(seeds.len());
    for seed in seeds {
        labels[(seed.row, seed.col)] = seed.id;
        frontier.push((seed.row, seed.col));
    }

    while !frontier.is_empty() {
        // Candidate pixel -> best (profile distance, id) claim this round
        let mut claims: BTreeMap<(usize, usize), (f64, u32)> = BTreeMap::new();

        for &(row, col) in &frontier {
            let id = labels[(row, col)];
            let seed = seed_by_id[&id];
            if seed.height <= 0.0 {
                continue;
            }

            for (dr, dc) in NEIGHBORS {
                let nr = row as isize + dr;
                let nc = col as isize + dc;
                if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                    continue;
                }
                let (nr, nc) = (nr as usize, nc as usize);
                if labels[(nr, nc)] != 0 {
                    continue;
                }

                let h = unsafe { chm.get_unchecked(nr, nc) };
                if !h.is_finite() || h < params.th_tree || h > seed.height * OVERSHOOT {
                    continue;
                }

                let d = distance_px((nr, nc), (seed.row, seed.col));
                if d > max_crown_px {
                    continue;
                }

                let expected = expected_height(seed.height, d, max_crown_px, params);
                if h < expected {
                    continue;
                }

                let score = (h - expected).abs();
                claims
                    .entry((nr, nc))
                    .and_modify(|best| {
                        if score < best.0 || (score == best.0 && id < best.1) {
                            *best = (score, id);
                        }
                    })
                    .or_insert((score, id));
            }
        }

        frontier.clear();
        for ((row, col), (_, id)) in claims {
            labels[(row, col)] = id;
            frontier.push((row, col));
        }
    }

    labels
}

/// Height required at distance `d` from the seed: th_seed of the top
/// height at the seed, relaxing linearly to th_crown at max_crown.
fn expected_height(top_height: f64, d: f64, max_crown_px: f64, params: &DelineationParams) -> f64 {
    let frac = params.th_seed + (params.th_crown - params.th_seed) * (d / max_crown_px);
    frac * top_height
}

fn distance_px(a: (usize, usize), b: (usize, usize)) -> f64 {
    let dr = a.0 as f64 - b.0 as f64;
    let dc = a.1 as f64 - b.1 as f64;
    (dr * dr + dc * dc).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delineation::{delineate, CrownAlgorithm};
    use crownseg_core::{TreeSet, TreeTop};

    fn gaussian_chm(size: usize, peaks: &[(usize, usize, f64)], sigma2: f64) -> GridSurface<f64> {
        let mut chm = GridSurface::filled(size, size, 0.0);
        for r in 0..size {
            for c in 0..size {
                let mut v: f64 = 0.0;
                for &(pr, pc, ph) in peaks {
                    let d2 = (r as f64 - pr as f64).powi(2) + (c as f64 - pc as f64).powi(2);
                    v = v.max(ph * (-d2 / (2.0 * sigma2)).exp());
                }
                chm.set(r, c, v).unwrap();
            }
        }
        chm
    }

    fn tops(pixels: &[(usize, usize)]) -> TreeSet {
        let mut ts = TreeSet::new();
        for (i, &(r, c)) in pixels.iter().enumerate() {
            ts.insert_top(TreeTop::new(i as u32 + 1, r, c));
        }
        ts
    }

    #[test]
    fn test_single_bump_crown() {
        let chm = gaussian_chm(10, &[(5, 5, 20.0)], 4.0);
        let params = DelineationParams {
            th_tree: 11.0,
            th_seed: 0.5,
            th_crown: 0.4,
            max_crown: 3.0,
            ..Default::default()
        };
        let ts = delineate(tops(&[(5, 5)]), &chm, CrownAlgorithm::RegionGrowing, &params).unwrap();

        let crown = ts.get(1).unwrap().crown.as_ref().unwrap();
        assert!(crown.contains_pixel((5, 5)));
        assert!(crown.mask.len() > 1);
        for &(r, c) in &crown.mask {
            assert!(
                chm.get(r, c).unwrap() >= 11.0,
                "pixel ({r}, {c}) below th_tree in crown"
            );
        }
    }

    #[test]
    fn test_two_crowns_disjoint() {
        let chm = gaussian_chm(16, &[(7, 4, 18.0), (7, 10, 18.0)], 4.0);
        let params = DelineationParams {
            th_tree: 5.0,
            th_seed: 0.6,
            th_crown: 0.3,
            max_crown: 4.0,
            ..Default::default()
        };
        let ts = delineate(
            tops(&[(7, 4), (7, 10)]),
            &chm,
            CrownAlgorithm::RegionGrowing,
            &params,
        )
        .unwrap();

        let a = ts.get(1).unwrap().crown.as_ref().unwrap();
        let b = ts.get(2).unwrap().crown.as_ref().unwrap();
        assert!(a.contains_pixel((7, 4)));
        assert!(b.contains_pixel((7, 10)));
        for px in &a.mask {
            assert!(!b.mask.contains(px), "pixel {px:?} in both crowns");
        }
    }

    #[test]
    fn test_max_crown_bounds_radius() {
        let chm = GridSurface::filled(21, 21, 15.0);
        let seeds = [Seed {
            id: 1,
            row: 10,
            col: 10,
            height: 15.0,
        }];
        let params = DelineationParams {
            th_tree: 2.0,
            th_seed: 0.5,
            th_crown: 0.5,
            max_crown: 3.0,
            ..Default::default()
        };
        let labels = grow(&chm, &seeds, &params);
        for ((r, c), &label) in labels.indexed_iter() {
            if label != 0 {
                assert!(distance_px((r, c), (10, 10)) <= 3.0);
            }
        }
    }

    #[test]
    fn test_competing_claim_prefers_matching_profile() {
        // Tall and short tree two cells apart on a flat canopy shelf at the
        // short tree's height: the shelf matches the short tree's profile.
        let mut chm = GridSurface::filled(9, 9, 8.0);
        chm.set(4, 2, 20.0).unwrap();
        chm.set(4, 6, 9.0).unwrap();
        let params = DelineationParams {
            th_tree: 5.0,
            th_seed: 0.8,
            th_crown: 0.3,
            max_crown: 4.0,
            ..Default::default()
        };
        let ts = delineate(
            tops(&[(4, 2), (4, 6)]),
            &chm,
            CrownAlgorithm::RegionGrowing,
            &params,
        )
        .unwrap();

        // The midpoint pixel is reachable by both; the short tree's
        // expected profile (fractions of 9) sits closer to 8 than the tall
        // tree's (fractions of 20).
        let b = ts.get(2).unwrap().crown.as_ref().unwrap();
        assert!(b.contains_pixel((4, 4)), "midpoint not won by closer profile");
    }
}
