//! Superpixel crown delineation
//!
//! Two phases: the CHM is first partitioned into compact superpixels by a
//! SLIC-style local clustering on height and pixel position, then each
//! superpixel is attributed to the tree top whose height best matches the
//! superpixel's mean height, subject to the `th_crown` height fraction and
//! the `max_crown` radius. Superpixels that reach no tree top stay
//! background, as do individual pixels below `th_tree`. Cluster scan order
//! and strict-improvement updates keep the labeling deterministic.

use super::{DelineationParams, Seed};
use crownseg_core::GridSurface;
use ndarray::Array2;

/// Height tolerance (map units) balancing spectral vs. spatial distance,
/// the `m` of SLIC.
const COMPACTNESS: f64 = 2.0;

#[derive(Debug, Clone, Copy)]
struct Center {
    row: f64,
    col: f64,
    height: f64,
}

pub(crate) fn segment(
    chm: &GridSurface<f64>,
    seeds: &[Seed],
    params: &DelineationParams,
) -> Array2<u32> {
    let (rows, cols) = chm.shape();
    let n = params.n_segments.max(1);
    let step = ((rows * cols) as f64 / n as f64).sqrt().max(1.0);

    let mut centers = seed_centers(chm, step);
    let mut cluster = Array2::<i32>::from_elem((rows, cols), -1);

    for _ in 0..params.iterations.max(1) {
        assign_pixels(chm, &centers, step, &mut cluster);
        update_centers(chm, &cluster, &mut centers);
    }

    merge_into_crowns(chm, &cluster, centers.len(), seeds, params)
}

/// Place initial cluster centers on a regular grid, skipping NaN cells
fn seed_centers(chm: &GridSurface<f64>, step: f64) -> Vec<Center> {
    let (rows, cols) = chm.shape();
    let mut centers = Vec::new();

    let mut row = step / 2.0;
    while row < rows as f64 {
        let mut col = step / 2.0;
        while col < cols as f64 {
            let (r, c) = (row as usize, col as usize);
            let h = unsafe { chm.get_unchecked(r, c) };
            if h.is_finite() {
                centers.push(Center {
                    row,
                    col,
                    height: h,
                });
            }
            col += step;
        }
        row += step;
    }

    centers
}

/// Assign every finite pixel to the best center within its 2S x 2S search
/// region. Strict-improvement updates keep ties with the lowest cluster
/// index.
fn assign_pixels(chm: &GridSurface<f64>, centers: &[Center], step: f64, cluster: &mut Array2<i32>) {
    let (rows, cols) = chm.shape();
    let mut dist = Array2::<f64>::from_elem((rows, cols), f64::INFINITY);
    cluster.fill(-1);

    let reach = step.ceil() as isize;

    for (k, center) in centers.iter().enumerate() {
        let cr = center.row.round() as isize;
        let cc = center.col.round() as isize;

        for r in (cr - reach).max(0)..=(cr + reach).min(rows as isize - 1) {
            for c in (cc - reach).max(0)..=(cc + reach).min(cols as isize - 1) {
                let (r, c) = (r as usize, c as usize);
                let h = unsafe { chm.get_unchecked(r, c) };
                if !h.is_finite() {
                    continue;
                }

                let dh = (h - center.height) / COMPACTNESS;
                let dr = (r as f64 - center.row) / step;
                let dc = (c as f64 - center.col) / step;
                let d2 = dh * dh + dr * dr + dc * dc;

                if d2 < dist[(r, c)] {
                    dist[(r, c)] = d2;
                    cluster[(r, c)] = k as i32;
                }
            }
        }
    }
}

/// Move each center to the mean position and height of its pixels
fn update_centers(chm: &GridSurface<f64>, cluster: &Array2<i32>, centers: &mut [Center]) {
    let mut sums = vec![(0.0_f64, 0.0_f64, 0.0_f64, 0_usize); centers.len()];

    for ((r, c), &k) in cluster.indexed_iter() {
        if k < 0 {
            continue;
        }
        let h = unsafe { chm.get_unchecked(r, c) };
        let entry = &mut sums[k as usize];
        entry.0 += r as f64;
        entry.1 += c as f64;
        entry.2 += h;
        entry.3 += 1;
    }

    for (center, (sr, sc, sh, count)) in centers.iter_mut().zip(sums) {
        if count > 0 {
            center.row = sr / count as f64;
            center.col = sc / count as f64;
            center.height = sh / count as f64;
        }
    }
}

/// Attribute superpixels to tree tops by best height match.
fn merge_into_crowns(
    chm: &GridSurface<f64>,
    cluster: &Array2<i32>,
    n_clusters: usize,
    seeds: &[Seed],
    params: &DelineationParams,
) -> Array2<u32> {
    let (rows, cols) = chm.shape();
    let max_crown_px = (params.max_crown / chm.cell_size()).max(1.0);

    // Per-cluster centroid and mean height
    let mut sums = vec![(0.0_f64, 0.0_f64, 0.0_f64, 0_usize); n_clusters];
    for ((r, c), &k) in cluster.indexed_iter() {
        if k < 0 {
            continue;
        }
        let h = unsafe { chm.get_unchecked(r, c) };
        let entry = &mut sums[k as usize];
        entry.0 += r as f64;
        entry.1 += c as f64;
        entry.2 += h;
        entry.3 += 1;
    }

    // Cluster -> tree id (0 = background)
    let owner: Vec<u32> = sums
        .iter()
        .map(|&(sr, sc, sh, count)| {
            if count == 0 {
                return 0;
            }
            let centroid = (sr / count as f64, sc / count as f64);
            let mean_h = sh / count as f64;
            if mean_h < params.th_tree {
                return 0;
            }

            let mut best: Option<(f64, u32)> = None;
            for seed in seeds {
                if seed.height <= 0.0 || mean_h < params.th_crown * seed.height {
                    continue;
                }
                let dr = centroid.0 - seed.row as f64;
                let dc = centroid.1 - seed.col as f64;
                if (dr * dr + dc * dc).sqrt() > max_crown_px {
                    continue;
                }
                let diff = (seed.height - mean_h).abs();
                let better = match best {
                    None => true,
                    Some((bd, bid)) => diff < bd || (diff == bd && seed.id < bid),
                };
                if better {
                    best = Some((diff, seed.id));
                }
            }
            best.map_or(0, |(_, id)| id)
        })
        .collect();

    let mut labels = Array2::<u32>::zeros((rows, cols));
    for ((r, c), &k) in cluster.indexed_iter() {
        if k < 0 {
            continue;
        }
        let id = owner[k as usize];
        if id == 0 {
            continue;
        }
        let h = unsafe { chm.get_unchecked(r, c) };
        if h.is_finite() && h >= params.th_tree {
            labels[(r, c)] = id;
        }
    }

    // A crown always contains its own top pixel, whatever the clustering did
    for seed in seeds {
        labels[(seed.row, seed.col)] = seed.id;
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delineation::{delineate, CrownAlgorithm};
    use crownseg_core::{TreeSet, TreeTop};

    fn gaussian_chm(size: usize, peaks: &[(usize, usize, f64)]) -> GridSurface<f64> {
        let mut chm = GridSurface::filled(size, size, 0.0);
        for r in 0..size {
            for c in 0..size {
                let mut v: f64 = 0.0;
                for &(pr, pc, ph) in peaks {
                    let d2 = (r as f64 - pr as f64).powi(2) + (c as f64 - pc as f64).powi(2);
                    v = v.max(ph * (-d2 / 8.0).exp());
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

    fn params() -> DelineationParams {
        DelineationParams {
            th_tree: 11.0,
            th_seed: 0.5,
            th_crown: 0.4,
            max_crown: 3.0,
            n_segments: 25,
            iterations: 5,
        }
    }

    #[test]
    fn test_single_bump_crown() {
        let chm = gaussian_chm(10, &[(5, 5, 20.0)]);
        let ts = delineate(tops(&[(5, 5)]), &chm, CrownAlgorithm::Superpixel, &params()).unwrap();

        let crown = ts.get(1).unwrap().crown.as_ref().unwrap();
        assert!(crown.contains_pixel((5, 5)));
        for &(r, c) in &crown.mask {
            if (r, c) == (5, 5) {
                continue;
            }
            assert!(chm.get(r, c).unwrap() >= 11.0);
        }
    }

    #[test]
    fn test_crowns_disjoint_and_own_tops() {
        let chm = gaussian_chm(20, &[(9, 5, 18.0), (9, 13, 16.0)]);
        let p = DelineationParams {
            th_tree: 5.0,
            max_crown: 4.0,
            n_segments: 50,
            ..params()
        };
        let ts = delineate(
            tops(&[(9, 5), (9, 13)]),
            &chm,
            CrownAlgorithm::Superpixel,
            &p,
        )
        .unwrap();

        let a = ts.get(1).unwrap().crown.as_ref().unwrap();
        let b = ts.get(2).unwrap().crown.as_ref().unwrap();
        assert!(a.contains_pixel((9, 5)));
        assert!(b.contains_pixel((9, 13)));
        for px in &a.mask {
            assert!(!b.mask.contains(px));
        }
    }

    #[test]
    fn test_determinism() {
        let chm = gaussian_chm(20, &[(9, 5, 18.0), (9, 13, 16.0)]);
        let p = DelineationParams {
            th_tree: 5.0,
            max_crown: 4.0,
            n_segments: 50,
            ..params()
        };
        let seeds = [
            Seed { id: 1, row: 9, col: 5, height: 18.0 },
            Seed { id: 2, row: 9, col: 13, height: 16.0 },
        ];
        let x = segment(&chm, &seeds, &p);
        let y = segment(&chm, &seeds, &p);
        assert_eq!(x, y);
    }
}
