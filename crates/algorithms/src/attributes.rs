//! Per-tree height/elevation computation and small-tree screening

use crownseg_core::{Error, GridSurface, Location, Result, ScreeningReport, TreeSet};

/// Compute height and ground elevation for every tree at one location
/// variant.
///
/// Height is the CHM value at the tree-top pixel, falling back to
/// DSM − DTM where the CHM has no data; elevation is the DTM value.
/// Recomputing with the same inputs yields the same attributes.
pub fn compute_height(
    mut tree_set: TreeSet,
    location: Location,
    chm: &GridSurface<f64>,
    dsm: &GridSurface<f64>,
    dtm: &GridSurface<f64>,
) -> Result<TreeSet> {
    chm.ensure_aligned_with(dsm, "chm vs dsm")?;
    chm.ensure_aligned_with(dtm, "chm vs dtm")?;

    let (rows, cols) = chm.shape();

    for (id, rec) in tree_set.iter_mut() {
        let (row, col) = rec.top.pixel_at(location);
        if row >= rows || col >= cols {
            return Err(Error::GridMismatch(format!(
                "tree {id} {} pixel ({row}, {col}) lies outside the surfaces",
                location.key()
            )));
        }

        let canopy = unsafe { chm.get_unchecked(row, col) };
        let ground = unsafe { dtm.get_unchecked(row, col) };
        let surface = unsafe { dsm.get_unchecked(row, col) };

        let height = if canopy.is_finite() {
            canopy
        } else {
            surface - ground
        };

        let attrs = rec.top.attrs_mut(location);
        attrs.height = height.is_finite().then_some(height);
        attrs.elevation = ground.is_finite().then_some(ground);
    }

    Ok(tree_set)
}

/// Remove every tree whose height at the given location variant is below
/// `hmin`. The removed tree's crown goes with it, and every removed id is
/// listed in the report.
///
/// # Errors
/// Heights must have been computed for the variant first.
pub fn screen(
    mut tree_set: TreeSet,
    hmin: f64,
    location: Location,
) -> Result<(TreeSet, ScreeningReport)> {
    let examined = tree_set.len();
    let mut removed = Vec::new();

    for id in tree_set.ids() {
        let height = tree_set
            .get(id)
            .and_then(|rec| rec.top.attrs(location).height)
            .ok_or_else(|| {
                Error::Other(format!(
                    "height at '{}' not computed for tree {id}",
                    location.key()
                ))
            })?;

        if height < hmin {
            tree_set.remove(id);
            removed.push(id);
        }
    }

    let report = ScreeningReport {
        examined,
        kept: tree_set.len(),
        removed,
    };
    Ok((tree_set, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crownseg_core::{Crown, TreeTop};

    fn surfaces() -> (GridSurface<f64>, GridSurface<f64>, GridSurface<f64>) {
        let mut chm = GridSurface::filled(6, 6, 0.0);
        let mut dsm = GridSurface::filled(6, 6, 100.0);
        let dtm = GridSurface::filled(6, 6, 100.0);
        chm.set(2, 2, 14.0).unwrap();
        chm.set(4, 4, 1.5).unwrap();
        dsm.set(2, 2, 114.0).unwrap();
        dsm.set(4, 4, 101.5).unwrap();
        (chm, dsm, dtm)
    }

    fn two_trees() -> TreeSet {
        let mut ts = TreeSet::new();
        ts.insert_top(TreeTop::new(1, 2, 2));
        ts.insert_top(TreeTop::new(2, 4, 4));
        ts.set_crown(1, Crown::from_mask(vec![(2, 2)])).unwrap();
        ts.set_crown(2, Crown::from_mask(vec![(4, 4)])).unwrap();
        ts
    }

    #[test]
    fn test_height_from_chm_and_elevation_from_dtm() {
        let (chm, dsm, dtm) = surfaces();
        let ts = compute_height(two_trees(), Location::Top, &chm, &dsm, &dtm).unwrap();
        let attrs = ts.get(1).unwrap().top.attrs(Location::Top);
        assert_eq!(attrs.height, Some(14.0));
        assert_eq!(attrs.elevation, Some(100.0));
    }

    #[test]
    fn test_nan_chm_falls_back_to_dsm_minus_dtm() {
        let (mut chm, dsm, dtm) = surfaces();
        chm.set(2, 2, f64::NAN).unwrap();
        let ts = compute_height(two_trees(), Location::Top, &chm, &dsm, &dtm).unwrap();
        assert_eq!(
            ts.get(1).unwrap().top.attrs(Location::Top).height,
            Some(14.0)
        );
    }

    #[test]
    fn test_idempotent() {
        let (chm, dsm, dtm) = surfaces();
        let ts = compute_height(two_trees(), Location::Top, &chm, &dsm, &dtm).unwrap();
        let ts = compute_height(ts, Location::Top, &chm, &dsm, &dtm).unwrap();
        assert_eq!(
            ts.get(1).unwrap().top.attrs(Location::Top).height,
            Some(14.0)
        );
    }

    #[test]
    fn test_corrected_location_used() {
        let (mut chm, dsm, dtm) = surfaces();
        chm.set(3, 3, 9.0).unwrap();
        let mut ts = two_trees();
        ts.get_mut(1).unwrap().top.pixel_cor = Some((3, 3));
        let ts = compute_height(ts, Location::TopCor, &chm, &dsm, &dtm).unwrap();
        assert_eq!(
            ts.get(1).unwrap().top.attrs(Location::TopCor).height,
            Some(9.0)
        );
        // Raw attributes untouched
        assert_eq!(ts.get(1).unwrap().top.attrs(Location::Top).height, None);
    }

    #[test]
    fn test_screening_removes_small_trees_and_crowns() {
        let (chm, dsm, dtm) = surfaces();
        let ts = compute_height(two_trees(), Location::Top, &chm, &dsm, &dtm).unwrap();
        let (ts, report) = screen(ts, 2.0, Location::Top).unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.kept, 1);
        assert_eq!(report.removed, vec![2]);
        assert!(ts.get(2).is_none());
        assert!(ts.get(1).unwrap().crown.is_some());
    }

    #[test]
    fn test_screening_keeps_tall_trees() {
        let (chm, dsm, dtm) = surfaces();
        let ts = compute_height(two_trees(), Location::Top, &chm, &dsm, &dtm).unwrap();
        let (ts, report) = screen(ts, 0.5, Location::Top).unwrap();
        assert_eq!(ts.len(), 2);
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_screening_requires_heights() {
        let result = screen(two_trees(), 2.0, Location::Top);
        assert!(result.is_err());
    }
}
