//! Weighted 26-neighbourhood masks for raster-scan propagation

use itertools::iproduct;
use levelcrate_core::GridGeometry;

/// Neighbour offsets `[dx, dy, dz]` with their physical step lengths
#[derive(Debug, Clone)]
pub struct Neighborhood {
    steps: Vec<([i32; 3], f32)>,
}

impl Neighborhood {
    /// All 26 neighbours
    pub fn full(geometry: &GridGeometry) -> Self {
        Self::from_filter(geometry, |_| true)
    }

    /// Neighbours visited before the centre in a forward raster scan
    pub fn causal(geometry: &GridGeometry) -> Self {
        Self::from_filter(geometry, |[dx, dy, dz]| (dz, dy, dx) < (0, 0, 0))
    }

    /// Neighbours visited before the centre in a backward raster scan
    pub fn anti_causal(geometry: &GridGeometry) -> Self {
        Self::from_filter(geometry, |[dx, dy, dz]| (dz, dy, dx) > (0, 0, 0))
    }

    fn from_filter<F>(geometry: &GridGeometry, keep: F) -> Self
    where
        F: Fn([i32; 3]) -> bool,
    {
        let spacing = geometry.spacing();
        let steps = iproduct!(-1i32..=1, -1i32..=1, -1i32..=1)
            .map(|(dz, dy, dx)| [dx, dy, dz])
            .filter(|&o| o != [0, 0, 0] && keep(o))
            // a planar grid has no neighbours across z
            .filter(|o| o[2] == 0 || !geometry.is_planar())
            .map(|o| {
                let step = nalgebra::Vector3::new(
                    o[0] as f32 * spacing.x,
                    o[1] as f32 * spacing.y,
                    o[2] as f32 * spacing.z,
                );
                (o, step.norm())
            })
            .collect();
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// In-range neighbours of `coords` as `(index, step length)`
    pub fn around<'a>(
        &'a self,
        geometry: &'a GridGeometry,
        coords: [usize; 3],
    ) -> impl Iterator<Item = (usize, f32)> + 'a {
        self.steps.iter().filter_map(move |&(o, w)| {
            geometry
                .checked_index(
                    coords[0] as i64 + o[0] as i64,
                    coords[1] as i64 + o[1] as i64,
                    coords[2] as i64 + o[2] as i64,
                )
                .map(|n| (n, w))
        })
    }
}
