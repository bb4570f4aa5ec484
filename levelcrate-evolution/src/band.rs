//! Narrow band bookkeeping
//!
//! The band holds every voxel with `|u| < half_width`. Inside it, voxels with
//! `|u| < tube` form the inner tube; when the front crosses a voxel that
//! started outside the tube, the band has to be rebuilt before the front
//! leaves it.

use levelcrate_core::GridGeometry;
use log::debug;

pub const OUTSIDE: u8 = 0;
pub const IN_BAND: u8 = 1;
pub const IN_TUBE: u8 = 2;

/// Voxels currently evolved, with the values they had at the last rebuild
#[derive(Debug, Clone, Default)]
pub struct NarrowBand {
    indices: Vec<usize>,
    initial_values: Vec<f32>,
    flags: Vec<u8>,
    max_size: usize,
    half_width: f32,
    tube: f32,
}

impl NarrowBand {
    /// First band of an evolution; widths are physical distances
    pub fn build(geometry: &GridGeometry, u: &[f32], half_width: f32, tube: f32) -> Self {
        let mut band = Self {
            indices: Vec::new(),
            initial_values: Vec::new(),
            flags: vec![OUTSIDE; geometry.len()],
            max_size: 0,
            half_width,
            tube,
        };
        band.rebuild(u);
        band
    }

    /// Recollect the band around the current zero level set
    pub fn rebuild(&mut self, u: &[f32]) {
        for &i in &self.indices {
            self.flags[i] = OUTSIDE;
        }
        self.indices.clear();
        self.initial_values.clear();

        for (i, &v) in u.iter().enumerate() {
            let magnitude = v.abs();
            if magnitude < self.half_width {
                self.indices.push(i);
                self.initial_values.push(v);
                self.flags[i] = if magnitude < self.tube { IN_TUBE } else { IN_BAND };
            }
        }
        self.resize_band(self.indices.len());
    }

    /// Track the capacity high-water mark
    fn resize_band(&mut self, size: usize) {
        if size > self.max_size {
            debug!("band capacity grows from {} to {} voxels", self.max_size, size);
            self.max_size = size;
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Values at the last rebuild, aligned with [`NarrowBand::indices`]
    pub fn initial_values(&self) -> &[f32] {
        &self.initial_values
    }

    pub fn flag(&self, index: usize) -> u8 {
        self.flags[index]
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Largest band seen so far
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn half_width(&self) -> f32 {
        self.half_width
    }

    pub fn tube(&self) -> f32 {
        self.tube
    }

    /// Grid coordinates of the band voxels
    pub fn coordinates(&self, geometry: &GridGeometry) -> Vec<[usize; 3]> {
        self.indices.iter().map(|&i| geometry.coords(i)).collect()
    }
}
