//! Scalar volumes and vector fields over a [`GridGeometry`]

use crate::{Error, GridGeometry, Result};
use nalgebra::Vector3;
use ndarray::{Array3, ArrayView3};

/// Flat scalar buffer laid out on a grid
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T> {
    geometry: GridGeometry,
    data: Vec<T>,
}

impl<T: Copy> Volume<T> {
    /// Wrap a buffer; its length must match the grid
    pub fn new(geometry: GridGeometry, data: Vec<T>) -> Result<Self> {
        if data.len() != geometry.len() {
            return Err(Error::InvalidData(format!(
                "Buffer holds {} values but grid {:?} needs {}",
                data.len(),
                geometry.dims(),
                geometry.len()
            )));
        }
        Ok(Self { geometry, data })
    }

    pub fn filled(geometry: GridGeometry, value: T) -> Self {
        Self {
            geometry,
            data: vec![value; geometry.len()],
        }
    }

    /// Build a volume by evaluating `f` at every voxel coordinate
    pub fn from_fn<F>(geometry: GridGeometry, mut f: F) -> Self
    where
        F: FnMut([usize; 3]) -> T,
    {
        let data = (0..geometry.len()).map(|i| f(geometry.coords(i))).collect();
        Self { geometry, data }
    }

    /// Convert an array indexed `[z, y, x]`
    pub fn from_array(array: Array3<T>, spacing: Vector3<f32>) -> Result<Self> {
        let (tz, ty, tx) = array.dim();
        let geometry = GridGeometry::new([tx, ty, tz], spacing)?;
        let data = array.iter().copied().collect();
        Ok(Self { geometry, data })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn dims(&self) -> [usize; 3] {
        self.geometry.dims()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Value at grid coordinates (with bounds checking)
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<T> {
        let [tx, ty, tz] = self.geometry.dims();
        if x < tx && y < ty && z < tz {
            Some(self.data[self.geometry.index(x, y, z)])
        } else {
            None
        }
    }

    /// Set value at grid coordinates
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: T) -> Result<()> {
        let [tx, ty, tz] = self.geometry.dims();
        if x < tx && y < ty && z < tz {
            let index = self.geometry.index(x, y, z);
            self.data[index] = value;
            Ok(())
        } else {
            Err(Error::InvalidData(format!(
                "Grid coordinates ({}, {}, {}) out of bounds for dimensions {:?}",
                x,
                y,
                z,
                self.geometry.dims()
            )))
        }
    }

    /// Borrow as an ndarray view indexed `[z, y, x]`
    pub fn view(&self) -> Result<ArrayView3<'_, T>> {
        let [tx, ty, tz] = self.geometry.dims();
        ArrayView3::from_shape((tz, ty, tx), &self.data)
            .map_err(|e| Error::InvalidData(format!("Volume layout mismatch: {}", e)))
    }

    /// Copy out the z-slice `z` as a planar volume
    pub fn slice(&self, z: usize) -> Result<Self> {
        if z >= self.geometry.tz() {
            return Err(Error::InvalidConfiguration(format!(
                "Slice {} out of range for {} slices",
                z,
                self.geometry.tz()
            )));
        }
        let txy = self.geometry.txy();
        Ok(Self {
            geometry: self.geometry.slice_geometry(),
            data: self.data[z * txy..(z + 1) * txy].to_vec(),
        })
    }

    pub fn map<U, F>(&self, f: F) -> Volume<U>
    where
        F: FnMut(&T) -> U,
    {
        Volume {
            geometry: self.geometry,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Replace the geometry (same dimensions, e.g. forced unit spacing)
    pub fn with_geometry(mut self, geometry: GridGeometry) -> Result<Self> {
        self.geometry.ensure_same_dims("volume", geometry.dims())?;
        self.geometry = geometry;
        Ok(self)
    }
}

impl Volume<f32> {
    /// Smallest and largest finite values
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Linearly map the value range onto `[lo, hi]`
    pub fn rescaled(&self, lo: f32, hi: f32) -> Self {
        match self.min_max() {
            Some((min, max)) if max > min => {
                let scale = (hi - lo) / (max - min);
                self.map(|&v| lo + (v - min) * scale)
            }
            _ => self.clone(),
        }
    }
}

/// Per-voxel 3-vector field (advection or external velocity)
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    geometry: GridGeometry,
    data: Vec<Vector3<f32>>,
}

impl VectorField {
    pub fn new(geometry: GridGeometry, data: Vec<Vector3<f32>>) -> Result<Self> {
        if data.len() != geometry.len() {
            return Err(Error::InvalidData(format!(
                "Vector field holds {} vectors but grid {:?} needs {}",
                data.len(),
                geometry.dims(),
                geometry.len()
            )));
        }
        Ok(Self { geometry, data })
    }

    pub fn from_fn<F>(geometry: GridGeometry, mut f: F) -> Self
    where
        F: FnMut([usize; 3]) -> Vector3<f32>,
    {
        let data = (0..geometry.len()).map(|i| f(geometry.coords(i))).collect();
        Self { geometry, data }
    }

    /// Build from three component volumes sharing one grid
    pub fn from_components(x: &Volume<f32>, y: &Volume<f32>, z: &Volume<f32>) -> Result<Self> {
        let geometry = *x.geometry();
        geometry.ensure_same_dims("vector y component", y.dims())?;
        geometry.ensure_same_dims("vector z component", z.dims())?;
        let data = itertools::izip!(x.as_slice(), y.as_slice(), z.as_slice())
            .map(|(&a, &b, &c)| Vector3::new(a, b, c))
            .collect();
        Ok(Self { geometry, data })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn dims(&self) -> [usize; 3] {
        self.geometry.dims()
    }

    #[inline]
    pub fn at(&self, index: usize) -> Vector3<f32> {
        self.data[index]
    }

    pub fn as_slice(&self) -> &[Vector3<f32>] {
        &self.data
    }

    pub fn slice(&self, z: usize) -> Result<Self> {
        if z >= self.geometry.tz() {
            return Err(Error::InvalidConfiguration(format!(
                "Slice {} out of range for {} slices",
                z,
                self.geometry.tz()
            )));
        }
        let txy = self.geometry.txy();
        Ok(Self {
            geometry: self.geometry.slice_geometry(),
            data: self.data[z * txy..(z + 1) * txy].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> GridGeometry {
        GridGeometry::isotropic([4, 3, 2]).unwrap()
    }

    #[test]
    fn test_volume_creation() {
        assert!(Volume::new(grid(), vec![0.0f32; 24]).is_ok());
        assert!(Volume::new(grid(), vec![0.0f32; 23]).is_err());
    }

    #[test]
    fn test_value_operations() {
        let mut volume = Volume::filled(grid(), 0.0f32);
        volume.set(3, 2, 1, 5.0).unwrap();
        assert_eq!(volume.get(3, 2, 1), Some(5.0));
        assert_eq!(volume.get(4, 0, 0), None);
        assert!(volume.set(0, 3, 0, 1.0).is_err());
    }

    #[test]
    fn test_ndarray_interop() {
        let volume = Volume::from_fn(grid(), |[x, y, z]| (x + 10 * y + 100 * z) as f32);
        let view = volume.view().unwrap();
        assert_eq!(view.dim(), (2, 3, 4));
        assert_relative_eq!(view[[1, 2, 3]], 123.0);

        let back = Volume::from_array(view.to_owned(), grid().spacing()).unwrap();
        assert_eq!(back, volume);
    }

    #[test]
    fn test_slice_extraction() {
        let volume = Volume::from_fn(grid(), |[x, _, z]| (x + 10 * z) as f32);
        let slice = volume.slice(1).unwrap();
        assert_eq!(slice.dims(), [4, 3, 1]);
        assert_eq!(slice.get(2, 1, 0), Some(12.0));
        assert!(volume.slice(2).is_err());
    }

    #[test]
    fn test_rescale() {
        let volume = Volume::from_fn(grid(), |[x, _, _]| x as f32 * 2.0 - 1.0);
        let rescaled = volume.rescaled(0.0, 255.0);
        let (lo, hi) = rescaled.min_max().unwrap();
        assert_relative_eq!(lo, 0.0);
        assert_relative_eq!(hi, 255.0);

        let flat = Volume::filled(grid(), 3.0f32);
        assert_eq!(flat.rescaled(0.0, 255.0), flat);
    }

    #[test]
    fn test_vector_field_components() {
        let x = Volume::filled(grid(), 1.0f32);
        let y = Volume::filled(grid(), 2.0f32);
        let z = Volume::filled(grid(), 3.0f32);
        let field = VectorField::from_components(&x, &y, &z).unwrap();
        assert_relative_eq!(field.at(5).z, 3.0);

        let short = Volume::filled(GridGeometry::isotropic([4, 3, 1]).unwrap(), 0.0f32);
        assert!(VectorField::from_components(&x, &short, &z).is_err());
    }
}
