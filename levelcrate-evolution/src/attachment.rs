//! Image-derived advection fields
//!
//! Vector schemes advect the front along the gradient of the normalised
//! image gradient norm, which points towards edges. The gain maps the
//! `histo_grad_threshold` quantile of the non-zero gradient norms to one.
//! The morphological scheme instead keeps the second derivative along the
//! image gradient and the gradient norm, both scaled to at most one.

use crate::stencil::Stencil;
use levelcrate_core::{AdvectionScheme, Error, GridGeometry, Result, VectorField, Volume};
use log::debug;
use std::borrow::Cow;

/// Second derivative along the gradient and gradient norm of the image
#[derive(Debug, Clone, PartialEq)]
pub struct MorphoField {
    pub secdergrad: Vec<f32>,
    pub normgrad: Vec<f32>,
    /// Largest gradient norm before normalisation
    pub max_normgrad: f32,
    /// Largest |secdergrad| before normalisation
    pub max_secdergrad: f32,
}

impl MorphoField {
    /// Scale both fields into [-1, 1]
    pub fn normalize_sec_der_grad(&mut self) {
        self.max_normgrad = self.normgrad.iter().copied().fold(0.0, f32::max);
        self.max_secdergrad = self.secdergrad.iter().fold(0.0, |m: f32, v| m.max(v.abs()));
        if self.max_normgrad > 0.0 {
            let inv = 1.0 / self.max_normgrad;
            self.normgrad.iter_mut().for_each(|v| *v *= inv);
        }
        if self.max_secdergrad > 0.0 {
            let inv = 1.0 / self.max_secdergrad;
            self.secdergrad.iter_mut().for_each(|v| *v *= inv);
        }
    }
}

/// Advection data used by the force evaluator
#[derive(Debug, Clone)]
pub enum DataAttachment<'a> {
    Vectors(Cow<'a, VectorField>),
    Morpho(MorphoField),
}

impl DataAttachment<'_> {
    pub fn vectors(&self) -> Option<&VectorField> {
        match self {
            DataAttachment::Vectors(field) => Some(field.as_ref()),
            DataAttachment::Morpho(_) => None,
        }
    }

    pub fn morpho(&self) -> Option<&MorphoField> {
        match self {
            DataAttachment::Vectors(_) => None,
            DataAttachment::Morpho(field) => Some(field),
        }
    }
}

/// Build the advection data for `scheme`
///
/// A caller-supplied vector field is used as is; it cannot drive the
/// morphological scheme.
pub fn precompute_data_attachment<'a>(
    scheme: AdvectionScheme,
    image: &Volume<f32>,
    histo_grad_threshold: f32,
    user_field: Option<Cow<'a, VectorField>>,
) -> Result<DataAttachment<'a>> {
    let geometry = image.geometry();
    match (scheme, user_field) {
        (AdvectionScheme::Morpho, Some(_)) => Err(Error::InvalidConfiguration(
            "a user advection field cannot drive the morphological scheme".to_string(),
        )),
        (AdvectionScheme::UpwindVectors | AdvectionScheme::CentralVectors, Some(field)) => {
            geometry.ensure_same_dims("advection field", field.dims())?;
            Ok(DataAttachment::Vectors(field))
        }
        (AdvectionScheme::UpwindVectors | AdvectionScheme::CentralVectors, None) => {
            let field = attachment_vectors(geometry, image.as_slice(), histo_grad_threshold);
            Ok(DataAttachment::Vectors(Cow::Owned(field)))
        }
        (AdvectionScheme::Morpho, None) => {
            let mut field = morpho_field(geometry, image.as_slice());
            field.normalize_sec_der_grad();
            debug!(
                "morphological attachment: max gradient {:.4}, max second derivative {:.4}",
                field.max_normgrad, field.max_secdergrad
            );
            Ok(DataAttachment::Morpho(field))
        }
    }
}

/// Gradient norm of every voxel
pub fn gradient_norm(geometry: &GridGeometry, image: &[f32]) -> Vec<f32> {
    let terms = geometry.spacing_terms();
    (0..geometry.len())
        .map(|i| Stencil::gather(geometry, &terms, image, i).gradient_norm())
        .collect()
}

/// Value below which `fraction` of the non-zero entries fall
pub fn nonzero_quantile(values: &[f32], fraction: f32) -> f32 {
    let mut nonzero: Vec<f32> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if nonzero.is_empty() {
        return 0.0;
    }
    let rank = ((nonzero.len() - 1) as f32 * fraction.clamp(0.0, 1.0)).round() as usize;
    let (_, value, _) = nonzero.select_nth_unstable_by(rank, f32::total_cmp);
    *value
}

fn attachment_vectors(geometry: &GridGeometry, image: &[f32], histo_grad_threshold: f32) -> VectorField {
    let norm = gradient_norm(geometry, image);
    let reference = nonzero_quantile(&norm, histo_grad_threshold);
    let gain = if reference > 0.0 { 1.0 / reference } else { 1.0 };
    debug!(
        "vector attachment: gradient quantile {:.4}, gain {:.4}",
        reference, gain
    );

    let scaled: Vec<f32> = norm.iter().map(|v| v * gain).collect();
    let terms = geometry.spacing_terms();
    VectorField::from_fn(*geometry, |[x, y, z]| {
        Stencil::gather(geometry, &terms, &scaled, geometry.index(x, y, z)).central
    })
}

fn morpho_field(geometry: &GridGeometry, image: &[f32]) -> MorphoField {
    let terms = geometry.spacing_terms();
    let (secdergrad, normgrad): (Vec<f32>, Vec<f32>) = (0..geometry.len())
        .map(|i| {
            let s = Stencil::gather(geometry, &terms, image, i);
            (s.second_derivative_along_gradient(), s.gradient_norm())
        })
        .unzip();
    MorphoField {
        secdergrad,
        normgrad,
        max_normgrad: 0.0,
        max_secdergrad: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn step_image(geometry: &GridGeometry) -> Volume<f32> {
        // bright for x < 8, smooth ramp between 6 and 10
        Volume::from_fn(*geometry, |[x, _, _]| {
            let t = ((x as f32 - 6.0) / 4.0).clamp(0.0, 1.0);
            200.0 * (1.0 - t)
        })
    }

    #[test]
    fn test_quantile() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 0.0];
        assert_relative_eq!(nonzero_quantile(&values, 1.0), 4.0);
        assert_relative_eq!(nonzero_quantile(&values, 0.0), 1.0);
        assert_relative_eq!(nonzero_quantile(&values, 0.5), 3.0);
        assert_relative_eq!(nonzero_quantile(&[0.0, 0.0], 0.8), 0.0);
    }

    #[test]
    fn test_vectors_point_to_edge() {
        let grid = GridGeometry::isotropic([16, 4, 4]).unwrap();
        let image = step_image(&grid);
        let attachment =
            precompute_data_attachment(AdvectionScheme::UpwindVectors, &image, 0.8, None).unwrap();
        let field = attachment.vectors().unwrap();

        // the gradient norm peaks on the ramp: vectors converge onto it
        assert!(field.at(grid.index(5, 2, 2)).x > 0.0);
        assert!(field.at(grid.index(11, 2, 2)).x < 0.0);
        assert_relative_eq!(field.at(grid.index(1, 2, 2)).norm(), 0.0);
        assert!(attachment.morpho().is_none());
    }

    #[test]
    fn test_user_field_is_borrowed() {
        let grid = GridGeometry::isotropic([4, 4, 4]).unwrap();
        let image = Volume::filled(grid, 1.0f32);
        let user = VectorField::from_fn(grid, |_| Vector3::new(1.0, 0.0, 0.0));

        let attachment =
            precompute_data_attachment(AdvectionScheme::CentralVectors, &image, 0.8, Some(Cow::Borrowed(&user)))
                .unwrap();
        assert!(matches!(attachment, DataAttachment::Vectors(Cow::Borrowed(_))));
        assert_relative_eq!(attachment.vectors().unwrap().at(3).x, 1.0);

        let err = precompute_data_attachment(AdvectionScheme::Morpho, &image, 0.8, Some(Cow::Borrowed(&user)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));

        let other = VectorField::from_fn(GridGeometry::isotropic([4, 4, 3]).unwrap(), |_| Vector3::zeros());
        let err =
            precompute_data_attachment(AdvectionScheme::UpwindVectors, &image, 0.8, Some(Cow::Owned(other)))
                .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_morpho_is_normalized() {
        let grid = GridGeometry::isotropic([16, 4, 4]).unwrap();
        let image = step_image(&grid);
        let attachment = precompute_data_attachment(AdvectionScheme::Morpho, &image, 0.8, None).unwrap();
        let morpho = attachment.morpho().unwrap();

        assert_relative_eq!(morpho.max_normgrad, 50.0, epsilon = 1e-3);
        assert_relative_eq!(morpho.normgrad.iter().copied().fold(0.0, f32::max), 1.0);
        assert!(morpho.secdergrad.iter().all(|v| v.abs() <= 1.0 + 1e-6));
        // concave shoulder at the bright side, convex at the dark side
        assert!(morpho.secdergrad[grid.index(6, 2, 2)] < 0.0);
        assert!(morpho.secdergrad[grid.index(10, 2, 2)] > 0.0);
        assert!(attachment.vectors().is_none());
    }
}
