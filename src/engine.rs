//! Coordinate arithmetic that keeps the measurement rulers and the slice
//! viewers in sync.
//!
//! Points are transformed with the volume's 4x4 affine as homogeneous
//! vectors. Stepping moves a ruler by a whole number of voxel slices along
//! one voxel axis and writes the resulting physical coordinate back into the
//! physical axis with the same index. That index conflation only holds for
//! volumes whose voxel axes are aligned with R, A and S; on oblique volumes
//! the step is still performed the same way and a warning is logged.

use log::{debug, warn};
use nalgebra::{Point3, Vector4};

use crate::axis::Axis;
use crate::common::{AxisName, Direction, SliceView, StructurePlane};
use crate::error::{LesionError, Result};
use crate::volume::Volume;

/// Physical (RAS) -> voxel (IJK). The last component is the homogeneous weight.
pub fn transform_physical_to_voxel(volume: &Volume, point: &Point3<f64>) -> Vector4<f64> {
    volume.physical_to_voxel(point)
}

/// Voxel (IJK) -> physical (RAS). The last component is the homogeneous weight.
pub fn transform_voxel_to_physical(volume: &Volume, point: &Point3<f64>) -> Vector4<f64> {
    volume.voxel_to_physical(point)
}

/// Moves both endpoints of `axis` by `step_count` voxel slices along the voxel
/// axis `voxel_axis_index`, taking the slice position from the first endpoint.
///
/// Returns the new physical coordinate that both endpoints now share at
/// `voxel_axis_index`. No bounds checks are done against the volume extents.
pub fn step_along_axis(
    volume: &Volume,
    axis: &mut Axis,
    voxel_axis_index: usize,
    step_count: i32,
) -> Result<f64> {
    let direction = Direction::from_usize(voxel_axis_index)?;
    let a = direction.to_usize();
    if !volume.is_axis_aligned() {
        warn!(
            "Volume '{}' is oblique, stepping along voxel axis {} moves physical axis {} only",
            volume.name(),
            direction,
            a
        );
    }

    let mut ijk = transform_physical_to_voxel(volume, &axis.endpoint1());
    ijk[a] += f64::from(step_count);
    let stepped = Point3::new(ijk[0], ijk[1], ijk[2]);
    let new_coordinate = transform_voxel_to_physical(volume, &stepped)[a];

    axis.endpoint1[a] = new_coordinate;
    axis.endpoint2[a] = new_coordinate;
    debug!(
        "Stepped ruler {} slice(s) along axis {}: new coordinate {:.3}",
        step_count, direction, new_coordinate
    );
    Ok(new_coordinate)
}

/// The two rulers that move together when stepping `plane`.
pub fn resolve_axis_pair_for_plane(plane: StructurePlane) -> Result<(AxisName, AxisName)> {
    match plane {
        StructurePlane::WidthHeight => Ok((AxisName::Width, AxisName::Height)),
        StructurePlane::HeightDepth => Ok((AxisName::Height, AxisName::Depth)),
        StructurePlane::DepthWidth => Ok((AxisName::Depth, AxisName::Width)),
        StructurePlane::None => Err(LesionError::UnselectedPlane),
    }
}

/// Voxel axis that is stepped for `plane`, and the viewer that follows it.
pub fn plane_voxel_axis(plane: StructurePlane) -> Result<(Direction, SliceView)> {
    match plane {
        StructurePlane::WidthHeight => Ok((Direction::Z, SliceView::Red)),
        StructurePlane::HeightDepth => Ok((Direction::X, SliceView::Yellow)),
        StructurePlane::DepthWidth => Ok((Direction::Y, SliceView::Green)),
        StructurePlane::None => Err(LesionError::UnselectedPlane),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix4;

    fn identity_volume() -> Volume {
        Volume::from_affine("identity", Matrix4::identity(), [64, 64, 64]).unwrap()
    }

    fn ct_volume() -> Volume {
        let affine = Matrix4::new(
            -0.7, 0.0, 0.0, 180.0,
            0.0, -0.7, 0.0, 160.0,
            0.0, 0.0, 2.5, -320.0,
            0.0, 0.0, 0.0, 1.0,
        );
        Volume::from_affine("ct", affine, [512, 512, 120]).unwrap()
    }

    fn oblique_volume() -> Volume {
        let (s, c) = (0.4f64.sin(), 0.4f64.cos());
        let affine = Matrix4::new(
            0.8 * c, -0.8 * s, 0.0, 12.0,
            0.8 * s, 0.8 * c, 0.3, -40.0,
            0.0, 0.1, 1.5, 7.5,
            0.0, 0.0, 0.0, 1.0,
        );
        Volume::from_affine("oblique", affine, [128, 128, 64]).unwrap()
    }

    #[test]
    fn physical_voxel_round_trip() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(-52.3, 17.9, 140.25),
            Point3::new(1e3, -1e3, 0.5),
        ];
        for volume in [identity_volume(), ct_volume(), oblique_volume()] {
            for p in &points {
                let ijk = transform_physical_to_voxel(&volume, p);
                assert_relative_eq!(ijk[3], 1.0, epsilon = 1e-12);
                let back =
                    transform_voxel_to_physical(&volume, &Point3::new(ijk[0], ijk[1], ijk[2]));
                assert_relative_eq!(back[0], p.x, epsilon = 1e-9);
                assert_relative_eq!(back[1], p.y, epsilon = 1e-9);
                assert_relative_eq!(back[2], p.z, epsilon = 1e-9);
                assert_relative_eq!(back[3], 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn zero_step_is_identity() {
        let volume = ct_volume();
        let original = Axis::new(Point3::new(-14.2, 3.3, -80.0), Point3::new(6.1, 3.3, -80.0));
        for index in 0..3 {
            let mut axis = original;
            step_along_axis(&volume, &mut axis, index, 0).unwrap();
            for i in 0..3 {
                assert_relative_eq!(axis.endpoint1[i], original.endpoint1[i], epsilon = 1e-9);
                assert_relative_eq!(axis.endpoint2[i], original.endpoint2[i], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn step_forth_and_back_restores_coordinate() {
        let volume = ct_volume();
        let original = Axis::new(Point3::new(10.0, -4.0, -62.5), Point3::new(10.0, 6.0, -62.5));
        for index in 0..3 {
            let mut axis = original;
            step_along_axis(&volume, &mut axis, index, 7).unwrap();
            let back = step_along_axis(&volume, &mut axis, index, -7).unwrap();
            assert_relative_eq!(back, original.endpoint1[index], epsilon = 1e-9);
        }
    }

    #[test]
    fn step_only_moves_the_stepped_dimension() {
        let volume = ct_volume();
        let original = Axis::new(Point3::new(-20.0, 5.0, -100.0), Point3::new(20.0, 9.0, -95.0));
        let mut axis = original;
        let new_z = step_along_axis(&volume, &mut axis, 2, 3).unwrap();

        assert_relative_eq!(new_z, -100.0 + 3.0 * 2.5, epsilon = 1e-9);
        assert_eq!(axis.endpoint1[0], original.endpoint1[0]);
        assert_eq!(axis.endpoint1[1], original.endpoint1[1]);
        assert_eq!(axis.endpoint2[0], original.endpoint2[0]);
        assert_eq!(axis.endpoint2[1], original.endpoint2[1]);
        assert_eq!(axis.endpoint1[2], new_z);
        assert_eq!(axis.endpoint2[2], new_z);
        let in_plane = |a: &Axis| {
            ((a.endpoint2[0] - a.endpoint1[0]).powi(2) + (a.endpoint2[1] - a.endpoint1[1]).powi(2))
                .sqrt()
        };
        assert_relative_eq!(in_plane(&axis), in_plane(&original), epsilon = 1e-12);
    }

    #[test]
    fn negative_spacing_steps_towards_lower_coordinates() {
        let volume = ct_volume();
        let mut axis = Axis::new(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 10.0, 0.0));
        let new_r = step_along_axis(&volume, &mut axis, 0, 1).unwrap();
        assert_relative_eq!(new_r, -0.7, epsilon = 1e-9);
    }

    #[test]
    fn identity_step_moves_width_up_one_slice() {
        let volume = identity_volume();
        let mut axis = Axis::new(Point3::new(-10.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));
        let new_z = step_along_axis(&volume, &mut axis, 2, 1).unwrap();
        assert_relative_eq!(new_z, 1.0);
        assert_eq!(axis.endpoint1, [-10.0, 0.0, 1.0]);
        assert_eq!(axis.endpoint2, [10.0, 0.0, 1.0]);
    }

    #[test]
    fn stepping_outside_the_grid_is_allowed() {
        let volume = identity_volume();
        let mut axis = Axis::new(Point3::new(0.0, 0.0, 63.0), Point3::new(5.0, 0.0, 63.0));
        let new_z = step_along_axis(&volume, &mut axis, 2, 10).unwrap();
        assert_relative_eq!(new_z, 73.0);
    }

    #[test]
    fn invalid_voxel_axis_is_rejected() {
        let volume = identity_volume();
        let mut axis = Axis::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0));
        let result = step_along_axis(&volume, &mut axis, 3, 1);
        assert!(matches!(result, Err(LesionError::InvalidAxisIndex(3))));
        assert_eq!(axis.endpoint1, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn plane_pairs_are_fixed() {
        assert!(matches!(
            resolve_axis_pair_for_plane(StructurePlane::None),
            Err(LesionError::UnselectedPlane)
        ));
        assert_eq!(
            resolve_axis_pair_for_plane(StructurePlane::WidthHeight).unwrap(),
            (AxisName::Width, AxisName::Height)
        );
        assert_eq!(
            resolve_axis_pair_for_plane(StructurePlane::HeightDepth).unwrap(),
            (AxisName::Height, AxisName::Depth)
        );
        assert_eq!(
            resolve_axis_pair_for_plane(StructurePlane::DepthWidth).unwrap(),
            (AxisName::Depth, AxisName::Width)
        );
    }

    #[test]
    fn planes_step_their_normal_axis() {
        assert_eq!(
            plane_voxel_axis(StructurePlane::WidthHeight).unwrap(),
            (Direction::Z, SliceView::Red)
        );
        assert_eq!(
            plane_voxel_axis(StructurePlane::HeightDepth).unwrap(),
            (Direction::X, SliceView::Yellow)
        );
        assert_eq!(
            plane_voxel_axis(StructurePlane::DepthWidth).unwrap(),
            (Direction::Y, SliceView::Green)
        );
        assert!(plane_voxel_axis(StructurePlane::None).is_err());
    }
}
