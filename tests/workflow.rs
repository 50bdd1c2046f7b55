use approx::assert_relative_eq;
use nalgebra::{Matrix4, Point3};

use lesionaxes::common::{AxisName, SliceView, StructurePlane};
use lesionaxes::report;
use lesionaxes::scene::Scene;
use lesionaxes::session::Session;
use lesionaxes::volume::Volume;
use lesionaxes::LesionError;

/// A typical chest CT grid: 0.75 mm in-plane, 1.25 mm slices, LPS-stored
/// voxels flipped into RAS by the affine.
fn chest_ct() -> Volume {
    let affine = Matrix4::new(
        -0.75, 0.0, 0.0, 96.0,
        0.0, -0.75, 0.0, 96.0,
        0.0, 0.0, 1.25, -100.0,
        0.0, 0.0, 0.0, 1.0,
    );
    Volume::from_affine("chest_ct", affine, [256, 256, 160]).unwrap()
}

#[test]
fn measure_step_rebuild_and_report() {
    let mut scene = Scene::new();
    let volume = scene.add_volume(chest_ct());
    let nodule = scene.add_nodule(volume).unwrap();
    let center = Point3::new(12.0, -30.0, -20.0);
    scene.place_center(volume, nodule, center).unwrap();

    // stepping without a plane is refused
    assert!(matches!(
        scene.step_slice(volume, nodule, StructurePlane::None, 1),
        Err(LesionError::UnselectedPlane)
    ));

    // two slices up in the axial view, then back down one
    let up = scene
        .step_slice(volume, nodule, StructurePlane::WidthHeight, 2)
        .unwrap();
    assert_eq!(up.view, SliceView::Red);
    assert_relative_eq!(up.coordinate, -20.0 + 2.0 * 1.25, epsilon = 1e-9);
    let down = scene
        .step_slice(volume, nodule, StructurePlane::WidthHeight, -1)
        .unwrap();
    assert_relative_eq!(down.coordinate, -20.0 + 1.25, epsilon = 1e-9);

    // rulers keep their length while moving
    let width = scene.axis_for_nodule(volume, nodule, AxisName::Width).unwrap();
    assert_relative_eq!(width.length(), 20.0, epsilon = 1e-9);

    // shrink the width and rebuild
    scene
        .set_axis_endpoints(
            volume,
            nodule,
            AxisName::Width,
            Point3::new(6.0, -30.0, -18.75),
            Point3::new(18.0, -30.0, -18.75),
        )
        .unwrap();
    scene.update_model_labelmap(volume, nodule).unwrap();
    let model = scene.model(volume, nodule).unwrap();
    assert_relative_eq!(model.ellipsoid.radii.x, 6.0, epsilon = 1e-9);
    assert_relative_eq!(model.ellipsoid.radii.y, 5.0, epsilon = 1e-9);
    let labelmap = &scene.labelmap(volume, nodule).unwrap().labelmap;
    let relative_error =
        (labelmap.physical_volume() - model.ellipsoid.volume()).abs() / model.ellipsoid.volume();
    assert!(relative_error < 0.1, "relative error {relative_error}");

    let rows = report::rows_for_volume(&scene, volume, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].case_id, "chest_ct");
    assert_eq!(rows[0].center_ras, "[[12.0, -30.0, -20.0]]");
    assert_eq!(
        rows[0].width_ras,
        "[[EP1:6.0,-30.0,-18.75],[EP2:18.0,-30.0,-18.75]]"
    );
    assert_eq!(
        rows[0].height_ras,
        "[[EP1:12.0,-35.0,-18.75],[EP2:12.0,-25.0,-18.75]]"
    );
    // depth is not part of the axial plane and stays where it was drawn
    assert_eq!(
        rows[0].depth_ras,
        "[[EP1:12.0,-30.0,-25.0],[EP2:12.0,-30.0,-15.0]]"
    );

    // the session brings the same measurements back
    let mut session = Session::new("chest_ct.nii.gz", Default::default());
    session.capture(&scene, volume).unwrap();
    let (restored, restored_volume) = session.restore(chest_ct()).unwrap();
    let restored_rows = report::rows_for_volume(&restored, restored_volume, None).unwrap();
    assert_eq!(restored_rows, rows);
}
