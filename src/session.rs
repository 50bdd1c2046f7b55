//! Persists the nodules measured on a volume between runs of the tools.

use log::{debug, info};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::axis::Axis;
use crate::common::{AxisName, WorkingMode};
use crate::error::Result;
use crate::scene::{NodeId, Scene};
use crate::volume::Volume;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoduleRecord {
    pub index: u32,
    pub centers: Vec<[f64; 3]>,
    #[serde(default)]
    pub axes: BTreeMap<AxisName, Axis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub volume_path: PathBuf,
    #[serde(default)]
    pub working_mode: WorkingMode,
    pub next_index: u32,
    #[serde(default)]
    pub nodules: Vec<NoduleRecord>,
}

impl Session {
    pub fn new<P: AsRef<Path>>(volume_path: P, working_mode: WorkingMode) -> Self {
        Self {
            volume_path: volume_path.as_ref().to_path_buf(),
            working_mode,
            next_index: 1,
            nodules: Vec::new(),
        }
    }

    /// Starts a session to be saved at `session_path`. A volume below the
    /// session's directory is stored relative to it so the case folder can
    /// be moved or read from elsewhere.
    pub fn create<P, Q>(session_path: P, volume_path: Q, working_mode: WorkingMode) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let volume = std::fs::canonicalize(volume_path.as_ref())?;
        let dir = match session_dir(session_path.as_ref()) {
            dir if dir.as_os_str().is_empty() => Path::new("."),
            dir => dir,
        };
        let dir = std::fs::canonicalize(dir)?;
        let stored = match volume.strip_prefix(&dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => volume,
        };
        debug!("Session volume stored as {}", stored.display());
        Ok(Self::new(stored, working_mode))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let session = serde_json::from_reader(reader)?;
        debug!("Loaded session {}", path.as_ref().display());
        Ok(session)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, self)?;
        debug!("Saved session {}", path.as_ref().display());
        Ok(())
    }

    /// The volume file of a session stored at `session_path`. Relative
    /// volume paths are taken from the session file's directory.
    pub fn volume_location<P: AsRef<Path>>(&self, session_path: P) -> PathBuf {
        if self.volume_path.is_absolute() {
            self.volume_path.clone()
        } else {
            session_dir(session_path.as_ref()).join(&self.volume_path)
        }
    }

    /// Reads the volume of a session stored at `session_path` and rebuilds
    /// the scene.
    pub fn open_scene<P: AsRef<Path>>(&self, session_path: P) -> Result<(Scene, NodeId)> {
        let volume = Volume::load(self.volume_location(session_path))?
            .with_working_mode(self.working_mode);
        self.restore(volume)
    }

    /// Rebuilds the scene on an already loaded volume. Nodules keep their
    /// indices; models and labelmaps are regenerated for measured nodules.
    pub fn restore(&self, volume: Volume) -> Result<(Scene, NodeId)> {
        let mut scene = Scene::new();
        let volume = scene.add_volume(volume.with_working_mode(self.working_mode));
        for record in &self.nodules {
            scene.insert_nodule(volume, record.index)?;
            for (i, center) in record.centers.iter().enumerate() {
                if i == 0 {
                    scene.place_center(volume, record.index, Point3::from(*center))?;
                } else {
                    scene.add_fiducial(volume, record.index, Point3::from(*center))?;
                }
            }
            if record.centers.is_empty() {
                continue;
            }
            for (name, axis) in &record.axes {
                scene.set_axis_endpoints(
                    volume,
                    record.index,
                    *name,
                    axis.endpoint1(),
                    axis.endpoint2(),
                )?;
            }
            scene.update_model_labelmap(volume, record.index)?;
        }
        scene.reserve_nodule_indices(volume, self.next_index)?;
        info!(
            "Restored {} nodule(s) on '{}'",
            self.nodules.len(),
            scene.volume(volume)?.name()
        );
        Ok((scene, volume))
    }

    /// Captures the nodules of `volume` from a scene.
    pub fn capture(&mut self, scene: &Scene, volume: NodeId) -> Result<()> {
        let mut nodules = Vec::new();
        for index in scene.nodule_indices(volume)? {
            let centers = scene
                .fiducials(volume, index)?
                .points
                .iter()
                .map(|p| [p.x, p.y, p.z])
                .collect();
            let axes = AxisName::ALL
                .iter()
                .filter_map(|name| {
                    scene
                        .axis_for_nodule(volume, index, *name)
                        .ok()
                        .map(|axis| (*name, axis))
                })
                .collect();
            nodules.push(NoduleRecord {
                index,
                centers,
                axes,
            });
        }
        self.nodules = nodules;
        self.next_index = scene.next_nodule_index(volume)?;
        self.working_mode = scene.volume(volume)?.working_mode();
        Ok(())
    }
}

fn session_dir(session_path: &Path) -> &Path {
    session_path.parent().unwrap_or_else(|| Path::new(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::StructurePlane;
    use nalgebra::Matrix4;
    use ndarray::Array3;
    use nifti::writer::WriterOptions;

    fn volume() -> Volume {
        Volume::from_affine("session_case", Matrix4::identity(), [32, 32, 32]).unwrap()
    }

    #[test]
    fn scene_survives_a_save_and_restore() {
        let mut scene = Scene::new();
        let vol = scene.add_volume(volume());
        let first = scene.add_nodule(vol).unwrap();
        let second = scene.add_nodule(vol).unwrap();
        let third = scene.add_nodule(vol).unwrap();
        scene.remove_nodule(vol, second).unwrap();
        scene.place_center(vol, first, Point3::new(16.0, 16.0, 16.0)).unwrap();
        scene
            .step_slice(vol, first, StructurePlane::WidthHeight, 2)
            .unwrap();

        let mut session = Session::new("unused.nii", WorkingMode::Human);
        session.capture(&scene, vol).unwrap();
        let path = std::env::temp_dir().join("lesionaxes_session_test.json");
        session.save(&path).unwrap();
        let loaded = Session::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, session);

        let (mut restored, rvol) = loaded.restore(volume()).unwrap();
        assert_eq!(restored.nodule_indices(rvol).unwrap(), vec![first, third]);
        let width = restored.axis_for_nodule(rvol, first, AxisName::Width).unwrap();
        assert_eq!(width.endpoint1, [6.0, 16.0, 18.0]);
        assert!(restored.model(rvol, first).is_ok());
        assert!(restored.model(rvol, third).is_err());
        assert_eq!(restored.add_nodule(rvol).unwrap(), 4);
    }

    /// Writes an empty 1 mm volume as `<dir>/case.nii`.
    fn case_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let reference = volume();
        WriterOptions::new(dir.join("case.nii"))
            .reference_header(&reference.reference_header())
            .write_nifti(&Array3::<u8>::zeros((8, 8, 8)))
            .unwrap();
        dir
    }

    #[test]
    fn relative_volume_is_found_next_to_the_session() {
        let dir = case_dir("lesionaxes_session_relative");
        let session_path = dir.join("lesion_session.json");
        let mut session = Session::new("case.nii", WorkingMode::SmallAnimal);
        session.next_index = 3;
        session.save(&session_path).unwrap();

        // the working directory is not the case folder
        let loaded = Session::load(&session_path).unwrap();
        assert_eq!(loaded.volume_location(&session_path), dir.join("case.nii"));
        let (scene, vol) = loaded.open_scene(&session_path).unwrap();
        assert_eq!(scene.volume(vol).unwrap().name(), "case");
        assert_eq!(scene.volume(vol).unwrap().dims(), [8, 8, 8]);
        assert_eq!(scene.next_nodule_index(vol).unwrap(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn created_sessions_store_the_volume_relative_to_themselves() {
        let dir = case_dir("lesionaxes_session_create");
        let session_path = dir.join("lesion_session.json");
        let session = Session::create(&session_path, dir.join("case.nii"), WorkingMode::Human)
            .unwrap();
        assert_eq!(session.volume_path, PathBuf::from("case.nii"));
        assert!(session.open_scene(&session_path).is_ok());

        // volumes outside the session's folder keep their absolute path
        let other = std::env::temp_dir().join("lesionaxes_session_other");
        std::fs::create_dir_all(&other).unwrap();
        let elsewhere = Session::create(
            other.join("lesion_session.json"),
            dir.join("case.nii"),
            WorkingMode::Human,
        )
        .unwrap();
        assert!(elsewhere.volume_path.is_absolute());
        std::fs::remove_dir_all(&dir).ok();
        std::fs::remove_dir_all(&other).ok();
    }

    #[test]
    fn missing_volume_is_an_io_error() {
        let session = Session::new("no_such_case.nii", WorkingMode::Human);
        let session_path = std::env::temp_dir().join("lesionaxes_missing/lesion_session.json");
        assert!(session.open_scene(&session_path).is_err());
    }
}
