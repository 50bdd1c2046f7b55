//! Commandline utility to measure lesions on a nifti volume.
//!
//! A session file keeps the nodules between runs: create it with `init`, add
//! nodules, place their centers, move the rulers through slices, rebuild the
//! ellipsoid model and labelmap, and append the measurements to a CSV report.

use clap::{ArgGroup, Parser, Subcommand};
use log::{warn, LevelFilter};
use nalgebra::Point3;
use simple_logger::SimpleLogger;
use std::path::{Path, PathBuf};

use lesionaxes::common::{AxisName, StructurePlane, WorkingMode};
use lesionaxes::engine;
use lesionaxes::report;
use lesionaxes::scene::{NodeId, Scene};
use lesionaxes::session::Session;
use lesionaxes::volume::Volume;

// use clap to create commandline interface
#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// the session file holding the nodules of one volume
    #[arg(short, long, global = true, default_value = "lesion_session.json")]
    session: PathBuf,

    /// more output, repeat for debug and trace messages
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new session on a nifti volume.
    Init {
        /// the reference nifti volume
        #[arg(long)]
        volume: PathBuf,

        /// use the small rulers meant for small animal scans
        #[arg(long)]
        small_animal: bool,
    },
    /// Add an empty nodule and print its index.
    AddNodule,
    /// Place the center of a nodule (R,A,S) and draw its default rulers.
    Center {
        #[arg(short, long)]
        nodule: u32,

        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        ras: Point3<f64>,
    },
    /// Move the endpoints of one ruler.
    SetAxis {
        #[arg(short, long)]
        nodule: u32,

        /// width, height or depth
        #[arg(long, value_parser = parse_axis)]
        axis: AxisName,

        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        ep1: Point3<f64>,

        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        ep2: Point3<f64>,
    },
    /// Move the two rulers of a plane up or down by a number of slices.
    Step {
        #[arg(short, long)]
        nodule: u32,

        /// axial, sagittal or coronal
        #[arg(short, long, default_value = "none", value_parser = parse_plane)]
        plane: StructurePlane,

        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        offset: i32,
    },
    /// Rebuild the model and labelmap of a nodule from its rulers.
    Rebuild {
        #[arg(short, long)]
        nodule: u32,

        /// where to write the ellipsoid model (Wavefront OBJ)
        #[arg(long)]
        model_out: Option<PathBuf>,

        /// where to write the labelmap (nifti)
        #[arg(long)]
        labelmap_out: Option<PathBuf>,
    },
    /// Remove a nodule. Its index is not reused.
    Remove {
        #[arg(short, long)]
        nodule: u32,
    },
    /// Append one row per measured nodule to a CSV report.
    Report {
        #[arg(short, long)]
        out: PathBuf,

        /// defaults to the volume file name
        #[arg(long)]
        case_id: Option<String>,
    },
    /// Convert a point between physical (RAS) and voxel (IJK) space.
    #[command(group(
        ArgGroup::new("direction")
            .required(true)
            .args(["to_voxel", "to_physical"]),
    ))]
    Transform {
        /// the nifti volume providing the affine, defaults to the session's volume
        #[arg(long)]
        volume: Option<PathBuf>,

        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        point: Point3<f64>,

        /// the point is in physical space and is converted to voxel space
        #[arg(long)]
        to_voxel: bool,

        /// the point is in voxel space and is converted to physical space
        #[arg(long)]
        to_physical: bool,
    },
}

fn parse_point(s: &str) -> Result<Point3<f64>, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("could not parse '{s}' as x,y,z: {e}"))?;
    match values.as_slice() {
        [x, y, z] => Ok(Point3::new(*x, *y, *z)),
        _ => Err(format!("expected three comma separated values, got '{s}'")),
    }
}

fn parse_axis(s: &str) -> Result<AxisName, String> {
    s.parse().map_err(|e: lesionaxes::LesionError| e.to_string())
}

fn parse_plane(s: &str) -> Result<StructurePlane, String> {
    s.parse().map_err(|e: lesionaxes::LesionError| e.to_string())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .unwrap_or_else(|e| {
            eprintln!("Error! {}", e);
            std::process::exit(-2);
        });
}

/// Opens the session's scene, applies `edit` and saves the session back.
fn edit_session<F>(session_path: &Path, edit: F) -> lesionaxes::Result<()>
where
    F: FnOnce(&mut Scene, NodeId) -> lesionaxes::Result<()>,
{
    let mut session = Session::load(session_path)?;
    let (mut scene, volume) = session.open_scene(session_path)?;
    edit(&mut scene, volume)?;
    session.capture(&scene, volume)?;
    session.save(session_path)
}

fn run(session_path: &Path, command: Command) -> lesionaxes::Result<()> {
    match command {
        Command::Init {
            volume,
            small_animal,
        } => {
            let mode = if small_animal {
                WorkingMode::SmallAnimal
            } else {
                WorkingMode::Human
            };
            // fail early if the volume cannot be read
            let loaded = Volume::load(&volume)?;
            if !loaded.is_axis_aligned() {
                warn!("The volume is oblique, slice steps move along R, A and S only");
            }
            Session::create(session_path, &volume, mode)?.save(session_path)?;
            println!("Started session on {}", loaded.name());
        }
        Command::Transform {
            volume,
            point,
            to_voxel,
            to_physical: _,
        } => {
            let path = match volume {
                Some(path) => path,
                None => Session::load(session_path)?.volume_location(session_path),
            };
            let volume = Volume::load(&path)?;
            let out = if to_voxel {
                engine::transform_physical_to_voxel(&volume, &point)
            } else {
                engine::transform_voxel_to_physical(&volume, &point)
            };
            println!("{:.3},{:.3},{:.3}", out[0], out[1], out[2]);
        }
        Command::AddNodule => edit_session(session_path, |scene, volume| {
            let index = scene.add_nodule(volume)?;
            println!("Nodule {index}");
            Ok(())
        })?,
        Command::Center { nodule, ras } => edit_session(session_path, |scene, volume| {
            scene.place_center(volume, nodule, ras)?;
            for name in AxisName::ALL {
                let axis = scene.axis_for_nodule(volume, nodule, name)?;
                println!("{name}: {}", axis.to_report_string());
            }
            Ok(())
        })?,
        Command::SetAxis {
            nodule,
            axis,
            ep1,
            ep2,
        } => edit_session(session_path, |scene, volume| {
            scene.set_axis_endpoints(volume, nodule, axis, ep1, ep2)?;
            let length = scene.axis_for_nodule(volume, nodule, axis)?.length();
            println!("{axis}: {length:.3} mm");
            Ok(())
        })?,
        Command::Step {
            nodule,
            plane,
            offset,
        } => edit_session(session_path, |scene, volume| {
            let jump = scene.step_slice(volume, nodule, plane, offset)?;
            println!("{:?} view: {:.3}", jump.view, jump.coordinate);
            Ok(())
        })?,
        Command::Rebuild {
            nodule,
            model_out,
            labelmap_out,
        } => edit_session(session_path, |scene, volume| {
            scene.update_model_labelmap(volume, nodule)?;
            let model = scene.model(volume, nodule)?;
            let labelmap = scene.labelmap(volume, nodule)?;
            println!(
                "{}: ellipsoid {:.3} mm³, labelmap {} voxels ({:.3} mm³)",
                model.name,
                model.ellipsoid.volume(),
                labelmap.labelmap.voxel_count(),
                labelmap.labelmap.physical_volume()
            );
            if let Some(path) = model_out {
                model.mesh.write_obj(&path, &model.name)?;
                println!("Output: {}", path.display());
            }
            if let Some(path) = labelmap_out {
                labelmap
                    .labelmap
                    .write_nifti(&path, scene.volume(volume)?)?;
                println!("Output: {}", path.display());
            }
            Ok(())
        })?,
        Command::Remove { nodule } => {
            edit_session(session_path, |scene, volume| scene.remove_nodule(volume, nodule))?
        }
        Command::Report { out, case_id } => edit_session(session_path, |scene, volume| {
            let rows = report::rows_for_volume(scene, volume, case_id.as_deref())?;
            report::append_rows(&out, &rows)?;
            println!("Saved {} nodule(s) to {}", rows.len(), out.display());
            Ok(())
        })?,
    }
    Ok(())
}

/// Main function parses commandline arguments and runs the requested step.
fn main() {
    let cli = Args::parse();
    init_logging(cli.verbose);
    run(&cli.session, cli.command).unwrap_or_else(|e| {
        eprintln!("Error! {}", e);
        std::process::exit(-2);
    });
}
