use std::{fs::File, io::BufReader, path::PathBuf};

use clap::Parser;
use mumax_toolbox_core::{formats::table::Table, geom::Dim3D};
use mumax_toolbox_view::{scene::RecordingScene, viewer::Viewer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Dataset directory containing the per-frame .npy files
    #[arg(value_name = "DIR")]
    dataset: PathBuf,

    /// mumax3 table log to summarize alongside the dataset
    #[arg(short, long, value_name = "FILE")]
    table: Option<PathBuf>,

    /// Scrub through every frame against the headless recording backend
    #[arg(long)]
    scrub: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Cli::parse();

    let mut scene = RecordingScene::new();
    let mut viewer = Viewer::new();
    viewer.open_dataset(&mut scene, &args.dataset)?;

    let dims = viewer.dims();
    println!(
        "{}: {} frame(s), {}x{}x{} cells",
        args.dataset.display(),
        dims.frame_count,
        dims.dims.x,
        dims.dims.y,
        dims.dims.z
    );
    for axis in Dim3D::iter() {
        println!(
            "  {:?} slice range: {:?}, centered at {}",
            axis,
            viewer.offset_range(axis),
            viewer.state().offset(axis)
        );
    }

    if let Some(path) = &args.table {
        let table = Table::from_reader(BufReader::new(File::open(path)?))?;
        println!("{}: {} step(s)", path.display(), table.len());
        for column in table.columns() {
            let unit = if column.unit.is_empty() {
                String::new()
            } else {
                format!(" ({})", column.unit)
            };
            println!("  {}{}", column.name, unit);
        }
    }

    if args.scrub {
        for index in viewer.frame_range() {
            viewer.set_frame(&mut scene, index)?;
        }
        println!(
            "scrubbed {} frame(s), {} scene op(s) recorded",
            dims.frame_count,
            scene.ops().len()
        );
    }

    Ok(())
}
