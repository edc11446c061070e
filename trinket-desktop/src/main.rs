#![warn(unused_extern_crates)]
use anyhow::Result;
use clap::{Args, Parser};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, span, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use trinket_img::accessory::{FileLoader, Slot};
use trinket_img::catalog::Catalog;
use trinket_img::config::Config;
use trinket_img::session::Session;
use trinket_img::snapshot;
use video::{spawn_capture, OutputVideoStream};

mod detector;
mod video;

const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CmdArgs {
    /// Target frame rate
    #[arg(long, default_value = "30")]
    fps: u32,

    /// JSON file overriding smoothing, scale and anchor settings
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Face detector output, one JSON detection per line. `-` reads stdin
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    landmarks: String,

    /// Directory relative image sources are read from
    #[arg(long, value_name = "DIR")]
    assets: Option<PathBuf>,

    #[command(flatten)]
    pick: Pick,

    /// Mark the ear and neck anchors on the output
    #[arg(long)]
    trace: bool,

    #[command(flatten)]
    out: Out,

    /// Process single input frame, reading from input path
    #[arg(short, long, requires = "output")]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct Pick {
    /// Catalog of designs by category
    #[arg(long, value_name = "FILE", requires = "category")]
    catalog: Option<PathBuf>,

    /// Catalog category to pick from, e.g. gold_earrings
    #[arg(long, requires = "catalog")]
    category: Option<String>,

    /// Position of the design within the category
    #[arg(long, default_value = "0")]
    design: usize,

    /// Earring image, bypassing the catalog
    #[arg(long, value_name = "SRC")]
    earring: Option<String>,

    /// Necklace image, bypassing the catalog
    #[arg(long, value_name = "SRC")]
    necklace: Option<String>,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct Out {
    /// Loopback device to write to. Displays in window if unset
    #[arg(group = "dest", short, long)]
    device: Option<String>,

    /// Snapshot destination: a PNG path, or a directory to save into
    #[arg(group = "dest", short, long, requires = "input")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    let args = CmdArgs::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.trace_anchors |= args.trace;

    let loader = Arc::new(FileLoader::new(args.assets.clone()));
    let (tx, events) = flume::unbounded();
    let mut session = Session::new(&config, loader, events);
    select_accessories(&mut session, &args.pick);

    if let (Some(input), Some(output)) = (args.input, args.out.output) {
        // Process single image at file and exit
        return process_image(&input, &output, &args.landmarks, &mut session);
    }

    detector::spawn_reader(&args.landmarks, tx.clone())?;
    let (width, height) = spawn_capture(args.fps, tx)?;
    let mut output_stream = OutputVideoStream::new(width, height, args.fps, args.out.device)?;

    session.run(|img| {
        let span = span!(Level::DEBUG, "write_frame");
        let _guard = span.enter();
        output_stream.write_frame(&img)
    })
}

fn select_accessories(session: &mut Session, pick: &Pick) {
    if let (Some(path), Some(category)) = (&pick.catalog, &pick.category) {
        let chosen = Catalog::load(path).and_then(|catalog| {
            session.browse(&catalog, category)?;
            session.choose(&catalog, category, pick.design)
        });
        match chosen {
            Ok(slot) => info!("Trying on {category} #{} as {slot:?}", pick.design),
            // The overlay keeps working with nothing selected
            Err(e) => error!("Error loading designs: {e}"),
        }
    }

    if pick.earring.is_some() {
        session.select(Slot::Earring, pick.earring.clone());
    }
    if pick.necklace.is_some() {
        session.select(Slot::Necklace, pick.necklace.clone());
    }
}

fn process_image(src: &Path, dest: &Path, landmarks: &str, session: &mut Session) -> Result<()> {
    let frame: RgbaImage = image::open(src)?.into_rgba8();
    session.resize(frame.width(), frame.height());

    for detection in detector::detections(detector::open(landmarks)?) {
        session.on_detection(detection);
    }
    session.settle(LOAD_TIMEOUT)?;

    let result = session.snapshot(&frame)?;
    if dest.is_dir() {
        snapshot::save(&result, dest)?;
    } else {
        result.save(dest)?;
        info!("Result at {:?}", dest);
    }

    Ok(())
}
