mod replay;

use log::*;
use posecap_core::DeviceRotation;
use posecap_export::read_exif;
use posecap_pipeline::{
    CaptureSession, CaptureSettings, CapturedImage, PhotoEvent, PixelFormat, PointCloud,
    PointCloudEvent,
};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "posecap", about = "A tool for replaying and inspecting pose-tagged captures")]
enum Opt {
    /// Runs one recorded capture through the pipeline and writes its bundle.
    Capture(CaptureOpt),
    /// Prints the metadata embedded in a captured JPEG.
    Inspect {
        /// The JPEG of a capture bundle.
        #[structopt(parse(from_os_str))]
        image: PathBuf,
    },
}

#[derive(StructOpt, Debug)]
struct CaptureOpt {
    /// The raw image buffer as delivered by the camera.
    #[structopt(short, long, parse(from_os_str))]
    image: PathBuf,
    /// The layout of the raw image: nv21, yv12 or rgba.
    #[structopt(short, long, default_value = "nv21")]
    format: PixelFormat,
    /// The image width in pixels.
    #[structopt(long)]
    width: u32,
    /// The image height in pixels.
    #[structopt(long)]
    height: u32,
    /// Pixels per row, if rows are padded beyond the width.
    #[structopt(long)]
    stride: Option<u32>,
    /// The recorded session.
    ///
    /// Holds the intrinsics and IMU poses of each camera, the depth capability, and the pose and
    /// timestamp of the capture.
    #[structopt(long, parse(from_os_str))]
    session: PathBuf,
    /// A depth point cloud stored as little-endian f32 values, four per point.
    #[structopt(short, long, parse(from_os_str))]
    point_cloud: Option<PathBuf>,
    /// A JSON list of recorded sensor events.
    #[structopt(long, parse(from_os_str))]
    sensors: Option<PathBuf>,
    /// The display rotation in degrees: 0, 90, 180 or 270.
    #[structopt(short, long, default_value = "0")]
    rotation: u32,
    /// The file where settings are specified.
    ///
    /// This is in the format of `posecap_pipeline::CaptureSettings`.
    #[structopt(short, long, default_value = "posecap-settings.json")]
    settings: PathBuf,
    /// An output directory tried before the ones in the settings.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
}

fn main() {
    pretty_env_logger::init_timed();
    match Opt::from_args() {
        Opt::Capture(opt) => capture(opt),
        Opt::Inspect { image } => inspect(image),
    }
}

fn capture(opt: CaptureOpt) {
    let settings = std::fs::File::open(&opt.settings)
        .ok()
        .and_then(|file| serde_json::from_reader(file).ok());
    if settings.is_some() {
        info!("loaded existing settings");
    } else {
        info!("used default settings");
    }
    let mut settings: CaptureSettings = settings.unwrap_or_default();
    if let Some(output) = opt.output {
        settings.output_directories.insert(0, output);
    }

    let device_rotation = DeviceRotation::from_degrees(opt.rotation)
        .expect("rotation must be 0, 90, 180 or 270 degrees");
    let session_record = replay::load_session(&opt.session).expect("failed to load session");
    let data = std::fs::read(&opt.image).expect("failed to read image");
    let point_cloud = opt.point_cloud.map(|path| {
        let file = std::fs::File::open(&path).expect("failed to open point cloud");
        replay::read_point_cloud(std::io::BufReader::new(file))
            .expect("failed to read point cloud")
    });
    let events = opt
        .sensors
        .map(|path| replay::load_sensor_events(&path).expect("failed to load sensor events"))
        .unwrap_or_default();

    let session = CaptureSession::new(settings, session_record.provider());

    info!("replaying {} sensor events", events.len());
    let (sender, ingest) = session
        .sensors()
        .spawn_ingest(session.settings().sensor_channel_capacity)
        .expect("failed to start sensor ingestion");
    for event in events {
        sender.send_blocking(event);
    }
    drop(sender);
    ingest.join().expect("sensor ingestion panicked");

    session.on_photo(PhotoEvent {
        image: CapturedImage {
            data,
            format: opt.format,
            width: opt.width,
            height: opt.height,
            stride: opt.stride,
            timestamp: session_record.timestamp,
        },
        pose: session_record.pose.pose(),
        device_rotation,
    });
    if let Some(points) = point_cloud {
        session.on_point_cloud(PointCloudEvent {
            cloud: PointCloud {
                points,
                timestamp: session_record.timestamp,
            },
        });
    }

    let report = session
        .post_process()
        .expect("failed to start capture")
        .wait()
        .expect("capture was cancelled");

    for file in &report.files {
        println!("{}", file.display());
    }
    if !report.warnings.is_empty() {
        eprintln!("warnings: {}", report.warning_text());
    }
    if !report.success {
        error!("capture {} failed", report.stem);
        std::process::exit(1);
    }
    info!("capture {} complete", report.stem);
}

fn inspect(image: PathBuf) {
    let jpeg = std::fs::read(&image).expect("failed to read image");
    match read_exif(&jpeg).expect("failed to parse image") {
        Some(tags) => {
            if let (Some(width), Some(height)) = (tags.width, tags.height) {
                println!("# {}x{}", width, height);
            }
            match tags.user_comment {
                Some(comment) => print!("{}", comment),
                None => info!("no user comment in {}", image.display()),
            }
        }
        None => {
            error!("{} has no EXIF segment", image.display());
            std::process::exit(1);
        }
    }
}
