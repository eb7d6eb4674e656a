//! pircamd - motion-triggered security camera daemon
//!
//! This daemon:
//! 1. Polls a PIR sensor pin once per second
//! 2. On motion, captures a still (or short clip) with the camera module
//! 3. Delivers the capture locally or via HTTP PUT to a cloud endpoint
//! 4. Cools down briefly, then re-arms
//!
//! Cloud delivery captures into a scratch file that is removed whatever the
//! upload outcome; with no BASE_URL configured the upload step logs and
//! skips. Ctrl-C shuts down cleanly and releases the sensor pin.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pircam::{
    Camera, CaptureSettings, CloudUploader, DeliveryMode, LoopOptions, PirSensor, RetryPolicy,
    Timing, TriggerLoop, UploadConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Motion-triggered security camera daemon")]
struct Args {
    /// PIR sensor pin (BCM numbering).
    #[arg(long, env = "PIR_PIN", default_value_t = 17)]
    pin: u8,

    /// Capture mode: 'photo' or 'video'.
    #[arg(long, env = "CAPTURE_MODE", default_value = "photo")]
    mode: String,

    /// Delivery mode: 'local' (write to --output-dir) or 'cloud' (HTTP PUT).
    #[arg(long, env = "DELIVERY_MODE", default_value = "local")]
    delivery: String,

    /// Cloud endpoint base URL. Unset disables cloud delivery; the loop
    /// still runs and logs each skipped upload.
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Function key for the cloud endpoint. Sent as the 'code' query
    /// parameter.
    #[arg(long, env = "AZURE_FUNCTION_KEY")]
    function_key: Option<String>,

    /// Site identifier used to route uploads server-side.
    #[arg(long, env = "WEBSITE_ID", default_value = "default")]
    website_id: String,

    /// Camera identifier used to route uploads server-side.
    #[arg(long, env = "CAMERA_NAME", default_value = "camera1")]
    camera_name: String,

    /// Directory for local-delivery captures.
    #[arg(long, env = "OUTPUT_DIR", default_value = "captures")]
    output_dir: PathBuf,

    /// Still capture width in pixels.
    #[arg(long, env = "CAPTURE_WIDTH", default_value_t = 4608)]
    width: u32,

    /// Still capture height in pixels.
    #[arg(long, env = "CAPTURE_HEIGHT", default_value_t = 2592)]
    height: u32,

    /// Video clip length in seconds.
    #[arg(long, env = "VIDEO_DURATION_SECS", default_value_t = 5)]
    video_duration_secs: u64,

    /// Upload re-attempts after a failed first try. The default of 0 drops
    /// a failed upload after logging it.
    #[arg(long, env = "UPLOAD_RETRIES", default_value_t = 0)]
    upload_retries: u32,

    /// Run with scripted sensor readings and a synthetic camera instead of
    /// the real hardware.
    #[arg(long, env = "STUB_HARDWARE")]
    stub_hardware: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mode = pircam::parse_capture_mode(&args.mode)?;
    let delivery = pircam::parse_delivery_mode(&args.delivery)?;
    let settings = CaptureSettings {
        width: args.width,
        height: args.height,
    };

    log::info!("pircamd starting");
    log::info!("  pin: {} (BCM)", args.pin);
    log::info!("  mode: {:?}, delivery: {:?}", mode, delivery);
    log::info!("  resolution: {}x{}", settings.width, settings.height);
    if delivery == DeliveryMode::Local {
        log::info!("  output dir: {}", args.output_dir.display());
    }

    let (sensor, camera) = if args.stub_hardware {
        log::warn!("stub hardware in use; triggering every fourth poll");
        let sensor = PirSensor::cycling(vec![false, false, false, true]);
        (sensor, Camera::stub(settings))
    } else {
        (PirSensor::open(args.pin)?, Camera::open(settings)?)
    };

    let uploader = CloudUploader::new(UploadConfig {
        base_url: args.base_url,
        function_key: args.function_key,
        website_id: args.website_id,
        camera_name: args.camera_name,
        ..UploadConfig::default()
    })?;
    match uploader.endpoint() {
        Some(url) => log::info!("  cloud endpoint: {}", url),
        None => log::info!("  cloud endpoint: none configured"),
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .context("set interrupt handler")?;

    let options = LoopOptions {
        mode,
        delivery,
        output_dir: args.output_dir,
        timing: Timing {
            video_duration: Duration::from_secs(args.video_duration_secs),
            ..Timing::default()
        },
        retry: RetryPolicy {
            retries: args.upload_retries,
            ..RetryPolicy::default()
        },
    };

    TriggerLoop::new(sensor, camera, uploader, options, shutdown)?.run()
}
