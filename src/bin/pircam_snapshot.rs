//! pircam_snapshot - one-shot scheduled capture and upload
//!
//! Run from cron or a systemd timer instead of the motion daemon: warm the
//! camera up briefly, capture one still into a scratch file, upload it, and
//! exit. Unlike the daemon, a missing BASE_URL is a hard startup error; a
//! one-shot invocation with nowhere to deliver is a misconfiguration.
//!
//! A handled upload failure (non-2xx, transport error) is logged and exits
//! 0: the scheduler should not treat a flaky endpoint as a crashed job.
//! Capture and probe failures exit non-zero.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::time::Duration;

use pircam::{
    upload_with_policy, Camera, CaptureSettings, CloudUploader, RetryPolicy, UploadConfig,
};

const SNAPSHOT_WARMUP: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(author, version, about = "One-shot scheduled capture and upload")]
struct Args {
    /// Cloud endpoint base URL. Required for the one-shot variant.
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

    /// Still capture width in pixels.
    #[arg(long, env = "CAPTURE_WIDTH", default_value_t = 4608)]
    width: u32,

    /// Still capture height in pixels.
    #[arg(long, env = "CAPTURE_HEIGHT", default_value_t = 2592)]
    height: u32,

    /// Upload re-attempts after a failed first try.
    #[arg(long, env = "UPLOAD_RETRIES", default_value_t = 0)]
    upload_retries: u32,

    /// Use the synthetic camera instead of the real hardware.
    #[arg(long, env = "STUB_HARDWARE")]
    stub_hardware: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.base_url.as_deref().unwrap_or("").is_empty() {
        bail!("BASE_URL is not set; set it to https://<app>.azurewebsites.net");
    }

    let settings = CaptureSettings {
        width: args.width,
        height: args.height,
    };
    let mut camera = if args.stub_hardware {
        Camera::stub(settings)
    } else {
        Camera::open(settings)?
    };
    let uploader = CloudUploader::new(UploadConfig {
        base_url: args.base_url,
        function_key: args.function_key,
        website_id: args.website_id,
        camera_name: args.camera_name,
        ..UploadConfig::default()
    })?;

    std::thread::sleep(SNAPSHOT_WARMUP);

    let stamp = pircam::timestamp();
    log::info!("scheduled capture starting: {}", stamp);
    let scratch = camera
        .capture_photo_to_temp()
        .context("scheduled capture failed")?;

    let policy = RetryPolicy {
        retries: args.upload_retries,
        ..RetryPolicy::default()
    };
    let result = upload_with_policy(&uploader, scratch.path(), &stamp, policy);
    scratch.release();

    if result.success {
        log::info!("scheduled upload complete: {}", stamp);
    } else {
        log::error!(
            "scheduled upload failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
