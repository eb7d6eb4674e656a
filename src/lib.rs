//! pircam
//!
//! Motion-triggered capture-and-upload pipeline for a single-board security
//! camera (Raspberry Pi + PIR sensor + camera module).
//!
//! # Architecture
//!
//! One control thread runs the trigger state machine:
//!
//! ```text
//! PirSensor -> TriggerLoop -> Camera -> (file) -> CloudUploader -> endpoint
//! ```
//!
//! - `sensor`: PIR pin reads (rppal GPIO, or a scripted backend for machines
//!   without the hardware)
//! - `camera`: still/video capture (rpicam-apps subprocess, or a synthetic
//!   JPEG backend)
//! - `scratch`: ephemeral artifact storage with guaranteed removal
//! - `upload`: one blocking HTTP PUT per artifact, never more than one in
//!   flight
//! - `trigger`: the ARMED/CAPTURING/COOLDOWN orchestrator owning the hardware
//!   handles for the process lifetime
//!
//! Every operation is synchronous; a slow endpoint stalls detection for at
//! most the request timeout. Sensor failures are fatal (an external
//! supervisor restarts the process); capture and upload failures are logged
//! and the loop re-arms.

use anyhow::Result;

pub mod camera;
pub mod scratch;
pub mod sensor;
pub mod trigger;
pub mod upload;

pub use camera::{Camera, CaptureSettings};
pub use scratch::{remove_if_present, ArtifactStore, ScratchFile};
pub use sensor::PirSensor;
pub use trigger::{
    upload_with_policy, CaptureMode, DeliveryMode, LoopOptions, Phase, RetryPolicy, Timing,
    TriggerLoop,
};
pub use upload::{CloudUploader, UploadConfig, UploadResult};

/// Capture timestamp, `YYYYMMDD-HHMMSS` in local time.
///
/// Used both for local filenames and as the log/correlation token handed to
/// the uploader. Second resolution: two triggers inside the same second share
/// a stamp, and a local-delivery capture then overwrites the earlier file.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Parse a capture mode flag value ("photo" or "video").
pub fn parse_capture_mode(value: &str) -> Result<CaptureMode> {
    match value {
        "photo" => Ok(CaptureMode::Photo),
        "video" => Ok(CaptureMode::Video),
        other => anyhow::bail!("unknown capture mode '{}'; expected photo or video", other),
    }
}

/// Parse a delivery mode flag value ("local" or "cloud").
pub fn parse_delivery_mode(value: &str) -> Result<DeliveryMode> {
    match value {
        "local" => Ok(DeliveryMode::Local),
        "cloud" => Ok(DeliveryMode::Cloud),
        other => anyhow::bail!("unknown delivery mode '{}'; expected local or cloud", other),
    }
}
