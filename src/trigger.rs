//! Trigger loop.
//!
//! The orchestrator tying sensor, camera, and uploader together:
//!
//! ```text
//!          true reading
//! ARMED ----------------> CAPTURING --> COOLDOWN --> ARMED
//!   ^  \___false reading___/
//! ```
//!
//! One state machine, one control thread, one live artifact at a time. The
//! loop owns the sensor and camera handles for the process lifetime and
//! releases the sensor on shutdown. Capture and upload failures are logged
//! and the machine re-arms; sensor failures propagate and terminate the
//! process for the supervisor to restart.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::camera::Camera;
use crate::sensor::PirSensor;
use crate::upload::{CloudUploader, UploadResult};

/// Trigger state. `Capturing` and `Cooldown` each last exactly one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Armed,
    Capturing,
    Cooldown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    Photo,
    Video,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    Local,
    Cloud,
}

/// Loop timing. The defaults are the deployment values; tests shrink them.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    /// Delay before first arming, letting the capture hardware stabilize.
    pub warmup: Duration,
    /// Interval between sensor reads while armed.
    pub poll_interval: Duration,
    /// Delay after a trigger cycle before re-arming, so one motion event
    /// does not fire twice.
    pub cooldown: Duration,
    /// Clip length for video captures.
    pub video_duration: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            cooldown: Duration::from_secs(2),
            video_duration: Duration::from_secs(5),
        }
    }
}

/// Upload retry knob. The default of zero retries is the contract: a failed
/// upload is logged and dropped. Anything else is opt-in configuration.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Re-attempts after the first try.
    pub retries: u32,
    /// Delay before the first re-attempt; doubles per attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Everything about a loop run that is not a hardware handle.
#[derive(Clone, Debug)]
pub struct LoopOptions {
    pub mode: CaptureMode,
    pub delivery: DeliveryMode,
    /// Destination for local-delivery captures.
    pub output_dir: PathBuf,
    pub timing: Timing,
    pub retry: RetryPolicy,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Photo,
            delivery: DeliveryMode::Local,
            output_dir: PathBuf::from("captures"),
            timing: Timing::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// The capture-trigger-deliver state machine.
pub struct TriggerLoop {
    sensor: PirSensor,
    camera: Camera,
    uploader: CloudUploader,
    options: LoopOptions,
    shutdown: Arc<AtomicBool>,
    phase: Phase,
}

impl TriggerLoop {
    pub fn new(
        sensor: PirSensor,
        camera: Camera,
        uploader: CloudUploader,
        options: LoopOptions,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        if options.mode == CaptureMode::Video && options.delivery == DeliveryMode::Cloud {
            bail!("video capture cannot be cloud-delivered; the endpoint accepts image/jpeg only");
        }
        if options.delivery == DeliveryMode::Local {
            std::fs::create_dir_all(&options.output_dir)?;
        }
        Ok(Self {
            sensor,
            camera,
            uploader,
            options,
            shutdown,
            phase: Phase::Armed,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance exactly one transition. Does not sleep; `run` owns the
    /// pacing between steps.
    pub fn step(&mut self) -> Result<Phase> {
        self.phase = match self.phase {
            Phase::Armed => {
                if self.sensor.motion_detected()? {
                    log::info!("Motion Detected!");
                    Phase::Capturing
                } else {
                    Phase::Armed
                }
            }
            Phase::Capturing => {
                self.run_capture_cycle()?;
                Phase::Cooldown
            }
            Phase::Cooldown => {
                log::info!("Ready");
                Phase::Armed
            }
        };
        Ok(self.phase)
    }

    /// Run until the shutdown flag is set, then release the sensor.
    pub fn run(mut self) -> Result<()> {
        log::info!(
            "warming up for {}s before arming",
            self.options.timing.warmup.as_secs()
        );
        self.sleep_interruptible(self.options.timing.warmup);
        log::info!("Ready");

        while !self.shutdown.load(Ordering::SeqCst) {
            self.step()?;
            match self.phase {
                Phase::Armed => self.sleep_interruptible(self.options.timing.poll_interval),
                Phase::Cooldown => self.sleep_interruptible(self.options.timing.cooldown),
                // Capture runs on the next step without delay.
                Phase::Capturing => {}
            }
        }

        log::info!("shutdown requested; releasing sensor");
        self.sensor.cleanup();
        Ok(())
    }

    /// One trigger cycle: capture, deliver, and for cloud delivery release
    /// the scratch artifact whatever the upload outcome. A capture failure
    /// ends the cycle; the machine still cools down and re-arms.
    fn run_capture_cycle(&mut self) -> Result<()> {
        let stamp = crate::timestamp();
        match (self.options.mode, self.options.delivery) {
            (CaptureMode::Photo, DeliveryMode::Local) => {
                let path = self.options.output_dir.join(format!("IMG_{}.jpg", stamp));
                match self.camera.capture_photo(&path) {
                    Ok(()) => log::info!("captured {}", path.display()),
                    Err(err) => log::error!("photo capture failed: {:#}", err),
                }
            }
            (CaptureMode::Video, DeliveryMode::Local) => {
                let path = self.options.output_dir.join(format!("VID_{}.mp4", stamp));
                match self
                    .camera
                    .capture_video(&path, self.options.timing.video_duration)
                {
                    Ok(()) => log::info!("recorded {}", path.display()),
                    Err(err) => log::error!("video capture failed: {:#}", err),
                }
            }
            (CaptureMode::Photo, DeliveryMode::Cloud) => {
                let scratch = match self.camera.capture_photo_to_temp() {
                    Ok(scratch) => scratch,
                    Err(err) => {
                        log::error!("photo capture failed: {:#}", err);
                        return Ok(());
                    }
                };
                let result =
                    upload_with_policy(&self.uploader, scratch.path(), &stamp, self.options.retry);
                if !result.success {
                    log::warn!(
                        "photo {} not delivered: {}",
                        stamp,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                scratch.release();
            }
            (CaptureMode::Video, DeliveryMode::Cloud) => {
                // Rejected in new(); unreachable in a constructed loop.
                bail!("video capture cannot be cloud-delivered");
            }
        }
        Ok(())
    }

    fn sleep_interruptible(&self, duration: Duration) {
        sleep_unless_shutdown(&self.shutdown, duration);
    }
}

/// Upload with up to `policy.retries` re-attempts and doubling backoff.
/// With the default policy this is exactly one attempt. An unconfigured
/// uploader never retries; skipping twice cannot succeed.
pub fn upload_with_policy(
    uploader: &CloudUploader,
    path: &std::path::Path,
    timestamp: &str,
    policy: RetryPolicy,
) -> UploadResult {
    let mut result = uploader.upload(path, timestamp);
    if !uploader.is_configured() {
        return result;
    }
    let mut backoff = policy.backoff;
    for attempt in 1..=policy.retries {
        if result.success {
            break;
        }
        log::info!(
            "retrying upload in {}ms (attempt {} of {})",
            backoff.as_millis(),
            attempt + 1,
            policy.retries + 1
        );
        std::thread::sleep(backoff);
        backoff *= 2;
        result = uploader.upload(path, timestamp);
    }
    result
}

fn sleep_unless_shutdown(shutdown: &AtomicBool, duration: Duration) {
    const SLICE: Duration = Duration::from_millis(50);
    let mut remaining = duration;
    while remaining > Duration::ZERO && !shutdown.load(Ordering::SeqCst) {
        let nap = remaining.min(SLICE);
        std::thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
}
