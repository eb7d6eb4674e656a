//! Camera capture.
//!
//! `Camera` wraps the capture hardware behind three operations: still to a
//! path, fixed-duration video to a path, and still to a fresh scratch file
//! (the cloud-delivery variant, where the final destination is not a
//! filesystem path).
//!
//! Backends:
//! - rpicam-apps subprocess runner (`rpicam-still` / `rpicam-vid`), blocking
//!   for the full capture
//! - synthetic backend that renders a real JPEG in-process, so the whole
//!   pipeline runs on machines without the camera module
//!
//! Opening a camera probes the capture stack once; that is the expensive
//! one-time setup, done once per process, not per capture.

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::io::BufWriter;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::scratch::{ArtifactStore, ScratchFile};

/// Capture geometry for stills and clips.
///
/// The default is the camera module's full still resolution.
#[derive(Clone, Copy, Debug)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 4608,
            height: 2592,
        }
    }
}

/// Capture hardware handle, owned by the orchestrator for the process
/// lifetime.
pub struct Camera {
    backend: CameraBackend,
    store: ArtifactStore,
}

enum CameraBackend {
    Rpicam(RpicamCamera),
    Stub(StubCamera),
}

impl Camera {
    /// Probe the rpicam capture stack and return a ready camera.
    pub fn open(settings: CaptureSettings) -> Result<Self> {
        let backend = RpicamCamera::probe(settings)?;
        Ok(Self {
            backend: CameraBackend::Rpicam(backend),
            store: ArtifactStore::new(),
        })
    }

    /// Synthetic backend rendering real JPEG frames in-process.
    pub fn stub(settings: CaptureSettings) -> Self {
        Self {
            backend: CameraBackend::Stub(StubCamera {
                settings,
                available: true,
                frame_count: 0,
            }),
            store: ArtifactStore::new(),
        }
    }

    /// Synthetic backend whose captures always fail. Exercises the
    /// capture-failure path without hardware.
    pub fn stub_unavailable(settings: CaptureSettings) -> Self {
        Self {
            backend: CameraBackend::Stub(StubCamera {
                settings,
                available: false,
                frame_count: 0,
            }),
            store: ArtifactStore::new(),
        }
    }

    /// Override the scratch store used by `capture_photo_to_temp`.
    pub fn with_store(mut self, store: ArtifactStore) -> Self {
        self.store = store;
        self
    }

    /// Capture one still image to `path`.
    pub fn capture_photo(&mut self, path: &Path) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Rpicam(camera) => camera.capture_photo(path),
            CameraBackend::Stub(camera) => camera.capture_photo(path),
        }
    }

    /// Record a clip of the given duration to `path`. Blocks for the full
    /// duration; there is no partial-result streaming.
    pub fn capture_video(&mut self, path: &Path, duration: Duration) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Rpicam(camera) => camera.capture_video(path, duration),
            CameraBackend::Stub(camera) => camera.capture_video(path, duration),
        }
    }

    /// Capture one still into a fresh scratch file. The returned guard owns
    /// the file; dropping it removes the capture.
    pub fn capture_photo_to_temp(&mut self) -> Result<ScratchFile> {
        let scratch = self.store.allocate(".jpg")?;
        // On capture failure the guard drops here and the reserved file is
        // removed with it.
        self.capture_photo(scratch.path())?;
        Ok(scratch)
    }
}

struct RpicamCamera {
    settings: CaptureSettings,
}

impl RpicamCamera {
    fn probe(settings: CaptureSettings) -> Result<Self> {
        let output = Command::new("rpicam-still")
            .arg("--version")
            .output()
            .context("probe rpicam-still; is this a Raspberry Pi with rpicam-apps installed?")?;
        if !output.status.success() {
            bail!(
                "rpicam-still probe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        log::info!(
            "camera ready: rpicam-apps, still resolution {}x{}",
            settings.width,
            settings.height
        );
        Ok(Self { settings })
    }

    fn capture_photo(&self, path: &Path) -> Result<()> {
        let output = Command::new("rpicam-still")
            .arg("--nopreview")
            .arg("--immediate")
            .args(["--width", &self.settings.width.to_string()])
            .args(["--height", &self.settings.height.to_string()])
            .arg("--output")
            .arg(path)
            .output()
            .context("run rpicam-still")?;
        if !output.status.success() {
            bail!(
                "rpicam-still failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn capture_video(&self, path: &Path, duration: Duration) -> Result<()> {
        let output = Command::new("rpicam-vid")
            .arg("--nopreview")
            .args(["--timeout", &duration.as_millis().to_string()])
            .args(["--width", &self.settings.width.to_string()])
            .args(["--height", &self.settings.height.to_string()])
            .args(["--codec", "libav"])
            .arg("--output")
            .arg(path)
            .output()
            .context("run rpicam-vid")?;
        if !output.status.success() {
            bail!(
                "rpicam-vid failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

struct StubCamera {
    settings: CaptureSettings,
    available: bool,
    frame_count: u64,
}

impl StubCamera {
    fn capture_photo(&mut self, path: &Path) -> Result<()> {
        if !self.available {
            return Err(anyhow!("capture hardware unavailable"));
        }
        self.frame_count += 1;
        let image = synthetic_frame(self.settings, self.frame_count);
        let file = std::fs::File::create(path)
            .with_context(|| format!("create capture file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        image
            .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, 85))
            .context("encode synthetic jpeg")?;
        Ok(())
    }

    fn capture_video(&mut self, path: &Path, duration: Duration) -> Result<()> {
        if !self.available {
            return Err(anyhow!("capture hardware unavailable"));
        }
        // Match the hardware contract: recording blocks for the clip length.
        std::thread::sleep(duration);
        self.frame_count += 1;
        std::fs::write(path, MP4_STUB_HEADER)
            .with_context(|| format!("create capture file {}", path.display()))?;
        Ok(())
    }
}

// Minimal ftyp box; enough for consumers that only sniff the container type.
const MP4_STUB_HEADER: &[u8] = &[
    0x00, 0x00, 0x00, 0x14, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00, 0x02, 0x00,
    b'i', b's', b'o', b'm',
];

fn synthetic_frame(settings: CaptureSettings, frame_count: u64) -> RgbImage {
    let shade = (frame_count % 251) as u8;
    RgbImage::from_fn(settings.width, settings.height, move |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, shade])
    })
}
