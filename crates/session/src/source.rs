//! Landmark frame sources.
//!
//! A source wraps the external landmark detector. It is pulled one frame
//! at a time by whichever session owns it; `start()` (re)opens it, so the
//! same source can serve a calibration run and then a realtime run.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use gazefit_common::error::{GazefitError, GazefitResult};
use gazefit_model::landmark::{parse_frames, LandmarkFrame, LandmarkSet};

/// One frame delivered by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the stream since the last `start()`.
    pub index: u64,
    /// Nanoseconds since stream start.
    pub timestamp_ns: u64,
    /// Detected landmarks, `None` when no face was found.
    pub landmarks: Option<LandmarkSet>,
}

/// Pull-based producer of landmark frames.
pub trait LandmarkSource {
    /// Open or rewind the source. Fails with `CaptureUnavailable`.
    fn start(&mut self) -> GazefitResult<()>;

    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> GazefitResult<Option<Frame>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

impl<S: LandmarkSource + ?Sized> LandmarkSource for Box<S> {
    fn start(&mut self) -> GazefitResult<()> {
        (**self).start()
    }

    fn next_frame(&mut self) -> GazefitResult<Option<Frame>> {
        (**self).next_frame()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Frames held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    frames: Vec<LandmarkFrame>,
    cursor: Option<usize>,
}

impl MemorySource {
    pub fn new(frames: Vec<LandmarkFrame>) -> Self {
        Self {
            name: "memory".to_string(),
            frames,
            cursor: None,
        }
    }

    /// Frames stamped at a fixed rate from a sequence of detector outputs.
    pub fn from_landmarks(landmarks: Vec<Option<LandmarkSet>>, fps: u32) -> Self {
        let frame_ns = 1_000_000_000 / u64::from(fps.max(1));
        let frames = landmarks
            .into_iter()
            .enumerate()
            .map(|(i, landmarks)| LandmarkFrame {
                timestamp_ns: i as u64 * frame_ns,
                landmarks,
            })
            .collect();
        Self::new(frames)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LandmarkSource for MemorySource {
    fn start(&mut self) -> GazefitResult<()> {
        self.cursor = Some(0);
        Ok(())
    }

    fn next_frame(&mut self) -> GazefitResult<Option<Frame>> {
        let cursor = self.cursor.as_mut().ok_or_else(|| {
            GazefitError::capture_unavailable(format!("{} not started", self.name))
        })?;
        let Some(frame) = self.frames.get(*cursor) else {
            return Ok(None);
        };
        let index = *cursor as u64;
        *cursor += 1;
        Ok(Some(Frame {
            index,
            timestamp_ns: frame.timestamp_ns,
            landmarks: frame.landmarks.clone(),
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Replays a JSONL landmark recording.
#[derive(Debug)]
pub struct ReplaySource {
    path: PathBuf,
    name: String,
    inner: Option<MemorySource>,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("replay:{}", path.display());
        Self {
            path,
            name,
            inner: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LandmarkSource for ReplaySource {
    fn start(&mut self) -> GazefitResult<()> {
        if let Some(inner) = self.inner.as_mut() {
            debug!(source = %self.name, "Rewinding recording");
            return inner.start();
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            GazefitError::capture_unavailable(format!(
                "cannot open recording {}: {e}",
                self.path.display()
            ))
        })?;
        let frames = parse_frames(&content).map_err(|e| {
            GazefitError::capture_unavailable(format!(
                "malformed recording {}: {e}",
                self.path.display()
            ))
        })?;

        info!(source = %self.name, frames = frames.len(), "Recording opened");
        let mut inner = MemorySource::new(frames).with_name(self.name.clone());
        inner.start()?;
        self.inner = Some(inner);
        Ok(())
    }

    fn next_frame(&mut self) -> GazefitResult<Option<Frame>> {
        match self.inner.as_mut() {
            Some(inner) => inner.next_frame(),
            None => Err(GazefitError::capture_unavailable(format!(
                "{} not started",
                self.name
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
