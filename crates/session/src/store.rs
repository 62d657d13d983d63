//! Append-only calibration sample store.
//!
//! A new file is created by writing its header to a temp file and renaming
//! it into place. After that, rows are only ever appended and synced, so a
//! crash can at worst leave one truncated final row, which readers skip.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use gazefit_common::error::{GazefitError, GazefitResult};
use gazefit_model::feature::FeatureLayout;
use gazefit_model::model::write_atomic;
use gazefit_model::sample::{
    file_preamble, format_row, parse_samples, CalibrationSample, SampleFile, SampleFileHeader,
};

use crate::model_error;

/// Writes calibration samples for one feature layout.
pub struct SampleStore {
    file: File,
    path: PathBuf,
    layout: FeatureLayout,
    pending: Vec<CalibrationSample>,
    flushed: usize,
}

impl SampleStore {
    /// Create a fresh sample file, replacing any previous one.
    pub fn create(path: impl Into<PathBuf>, layout: FeatureLayout) -> GazefitResult<Self> {
        let path = path.into();
        let header = SampleFileHeader::new(layout);
        let preamble = file_preamble(&header)?;
        write_atomic(&path, preamble.as_bytes()).map_err(|e| model_error(&path, e))?;

        info!(path = %path.display(), layout = %layout, "Sample file created");
        Self::open_file(path, layout, 0)
    }

    /// Append to an existing sample file, creating it if absent.
    ///
    /// The file's layout must match `layout`.
    pub fn open_append(path: impl Into<PathBuf>, layout: FeatureLayout) -> GazefitResult<Self> {
        let path = path.into();
        if !path.exists() {
            return Self::create(path, layout);
        }

        let existing = read_samples(&path)?;
        if existing.layout != layout {
            return Err(GazefitError::incompatible(
                layout.describe(),
                existing.layout.describe(),
            ));
        }
        if existing.truncated_tail {
            drop_partial_row(&path)?;
        } else {
            terminate_last_row(&path)?;
        }

        info!(
            path = %path.display(),
            layout = %layout,
            existing = existing.samples.len(),
            "Appending to sample file"
        );
        Self::open_file(path, layout, existing.samples.len())
    }

    fn open_file(path: PathBuf, layout: FeatureLayout, flushed: usize) -> GazefitResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| GazefitError::persistence(&path, e))?;
        Ok(Self {
            file,
            path,
            layout,
            pending: Vec::new(),
            flushed,
        })
    }

    /// Buffer one sample. Nothing is written until [`flush`](Self::flush).
    pub fn record(&mut self, sample: CalibrationSample) -> GazefitResult<()> {
        if sample.features.layout() != self.layout {
            return Err(GazefitError::config(format!(
                "sample layout {} does not match store layout {}",
                sample.features.layout().describe(),
                self.layout.describe()
            )));
        }
        self.pending.push(sample);
        Ok(())
    }

    /// Append and sync all buffered samples.
    pub fn flush(&mut self) -> GazefitResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let mut rows = String::new();
        for sample in &self.pending {
            rows.push_str(&format_row(sample));
            rows.push('\n');
        }
        self.file
            .write_all(rows.as_bytes())
            .and_then(|_| self.file.sync_data())
            .map_err(|e| GazefitError::persistence(&self.path, e))?;

        let written = self.pending.len();
        self.flushed += written;
        self.pending.clear();
        debug!(written, total = self.flushed, "Samples flushed");
        Ok(written)
    }

    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    /// Samples buffered but not yet flushed.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Samples durably in the file, including ones from earlier sessions.
    pub fn flushed(&self) -> usize {
        self.flushed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SampleStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "Failed to flush samples on drop");
        }
    }
}

/// Read a sample file.
pub fn read_samples(path: impl AsRef<Path>) -> GazefitResult<SampleFile> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| GazefitError::persistence(path, e))?;
    let file = parse_samples(&content).map_err(|e| model_error(path, e))?;
    if file.truncated_tail {
        warn!(path = %path.display(), "Ignoring truncated final row");
    }
    Ok(file)
}

/// Add the missing newline after a complete final row.
fn terminate_last_row(path: &Path) -> GazefitResult<()> {
    let bytes = std::fs::read(path).map_err(|e| GazefitError::persistence(path, e))?;
    if bytes.last().map_or(true, |b| *b == b'\n') {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| GazefitError::persistence(path, e))?;
    file.write_all(b"\n")
        .and_then(|_| file.sync_data())
        .map_err(|e| GazefitError::persistence(path, e))?;
    debug!(path = %path.display(), "Terminated final row before appending");
    Ok(())
}

/// Cut an interrupted final row so appends start on a fresh line.
fn drop_partial_row(path: &Path) -> GazefitResult<()> {
    let bytes = std::fs::read(path).map_err(|e| GazefitError::persistence(path, e))?;
    let keep = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i + 1);

    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| GazefitError::persistence(path, e))?;
    file.set_len(keep as u64)
        .and_then(|_| file.sync_data())
        .map_err(|e| GazefitError::persistence(path, e))?;

    warn!(
        path = %path.display(),
        dropped_bytes = bytes.len() - keep,
        "Removed truncated final row before appending"
    );
    Ok(())
}
