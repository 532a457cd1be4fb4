//! Sequential batch extraction over local image files.
//!
//! A failing item never stops the batch: it is logged and recorded with no
//! hex (or the configured fallback), and the next job runs.

use std::path::PathBuf;

use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::decode::open_image;
use crate::error::{ExtractError, Result};
use crate::sampler::{DominantColor, SamplerParams, extract_dominant_color, to_hex};

/// One product color to sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorJob {
    pub label: String,
    pub source: PathBuf,
}

impl ColorJob {
    pub fn new(label: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
        }
    }

    /// Job labelled by the file stem of `source`.
    pub fn from_path(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let label = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        Self { label, source }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOptions {
    pub params: SamplerParams,
    /// Hex written for items whose extraction failed; `None` leaves them unset.
    pub fallback_hex: Option<String>,
}

impl BatchOptions {
    pub fn new(params: SamplerParams) -> Self {
        Self {
            params,
            fallback_hex: None,
        }
    }

    /// Set the fallback color, normalising it to lowercase `#rrggbb`.
    pub fn with_fallback(mut self, hex: &str) -> Result<Self> {
        self.fallback_hex = Some(to_hex(parse_hex(hex)?));
        Ok(self)
    }
}

/// Per-job output row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRecord {
    pub label: String,
    pub source: PathBuf,
    pub hex: Option<String>,
    pub filtered_to_empty: bool,
    pub fallback_used: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub records: Vec<ColorRecord>,
    pub sampled: usize,
    pub skipped: usize,
}

/// Run every job in order with the same parameters.
///
/// Parameters are checked once up front; invalid tunables are the only error
/// that aborts the whole batch.
pub fn run_batch(jobs: &[ColorJob], options: &BatchOptions) -> Result<BatchReport> {
    options.params.validate()?;

    let mut report = BatchReport::default();
    for (i, job) in jobs.iter().enumerate() {
        log::debug!("[{}/{}] sampling {}", i + 1, jobs.len(), job.source.display());

        let record = match sample_job(job, &options.params) {
            Ok(color) => {
                report.sampled += 1;
                if color.filtered_to_empty {
                    log::warn!(
                        "{}: every pixel was background, sampled unfiltered crop",
                        job.label
                    );
                }
                ColorRecord {
                    label: job.label.clone(),
                    source: job.source.clone(),
                    hex: Some(color.hex),
                    filtered_to_empty: color.filtered_to_empty,
                    fallback_used: false,
                    error: None,
                }
            }
            Err(err) => {
                report.skipped += 1;
                log::warn!("{}: skipping color ({err})", job.label);
                ColorRecord {
                    label: job.label.clone(),
                    source: job.source.clone(),
                    hex: options.fallback_hex.clone(),
                    filtered_to_empty: false,
                    fallback_used: options.fallback_hex.is_some(),
                    error: Some(err.to_string()),
                }
            }
        };
        report.records.push(record);
    }

    log::info!(
        "batch complete: {} sampled, {} skipped",
        report.sampled,
        report.skipped
    );
    Ok(report)
}

fn sample_job(job: &ColorJob, params: &SamplerParams) -> Result<DominantColor> {
    let grid = open_image(&job.source)?;
    extract_dominant_color(&grid, params)
}

/// Parse `#rrggbb` or `rrggbb` (either case).
pub fn parse_hex(value: &str) -> Result<Srgb<u8>> {
    let invalid = || ExtractError::InvalidHex {
        value: value.to_string(),
    };

    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| invalid())?;
    let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| invalid())?;
    let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| invalid())?;
    Ok(Srgb::new(r, g, b))
}
