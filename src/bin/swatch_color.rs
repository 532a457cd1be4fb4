use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use swatch_color_wasm::config::{ParamOverrides, read_params_file, resolve_params};
use swatch_color_wasm::{BatchOptions, ColorJob, Profile, SamplerParams, run_batch};
use anyhow::Context;
use anyhow::Result;

/// Sample the dominant color of product photos and print one JSON record per image.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Parameter preset: "general" (whole product photo) or "swatch" (centered garment)
    #[arg(short, long, default_value = "general")]
    profile: Profile,

    /// JSON file with sampler parameters, layered over the profile
    #[arg(long)]
    params: Option<PathBuf>,

    /// Fraction of rows/columns kept around the image center
    #[arg(short = 'c', long)]
    crop_fraction: Option<f64>,

    /// Pixels with channel mean at or above this are treated as background
    #[arg(short = 't', long)]
    brightness_threshold: Option<u8>,

    /// Number of k-means clusters
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Maximum k-means refinement passes
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Seed for centroid initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Hex color recorded for images that could not be sampled
    #[arg(short = 'f', long)]
    fallback: Option<String>,

    /// Pretty-print each record
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let params = resolve(&args)?;
    log::info!(
        "profile {}: crop {}, threshold {}, {} clusters, {} passes, seed {}",
        args.profile,
        params.crop_fraction,
        params.brightness_threshold,
        params.cluster_count,
        params.max_iterations,
        params.seed
    );

    let mut options = BatchOptions::new(params);
    if let Some(hex) = &args.fallback {
        options = options.with_fallback(hex).context("invalid --fallback color")?;
    }

    let jobs: Vec<ColorJob> = args
        .inputs
        .iter()
        .map(|p| ColorJob::from_path(p.clone()))
        .collect();
    let report = run_batch(&jobs, &options).context("sampler parameters rejected")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in &report.records {
        let line = if args.pretty {
            serde_json::to_string_pretty(record)?
        } else {
            serde_json::to_string(record)?
        };
        writeln!(out, "{line}")?;
    }

    Ok(())
}

/// Profile preset, then the optional params file, then individual flags.
fn resolve(args: &Args) -> Result<SamplerParams> {
    let json = match &args.params {
        Some(path) => Some(
            read_params_file(path)
                .with_context(|| format!("failed to read params file {}", path.display()))?,
        ),
        None => None,
    };
    let overrides = ParamOverrides {
        crop_fraction: args.crop_fraction,
        brightness_threshold: args.brightness_threshold,
        cluster_count: args.clusters,
        max_iterations: args.max_iterations,
        seed: args.seed,
    };
    resolve_params(args.profile, json.as_deref(), &overrides)
        .context("invalid sampler parameters")
}
