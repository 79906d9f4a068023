//! Multi-visit repeatability and PSF-residual correlation report.
//!
//! Loads per-visit JSON catalogs from a repository directory, matches
//! detections across visits, and prints the photometric/astrometric
//! repeatability summary plus the TE1/TE2 residual-ellipticity correlation
//! measurements.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use matched_visits::config::PipelineConfig;
use matched_visits::measurement::{MeasurementError, TExConfig, TExMeasurement};
use matched_visits::record::VisitId;
use matched_visits::reduce::MatchedMultiVisitDataset;
use matched_visits::repository::json::JsonRepository;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-visit repeatability statistics")]
struct Args {
    /// Repository directory holding visit_<visit>_<ccd>.json catalogs
    #[arg(long)]
    repo: PathBuf,

    /// Visit identifiers as visit:ccd pairs (e.g. 850587:10)
    #[arg(long, required = true, num_args = 1..)]
    visit: Vec<String>,

    /// Pipeline configuration file (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cross-visit match radius in arcseconds (overrides config)
    #[arg(long)]
    match_radius: Option<f64>,

    /// Minimum median SNR for the safe sample (overrides config)
    #[arg(long)]
    safe_snr: Option<f64>,

    /// Output additional information on the analysis steps
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn parse_visit_id(spec: &str) -> anyhow::Result<VisitId> {
    let (visit, detector) = spec
        .split_once(':')
        .with_context(|| format!("visit spec '{spec}' is not of the form visit:ccd"))?;
    Ok(VisitId::new(
        visit.parse().with_context(|| format!("bad visit number in '{spec}'"))?,
        detector.parse().with_context(|| format!("bad ccd number in '{spec}'"))?,
    ))
}

fn print_measurement(m: &TExMeasurement) {
    println!(
        "  {} ({}-band): {:.3e} +/- {:.3e}",
        m.name, m.filter_name, m.quantity, m.quantity_err
    );
    println!("    r (arcmin)      xip          xip_err      npairs");
    for b in 0..m.profile.nbins() {
        println!(
            "    {:>10.3}  {:>12.4e}  {:>11.4e}  {:>8}",
            m.profile.radius[b], m.profile.xip[b], m.profile.xip_err[b], m.profile.npairs[b]
        );
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(radius) = args.match_radius {
        config.match_radius_arcsec = radius;
    }
    if let Some(snr) = args.safe_snr {
        config.safe_snr = snr;
    }
    config.verbose = args.verbose;

    let visit_ids = args
        .visit
        .iter()
        .map(|s| parse_visit_id(s))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let repo = JsonRepository::new(&args.repo);
    let dataset = MatchedMultiVisitDataset::new(&repo, &visit_ids, &config)
        .context("building matched dataset")?;

    println!("Matched multi-visit dataset ({}-band)", dataset.filter_name);
    println!(
        "  groups: {} total, {} good, {} safe",
        dataset.total_groups,
        dataset.good.len(),
        dataset.safe.len()
    );
    println!("  mean magnitude:        {:>10.3} mag", dataset.summary.mag);
    println!("  magnitude RMS:         {:>10.4} mag", dataset.summary.mag_rms);
    println!("  median magnitude err:  {:>10.4} mag", dataset.summary.mag_err);
    println!("  median SNR:            {:>10.1}", dataset.summary.snr);
    println!("  positional RMS:        {:>10.2} mas", dataset.summary.dist_mas);

    println!("\nPSF-residual ellipticity correlations:");
    for tex in [TExConfig::te1(), TExConfig::te2()] {
        match TExMeasurement::compute(&dataset, &tex, &config.correlation) {
            Ok(m) => print_measurement(&m),
            Err(e @ MeasurementError::Correlation { .. }) => {
                // Too few safe stars or an empty bin selection is a missing
                // measurement, not a crash; report it and keep going.
                println!("  {}: not measurable ({e})", tex.name);
            }
        }
    }

    Ok(())
}
