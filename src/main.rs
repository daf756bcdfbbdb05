use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};

use poi_extract::apis::{CachedGeocoder, GeocodeCache, NominatimGeocoder, resolve_address};
use poi_extract::error::{PoiError, Result};
use poi_extract::overpass::{OverpassClient, normalize_snapshot};
use poi_extract::pipeline::{ExtractRequest, extract};
use poi_extract::repro::{
    DEFAULT_RUNS, ReproRequest, compare_runs, latest_run_dir, run_and_compare,
};
use poi_extract::settings::{DEFAULT_OVERPASS_URL, RetryPolicy, Settings};
use poi_extract::types::{GeoPoint, ReproComparison};

/// Exit code for a repro comparison whose runs disagree.
const UNSTABLE_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "poiextract", version, about = "Deterministic 1x1 km OSM POI extraction")]
struct Cli {
    /// Log level when RUST_LOG is not set.
    #[arg(long, global = true, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract POIs around a point and write pois.csv / pois.json.
    Extract {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        network: NetworkArgs,
        /// Output directory.
        #[arg(long, default_value = "out")]
        outdir: PathBuf,
    },
    /// Fetch the same query several times and compare identity hashes.
    Repro {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        network: NetworkArgs,
        /// Number of fetches.
        #[arg(long, default_value_t = DEFAULT_RUNS)]
        runs: u32,
        /// Parent directory for timestamped run directories.
        #[arg(long, default_value = "logs/repro")]
        outdir: PathBuf,
    },
    /// Compare the run records in an existing repro directory.
    Compare {
        /// A run directory, or a parent whose newest run directory is used.
        dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Centre latitude in degrees.
    #[arg(long, requires = "lon", conflicts_with = "address", allow_negative_numbers = true)]
    lat: Option<f64>,
    /// Centre longitude in degrees.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,
    /// Free-form address, geocoded through Nominatim.
    #[arg(long)]
    address: Option<String>,
    /// Tag filter file (.toml, .yml/.yaml or .json).
    #[arg(long)]
    tags: PathBuf,
    /// Pin the data to a date: YYYY-MM-DD or an RFC 3339 timestamp.
    #[arg(long)]
    snapshot: Option<String>,
    /// Geocode cache file; defaults to the per-user cache directory.
    #[arg(long)]
    geocode_cache: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct NetworkArgs {
    #[arg(long, default_value = DEFAULT_OVERPASS_URL)]
    overpass_url: String,
    /// Attempts per request, including the first.
    #[arg(long, default_value_t = 5)]
    max_retries: u32,
    /// Tag filters per request.
    #[arg(long, default_value_t = 1)]
    chunk_size: usize,
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 180)]
    timeout: u64,
}

impl NetworkArgs {
    fn client(&self) -> OverpassClient {
        let settings = Settings::default()
            .with_overpass_url(&self.overpass_url)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_chunk_size(self.chunk_size)
            .with_retry(RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            });
        OverpassClient::with_settings(settings)
    }
}

impl TargetArgs {
    fn center(&self) -> Result<GeoPoint> {
        match (self.lat, self.lon, self.address.as_deref()) {
            (Some(lat), Some(lon), _) => {
                let center = GeoPoint::new(lat, lon);
                center.validate()?;
                Ok(center)
            }
            (_, _, Some(address)) => {
                let path = match &self.geocode_cache {
                    Some(path) => path.clone(),
                    None => GeocodeCache::default_path().ok_or_else(|| {
                        PoiError::Config(
                            "no cache directory for geocoding; pass --geocode-cache".to_string(),
                        )
                    })?,
                };
                let mut geocoder =
                    CachedGeocoder::new(NominatimGeocoder::default(), GeocodeCache::open(&path));
                let center = resolve_address(&mut geocoder, address)?;
                info!(address, lat = center.lat, lon = center.lon, "resolved address");
                Ok(center)
            }
            _ => Err(PoiError::Config(
                "either --lat/--lon or --address is required".to_string(),
            )),
        }
    }

    fn snapshot(&self) -> Result<Option<String>> {
        self.snapshot.as_deref().map(normalize_snapshot).transpose()
    }
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match execute(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn execute(command: Command) -> Result<ExitCode> {
    match command {
        Command::Extract {
            target,
            network,
            outdir,
        } => {
            let request = ExtractRequest {
                center: target.center()?,
                input_address: target.address.clone(),
                tags_path: target.tags.clone(),
                snapshot_iso: target.snapshot()?,
                out_dir: outdir,
            };
            if request.snapshot_iso.is_none() {
                warn!("no --snapshot given; the result reflects the live database");
            }
            let summary = extract(&request, &network.client())?;
            info!(
                rows = summary.rows,
                skipped = summary.skipped.discarded(),
                id_list_sha256 = %summary.id_list_sha256,
                osm_base_ts = ?summary.osm_base_ts,
                "extraction complete"
            );
            println!("{}", summary.csv_path.display());
            println!("{}", summary.json_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Repro {
            target,
            network,
            runs,
            outdir,
        } => {
            let request = ReproRequest::new(target.center()?, target.tags.clone(), &outdir)
                .with_runs(runs)
                .with_snapshot(target.snapshot()?);
            let (run_dir, comparison) = run_and_compare(&request, &network.client())?;
            info!(dir = %run_dir.display(), "repro runs written");
            report(&comparison)
        }
        Command::Compare { dir } => {
            let has_runs = std::fs::read_dir(&dir)?.filter_map(|entry| entry.ok()).any(|entry| {
                entry.path().extension().and_then(|ext| ext.to_str()) == Some("json")
            });
            let run_dir = if has_runs {
                dir
            } else {
                latest_run_dir(&dir)?.unwrap_or(dir)
            };
            report(&compare_runs(&run_dir)?)
        }
    }
}

fn report(comparison: &ReproComparison) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(comparison)?);
    if comparison.stable {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(distinct = comparison.distinct_hashes().len(), "repro runs disagree");
        Ok(ExitCode::from(UNSTABLE_EXIT))
    }
}
