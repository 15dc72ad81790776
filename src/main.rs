use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use iconset::feasibility::check_feasibility;
use iconset::jaccard::validate_overlap;
use iconset::partition::{chi_squared, partition_counts, HASH_IDENTITY, NUM_PARTITIONS};
use iconset::sampler::GenerateError;
use iconset::service::{execute, GenerationRequest, GenerationResponse, ServiceError};
use iconset::universe::InMemoryUniverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "iconset", version, about = "Deterministic icon set generator (HPSS)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate icon sets and write the response JSON.
    Generate {
        #[arg(long, default_value_t = 100)]
        num_sets: usize,
        #[arg(long, default_value_t = 20)]
        items_per_set: usize,
        #[arg(long, default_value_t = 0.10)]
        threshold: f64,
        /// Use the sequential universe 1..=N.
        #[arg(long, conflicts_with = "ids_file")]
        universe_size: Option<u64>,
        /// Load the universe from a file of one id per line.
        #[arg(long)]
        ids_file: Option<PathBuf>,
        #[arg(long, default_value = "out/sets.json")]
        out: PathBuf,
    },
    /// Print the feasibility verdict for a request without generating.
    Feasibility {
        #[arg(long)]
        num_sets: usize,
        #[arg(long)]
        items_per_set: usize,
        #[arg(long)]
        threshold: f64,
        #[arg(long)]
        universe_size: u64,
    },
    /// Re-check a written response against a threshold, pair by pair.
    Validate {
        #[arg(long)]
        sets: PathBuf,
        #[arg(long)]
        threshold: f64,
    },
    /// Partition population histogram and chi-squared uniformity statistic.
    PartitionStats {
        #[arg(long, conflicts_with = "ids_file")]
        universe_size: Option<u64>,
        #[arg(long)]
        ids_file: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Generate {
            num_sets,
            items_per_set,
            threshold,
            universe_size,
            ids_file,
            out,
        } => {
            let universe = load_universe(universe_size, ids_file.as_deref())?;
            let request = GenerationRequest {
                num_sets,
                items_per_set,
                overlap_threshold: threshold,
                request_id: None,
            };
            let response = match execute(&request, &universe) {
                Ok(response) => response,
                Err(ServiceError::Validation(reason)) => {
                    eprintln!("invalid request: {reason}");
                    return Ok(ExitCode::from(2));
                }
                Err(ServiceError::Generate(GenerateError::Infeasible(verdict))) => {
                    eprintln!("{}", serde_json::to_string_pretty(&verdict)?);
                    return Ok(ExitCode::from(3));
                }
                Err(other) => return Err(other.into()),
            };
            write_response(&out, &response)?;
            println!(
                "generated sets={} items_per_set={} max_jaccard={:.4} time_ms={} out={}",
                response.total_sets,
                response.items_per_set,
                response.statistics.max_jaccard,
                response.execution_time_ms,
                out.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Feasibility {
            num_sets,
            items_per_set,
            threshold,
            universe_size,
        } => {
            let verdict = check_feasibility(num_sets, items_per_set, threshold, universe_size)?;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { sets, threshold } => {
            let text = fs::read_to_string(&sets)
                .with_context(|| format!("reading {}", sets.display()))?;
            let response: GenerationResponse =
                serde_json::from_str(&text).context("parsing response JSON")?;
            let report = validate_overlap(&response.sets, threshold);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.valid {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::PartitionStats {
            universe_size,
            ids_file,
        } => {
            let ids = match ids_file.as_deref() {
                Some(path) => read_ids(path)?,
                None => (1..=universe_size.unwrap_or(100_000) as i64).collect(),
            };
            let total = ids.len() as u64;
            let counts = partition_counts(ids);
            let min = counts.iter().min().copied().unwrap_or(0);
            let max = counts.iter().max().copied().unwrap_or(0);
            println!(
                "hash={} partitions={} icons={} min_per_partition={} max_per_partition={} chi_squared={:.2}",
                HASH_IDENTITY,
                NUM_PARTITIONS,
                total,
                min,
                max,
                chi_squared(&counts, total)
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_universe(universe_size: Option<u64>, ids_file: Option<&Path>) -> Result<InMemoryUniverse> {
    match ids_file {
        Some(path) => Ok(InMemoryUniverse::from_ids(read_ids(path)?)),
        None => Ok(InMemoryUniverse::sequential(universe_size.unwrap_or(100_000))),
    }
}

fn read_ids(path: &Path) -> Result<Vec<i64>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut ids = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id: i64 = line
            .parse()
            .with_context(|| format!("{}:{}: bad icon id {line:?}", path.display(), lineno + 1))?;
        ids.push(id);
    }
    if ids.is_empty() {
        bail!("{} contains no icon ids", path.display());
    }
    Ok(ids)
}

fn write_response(out: &Path, response: &GenerationResponse) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    fs::write(out, serde_json::to_vec_pretty(response)?)
        .with_context(|| format!("writing {}", out.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ids_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        fs::write(&path, "5\n\n  17 \n-3\n").unwrap();
        assert_eq!(read_ids(&path).unwrap(), vec![5, 17, -3]);
    }

    #[test]
    fn ids_file_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        fs::write(&path, "5\nnot-a-number\n").unwrap();
        assert!(read_ids(&path).is_err());
    }

    #[test]
    fn generate_then_validate_round_trip() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("sets.json");
        let universe = InMemoryUniverse::sequential(100_000);
        let request = GenerationRequest {
            num_sets: 5,
            items_per_set: 10,
            overlap_threshold: 0.10,
            request_id: None,
        };
        let response = execute(&request, &universe).unwrap();
        write_response(&out, &response).unwrap();

        let text = fs::read_to_string(&out).unwrap();
        let reloaded: GenerationResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(reloaded.sets, response.sets);
        let report = validate_overlap(&reloaded.sets, 0.10);
        assert!(report.valid);
    }
}
