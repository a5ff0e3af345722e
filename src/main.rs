//! Deployment Preparation CLI
//!
//! A command-line tool for building catalyst entities and solving the
//! proof-of-work challenges that gate deployments.
//!
//! # Commands
//!
//! - `build` - Hash a directory and build the entity that references it
//! - `rebuild` - Build an entity from previously uploaded content hashes
//! - `hash` - Print the content hash of a file
//! - `solve` - Find a nonce for a proof-of-work challenge
//! - `verify-pow` - Check a nonce against a challenge
//! - `benchmark` - Measure proof-of-work attempts per second

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deploy::config::{default_config_path, ProverConfig};
use deploy::files::{collect_files, parse_content_arg, write_deployment};
use deploy::solver::solve_with_timeout;
use deploy::{
    hash_content, pow, DeploymentBuilder, DeploymentPreparationData, EntityMetadata, EntityType,
    PowChallenge, Timestamp,
};

#[derive(Parser)]
#[command(name = "deploy")]
#[command(author = "Cyberia")]
#[command(version = "0.1.0")]
#[command(about = "Build content-addressed entities and solve deployment proof-of-work challenges")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash every file under a directory and build the entity
    Build {
        /// Entity type (scene, profile, wearable, store, emote)
        #[arg(long = "type")]
        entity_type: EntityType,

        /// Pointer the entity claims (repeatable)
        #[arg(long = "pointer", required = true)]
        pointers: Vec<String>,

        /// Directory holding the content files
        #[arg(long)]
        dir: PathBuf,

        /// JSON file with the entity metadata
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Entity timestamp in milliseconds (default: now)
        #[arg(long)]
        timestamp: Option<Timestamp>,

        /// Write every deployment file here, named by its hash
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Build an entity from content that was uploaded before
    Rebuild {
        /// Entity type (scene, profile, wearable, store, emote)
        #[arg(long = "type")]
        entity_type: EntityType,

        /// Pointer the entity claims (repeatable)
        #[arg(long = "pointer", required = true)]
        pointers: Vec<String>,

        /// Referenced content as NAME=HASH (repeatable)
        #[arg(long = "content")]
        content: Vec<String>,

        /// JSON file with the entity metadata
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Entity timestamp in milliseconds (default: now)
        #[arg(long)]
        timestamp: Option<Timestamp>,

        /// Write the entity file here, named by its hash
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the content hash of a file
    Hash {
        /// File to hash
        file: PathBuf,
    },

    /// Find a nonce for a proof-of-work challenge
    Solve {
        /// Hex challenge issued by the authorization server
        #[arg(long, required_unless_present = "challenge_file")]
        challenge: Option<String>,

        /// Number of leading zero hex digits required
        #[arg(long, required_unless_present = "challenge_file")]
        complexity: Option<usize>,

        /// JSON file holding {"challenge": ..., "complexity": ...}
        #[arg(long, conflicts_with_all = ["challenge", "complexity"])]
        challenge_file: Option<PathBuf>,

        /// Number of threads to use (default: number of CPU cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Check a nonce against a challenge
    VerifyPow {
        #[arg(long)]
        challenge: String,

        #[arg(long)]
        complexity: usize,

        #[arg(long)]
        nonce: String,
    },

    /// Run proof-of-work benchmark
    Benchmark {
        /// Number of nonces to solve at complexity 1
        #[arg(short, long, default_value = "1000")]
        count: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config).and_then(|config| match cli.command {
        Commands::Build {
            entity_type,
            pointers,
            dir,
            metadata,
            timestamp,
            out,
        } => cmd_build(entity_type, pointers, &dir, metadata, timestamp, out, &config),
        Commands::Rebuild {
            entity_type,
            pointers,
            content,
            metadata,
            timestamp,
            out,
        } => cmd_rebuild(entity_type, pointers, &content, metadata, timestamp, out, &config),
        Commands::Hash { file } => cmd_hash(&file),
        Commands::Solve {
            challenge,
            complexity,
            challenge_file,
            threads,
            timeout,
        } => cmd_solve(challenge, complexity, challenge_file, threads, timeout, config),
        Commands::VerifyPow {
            challenge,
            complexity,
            nonce,
        } => cmd_verify_pow(challenge, complexity, &nonce),
        Commands::Benchmark { count } => cmd_benchmark(count),
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ProverConfig> {
    let config = ProverConfig::load_or_default(path.as_deref(), &default_config_path())?;
    Ok(config)
}

fn read_metadata(path: Option<PathBuf>) -> anyhow::Result<Option<EntityMetadata>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read metadata {}", path.display()))?;
    let metadata = serde_json::from_str(&content)
        .with_context(|| format!("Metadata {} is not valid JSON", path.display()))?;
    Ok(Some(metadata))
}

fn report_deployment(
    prepared: &DeploymentPreparationData,
    out: Option<PathBuf>,
    config: &ProverConfig,
) -> anyhow::Result<()> {
    println!("\nEntity id: {}", prepared.entity_id);
    println!("Files ({}):", prepared.files.len());
    for (hash, content) in &prepared.files {
        let marker = if *hash == prepared.entity_id { " (entity)" } else { "" };
        println!("  {}  {} bytes{}", hash, content.len(), marker);
    }

    if let Some(out_dir) = out.or_else(|| config.output_dir.clone()) {
        let written = write_deployment(prepared, &out_dir)?;
        println!("\nWrote {} files to {}", written.len(), out_dir.display());
    }

    println!("\nSign the entity id to authorize the deployment.");
    Ok(())
}

fn cmd_build(
    entity_type: EntityType,
    pointers: Vec<String>,
    dir: &Path,
    metadata: Option<PathBuf>,
    timestamp: Option<Timestamp>,
    out: Option<PathBuf>,
    config: &ProverConfig,
) -> anyhow::Result<()> {
    let metadata = read_metadata(metadata)?;
    let files = collect_files(dir)?;
    info!(files = files.len(), dir = %dir.display(), "building entity");

    let prepared = DeploymentBuilder::new().build_entity(
        entity_type,
        pointers,
        files,
        metadata,
        timestamp,
    )?;

    report_deployment(&prepared, out, config)
}

fn cmd_rebuild(
    entity_type: EntityType,
    pointers: Vec<String>,
    content: &[String],
    metadata: Option<PathBuf>,
    timestamp: Option<Timestamp>,
    out: Option<PathBuf>,
    config: &ProverConfig,
) -> anyhow::Result<()> {
    let metadata = read_metadata(metadata)?;
    let hashes_by_key = content
        .iter()
        .map(|arg| parse_content_arg(arg))
        .collect::<Result<Vec<_>, _>>()?;

    let prepared = DeploymentBuilder::new().build_entity_without_new_files(
        entity_type,
        pointers,
        hashes_by_key,
        metadata,
        timestamp,
    )?;

    report_deployment(&prepared, out, config)
}

fn cmd_hash(file: &Path) -> anyhow::Result<()> {
    let content =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    println!("{}", hash_content(&content)?);
    Ok(())
}

fn cmd_solve(
    challenge: Option<String>,
    complexity: Option<usize>,
    challenge_file: Option<PathBuf>,
    threads: Option<usize>,
    timeout: Option<u64>,
    mut config: ProverConfig,
) -> anyhow::Result<()> {
    let challenge = match (challenge_file, challenge, complexity) {
        (Some(path), _, _) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<PowChallenge>(&content)
                .with_context(|| format!("Invalid challenge in {}", path.display()))?
        }
        (None, Some(challenge), Some(complexity)) => PowChallenge::new(challenge, complexity)?,
        _ => anyhow::bail!("Either --challenge-file or --challenge with --complexity is required"),
    };

    if let Some(threads) = threads {
        config.threads = threads;
    }
    if let Some(timeout) = timeout {
        config.timeout_secs = Some(timeout);
    }

    println!("\n=== Proof-of-Work Solver ===");
    println!("Challenge:  {}", challenge.challenge());
    println!("Complexity: {} hex digits", challenge.complexity());
    println!("Expected attempts: {:.0}", challenge.expected_attempts());
    println!("Threads: {}", config.threads());
    match config.timeout() {
        Some(t) => println!("Timeout: {}s", t.as_secs()),
        None => println!("Timeout: none"),
    }
    println!("============================\n");

    let rt = tokio::runtime::Runtime::new()?;
    let solver = config.solver();
    let solution = rt.block_on(solve_with_timeout(solver, challenge, config.timeout()))?;

    match solution {
        Some(solution) => {
            let secs = solution.elapsed.as_secs_f64();
            println!("Found valid nonce!");
            println!(
                "  Attempts: {} ({:.0} H/s)",
                solution.attempts,
                solution.attempts as f64 / secs.max(f64::EPSILON)
            );
            println!("  Time:     {:.2}s", secs);
            println!("\n{}", solution.nonce);
            Ok(())
        }
        None => anyhow::bail!("No nonce found before the timeout"),
    }
}

fn cmd_verify_pow(challenge: String, complexity: usize, nonce: &str) -> anyhow::Result<()> {
    let challenge = PowChallenge::new(challenge, complexity)?;

    match pow::digest_hex(challenge.challenge(), nonce) {
        Some(digest) => println!("Digest: {}", digest),
        None => anyhow::bail!("Nonce is not hex encoded"),
    }

    if pow::verify(&challenge, nonce) {
        println!("Nonce is valid");
        Ok(())
    } else {
        anyhow::bail!("Nonce does not meet complexity {}", challenge.complexity())
    }
}

fn cmd_benchmark(count: u32) -> anyhow::Result<()> {
    println!("Running benchmark with {} solves at complexity 1...", count);

    let challenge = PowChallenge::new("c0ffee00c0ffee00", 1)?;
    let start = Instant::now();

    for _ in 0..count {
        let _ = pow::solve(&challenge);
    }

    let elapsed = start.elapsed();
    // complexity 1 takes 16 attempts on average
    let attempts = count as f64 * challenge.expected_attempts();
    let rate = attempts / elapsed.as_secs_f64();

    println!("\nResults:");
    println!("  Nonces found:     {}", count);
    println!("  Time elapsed:     {:.2}s", elapsed.as_secs_f64());
    println!("  Attempts (est.):  {:.0}", attempts);
    println!("  Rate:             {:.2} H/s", rate);

    println!("\nSearch parameters:");
    println!("  Nonce size:       {} bytes", deploy::NONCE_BYTES);
    println!("  Max complexity:   {}", deploy::MAX_COMPLEXITY);

    Ok(())
}
