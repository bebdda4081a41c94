//! markerprep CLI
//!
//! Filters follower/marker edge lists down to a consistent, target-audience
//! sample ready for ideological scaling.

mod config;
mod progress;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use markerprep_core::annotate::{classify_languages, language_summary};
use markerprep_core::{CategoryMap, FollowerRecord, Pipeline, PipelineInput, Table};
use markerprep_filters::language::{LanguageClassifierConfig, WhatlangClassifier};
use markerprep_filters::{LocationClassifier, MatchMode, TextNormalizer};
use markerprep_formats::{count_records, read_table, write_jsonl, write_table};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::RunConfig;
use progress::ProgressReporter;

#[derive(Parser)]
#[command(name = "markerprep")]
#[command(version, about = "Follower/marker edge list filtering for ideological scaling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output statistics in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full filtering pipeline described by a run file
    Run {
        /// Run file (YAML or TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Show statistics without writing output
        #[arg(long)]
        dry_run: bool,
    },

    /// Write a starter run file with the default thresholds
    Init {
        /// Where to write the run file (.yaml, .yml or .toml)
        #[arg(value_name = "FILE", default_value = "markerprep.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Normalise bios of a followers file and report its language shares
    Languages {
        /// Followers file (JSONL, optionally gzip-compressed)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Minimum detector confidence for a language to be reported
        #[arg(long, default_value = "0.0")]
        min_confidence: f64,

        /// Keep guesses whatlang does not flag as reliable
        #[arg(long)]
        allow_unreliable: bool,

        /// Seed handed to the language classifier
        #[arg(long, default_value = "3")]
        seed: u64,
    },

    /// Check whether a location string lies in the target country
    Locate {
        /// Free-text location, as found in a follower profile
        #[arg(value_name = "LOCATION")]
        location: String,

        /// Gazetteer of target-country place names, one per line
        #[arg(short, long)]
        gazetteer: PathBuf,

        /// Require place names to match whole tokens
        #[arg(long)]
        token: bool,
    },

    /// Count records in a JSONL table
    Count {
        /// Path to the table file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(!cli.json) // Disable colors if JSON output
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run { config, dry_run } => {
            run_pipeline(config, dry_run, cli.json)?;
        }
        Commands::Init { output, force } => {
            init_config(&output, force)?;
        }
        Commands::Languages {
            input,
            min_confidence,
            allow_unreliable,
            seed,
        } => {
            detect_languages(input, min_confidence, !allow_unreliable, seed, cli.json)?;
        }
        Commands::Locate {
            location,
            gazetteer,
            token,
        } => {
            locate(&location, &gazetteer, token, cli.json)?;
        }
        Commands::Count { input } => {
            count_table(input, cli.json)?;
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}

fn run_pipeline(config_path: PathBuf, dry_run: bool, json_output: bool) -> Result<()> {
    info!("Running follower pipeline");
    info!("  Config: {:?}", config_path);

    let config = RunConfig::load(&config_path)?;
    let mut progress = if json_output {
        ProgressReporter::hidden()
    } else {
        ProgressReporter::new()?
    };

    let gazetteer = config::load_gazetteer(&config.gazetteer)?;
    let categories = match &config.categories {
        Some(path) => config::load_category_map(path)?,
        None => CategoryMap::default(),
    };
    info!(
        "  Gazetteer: {} places, category map: {} labels",
        gazetteer.len(),
        categories.len()
    );

    let pipeline = Pipeline::builder(config.pipeline.clone())
        .gazetteer(gazetteer)
        .categories(categories)
        .build()
        .context("Invalid pipeline configuration")?;

    let input = PipelineInput {
        edges: read_table(&config.input.edges, "edges")
            .with_context(|| format!("Failed to read edges: {}", config.input.edges.display()))?,
        followers: read_table(&config.input.followers, "followers").with_context(|| {
            format!("Failed to read followers: {}", config.input.followers.display())
        })?,
        markers: read_table(&config.input.markers, "markers").with_context(|| {
            format!("Failed to read markers: {}", config.input.markers.display())
        })?,
    };

    progress.set_message("running pipeline");
    let result = pipeline.run_with_observer(input, |row| progress.stage(row));
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            progress.finish();
            return Err(e).context("Pipeline failed, no output written");
        }
    };

    let removed_output = config.removed_markers_path();
    let written = if dry_run {
        None
    } else {
        create_parent(&config.output.edges)?;
        create_parent(&config.output.followers)?;
        create_parent(&removed_output)?;

        write_table(&config.output.edges, &output.edges).with_context(|| {
            format!("Failed to write edges: {}", config.output.edges.display())
        })?;
        write_table(&config.output.followers, &output.followers).with_context(|| {
            format!("Failed to write followers: {}", config.output.followers.display())
        })?;
        write_jsonl(&removed_output, &output.removed_markers).with_context(|| {
            format!("Failed to write removed markers: {}", removed_output.display())
        })?;

        Some(vec![
            ("Edges", config.output.edges.clone()),
            ("Followers", config.output.followers.clone()),
            ("Removed markers", removed_output.clone()),
        ])
    };
    progress.finish();

    let stats = &output.stats;
    if json_output {
        let report = serde_json::json!({
            "config": config_path.to_string_lossy().to_string(),
            "dry_run": dry_run,
            "outputs": if dry_run {
                serde_json::Value::Null
            } else {
                serde_json::json!({
                    "edges": config.output.edges.to_string_lossy().to_string(),
                    "followers": config.output.followers.to_string_lossy().to_string(),
                    "removed_markers": removed_output.to_string_lossy().to_string(),
                })
            },
            "edge_retention_rate": stats.edge_retention_rate(),
            "follower_retention_rate": stats.follower_retention_rate(),
            "stats": stats,
            "removed_markers": output.removed_markers,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        progress::print_summary_report(stats, written.as_deref(), progress.elapsed());
    }

    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "{} already exists, pass --force to overwrite",
            output.display()
        ));
    }
    RunConfig::template().save(output)?;
    println!("Wrote run file template to {}", output.display());
    Ok(())
}

fn detect_languages(
    input: PathBuf,
    min_confidence: f64,
    require_reliable: bool,
    seed: u64,
    json_output: bool,
) -> Result<()> {
    info!("Detecting follower languages");
    info!("  Input: {:?}", input);

    let followers: Table<FollowerRecord> = read_table(&input, "followers")
        .with_context(|| format!("Failed to read followers: {}", input.display()))?;
    let classifier = WhatlangClassifier::new(LanguageClassifierConfig {
        min_confidence,
        require_reliable,
        ..LanguageClassifierConfig::default()
    })?;

    let classified = classify_languages(followers, &TextNormalizer::bio(), &classifier, seed, true);
    let shares = language_summary(&classified);

    if json_output {
        let report = serde_json::json!({
            "input": input.to_string_lossy().to_string(),
            "followers": classified.len(),
            "languages": shares,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        progress::print_language_report(classified.len(), &shares);
    }

    Ok(())
}

fn locate(location: &str, gazetteer: &Path, token: bool, json_output: bool) -> Result<()> {
    let gazetteer = config::load_gazetteer(gazetteer)?;
    let mode = if token {
        MatchMode::Token
    } else {
        MatchMode::Substring
    };
    let classifier = LocationClassifier::new(&gazetteer, mode)?;
    let matched = classifier.matched_place(Some(location));

    if json_output {
        let report = serde_json::json!({
            "location": location,
            "in_target_country": matched.is_some(),
            "matched": matched,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match matched {
            Some(place) => println!("{:?}: in target country (matched {:?})", location, place),
            None => println!("{:?}: not in target country", location),
        }
    }

    Ok(())
}

fn count_table(input: PathBuf, json_output: bool) -> Result<()> {
    info!("Counting records in: {:?}", input);

    let count = count_records(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    if json_output {
        let report = serde_json::json!({
            "input": input.to_string_lossy().to_string(),
            "records": count,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Total records: {}", progress::format_with_commas(count));
    }

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["markerprep", "--json", "run", "-c", "run.yaml", "--dry-run"])
            .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run { config, dry_run } => {
                assert_eq!(config, PathBuf::from("run.yaml"));
                assert!(dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_locate() {
        let cli = Cli::try_parse_from([
            "markerprep",
            "locate",
            "Paris, France",
            "--gazetteer",
            "places.txt",
            "--token",
        ])
        .unwrap();
        match cli.command {
            Commands::Locate {
                location, token, ..
            } => {
                assert_eq!(location, "Paris, France");
                assert!(token);
            }
            _ => panic!("expected locate"),
        }
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.yaml");

        init_config(&path, false).unwrap();
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
        assert!(RunConfig::load(&path).is_ok());
    }

    #[test]
    fn test_create_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out/nested/edges.jsonl");
        create_parent(&path).unwrap();
        assert!(dir.path().join("out/nested").is_dir());
        create_parent(Path::new("edges.jsonl")).unwrap();
    }

    #[test]
    fn test_dry_run_end_to_end() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("gazetteer.txt"), "paris\nlyon\n").unwrap();
        std::fs::write(
            root.join("edges.jsonl"),
            "{\"marker_id\": 1, \"follower_id\": 10}\n{\"marker_id\": 2, \"follower_id\": 10}\n",
        )
        .unwrap();
        std::fs::write(
            root.join("followers.jsonl"),
            "{\"follower_id\": 10, \"description\": \"Bonjour à tous, je suis journaliste à Paris et je couvre le football depuis de nombreuses années pour un quotidien national. Le week-end, je me promène au bord de la Seine avec ma famille.\", \"location\": \"Paris\", \"followers\": 300, \"tweets\": 900}\n",
        )
        .unwrap();
        std::fs::write(
            root.join("markers.jsonl"),
            "{\"marker_id\": 1, \"twitter_name\": \"lemonde\", \"type\": \"newspapers\"}\n{\"marker_id\": 2, \"twitter_name\": \"psg\", \"type\": \"football clubs\"}\n",
        )
        .unwrap();

        let mut config = RunConfig::template();
        config.categories = None;
        config.pipeline.min_marker_followers = 1;
        let config_path = root.join("run.yaml");
        config.save(&config_path).unwrap();

        run_pipeline(config_path.clone(), true, true).unwrap();
        assert!(!root.join("out").exists());

        run_pipeline(config_path, false, true).unwrap();
        assert!(root.join("out/edges.jsonl").exists());
        assert!(root.join("out/followers.jsonl").exists());
        assert!(root.join("out/edges.removed.jsonl").exists());
    }
}
