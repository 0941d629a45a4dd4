use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cragmatch::annotation::AnnotationDocument;
use cragmatch::config::MatcherConfig;
use cragmatch::correspondence::SharedOracle;
use cragmatch::crag_store::CragStore;
use cragmatch::descriptor_oracle::DescriptorOracle;
use cragmatch::image_frame::ImageFrame;
use cragmatch::pipeline::MatchPipeline;
use cragmatch::response::{CragResponse, StatusResponse};
use flexi_logger::Logger;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Find the stored crag photo matching a query photo and register it."
)]
struct Args {
    /// Root directory of the region/crag store (overrides the config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log specification, e.g. "info" or "cragmatch=debug". RUST_LOG wins when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Write the JSON result to this file instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the best stored match in a region and register the photo onto it
    FindBestMatch { region: String, photo: PathBuf },

    /// Register one photo onto another
    MatchPair { photo1: PathBuf, photo2: PathBuf },

    /// Score a photo against every image of a region
    Rank { region: String, photo: PathBuf },

    #[command(subcommand)]
    Region(RegionCommand),

    #[command(subcommand)]
    Crag(CragCommand),

    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum RegionCommand {
    /// List the crag images of a region
    List { region: String },
    /// Create an empty region
    Create { region: String },
}

#[derive(Subcommand, Debug)]
enum CragCommand {
    /// Show a crag's annotations and image path
    Get { region: String, crag: String },
    /// Replace a crag's annotations with the contents of a JSON file
    Put { region: String, crag: String, json_file: PathBuf },
    /// Add a crag image (creating the region if needed)
    Add { region: String, crag: String, image: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Dump,
}

fn main() {
    let args = Args::parse();

    let logger =
        Logger::try_with_env_or_str(&args.log_level).and_then(|l| l.log_to_stderr().start());
    let _logger = match logger {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Logger initialization failed: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        log::error!("{e:#}");
        eprintln!("Err: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => MatcherConfig::load(path)
            .with_context(|| format!("Could not load config {}", path.display()))?,
        None => MatcherConfig::default(),
    };
    if let Some(root) = &args.store {
        config.store.root = root.clone();
    }
    let store = CragStore::new(config.store.root.clone());
    let output = args.output.as_deref();

    match args.command {
        Command::FindBestMatch { region, photo } => {
            let query = read_frame(&photo, &config)?;
            let pipeline = build_pipeline(config);
            let response = pipeline
                .find_best_match_in_region(&store, &region, &query)
                .with_context(|| {
                    format!("Matching {} against region {region} failed", photo.display())
                })?;
            write_json(&response, output)
        }
        Command::MatchPair { photo1, photo2 } => {
            let frame1 = read_frame(&photo1, &config)?;
            let frame2 = read_frame(&photo2, &config)?;
            let response = build_pipeline(config)
                .match_pair(&frame1, &frame2)
                .context("Pair matching failed")?;
            write_json(&response, output)
        }
        Command::Rank { region, photo } => {
            let query = read_frame(&photo, &config)?;
            let response = build_pipeline(config)
                .rank_region(&store, &region, &query)
                .with_context(|| format!("Ranking region {region} failed"))?;
            write_json(&response, output)
        }
        Command::Region(RegionCommand::List { region }) => {
            let images = store
                .list_images(&region)
                .with_context(|| format!("Could not list region {region}"))?;
            write_json(&images, output)
        }
        Command::Region(RegionCommand::Create { region }) => {
            store
                .create_region(&region)
                .with_context(|| format!("Could not create region {region}"))?;
            write_json(&StatusResponse::ok(), output)
        }
        Command::Crag(CragCommand::Get { region, crag }) => {
            let record = store
                .crag(&region, &crag)
                .with_context(|| format!("Could not read crag {crag} in {region}"))?;
            write_json(&CragResponse::from(record), output)
        }
        Command::Crag(CragCommand::Put { region, crag, json_file }) => {
            let text = fs::read_to_string(&json_file)
                .with_context(|| format!("Could not read {}", json_file.display()))?;
            let doc: AnnotationDocument = serde_json::from_str(&text)
                .with_context(|| format!("{} is not an annotation document", json_file.display()))?;
            store.write_annotation(&region, &crag, &doc)?;
            write_json(&StatusResponse::ok(), output)
        }
        Command::Crag(CragCommand::Add { region, crag, image }) => {
            let bytes =
                fs::read(&image).with_context(|| format!("Could not read {}", image.display()))?;
            store.add_crag(&region, &crag, &bytes)?;
            write_json(&StatusResponse::ok(), output)
        }
        Command::Config(ConfigCommand::Dump) => {
            write_text(&config.to_toml_string()?, output)
        }
    }
}

fn build_pipeline(config: MatcherConfig) -> MatchPipeline<DescriptorOracle> {
    let descriptor = DescriptorOracle::new(config.descriptor.clone());
    let oracle = SharedOracle::from_config(descriptor, &config.oracle);
    MatchPipeline::new(oracle, config)
}

pub fn read_frame(filename: &Path, config: &MatcherConfig) -> Result<ImageFrame> {
    log::info!("Reading image file: {}", filename.display());
    ImageFrame::open(filename, config.frame.working_size)
        .with_context(|| format!("Could not load image {}", filename.display()))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    write_text(&text, output)
}

fn write_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Could not write {}", path.display()))?;
            log::info!("Result written to {}", path.display());
        }
        None => std::io::stdout().write_all(text.as_bytes())?,
    }
    Ok(())
}
