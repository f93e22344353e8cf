use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod error;
mod hierarchy;
mod merge;
mod pipeline;
mod registry;
mod render;
mod schema;
mod source;

use registry::YamlRegistry;
use schema::Conventions;
use source::{FieldSource, FileSource, HttpSource};

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "ecs-proto-gen")]
#[command(about = "Generate a proto3 schema from the Elastic Common Schema with stable field tags", long_about = None)]
struct Cli {
    /// A git ref from https://github.com/elastic/ecs
    /// (examples: v1.5.0, main, e2d5286, e2d52861811f0888f69308e06412268dd296f731)
    #[arg(value_parser = parse_git_ref)]
    tag_name: String,

    /// Tag registry carried between runs.
    #[arg(long, default_value = "cached-fields.yml")]
    cache: PathBuf,

    /// Generated schema file.
    #[arg(long, default_value = "elastic.proto")]
    proto: PathBuf,

    #[arg(long, default_value = source::http::DEFAULT_URL_PREFIX)]
    source_url: String,

    /// Read the flat field document from disk instead of fetching it.
    #[arg(long)]
    flat_file: Option<PathBuf>,

    /// Keep a copy of the fetched document as <DIR>/<TAG_NAME>.yml.
    #[arg(long, value_name = "DIR")]
    save_flat: Option<PathBuf>,

    #[arg(long)]
    package: Option<String>,

    #[arg(long)]
    root_message: Option<String>,
}

fn parse_git_ref(s: &str) -> std::result::Result<String, String> {
    const GIT_REF_RE: &str = r"^[A-Za-z0-9][A-Za-z0-9._/-]*$";
    let re = regex::Regex::new(GIT_REF_RE).map_err(|e| e.to_string())?;
    if re.is_match(s) && !s.contains("..") {
        Ok(s.to_string())
    } else {
        Err(format!("not a git ref: {:?}", s))
    }
}

fn main() -> ExitCode {
    // Help and misuse both go to stderr with a failing status.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprint!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let defaults = Conventions::default();
    let conventions = Conventions {
        package: cli.package.unwrap_or(defaults.package.clone()),
        root_message: cli.root_message.unwrap_or(defaults.root_message.clone()),
        ..defaults
    };

    let source: Box<dyn FieldSource> = match &cli.flat_file {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(HttpSource::new(&cli.source_url, &cli.tag_name)),
    };
    let registry = YamlRegistry::new(&cli.cache);
    let snapshot = cli
        .save_flat
        .as_deref()
        .map(|dir| (dir, cli.tag_name.as_str()));

    let summary = pipeline::run(
        source.as_ref(),
        &registry,
        &conventions,
        &cli.proto,
        snapshot,
    )?;

    log::info!(
        "{} declared fields, {} in schema, {} new tags, {} compatibility events",
        summary.declared,
        summary.merged,
        summary.report.allocated,
        summary.report.events.len()
    );
    println!("Wrote {}", cli.proto.display());
    println!("Wrote {}", registry.path().display());

    Ok(())
}
