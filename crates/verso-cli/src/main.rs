//! `verso`: check and inspect versioned API manifests

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use verso_structure::ApiVersion;
use verso_synthesis::{synthesize, ApiManifest, VersionSnapshot, VersionTables};

fn cli() -> Command {
    let manifest = Arg::new("manifest")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Manifest file (.yaml, .yml, .json or .toml)");

    Command::new("verso")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Versioned API surface synthesis")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("check")
                .about("Synthesize every version and print a summary")
                .arg(manifest.clone()),
        )
        .subcommand(
            Command::new("dump")
                .about("Print synthesized shapes, enumerations and operations")
                .arg(manifest)
                .arg(
                    Arg::new("version")
                        .long("version")
                        .value_parser(value_parser!(ApiVersion))
                        .help("Only this version (YYYY-MM-DD); other dates resolve to the version serving them"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let outcome = match matches.subcommand() {
        Some(("check", args)) => check(args).await,
        Some(("dump", args)) => dump(args).await,
        _ => Ok(()),
    };

    if let Err(e) = outcome {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn load(args: &ArgMatches) -> Result<VersionTables> {
    let path = args
        .get_one::<PathBuf>("manifest")
        .context("manifest path is required")?;
    let manifest = ApiManifest::load(path)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    let schema = manifest.into_schema().context("building schema")?;
    let tables = synthesize(Arc::new(schema)).context("synthesizing version tables")?;
    tracing::info!(
        versions = tables.graph().len(),
        fingerprint = %tables.fingerprint().short(),
        "synthesized {}",
        path.display()
    );
    Ok(tables)
}

async fn check(args: &ArgMatches) -> Result<()> {
    let tables = load(args).await?;
    print!("{}", summary(&tables));
    Ok(())
}

async fn dump(args: &ArgMatches) -> Result<()> {
    let tables = load(args).await?;
    let json = args.get_flag("json");

    match args.get_one::<ApiVersion>("version") {
        Some(requested) => {
            let version = tables.graph().resolve(*requested)?;
            let snapshot = tables
                .snapshot(version)
                .with_context(|| format!("no snapshot for {version}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(snapshot)?);
            } else {
                print!("{}", render(snapshot));
            }
        }
        None if json => println!("{}", serde_json::to_string_pretty(&tables)?),
        None => {
            let pages: Vec<String> = tables.snapshots().map(render).collect();
            print!("{}", pages.join("\n"));
        }
    }
    Ok(())
}

/// One line per version, newest first
fn summary(tables: &VersionTables) -> String {
    let mut out = String::new();
    for snapshot in tables.snapshots() {
        let changes = tables
            .graph()
            .get(snapshot.version())
            .map_or(0, |version| version.changes().len());
        let _ = writeln!(
            out,
            "{}  shapes={} enums={} operations={} changes={} fingerprint={}",
            snapshot.version(),
            snapshot.shapes().shapes().len(),
            snapshot.shapes().enums().len(),
            snapshot.operations().present().count(),
            changes,
            snapshot.fingerprint().short()
        );
    }
    let _ = writeln!(
        out,
        "ok: {} versions, latest {}, fingerprint {}",
        tables.graph().len(),
        tables.latest(),
        tables.fingerprint().short()
    );
    out
}

/// Human-readable listing of one version
fn render(snapshot: &VersionSnapshot) -> String {
    let shapes = snapshot.shapes();
    let mut out = String::new();
    let _ = writeln!(out, "== {} ({})", snapshot.version(), snapshot.fingerprint().short());

    for shape in shapes.shapes().values() {
        let _ = writeln!(out, "shape {}", shape.name());
        for (name, field) in shape.fields() {
            let _ = write!(out, "  {name}: {}", shapes.render_type(&field.ty));
            if let Some(default) = &field.attributes.default {
                let _ = write!(out, " = {default}");
            }
            out.push('\n');
        }
        for property in shape.properties().keys() {
            let _ = writeln!(out, "  {property} (computed)");
        }
    }

    for enumeration in shapes.enums().values() {
        let _ = writeln!(out, "enum {}", enumeration.name());
        for (member, value) in enumeration.members() {
            let _ = writeln!(out, "  {member} = {value}");
        }
    }

    for operation in snapshot.operations().present() {
        let _ = write!(out, "operation {}", operation.route());
        if let Some(request) = operation.request_shape() {
            let _ = write!(out, " <- {}", shapes.resolve_name(request).unwrap_or(request.as_str()));
        }
        if let Some(response) = operation.response_shape() {
            let _ = write!(out, " -> {}", shapes.resolve_name(response).unwrap_or(response.as_str()));
        }
        if operation.attributes().deprecated {
            out.push_str(" [deprecated]");
        }
        out.push('\n');
    }
    out
}
