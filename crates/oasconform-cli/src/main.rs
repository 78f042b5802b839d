//! oasconform CLI - check captured HTTP responses against an OpenAPI spec

mod logging;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use oasconform_core::{Config, ResponseSnapshot, Verdict};
use oasconform_engine::{CheckOptions, ConformanceEngine, SpecDocument, load_spec};

#[derive(Parser)]
#[command(name = "oasconform")]
#[command(about = "Check captured HTTP responses against an OpenAPI spec")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one captured response
    Check {
        /// HTTP method of the request
        #[arg(short, long)]
        method: String,

        /// Request path (query string allowed, ignored for matching)
        #[arg(short, long)]
        path: String,

        /// Response snapshot JSON file (`status`, `headers`, `body`, `text`); `-` reads stdin
        #[arg(short, long)]
        response: PathBuf,

        /// OpenAPI spec (default: from config)
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Config file (default: .oasconform.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Expect the response NOT to satisfy the spec
        #[arg(long = "not")]
        negate: bool,
    },

    /// List documented operations and their responses
    Routes {
        /// OpenAPI spec (default: from config)
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Config file (default: .oasconform.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for the verdict format
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Check {
            method,
            path,
            response,
            spec,
            config,
            negate,
        } => {
            let cfg = load_config(config.as_deref())?;
            let doc = load_document(spec.as_deref(), &cfg)?;
            let snapshot = read_snapshot(&response)?;

            let engine = ConformanceEngine::new(&doc).with_options(CheckOptions::from(&cfg));
            let verdict = if negate {
                engine.check_not(&method, &path, &snapshot)
            } else {
                engine.check(&method, &path, &snapshot)
            };

            print_verdict(&verdict, cli.output, cfg.max_reported_violations)?;
            Ok(verdict.exit_code())
        }

        Commands::Routes { spec, config } => {
            let cfg = load_config(config.as_deref())?;
            let doc = load_document(spec.as_deref(), &cfg)?;

            match cli.output {
                OutputFormat::Terminal => {
                    println!("{} ({} operations)", doc.version, doc.operations().count());
                    if doc.base_paths.iter().any(|b| !b.is_empty()) {
                        println!("Base paths: {}", doc.base_paths.join(", "));
                    }
                    for line in route_lines(&doc) {
                        println!("  {line}");
                    }
                }
                OutputFormat::Json => {
                    let routes: Vec<_> = doc
                        .operations()
                        .map(|op| {
                            serde_json::json!({
                                "method": op.method.to_string(),
                                "path": op.path,
                                "responses": op.selectors(),
                            })
                        })
                        .collect();
                    let out = serde_json::json!({
                        "version": doc.version.to_string(),
                        "base_paths": doc.base_paths,
                        "routes": routes,
                    });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(0)
        }

        Commands::Init => {
            let config_path = ".oasconform.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path to your OpenAPI document");
            println!("  - servers: extra base paths your API is mounted under");
            Ok(0)
        }

        Commands::Schema => {
            let schema = oasconform_core::report::generate_schema()?;
            println!("{schema}");
            Ok(0)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(cfg)
}

fn load_document(spec: Option<&Path>, cfg: &Config) -> Result<SpecDocument> {
    let path = spec.unwrap_or(&cfg.spec);
    load_spec(path).with_context(|| format!("failed to load spec {}", path.display()))
}

fn read_snapshot(path: &Path) -> Result<ResponseSnapshot> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read response from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read response {}", path.display()))?
    };
    serde_json::from_str(&content).context("response file is not a valid snapshot")
}

fn print_verdict(verdict: &Verdict, output: OutputFormat, limit: Option<usize>) -> Result<()> {
    match output {
        OutputFormat::Terminal => {
            println!("{}: {}", verdict.status, verdict.render(limit));
            println!("  Exit code: {}", verdict.exit_code());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(verdict)?);
        }
        OutputFormat::Silent => {}
    }
    Ok(())
}

/// `GET /items/{id}  200, 404` per operation, methods aligned.
fn route_lines(doc: &SpecDocument) -> Vec<String> {
    doc.operations()
        .map(|op| {
            let responses = op.selectors();
            let responses = if responses.is_empty() {
                "(no responses)".to_string()
            } else {
                responses.join(", ")
            };
            format!("{:<7} {}  {responses}", op.method.to_string(), op.path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_arguments() {
        let cli = Cli::try_parse_from([
            "oasconform", "check", "-m", "GET", "-p", "/items/1", "-r", "resp.json", "--not",
            "--output", "json",
        ])
        .unwrap();
        assert!(cli.output == OutputFormat::Json);
        match cli.command {
            Commands::Check {
                method,
                negate,
                spec,
                ..
            } => {
                assert_eq!(method, "GET");
                assert!(negate);
                assert!(spec.is_none());
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn reads_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resp.json");
        std::fs::write(
            &path,
            r#"{"status": 200, "headers": {"Content-Type": "application/json"}, "body": {"name": "a"}}"#,
        )
        .unwrap();
        let snapshot = read_snapshot(&path).unwrap();
        assert_eq!(snapshot.status, 200);
        assert_eq!(snapshot.content_type(), Some("application/json"));
        assert_eq!(snapshot.body, Some(serde_json::json!({"name": "a"})));
    }

    #[test]
    fn rejects_malformed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resp.json");
        std::fs::write(&path, r#"{"headers": {}}"#).unwrap();
        assert!(read_snapshot(&path).is_err());
    }

    #[test]
    fn check_against_spec_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("openapi.yaml");
        std::fs::write(
            &spec_path,
            "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths:\n  /items/{id}:\n    get:\n      responses:\n        '200':\n          description: ok\n          content:\n            application/json:\n              schema: {type: object, required: [name]}\n",
        )
        .unwrap();

        let cfg = Config::default();
        let doc = load_document(Some(&spec_path), &cfg).unwrap();
        assert_eq!(route_lines(&doc), vec!["GET     /items/{id}  200"]);

        let engine = ConformanceEngine::new(&doc).with_options(CheckOptions::from(&cfg));
        let snapshot = ResponseSnapshot::new(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::json!({}));
        assert_eq!(engine.check("GET", "/items/1", &snapshot).exit_code(), 1);
        assert_eq!(engine.check_not("GET", "/items/1", &snapshot).exit_code(), 0);
    }

    #[test]
    fn missing_spec_is_an_error() {
        let cfg = Config::default();
        let err = load_document(Some(Path::new("/no/such/spec.yaml")), &cfg).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load spec /no/such/spec.yaml"));
    }
}
