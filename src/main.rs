//! kubeapp-manifest - label, split and inspect Kubernetes manifests

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use kubeapp_manifest::labels::{helm_app_labels, KubeAppLabels};
use kubeapp_manifest::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use kubeapp_manifest::{add_app_labels, extract_documents, get_namespace, join_documents};

/// Kubernetes manifest tooling for application stacks
#[derive(Parser, Debug)]
#[command(name = "kubeapp-manifest", version, about, long_about = None)]
struct Cli {
    /// Log line format (logs go to stderr)
    #[arg(
        long,
        value_enum,
        env = "KUBEAPP_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add application labels to every resource in a manifest
    Label(LabelArgs),

    /// Split a manifest into its documents and print them re-encoded
    ///
    /// Blank documents are dropped and every document is normalized to
    /// two-space indentation.
    Extract(InputArgs),

    /// Print the namespace targeted by the first resource in a manifest
    Namespace(InputArgs),
}

/// Manifest input selection
#[derive(Args, Debug)]
struct InputArgs {
    /// Manifest file to read; `-` or no value reads stdin
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,
}

/// Label mode arguments
#[derive(Args, Debug)]
struct LabelArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Stack identifier
    #[arg(long, env = "KUBEAPP_STACK_ID", default_value_t = 0)]
    stack_id: i64,

    /// Stack name, also used as the application name
    #[arg(long, env = "KUBEAPP_STACK_NAME")]
    stack_name: String,

    /// Owner of the stack; sanitized before use
    #[arg(long, env = "KUBEAPP_OWNER")]
    owner: String,

    /// Deployment kind recorded on each resource
    #[arg(long, env = "KUBEAPP_KIND", default_value = "content")]
    kind: String,

    /// Apply only the Helm application labels (name and owner)
    #[arg(long)]
    helm: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
        ..Default::default()
    })?;

    match cli.command {
        Commands::Label(args) => run_label(args),
        Commands::Extract(args) => run_extract(args),
        Commands::Namespace(args) => run_namespace(args),
    }
}

fn run_label(args: LabelArgs) -> anyhow::Result<()> {
    let manifest = read_manifest(&args.input)?;

    let labels = if args.helm {
        helm_app_labels(&args.stack_name, &args.owner)
    } else {
        KubeAppLabels {
            stack_id: args.stack_id,
            stack_name: args.stack_name,
            owner: args.owner,
            kind: args.kind,
        }
        .to_map()
    };

    let labeled = add_app_labels(&manifest, &labels).context("failed to label manifest")?;
    info!(labels = labels.len(), bytes = labeled.len(), "Labeled manifest");
    write_output(&labeled)
}

fn run_extract(args: InputArgs) -> anyhow::Result<()> {
    let manifest = read_manifest(&args)?;
    let docs = extract_documents(&manifest, None).context("failed to extract documents")?;
    info!(count = docs.len(), "Extracted manifest documents");
    write_output(&join_documents(&docs))
}

fn run_namespace(args: InputArgs) -> anyhow::Result<()> {
    let manifest = read_manifest(&args)?;
    let namespace = get_namespace(&manifest).context("failed to resolve namespace")?;
    println!("{namespace}");
    Ok(())
}

/// Read the whole manifest from the selected file or stdin
fn read_manifest(input: &InputArgs) -> anyhow::Result<Vec<u8>> {
    match input.file.as_deref() {
        Some(path) if path.as_os_str() != "-" => std::fs::read(path)
            .with_context(|| format!("failed to read manifest {}", path.display())),
        _ => {
            let mut manifest = Vec::new();
            std::io::stdin()
                .read_to_end(&mut manifest)
                .context("failed to read manifest from stdin")?;
            Ok(manifest)
        }
    }
}

fn write_output(bytes: &[u8]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes).context("failed to write output")?;
    stdout.flush().context("failed to write output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_label_args_parse() {
        let cli = Cli::try_parse_from([
            "kubeapp-manifest",
            "label",
            "-f",
            "app.yaml",
            "--stack-id",
            "4",
            "--stack-name",
            "shop",
            "--owner",
            "admin",
        ])
        .unwrap();
        match cli.command {
            Commands::Label(args) => {
                assert_eq!(args.stack_id, 4);
                assert_eq!(args.stack_name, "shop");
                assert_eq!(args.kind, "content");
                assert!(!args.helm);
                assert_eq!(args.input.file, Some(PathBuf::from("app.yaml")));
            }
            other => panic!("Expected Label command, got {:?}", other),
        }
    }

    #[test]
    fn test_namespace_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["kubeapp-manifest", "namespace"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Namespace(InputArgs { file: None })
        ));
        assert_eq!(cli.log_format, LogFormat::Text);
    }
}
