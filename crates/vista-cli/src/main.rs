use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vista_config::TemplateKind;

mod commands;
mod project;
mod session;

/// Vista live-preview compiler.
///
/// Resolves project dependency manifests and drives preview builds of a
/// project directory, printing the host event stream as JSON lines.
///
/// EXAMPLES:
///     vista manifest ./app                       Print the resolved manifest
///     vista build ./app --template create-react-app
///     vista build ./app --entry src/Button.js    Build one module (module view)
///     vista build ./app --watch                  Rebuild on file changes
///
/// ENVIRONMENT VARIABLES:
///     VISTA_LOG            Log filter (e.g. 'debug', 'vista_build=trace')
///     VISTA_CACHE_DIR      Session cache directory
///     VISTA_CACHE_ENABLED  Set to 'false' to disable the session cache
#[derive(Parser)]
#[command(name = "vista")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dependency manifest a project resolves to
    ///
    /// EXAMPLES:
    ///     vista manifest ./app
    ///     vista manifest ./app --template vue-cli --combination
    #[command(visible_alias = "m")]
    Manifest {
        /// Project directory
        dir: PathBuf,
        /// Project template
        #[arg(long, short = 't', default_value = "node", value_parser = parse_template)]
        template: TemplateKind,
        /// Include the combination fingerprint
        #[arg(long)]
        combination: bool,
    },

    /// Build a project and print host events as JSON lines
    ///
    /// Runs the full pipeline with a dry-run session: dependencies are
    /// resolved offline and modules are tracked but not executed.
    ///
    /// EXAMPLES:
    ///     vista build ./app
    ///     vista build ./app --skip-eval
    ///     vista build ./app --no-cache --watch
    #[command(visible_alias = "b")]
    Build {
        /// Project directory
        dir: PathBuf,
        /// Project template
        #[arg(long, short = 't', default_value = "node", value_parser = parse_template)]
        template: TemplateKind,
        /// Evaluate this module instead of the template entry (module view)
        #[arg(long, short = 'e')]
        entry: Option<String>,
        /// Stop after transpilation
        #[arg(long)]
        skip_eval: bool,
        /// Engine configuration file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
        /// Do not use the persistent session cache
        #[arg(long)]
        no_cache: bool,
        /// Rebuild on file changes
        #[arg(long, short = 'w')]
        watch: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_template(value: &str) -> Result<TemplateKind, String> {
    value.parse().map_err(|e: vista_config::ConfigError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VISTA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest {
            dir,
            template,
            combination,
        } => {
            let args = commands::manifest::ManifestArgs {
                project_dir: dir,
                template,
                combination,
            };
            commands::manifest::run(args)?;
        }
        Commands::Build {
            dir,
            template,
            entry,
            skip_eval,
            config,
            no_cache,
            watch,
        } => {
            let args = commands::build::BuildArgs {
                project_dir: dir,
                template,
                entry,
                skip_eval,
                config_path: config,
                no_cache,
                watch,
            };
            commands::build::run(args).await?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}
