use anyhow::Result;
use clap::Parser;
use monorepo_helper::commands::{self, WorkspaceAction};
use monorepo_helper::runtime::RealRuntime;
use std::path::PathBuf;
use std::sync::Arc;

/// monorepo-helper - resolve monorepo sub-packages as local path packages
///
/// Discovers every package manifest inside the git work tree, guesses the
/// versions each package can be installed as and keeps the frontend
/// workspace list in package.json in sync.
///
/// Examples:
///   monorepo-helper packages                      # All registered package records
///   monorepo-helper packages --name acme/lib      # Versions of one package
///   monorepo-helper workspace register web/modules/ui
#[derive(Parser, Debug)]
#[command(author, version = env!("MONOREPO_HELPER_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Version of the root package, offered as a version of every monorepo package
    #[arg(
        long = "root-version",
        env = "MONOREPO_HELPER_ROOT_VERSION",
        value_name = "VERSION",
        default_value = "dev-master",
        global = true
    )]
    root_version: String,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the package records the monorepo repository registers
    Packages(PackagesArgs),

    /// Add or remove a package's frontend in the package.json workspaces
    Workspace {
        #[command(subcommand)]
        action: WorkspaceCommand,
    },
}

#[derive(clap::Args, Debug)]
struct PackagesArgs {
    /// Only records of this package (case insensitive)
    #[arg(long, value_name = "VENDOR/NAME")]
    name: Option<String>,

    /// Resolve for lowest versions; disables the monorepo repository
    #[arg(long)]
    prefer_lowest: bool,
}

#[derive(clap::Subcommand, Debug)]
enum WorkspaceCommand {
    /// Register the package installed at PATH, as after an install
    Register(WorkspaceArgs),
    /// Deregister the package installed at PATH, as before an uninstall
    Deregister(WorkspaceArgs),
}

#[derive(clap::Args, Debug)]
struct WorkspaceArgs {
    /// Install path of the package
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Package name used in log messages
    #[arg(long, value_name = "VENDOR/NAME")]
    name: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = Arc::new(RealRuntime);

    match cli.command {
        Commands::Packages(args) => commands::packages(
            runtime,
            &cli.root_version,
            args.name.as_deref(),
            args.prefer_lowest,
        )?,
        Commands::Workspace { action } => {
            let (action, args) = match action {
                WorkspaceCommand::Register(args) => (WorkspaceAction::Register, args),
                WorkspaceCommand::Deregister(args) => (WorkspaceAction::Deregister, args),
            };
            commands::workspace(
                runtime,
                &cli.root_version,
                action,
                &args.path,
                args.name.as_deref(),
            )?
        }
    }
    Ok(())
}
