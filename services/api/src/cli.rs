use crate::demo::{run_batch, run_demo, BatchArgs, DemoArgs};
use crate::server;
use applicant_eval::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Applicant Evaluation Service",
    about = "Resolve interview criteria and reconcile candidate scores from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Evaluate a candidate CSV offline and print per-row outcomes
    Batch(BatchArgs),
    /// Run an end-to-end walkthrough of resolution, manual scoring and batch evaluation
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Batch(args) => run_batch(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
