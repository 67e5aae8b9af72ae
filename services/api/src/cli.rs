use crate::demo::{run_demo, run_window_check, DemoArgs, WindowArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use class_enrollment::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Class Enrollment",
    about = "Run the coding academy enrollment service or explore it from the command line",
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
    /// Walk through sign-up, payment, assignment, waitlist promotion, and archiving
    Demo(DemoArgs),
    /// Check whether a program still accepts sign-ups on a given day
    Window(WindowArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Start with an empty catalogue instead of the demo programs and students
    #[arg(long)]
    pub(crate) no_seed: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Window(args) => run_window_check(args),
    }
}
