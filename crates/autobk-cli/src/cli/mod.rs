mod commands;
mod helpers;

use autobk_core::AutobkError;
use clap::Parser;

pub fn run_from_env() -> i32 {
    match run(std::env::args()) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_autobk_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            diagnostic.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{err}");
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "autobk-rs",
    about = "AUTOBK background removal for X-ray absorption spectra"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Fit and remove the atomic background from a spectrum file
    Run(commands::RunArgs),
    /// List the recognized window functions
    Windows,
}

fn dispatch(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_fit_command(args),
        CliCommand::Windows => commands::run_windows_command(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(AutobkError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_autobk_error(&self) -> AutobkError {
        match self {
            Self::Usage(message) => {
                AutobkError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => AutobkError::internal("INTERNAL.CLI", format!("{error:#}")),
        }
    }
}
