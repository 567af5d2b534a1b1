use clap::Parser;

use kulo::cli::Cli;
use kulo::config::Config;
use kulo::errors::AppError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    kulo::logging::init(cli.verbose);

    let config = match Config::try_from(cli) {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };

    if let Err(e) = kulo::run(config).await {
        exit_with(e);
    }
}

fn exit_with(e: AppError) -> ! {
    eprintln!("Error: {e}");
    std::process::exit(e.exit_code());
}
