use clap::Parser;

use mdm_user_setup::{CliArgs, RunOutcome, telemetry, workflow};

fn main() {
    let cli = CliArgs::parse();
    if let Err(err) = telemetry::init(cli.verbose) {
        eprintln!("{err}");
    }

    match workflow::run_program(cli) {
        Ok(RunOutcome::Completed(summary)) => {
            println!("{summary}");
            std::process::exit(0);
        }
        Ok(RunOutcome::Aborted(message)) => {
            println!("{message}");
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
