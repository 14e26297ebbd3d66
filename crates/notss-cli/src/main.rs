mod cli;
mod funk;
mod logging;
mod run;

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();

    if cli.funk {
        funk::party();
        std::process::exit(run::EXIT_FUNK);
    }

    let dispatch = logging::dispatch(cli.logging, cli.verbose);
    let code = tracing::dispatcher::with_default(&dispatch, || match run::run(cli) {
        Ok(code) => code,
        Err(e) => run::exit_code_for(&e),
    });

    std::process::exit(code);
}
