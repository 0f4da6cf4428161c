use clap::Parser;

use levervault::{cli, example, model, scenario_run, schema};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Schema => schema::run(),
        cli::Command::Validate { file } => model::scenario::run(&file),
        cli::Command::Example => example::run(),
        cli::Command::Simulate {
            file,
            verbose,
            output,
        } => scenario_run::run(&scenario_run::SimulateConfig {
            scenario_path: file,
            verbose,
            output,
        }),
    }
}
