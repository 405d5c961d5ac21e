use chrono::Utc;

use crate::clap_app::Cli;

mod app;
mod clap_app;

fn run() -> anyhow::Result<()> {
    let app = Cli::build()?;
    println!("{} Starting the simulation", Utc::now());
    app.run()
}

fn main() {
    std::process::exit(match run() {
        Ok(()) => {
            println!("{} End simulation", Utc::now());
            0
        }
        Err(err) => {
            eprintln!("Error: {:?}", err);
            1
        }
    });
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;

    Cli::command().debug_assert()
}
