use crate::app::Generate;
use clap::{ArgAction, Parser};
use cophy_sim::{Coevolution, CoevolutionRates};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cophy-sim")]
#[command(
    about = "Simulate host-symbiont coevolution on a birth-death host tree",
    long_about = "Simulate the cophylogenetic history of a symbiont lineage evolving on a birth-death host tree under cospeciation, duplication, host-switch and loss, writing the host tree, the symbiont tree and the tip associations"
)]
pub struct Cli {
    /// Time of origin of the host tree
    #[arg(long, value_name = "TIME")]
    origin: f64,
    /// Birth rate of the host tree
    #[arg(long, value_name = "RATE")]
    host_birth: f64,
    /// Death rate of the host tree
    #[arg(long, value_name = "RATE", default_value_t = 0.)]
    host_death: f64,
    /// Duplication rate of the symbiont
    #[arg(long, value_name = "RATE")]
    duplication: f64,
    /// Host-switch rate of the symbiont
    #[arg(long, value_name = "RATE")]
    host_switch: f64,
    /// Loss rate of the symbiont
    #[arg(long, value_name = "RATE")]
    loss: f64,
    /// Overall clock-rate multiplier applied to the three symbiont rates
    #[arg(long, value_name = "RATE", default_value_t = 1.)]
    clock_rate: f64,
    /// Stdev of the relaxed lognormal clock; strict clock when unset
    #[arg(long, value_name = "STDEV")]
    relaxed_stdev: Option<f64>,
    /// Keep lost symbiont lineages as labelled extinct leaves
    #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
    keep_extinctions: bool,
    /// Attempts discarded to whole-tree extinction before giving up
    #[arg(long, value_name = "N", default_value_t = 100_000)]
    max_attempts: u64,
    /// Seed for reproducibility; drawn and printed when unset
    #[arg(long, short)]
    seed: Option<u64>,
    #[arg(short, long, action = ArgAction::Count, default_value_t = 0)]
    verbose: u8,
    /// Directory where host.nwk, symbiont.nwk and associations.map are written
    #[arg(value_name = "DIR", value_parser = |path: &str| { let path_b = PathBuf::from(path); if path_b.is_dir() { Ok(path_b) } else { Err("Cannot find dir") }} ) ]
    path: PathBuf,
}

impl Cli {
    pub fn build() -> anyhow::Result<Generate> {
        let args = Cli::parse();

        let seed = match args.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random();
                println!("Seed used: {}", seed);
                seed
            }
        };

        let rates = CoevolutionRates {
            duplication: args.duplication,
            host_switch: args.host_switch,
            loss: args.loss,
        };
        let coevolution = Coevolution::new(&rates, args.clock_rate, args.relaxed_stdev)?
            .keep_extinctions(args.keep_extinctions)
            .max_attempts(args.max_attempts)
            .verbosity(args.verbose);

        Ok(Generate {
            origin: args.origin,
            host_birth: args.host_birth,
            host_death: args.host_death,
            coevolution,
            seed,
            path2dir: args.path,
            verbosity: args.verbose,
        })
    }
}
