use anyhow::Context;
use cophy_sim::{Coevolution, HostTree};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Generation of one synthetic cophylogenetic dataset: a birth-death host
/// tree, a symbiont tree coevolved on it, and the tip associations, written
/// as text files under `path2dir`.
pub struct Generate {
    pub origin: f64,
    pub host_birth: f64,
    pub host_death: f64,
    pub coevolution: Coevolution,
    pub seed: u64,
    pub path2dir: PathBuf,
    pub verbosity: u8,
}

impl Generate {
    pub fn run(&self) -> anyhow::Result<()> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let host =
            HostTree::simulate_birth_death(self.origin, self.host_birth, self.host_death, &mut rng)
                .with_context(|| "cannot simulate the host tree")?;
        if self.verbosity > 0 {
            println!("host tree with {} tips", host.external_count());
        }

        let simulated = self
            .coevolution
            .simulate(&host, &mut rng)
            .with_context(|| "cannot simulate the symbiont tree")?;
        if self.verbosity > 0 {
            println!(
                "symbiont tree with {} tips after {} attempts",
                simulated.tree.external_count(),
                simulated.attempts
            );
        }

        write_lines(&self.path2dir.join("host.nwk"), &[host.to_newick()])?;
        write_lines(&self.path2dir.join("symbiont.nwk"), &[simulated.tree.to_newick()])?;

        let mut associations: Vec<_> = simulated.associations.iter().collect();
        associations.sort();
        let lines: Vec<String> = associations
            .iter()
            .map(|(symbiont, host_taxon)| format!("{}\t{}", symbiont, host_taxon))
            .collect();
        write_lines(&self.path2dir.join("associations.map"), &lines)?;
        Ok(())
    }
}

fn write_lines(path: &Path, lines: &[String]) -> anyhow::Result<()> {
    fs::create_dir_all(path.parent().expect("output files live under a directory"))
        .with_context(|| format!("cannot create the parent directory of {:?}", path))?;
    let f = fs::File::create(path).with_context(|| format!("cannot create {:?}", path))?;
    let mut buffer = BufWriter::new(f);
    for line in lines {
        writeln!(buffer, "{}", line)?;
    }
    Ok(())
}
