use std::io::Write;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use subvec::Vectors;

/// number of closest words that will be shown
const N: usize = 40;

#[derive(Parser)]
#[command(about = "Show the words closest to a word or sentence", long_about = None)]
struct Options {
    /// Word vectors written by `subvec --output FILE`
    #[arg(value_name = "FILE")]
    file_name: PathBuf,

    /// FILE was written with --binary
    #[arg(long)]
    binary: bool,
}

fn run(options: Options) -> Result<()> {
    let vectors = Vectors::load(&options.file_name, options.binary)
        .with_context(|| format!("failed to load vectors from {}", options.file_name.display()))?;
    let dim = vectors.dim();

    'outer: loop {
        print!("Enter word or sentence (EXIT to break): ");
        let _ = std::io::stdout().flush();

        let mut st1 = String::new();
        if std::io::stdin()
            .read_line(&mut st1)
            .context("error reading stdin")?
            == 0
        {
            break;
        }
        let st1 = st1.trim();
        if st1 == "EXIT" {
            break;
        }

        let mut bi: Vec<usize> = vec![];
        for sta in st1.split_whitespace() {
            println!();
            println!("Word: {sta}  Position in vocabulary: ");
            match vectors.id(sta) {
                None => {
                    println!("None");
                    println!("Out of dictionary word!");
                    continue 'outer;
                }
                Some(i) => {
                    println!("{i}");
                    bi.push(i);
                }
            }
        }
        if bi.is_empty() {
            continue;
        }

        println!();
        println!("                                              Word       Cosine distance");
        println!("------------------------------------------------------------------------");

        let mut vec = vec![0.0; dim];
        for &i in &bi {
            for (v, r) in vec.iter_mut().zip(vectors.vector(i).iter().copied()) {
                *v += r;
            }
        }
        for (word, dist) in vectors.nearest(&vec, N, &bi) {
            println!("{:50}\t\t{}", word, dist);
        }
    }
    Ok(())
}

fn main() {
    let options = Options::parse();
    if let Err(err) = run(options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
