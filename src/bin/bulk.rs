use clap::Parser;
use learning_stylecheck::{read_bulk, Error, SectionLayout};
use std::fs::File;
use std::io::BufReader;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Args {
    path: String,
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let reader = BufReader::new(File::open(&args.path)?);
    let layout = SectionLayout::default();
    for row in read_bulk(reader) {
        match row {
            Ok((id, store)) => {
                let scores = store.section_scores(&layout);
                println!(
                    "id = {}, scores = {:?}, complete = {}",
                    id,
                    scores.as_triple(),
                    store.is_complete()
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping row");
            }
        }
    }
    Ok(())
}
