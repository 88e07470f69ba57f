#[cfg(feature = "cli")]
mod cli;

#[cfg(feature = "cli")]
fn main() {
    if let Err(err) = cli::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("ancient-lexicon was built without its command line. Rebuild with `--features cli`.");
}
