use clap::Parser;
use coursebook::cli::{run, Args};
use std::error::Error;

fn main() {
    let args = Args::parse();
    let Err(e) = run(&args) else {
        return;
    };
    eprintln!("error: {}", e);
    if args.verbose {
        let mut source = e.source();
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
    }
    std::process::exit(e.exit_code());
}
