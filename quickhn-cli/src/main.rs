//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    env_logger::init();
    if let Err(err) = quickhn_cli::run() {
        eprintln!("quickhn: {err}");
        std::process::exit(1);
    }
}
