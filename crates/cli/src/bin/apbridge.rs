//! apbridge binary entrypoint.

fn main() {
    if let Err(err) = apbridge_cli::app::run() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
