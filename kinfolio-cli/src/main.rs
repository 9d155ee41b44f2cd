//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

#[expect(
    clippy::print_stderr,
    reason = "the binary reports fatal errors on stderr before exiting"
)]
fn main() {
    if let Err(err) = kinfolio_cli::run() {
        eprintln!("kinfolio: {err}");
        std::process::exit(1);
    }
}
