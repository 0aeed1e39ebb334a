pub mod progress;

pub fn print_banner() {
    eprintln!("dabmsc-rs {}", env!("CARGO_PKG_VERSION"));
}
