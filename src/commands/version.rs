//! Version command

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("{}", VERSION);
}
