//! socktestd - TCP relay server binary
//!
//! See [`socktestd::cli`] for flags and environment variables.

fn main() -> anyhow::Result<()> {
    socktestd::cli::run()
}
