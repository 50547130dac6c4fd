//! socktest - interactive TCP test client binary
//!
//! See [`socktest_client::cli`] for flags and environment variables.

fn main() -> anyhow::Result<()> {
    socktest_client::cli::run()
}
