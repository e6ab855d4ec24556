use anyhow::Result;

fn main() -> Result<()> {
    let code = autoapprove::cli::run()?;
    std::process::exit(code)
}
