use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("envmon version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
