use anyhow::Result;

fn main() -> Result<()> {
    darktide_order::cli::run()
}
