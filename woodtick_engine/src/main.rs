use anyhow::Result;

fn main() -> Result<()> {
    env_logger::init();
    let args = woodtick_engine::cli::parse()?;
    woodtick_engine::runtime::execute(args)
}
