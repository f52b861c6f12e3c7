use anyhow::Result;

use rotation_quant::config::Config;
use rotation_quant::state::load_state_from_path;
use rotation_quant::summary::build_summary;

fn main() -> Result<()> {
    let config = Config::load_without_secrets()?;
    rotation_quant::logging::init(&config.logging);

    let state = load_state_from_path(&config.state.path)?;
    let now = chrono::Utc::now().timestamp();
    println!("{}", build_summary(&state, &config.trading.base_ccy, now));
    Ok(())
}
