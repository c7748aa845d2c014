#[macro_use]
extern crate log;

use tilehelper::{Config, TileService, XcbConnection};
use simplelog::SimpleLogger;

/// A default 'anyhow' based result type
type Result<T> = anyhow::Result<T>;

fn main() -> Result<()> {
    let config = Config::from_env()?;

    // -- logging --
    SimpleLogger::init(config.log_level, simplelog::Config::default())?;

    let mut conn = XcbConnection::new()?;
    conn.set_window_order(config.window_order);

    let mut service = TileService::new(&conn)?;
    info!("tile helper started ({:?} window order)", config.window_order);
    service.run()?;
    info!("tile helper stopped");

    Ok(())
}
