#[macro_use]
extern crate log;

use std::{env, process};
use anyhow::{Result, anyhow};

use tilehelper::{
    command,
    ipc::IpcClient,
    Config,
};

use simplelog::SimpleLogger;

const USAGE: &str = "usage: tilectl <command> [args...]

  Tile <class> <x> <y> <width> <height>
  Maximize <class>
  Minimize <class>
  TileXid <xid> <x> <y> <width> <height>
  MaximizeXid <xid>
  MinimizeXid <xid>
  List
  Quit";

fn main() -> Result<()> {
    // -- logging --
    let config = Config::from_env()?;
    SimpleLogger::init(config.log_level, simplelog::Config::default())?;

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return Err(anyhow!("No command specified\n\n{}", USAGE));
    }
    // Don't bother the service with something it will reject
    command::parse(&args.join(" ")).map_err(|e| anyhow!("{}\n\n{}", e, USAGE))?;

    let ipc = IpcClient::new()?;
    ipc.send_command(&args)?;
    let reply = ipc.get_reply()?;
    debug!("reply: {}", reply);
    println!("{}", reply);

    if reply == "false" {
        drop(ipc);
        process::exit(1);
    }
    Ok(())
}
