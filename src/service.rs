use std::env;

use anyhow::{Result, anyhow};
use log::LevelFilter;
use xcb::{Window, Atom};

use crate::{
    command::{self, Command},
    ipc::IpcServer,
    tiler::Tiler,
    window::Timestamp,
    xconnection::{XcbConnection, XEvent, WindowOrder},
};

pub const LOG_LEVEL_VAR: &str = "TILEHELPER_LOG";
pub const WINDOW_ORDER_VAR: &str = "TILEHELPER_WINDOW_ORDER";

/// The service: answers tiling commands from IPC clients, one at a time.
pub struct TileService<'a> {
    conn: &'a XcbConnection,
    ipc_server: IpcServer<'a>,
    running: bool,
}

impl<'a> TileService<'a> {
    /// Publish the IPC window. Fails if another service is already running on this display.
    pub fn new(conn: &'a XcbConnection) -> Result<Self> {
        let ipc_server = IpcServer::new(conn)?;
        Ok(TileService {
            conn,
            ipc_server,
            running: false,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        self.running = true;
        while self.running {
            let event = self.conn.wait_for_event()?;
            debug!("got XEvent: {:?}", event);
            if let XEvent::ClientMessage { window, atom, data } = event {
                self.handle_client_message(window, atom, data);
            }
            self.conn.flush();
        }
        Ok(())
    }

    /// Withdraw the IPC window and leave the event loop
    pub fn exit(&mut self) {
        self.ipc_server.close();
        self.running = false;
    }

    fn handle_client_message(&mut self, window: Window, atom: Atom, data: [u32; 5]) {
        if let Some(request) = self.ipc_server.get_request(window, atom, data) {
            debug!("command from {:#x}: {}", request.client, request.command);
            let (reply, quit) = self.handle_command(&request.command, request.time);
            self.ipc_server.send_reply(request.client, &reply);
            if quit {
                info!("quit requested by {:#x}", request.client);
                self.exit();
            }
        }
    }

    /// The reply text for a command, and whether the service should stop afterwards
    fn handle_command(&self, line: &str, time: Timestamp) -> (String, bool) {
        let engine = Tiler::new(self.conn);
        match command::parse(line) {
            Ok(Command::Run(request)) => (engine.dispatch(&request, time).to_string(), false),
            Ok(Command::List) => (engine.list(), false),
            Ok(Command::Quit) => (true.to_string(), true),
            Err(e) => {
                warn!("rejecting '{}': {:#}", line, e);
                (false.to_string(), false)
            }
        }
    }
}

/// The main user facing configuration details
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Config {
    /// How much to log
    pub log_level: LevelFilter,
    /// Where the window snapshot is read from. Decides which window wins when
    /// several share a class name.
    pub window_order: WindowOrder,
}

impl Config {
    /// Initialise a default Config, giving sensible (but minimal) values for all fields.
    pub fn default() -> Config {
        Config {
            log_level: LevelFilter::Info,
            window_order: WindowOrder::Stacking,
        }
    }

    /// The default Config, overridden by TILEHELPER_LOG and TILEHELPER_WINDOW_ORDER
    pub fn from_env() -> Result<Config> {
        Config::from_vars(env::var(LOG_LEVEL_VAR).ok(), env::var(WINDOW_ORDER_VAR).ok())
    }

    fn from_vars(log_level: Option<String>, window_order: Option<String>) -> Result<Config> {
        let mut config = Config::default();
        if let Some(level) = log_level {
            config.log_level = level
                .parse()
                .map_err(|_| anyhow!("Invalid {} {}", LOG_LEVEL_VAR, level))?;
        }
        if let Some(order) = window_order {
            config.window_order = match order.to_lowercase().as_str() {
                "stacking" => WindowOrder::Stacking,
                "mapping" => WindowOrder::Mapping,
                _ => return Err(anyhow!("Invalid {} {}, expected stacking or mapping", WINDOW_ORDER_VAR, order)),
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::from_vars(None, None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_level, LevelFilter::Info);
        assert_eq!(config.window_order, WindowOrder::Stacking);
    }

    #[test]
    fn overrides() {
        let config = Config::from_vars(Some("debug".into()), Some("Mapping".into())).unwrap();
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.window_order, WindowOrder::Mapping);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(Config::from_vars(Some("loud".into()), None).is_err());
        assert!(Config::from_vars(None, Some("random".into())).is_err());
    }
}
