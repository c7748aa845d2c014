use anyhow::{Result, Context, anyhow};
use xcb::{Window, Atom};

use crate::{
    window::Timestamp,
    xconnection::{XcbConnection, XEvent},
};

const CLIENT_WINDOW_EVENT_MASK: u32 = xcb::EVENT_MASK_PROPERTY_CHANGE;

pub const IPC_SERVER_NAME: &str = "TILEHELPER_IPC_SERVER";
pub const IPC_CLIENT_NAME: &str = "TILEHELPER_IPC_CLIENT";
pub const IPC_WINDOW_CLASS: &str = "TILEHELPER_IPC";
/// Root window property holding the server window
pub const IPC_SERVER_ATOM: &str = "_TILEHELPER_IPC_WINDOW";
/// ClientMessage type of a request: [client window, timestamp, 0, 0, 0]
pub const IPC_REQUEST_ATOM: &str = "_TILEHELPER_IPC_REQUEST";
/// Client window property: the command, then the reply
pub const IPC_COMMAND_ATOM: &str = "_TILEHELPER_IPC_COMMAND";
pub const IPC_STATE_ATOM: &str = "_TILEHELPER_IPC_STATE";
pub const IPC_STATE_REPLY_READY: &str = "reply_ready";

/// A command read from a client window
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct IpcRequest {
    /// Where the reply goes
    pub client: Window,
    pub command: String,
    /// Server time at which the client sent the command
    pub time: Timestamp,
}

/**
 * The service end of the IPC protocol.
 *
 * Owns an unmapped window that is published on the root window while the server
 * is alive. Clients write a command onto a window of their own and point us at it
 * with a ClientMessage; we answer on the same window.
 */
pub struct IpcServer<'a> {
    conn: &'a XcbConnection,
    ipc_win: Window,
    atom_server: Atom,
    atom_request: Atom,
    atom_command: Atom,
    atom_state: Atom,
    closed: bool,
}

impl<'a> IpcServer<'a> {
    pub fn new(conn: &'a XcbConnection) -> Result<IpcServer<'a>> {
        let atom_server = conn.intern_atom(IPC_SERVER_ATOM)?;
        let atom_request = conn.intern_atom(IPC_REQUEST_ATOM)?;
        let atom_command = conn.intern_atom(IPC_COMMAND_ATOM)?;
        let atom_state = conn.intern_atom(IPC_STATE_ATOM)?;

        let root = conn.root();
        if let Some(other) = conn.get_window_property(root, atom_server)? {
            if conn.window_exists(other) {
                return Err(anyhow!("Another tile helper is already running (IPC window {:#x})", other));
            }
            warn!("replacing stale IPC window {:#x}", other);
        }

        let ipc_win = conn
            .create_input_window(IPC_SERVER_NAME, IPC_WINDOW_CLASS, 0)
            .context("Failed to create a window for IPC")?;
        conn.set_window_property(root, atom_server, ipc_win)
            .context("Failed to publish the IPC window")?;
        conn.flush();
        info!("listening for commands on {:#x}", ipc_win);

        Ok(IpcServer {
            conn,
            ipc_win,
            atom_server,
            atom_request,
            atom_command,
            atom_state,
            closed: false,
        })
    }

    /// Read the command a ClientMessage points at, if the message is a request for us
    pub fn get_request(&self, win: Window, atom: Atom, data: [u32; 5]) -> Option<IpcRequest> {
        if win != self.ipc_win || atom != self.atom_request {
            return None;
        }
        let client = data[0];
        match self.conn.get_text_property(client, self.atom_command) {
            Ok(command) => Some(IpcRequest {
                client,
                command,
                time: data[1],
            }),
            Err(e) => {
                warn!("unable to read a command from client {:#x}: {}", client, e);
                None
            }
        }
    }

    pub fn send_reply(&self, client: Window, reply: &str) {
        // The reply must be in place before the state change wakes the client up
        self.conn.set_text_property(client, self.atom_command, reply);
        self.conn.set_text_property(client, self.atom_state, IPC_STATE_REPLY_READY);
        self.conn.flush();
    }

    /// Withdraw the published IPC window. Further requests will find no server.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        let root = self.conn.root();
        if let Ok(Some(published)) = self.conn.get_window_property(root, self.atom_server) {
            if published == self.ipc_win {
                self.conn.delete_property(root, self.atom_server);
            }
        }
        self.conn.destroy_window(self.ipc_win);
        self.conn.flush();
        self.closed = true;
        info!("IPC window {:#x} closed", self.ipc_win);
    }
}

impl<'a> Drop for IpcServer<'a> {
    fn drop(&mut self) {
        self.close();
    }
}

/// The command line end of the IPC protocol
pub struct IpcClient {
    conn: XcbConnection,
    server: Window,
    ipc_win: Window,
    atom_request: Atom,
    atom_command: Atom,
    atom_state: Atom,
}

impl IpcClient {
    pub fn new() -> Result<IpcClient> {
        let conn = XcbConnection::new()?;

        let atom_server = conn.intern_atom(IPC_SERVER_ATOM)?;
        let atom_request = conn.intern_atom(IPC_REQUEST_ATOM)?;
        let atom_command = conn.intern_atom(IPC_COMMAND_ATOM)?;
        let atom_state = conn.intern_atom(IPC_STATE_ATOM)?;

        let server = conn
            .get_window_property(conn.root(), atom_server)?
            .filter(|&w| conn.window_exists(w))
            .context("The tile helper service is not running")?;
        // Hear about it if the server goes away before replying
        conn.register_events(server, xcb::EVENT_MASK_STRUCTURE_NOTIFY)?;

        let ipc_win = conn
            .create_input_window(IPC_CLIENT_NAME, IPC_WINDOW_CLASS, CLIENT_WINDOW_EVENT_MASK)
            .context("Failed to create a window for IPC")?;
        conn.flush();

        Ok(IpcClient {
            conn,
            server,
            ipc_win,
            atom_request,
            atom_command,
            atom_state,
        })
    }

    pub fn send_command(&self, command: &[String]) -> Result<()> {
        self.conn.set_text_property(self.ipc_win, self.atom_command, &command.join(" "));
        self.conn.flush();

        // The PropertyNotify for our own write carries the server time we hand on
        // to the window manager as the time of this user action.
        let time = loop {
            match self.conn.wait_for_event()? {
                XEvent::PropertyNotify { id, atom, time, .. }
                    if id == self.ipc_win && atom == self.atom_command => break time,
                _ => {}
            }
        };
        debug!("ipc client: command written at {}", time);

        self.conn
            .send_client_message_to(self.server, self.atom_request, [self.ipc_win, time, 0, 0, 0])?;
        self.conn.flush();
        Ok(())
    }

    pub fn get_reply(&self) -> Result<String> {
        loop {
            match self.conn.wait_for_event()? {
                XEvent::PropertyNotify { id, atom, deleted: false, .. }
                    if id == self.ipc_win && atom == self.atom_state =>
                {
                    return match self.conn.get_text_property(id, atom)?.as_str() {
                        IPC_STATE_REPLY_READY => self.conn.get_text_property(id, self.atom_command),
                        state => Err(anyhow!("Got an invalid state {}", state)),
                    };
                }
                XEvent::DestroyNotify { id } if id == self.server => {
                    return Err(anyhow!("The tile helper service exited before replying"));
                }
                _ => {}
            }
        }
    }
}

impl Drop for IpcClient {
    fn drop(&mut self) {
        self.conn.destroy_window(self.ipc_win);
        self.conn.flush();
    }
}
