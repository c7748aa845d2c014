use anyhow::{Result, Context, anyhow};

use xcb::{Window, Atom};
use xcb_util::{ewmh, icccm};

use crate::window::{WindowInfo, WindowType, Timestamp};

// Mask out the most significant bit, which indicates if it's a send_event
const XCB_RESPONSE_TYPE_MASK: u8 = 0x7F;
const COPY_FROM_PARENT: u8 = xcb::COPY_FROM_PARENT as u8;
const WINDOW_CLASS_INPUT_ONLY: u16 = xcb::WINDOW_CLASS_INPUT_ONLY as u16;
const PROP_MODE_REPLACE: u8 = xcb::PROP_MODE_REPLACE as u8;
const PROPERTY_DELETE: u8 = xcb::PROPERTY_DELETE as u8;

// Client messages to the root window must be selected for by the running window manager
const ROOT_MESSAGE_MASK: u32 =
    xcb::EVENT_MASK_SUBSTRUCTURE_REDIRECT | xcb::EVENT_MASK_SUBSTRUCTURE_NOTIFY;

// _NET_WM_STATE actions
const NET_WM_STATE_REMOVE: u32 = 0;
const NET_WM_STATE_ADD: u32 = 1;
// ICCCM WM_STATE
const ICONIC_STATE: u32 = 3;
// EWMH source indication for pagers and other direct user tools
const SOURCE_PAGER: u32 = 2;
// _NET_MOVERESIZE_WINDOW: NorthWest gravity, x/y/width/height present, pager source
const MOVERESIZE_FLAGS: u32 = 1 | (0xF << 8) | (SOURCE_PAGER << 12);

// How many 32bit multiples of a property to fetch at most
const PROPERTY_MAX_LENGTH: u32 = 4096;

macro_rules! atoms {
    ( $( $name:ident ),+ ) => {
        #[allow(non_snake_case)]
        pub struct InternedAtoms {
            $(
                pub $name: xcb::Atom
            ),*
        }

        impl InternedAtoms {
            pub fn new(conn: &xcb::Connection) -> Result<InternedAtoms> {
                Ok(InternedAtoms {
                    $(
                        $name: xcb::intern_atom(conn, false, stringify!($name)).get_reply()?.atom()
                    ),*
                })
            }
        }
    };
    // Allow trailing comma:
    ( $( $name:ident ),+ , ) => (atoms!($( $name ),+);)
}

atoms!(
    UTF8_STRING,
    WM_CHANGE_STATE,
    _NET_CLIENT_LIST,
    _NET_CLIENT_LIST_STACKING,
    _NET_ACTIVE_WINDOW,
    _NET_MOVERESIZE_WINDOW,
    _NET_FRAME_EXTENTS,
    _NET_WM_STATE,
    _NET_WM_STATE_HIDDEN,
    _NET_WM_STATE_MAXIMIZED_VERT,
    _NET_WM_STATE_MAXIMIZED_HORZ,
    _NET_WM_WINDOW_TYPE,
    _NET_WM_WINDOW_TYPE_NORMAL,
    _NET_WM_WINDOW_TYPE_DIALOG,
    _NET_WM_WINDOW_TYPE_UTILITY,
    _NET_WM_WINDOW_TYPE_TOOLBAR,
    _NET_WM_WINDOW_TYPE_MENU,
    _NET_WM_WINDOW_TYPE_SPLASH,
    _NET_WM_WINDOW_TYPE_DOCK,
    _NET_WM_WINDOW_TYPE_DESKTOP,
    _NET_WM_WINDOW_TYPE_NOTIFICATION,
);

/// An X window / screen position: top left corner + extent
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Rectangle {
    x: i32,
    y: i32,
    w: u32,
    h: u32,
}

impl Rectangle {
    /// Create a new Rectangle.
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Rectangle {
        Rectangle { x, y, w, h }
    }

    pub fn values(&self) -> (i32, i32, u32, u32) {
        (self.x, self.y, self.w, self.h)
    }
}

impl std::fmt::Display for Rectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}{:+}{:+}", self.w, self.h, self.x, self.y)
    }
}

/// Which root window property the window snapshot is read from
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WindowOrder {
    /// _NET_CLIENT_LIST_STACKING, bottom to top
    Stacking,
    /// _NET_CLIENT_LIST, oldest mapped first
    Mapping,
}

/**
 * The window manager primitives the tiler needs.
 *
 * Every call goes to the live window manager state: implementations must not
 * cache the window list between calls. State mutators are requests, so they are
 * idempotent (asking to maximize a maximized window is harmless).
 */
pub trait XConn {
    /// All managed client windows, in snapshot order
    fn list_windows(&self) -> Result<Vec<WindowInfo>>;
    fn unminimize(&self, win: Window) -> Result<()>;
    /// Clear both the horizontal and vertical maximized state
    fn unmaximize(&self, win: Window) -> Result<()>;
    /// Set both the horizontal and vertical maximized state
    fn maximize(&self, win: Window) -> Result<()>;
    fn minimize(&self, win: Window) -> Result<()>;
    /// Place the outer frame of a window (decorations included) on `region`
    fn move_resize_frame(&self, win: Window, region: Rectangle) -> Result<()>;
    /// Raise and focus a window
    fn activate(&self, win: Window, time: Timestamp) -> Result<()>;
    fn flush(&self) -> bool;
}

/**
 * Wrapper around the low level XCB event types that require casting to work with.
 * Only the events used by the IPC protocol are passed through.
 *
 * *ClientMessage* - another client sent us a message
 *   - _window_ (Window): the window the message was addressed to
 *   - _type_ (Atom): what the message is about
 *   - _data_: 20 bytes, read here as five 32 bit values
 *
 * *PropertyNotify* - a property changed on a window we selected PropertyChange on
 *   - _time_ (Timestamp): server time of the change. This is the only cheap way
 *     for a client to learn the current server time.
 */
#[derive(Debug, Clone)]
pub enum XEvent {
    /// xcb docs: https://www.mankier.com/3/xcb_client_message_event_t
    ClientMessage {
        window: Window,
        atom: Atom,
        data: [u32; 5],
    },

    /// xcb docs: https://www.mankier.com/3/xcb_property_notify_event_t
    PropertyNotify {
        /// The ID of the window that had a property changed
        id: Window,
        /// The property that changed
        atom: Atom,
        /// Server time of the change
        time: Timestamp,
        /// Was the property deleted rather than set?
        deleted: bool,
    },

    /// xcb docs: https://www.mankier.com/3/xcb_destroy_notify_event_t
    DestroyNotify {
        /// The ID of the window being destroyed
        id: Window,
    },
}

/// Handles communication with an X server via xcb
pub struct XcbConnection {
    conn: ewmh::Connection,
    root: Window,
    atoms: InternedAtoms,
    window_order: WindowOrder,
}

impl XcbConnection {
    pub fn new() -> Result<XcbConnection> {
        let (conn, preferred_screen) = xcb::Connection::connect(None)
            .context("Unable to connection to X server")?;
        let conn = ewmh::Connection::connect(conn).map_err(|(e, _)| e)?;

        let root = conn
            .get_setup()
            .roots()
            .nth(preferred_screen as usize)
            .context("Unable to get the root window of the preferred screen")?
            .root();

        let atoms = InternedAtoms::new(&conn).context("Failed to intern atoms")?;

        Ok(XcbConnection {
            conn,
            root,
            atoms,
            window_order: WindowOrder::Stacking,
        })
    }

    pub fn root(&self) -> Window {
        self.root
    }

    pub fn flush(&self) -> bool {
        self.conn.flush()
    }

    pub fn set_window_order(&mut self, order: WindowOrder) {
        self.window_order = order;
    }

    /// Returns the Atom identifier associated with the atom_name str.
    pub fn intern_atom(&self, atom_name: &str) -> Result<Atom> {
        Ok(xcb::intern_atom(&self.conn, false, atom_name).get_reply()?.atom())
    }

    /// Create an unmapped 1x1 InputOnly window, used as an IPC endpoint.
    pub fn create_input_window(&self, name: &str, class: &str, event_mask: u32) -> Result<Window> {
        let win = self.conn.generate_id();
        xcb::create_window_checked(
            &self.conn,              // xcb connection to X11
            COPY_FROM_PARENT,        // new window's depth
            win,                     // ID to be used for referring to the window
            self.root,               // parent window
            0,                       // x-coordinate
            0,                       // y-coordinate
            1,                       // width, can't be 0
            1,                       // height, can't be 0
            0,                       // border width
            WINDOW_CLASS_INPUT_ONLY, // class
            xcb::COPY_FROM_PARENT,   // visual
            &[(xcb::CW_EVENT_MASK, event_mask)], // value list
        ).request_check().context("Failed to create an input only window")?;

        ewmh::set_wm_name_checked(&self.conn, win, name).request_check()?;
        icccm::set_wm_class_checked(&self.conn, win, class, class).request_check()?;
        Ok(win)
    }

    pub fn destroy_window(&self, win: Window) {
        xcb::destroy_window(&self.conn, win);
    }

    /// Is `win` still a live window on the server?
    pub fn window_exists(&self, win: Window) -> bool {
        xcb::get_window_attributes(&self.conn, win).get_reply().is_ok()
    }

    /// The (class, instance) pair of WM_CLASS
    pub fn get_wm_class(&self, win: Window) -> Result<(String, String)> {
        let reply = icccm::get_wm_class(&self.conn, win).get_reply()?;
        Ok((reply.class().to_string(), reply.instance().to_string()))
    }

    pub fn get_text_property(&self, win: Window, atom: Atom) -> Result<String> {
        let prop = icccm::get_text_property(&self.conn, win, atom).get_reply()?.name().to_string();
        Ok(prop)
    }

    pub fn set_text_property(&self, win: Window, atom: Atom, data: &str) {
        xcb::change_property(
            &self.conn,             // xcb connection to X11
            PROP_MODE_REPLACE,      // discard current prop and replace
            win,                    // window to change prop on
            atom,                   // prop to change
            self.atoms.UTF8_STRING, // type of prop
            8,                      // data format (8/16/32-bit)
            data.as_bytes(),        // data
        );
    }

    /// Read a WINDOW property holding a single window id
    pub fn get_window_property(&self, win: Window, atom: Atom) -> Result<Option<Window>> {
        let ids = self.get_u32_list(win, atom, xcb::ATOM_WINDOW)?;
        Ok(ids.first().copied().filter(|&id| id != xcb::NONE))
    }

    pub fn set_window_property(&self, win: Window, atom: Atom, value: Window) -> Result<()> {
        xcb::change_property_checked(
            &self.conn,
            PROP_MODE_REPLACE,
            win,
            atom,
            xcb::ATOM_WINDOW,
            32,
            &[value],
        ).request_check().context("Failed to set window property")?;
        Ok(())
    }

    pub fn delete_property(&self, win: Window, atom: Atom) {
        xcb::delete_property(&self.conn, win, atom);
    }

    /// Address a ClientMessage about `win` to another client's window.
    ///
    /// An empty event mask delivers the event to the client that created `destination`.
    pub fn send_client_message_to(&self, destination: Window, atom: Atom, data: [u32; 5]) -> Result<()> {
        let data = xcb::ClientMessageData::from_data32(data);
        let event = xcb::ClientMessageEvent::new(32, destination, atom, data);
        xcb::send_event_checked(&self.conn, false, destination, xcb::EVENT_MASK_NO_EVENT, &event)
            .request_check()
            .context(format!("Failed to send a client message to {:#x}", destination))?;
        Ok(())
    }

    /// Ask the window manager to do something with `win`.
    fn send_root_message(&self, win: Window, atom: Atom, data: [u32; 5]) -> Result<()> {
        let data = xcb::ClientMessageData::from_data32(data);
        let event = xcb::ClientMessageEvent::new(32, win, atom, data);
        xcb::send_event_checked(&self.conn, false, self.root, ROOT_MESSAGE_MASK, &event)
            .request_check()
            .context(format!("Failed to send a window manager request for {:#x}", win))?;
        Ok(())
    }

    fn get_u32_list(&self, win: Window, atom: Atom, type_: Atom) -> Result<Vec<u32>> {
        // xcb docs: https://www.mankier.com/3/xcb_get_property
        let reply = xcb::get_property(
            &self.conn,          // xcb connection to X11
            false,               // should the property be deleted
            win,                 // target window to query
            atom,                // the property we want
            type_,               // the type of the property
            0,                   // offset in the property to retrieve data from
            PROPERTY_MAX_LENGTH, // how many 32bit multiples of data to retrieve
        ).get_reply()?;

        if reply.format() != 32 {
            // Unset, or not something we know how to read
            return Ok(Vec::new());
        }
        Ok(reply.value::<u32>().to_vec())
    }

    /// _NET_FRAME_EXTENTS of a window, zero when undecorated
    fn frame_extents(&self, win: Window) -> Result<FrameExtents> {
        let extents = self.get_u32_list(win, self.atoms._NET_FRAME_EXTENTS, xcb::ATOM_CARDINAL)?;
        Ok(FrameExtents::from_property(&extents))
    }

    fn frame_geometry(&self, win: Window) -> Result<Rectangle> {
        let geometry = xcb::get_geometry(&self.conn, win).get_reply()?;
        let origin = xcb::translate_coordinates(&self.conn, win, self.root, 0, 0).get_reply()?;
        let extents = self.frame_extents(win)?;
        Ok(frame_from_client(
            (origin.dst_x() as i32, origin.dst_y() as i32),
            (geometry.width() as u32, geometry.height() as u32),
            extents,
        ))
    }

    fn window_type(&self, win: Window) -> Result<WindowType> {
        let types = self.get_u32_list(win, self.atoms._NET_WM_WINDOW_TYPE, xcb::ATOM_ATOM)?;
        if types.is_empty() {
            let transient_for = self.get_u32_list(win, xcb::ATOM_WM_TRANSIENT_FOR, xcb::ATOM_WINDOW)?;
            return Ok(untyped_window_type(&transient_for));
        }
        // The first type we understand wins
        Ok(types
            .iter()
            .find_map(|&atom| self.known_window_type(atom))
            .unwrap_or(WindowType::Other))
    }

    fn known_window_type(&self, atom: Atom) -> Option<WindowType> {
        let a = &self.atoms;
        let known = [
            (a._NET_WM_WINDOW_TYPE_NORMAL, WindowType::Normal),
            (a._NET_WM_WINDOW_TYPE_DIALOG, WindowType::Dialog),
            (a._NET_WM_WINDOW_TYPE_UTILITY, WindowType::Utility),
            (a._NET_WM_WINDOW_TYPE_TOOLBAR, WindowType::Toolbar),
            (a._NET_WM_WINDOW_TYPE_MENU, WindowType::Menu),
            (a._NET_WM_WINDOW_TYPE_SPLASH, WindowType::Splash),
            (a._NET_WM_WINDOW_TYPE_DOCK, WindowType::Dock),
            (a._NET_WM_WINDOW_TYPE_DESKTOP, WindowType::Desktop),
            (a._NET_WM_WINDOW_TYPE_NOTIFICATION, WindowType::Notification),
        ];
        known.iter().find(|(k, _)| *k == atom).map(|&(_, t)| t)
    }

    fn read_window(&self, win: Window) -> Result<WindowInfo> {
        let geometry = self.frame_geometry(win)?;
        // Windows without WM_CLASS match nothing but an empty class name
        let (wm_class, wm_class_instance) = self.get_wm_class(win).unwrap_or_default();
        let window_type = self.window_type(win)?;
        let states = self.get_u32_list(win, self.atoms._NET_WM_STATE, xcb::ATOM_ATOM)?;
        let (minimized, maximized) = self.wm_state().decode(&states);

        Ok(WindowInfo::new(
            win,
            wm_class,
            wm_class_instance,
            window_type,
            minimized,
            maximized,
            geometry,
        ))
    }

    fn set_maximized(&self, win: Window, action: u32) -> Result<()> {
        self.send_root_message(win, self.atoms._NET_WM_STATE, [
            action,
            self.atoms._NET_WM_STATE_MAXIMIZED_VERT,
            self.atoms._NET_WM_STATE_MAXIMIZED_HORZ,
            SOURCE_PAGER,
            0,
        ])
    }

    fn wm_state(&self) -> WmStateAtoms {
        WmStateAtoms {
            hidden: self.atoms._NET_WM_STATE_HIDDEN,
            maximized_vert: self.atoms._NET_WM_STATE_MAXIMIZED_VERT,
            maximized_horz: self.atoms._NET_WM_STATE_MAXIMIZED_HORZ,
        }
    }

    fn active_window(&self) -> Window {
        self.get_window_property(self.root, self.atoms._NET_ACTIVE_WINDOW)
            .ok()
            .flatten()
            .unwrap_or(xcb::NONE)
    }

    /// Block until the next event we know how to handle arrives.
    ///
    /// Errors only when the connection to the X server is gone.
    pub fn wait_for_event(&self) -> Result<XEvent> {
        loop {
            let event = self
                .conn
                .wait_for_event()
                .ok_or_else(|| anyhow!("Lost the connection to the X server"))?;
            if let Some(event) = self.convert_event(&event) {
                return Ok(event);
            }
        }
    }

    fn convert_event(&self, event: &xcb::GenericEvent) -> Option<XEvent> {
        let etype = event.response_type() & XCB_RESPONSE_TYPE_MASK;

        match etype {
            xcb::CLIENT_MESSAGE => {
                let e: &xcb::ClientMessageEvent = unsafe { xcb::cast_event(event) };
                if e.format() != 32 {
                    return None;
                }
                let mut data: [u32; 5] = [0; 5];
                data.copy_from_slice(e.data().data32());
                Some(XEvent::ClientMessage {
                    window: e.window(),
                    atom: e.type_(),
                    data,
                })
            }

            xcb::PROPERTY_NOTIFY => {
                let e: &xcb::PropertyNotifyEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::PropertyNotify {
                    id: e.window(),
                    atom: e.atom(),
                    time: e.time(),
                    deleted: e.state() == PROPERTY_DELETE,
                })
            }

            xcb::DESTROY_NOTIFY => {
                let e: &xcb::DestroyNotifyEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::DestroyNotify { id: e.window() })
            }

            // NOTE: ignoring other event types
            _ => None,
        }
    }

    pub fn register_events(&self, win: Window, events: u32) -> Result<()> {
        xcb::change_window_attributes_checked(&self.conn, win, &[(xcb::CW_EVENT_MASK, events)])
            .request_check()
            .context(format!("Could not register events: {}", events))?;
        Ok(())
    }

}

/// Decoration sizes from _NET_FRAME_EXTENTS
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct FrameExtents {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl FrameExtents {
    /// The property is left, right, top, bottom. Anything else counts as undecorated.
    pub fn from_property(values: &[u32]) -> FrameExtents {
        match *values {
            [left, right, top, bottom] => FrameExtents { left, right, top, bottom },
            _ => FrameExtents::default(),
        }
    }

    fn horizontal(&self) -> u32 {
        self.left.saturating_add(self.right)
    }

    fn vertical(&self) -> u32 {
        self.top.saturating_add(self.bottom)
    }
}

/// The outer frame around a client window at `origin` (root coordinates) of `size`.
///
/// Extents are written by any client, so the arithmetic saturates rather than wrapping.
pub fn frame_from_client(origin: (i32, i32), size: (u32, u32), extents: FrameExtents) -> Rectangle {
    let shift = |pos: i32, by: u32| (i64::from(pos) - i64::from(by)).max(i64::from(i32::MIN)) as i32;
    Rectangle::new(
        shift(origin.0, extents.left),
        shift(origin.1, extents.top),
        size.0.saturating_add(extents.horizontal()),
        size.1.saturating_add(extents.vertical()),
    )
}

/// Client width and height that make the frame fill `region`, never below 1x1
pub fn client_size_for_frame(region: Rectangle, extents: FrameExtents) -> (u32, u32) {
    let (_, _, w, h) = region.values();
    (
        w.saturating_sub(extents.horizontal()).max(1),
        h.saturating_sub(extents.vertical()).max(1),
    )
}

/// EWMH: untyped transient windows are dialogs, everything else is normal
pub fn untyped_window_type(transient_for: &[Window]) -> WindowType {
    if transient_for.iter().any(|&w| w != xcb::NONE) {
        WindowType::Dialog
    } else {
        WindowType::Normal
    }
}

/// The _NET_WM_STATE atoms that make up a window's minimized and maximized flags
#[derive(Debug, Clone, Copy)]
pub struct WmStateAtoms {
    pub hidden: Atom,
    pub maximized_vert: Atom,
    pub maximized_horz: Atom,
}

impl WmStateAtoms {
    /// (minimized, maximized). Maximized in either direction counts as maximized.
    pub fn decode(&self, states: &[Atom]) -> (bool, bool) {
        let minimized = states.contains(&self.hidden);
        let maximized = states.contains(&self.maximized_vert) || states.contains(&self.maximized_horz);
        (minimized, maximized)
    }
}

impl XConn for XcbConnection {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let list = match self.window_order {
            WindowOrder::Stacking => self.atoms._NET_CLIENT_LIST_STACKING,
            WindowOrder::Mapping => self.atoms._NET_CLIENT_LIST,
        };
        let ids = self
            .get_u32_list(self.root, list, xcb::ATOM_WINDOW)
            .context("Failed to read the client list, is an EWMH window manager running?")?;

        let mut windows = Vec::with_capacity(ids.len());
        for id in ids {
            // The window may be gone by the time we get to it
            match self.read_window(id) {
                Ok(info) => windows.push(info),
                Err(e) => debug!("skipping window {:#x}: {}", id, e),
            }
        }
        Ok(windows)
    }

    fn unminimize(&self, win: Window) -> Result<()> {
        // ICCCM: mapping an iconic window asks for NormalState
        xcb::map_window_checked(&self.conn, win)
            .request_check()
            .context(format!("Failed to map window {:#x}", win))?;
        Ok(())
    }

    fn unmaximize(&self, win: Window) -> Result<()> {
        self.set_maximized(win, NET_WM_STATE_REMOVE)
    }

    fn maximize(&self, win: Window) -> Result<()> {
        self.set_maximized(win, NET_WM_STATE_ADD)
    }

    fn minimize(&self, win: Window) -> Result<()> {
        self.send_root_message(win, self.atoms.WM_CHANGE_STATE, [ICONIC_STATE, 0, 0, 0, 0])
    }

    fn move_resize_frame(&self, win: Window, region: Rectangle) -> Result<()> {
        // With NorthWest gravity x/y place the frame, but width/height size the client.
        // NOTE: when this follows an unmaximize the window manager may not have handled
        // it yet, so a WM that hides decorations on maximized windows (KWin borderless
        // maximize, xfwm4) still reports zero extents and the frame ends up too large.
        // The round trip below gives it a chance to catch up first.
        xcb::get_input_focus(&self.conn).get_reply()?;
        let extents = self.frame_extents(win)?;
        let (x, y, _, _) = region.values();
        let (width, height) = client_size_for_frame(region, extents);
        self.send_root_message(win, self.atoms._NET_MOVERESIZE_WINDOW, [
            MOVERESIZE_FLAGS,
            x as u32,
            y as u32,
            width,
            height,
        ])
    }

    fn activate(&self, win: Window, time: Timestamp) -> Result<()> {
        if !self.window_exists(win) {
            return Err(anyhow!("window {:#x} no longer exists", win));
        }
        self.send_root_message(win, self.atoms._NET_ACTIVE_WINDOW, [
            SOURCE_PAGER,
            time,
            self.active_window(),
            0,
            0,
        ])
    }

    fn flush(&self) -> bool {
        XcbConnection::flush(self)
    }
}
