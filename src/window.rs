use crate::xconnection::Rectangle;

/// An X11 window id
pub type WindowId = u32;

/// X server time in milliseconds. 0 is CurrentTime.
pub type Timestamp = u32;

/// _NET_WM_WINDOW_TYPE of a window, collapsed to the kinds we care about
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WindowType {
    Normal,
    Dialog,
    Utility,
    Toolbar,
    Menu,
    Splash,
    Dock,
    Desktop,
    Notification,
    Other,
}

impl WindowType {
    pub fn name(&self) -> &'static str {
        match self {
            WindowType::Normal => "normal",
            WindowType::Dialog => "dialog",
            WindowType::Utility => "utility",
            WindowType::Toolbar => "toolbar",
            WindowType::Menu => "menu",
            WindowType::Splash => "splash",
            WindowType::Dock => "dock",
            WindowType::Desktop => "desktop",
            WindowType::Notification => "notification",
            WindowType::Other => "other",
        }
    }
}

/**
 * A snapshot of a live window, read from the X server.
 *
 * Owned by nobody but the request that read it: the next request reads the
 * window list again instead of trusting anything stored here.
 */
#[derive(Debug, PartialEq, Clone)]
pub struct WindowInfo {
    id: WindowId,
    wm_class: String,
    wm_class_instance: String,
    window_type: WindowType,
    // state flags
    minimized: bool,
    maximized: bool,
    geometry: Rectangle,
    description: String,
}

impl WindowInfo {
    pub fn new(
        id: WindowId,
        wm_class: impl Into<String>,
        wm_class_instance: impl Into<String>,
        window_type: WindowType,
        minimized: bool,
        maximized: bool,
        geometry: Rectangle,
    ) -> WindowInfo {
        WindowInfo {
            id,
            wm_class: wm_class.into(),
            wm_class_instance: wm_class_instance.into(),
            window_type,
            minimized,
            maximized,
            geometry,
            description: describe(id),
        }
    }

    /// The X window ID of this window
    pub fn id(&self) -> WindowId {
        self.id
    }

    /// The class part of WM_CLASS
    pub fn wm_class(&self) -> &str {
        &self.wm_class
    }

    /// The instance part of WM_CLASS
    pub fn wm_class_instance(&self) -> &str {
        &self.wm_class_instance
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub fn is_maximized(&self) -> bool {
        self.maximized
    }

    /// Outer frame geometry in root window coordinates
    pub fn geometry(&self) -> Rectangle {
        self.geometry
    }

    /// Low level identifier string, `0x` followed by the lowercase hex id
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// The description string of an X window id, e.g. `0x3a00007`
pub fn describe(id: u32) -> String {
    format!("{:#x}", id)
}
