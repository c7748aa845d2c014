//! Window targeting: which live window does a request refer to?

use std::fmt;

use crate::window::{describe, WindowInfo, WindowType};

/// How a request names its window
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Target {
    /// WM_CLASS class or instance name, compared case-insensitively
    ByClass(String),
    /// X11 window id
    ById(u32),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::ByClass(name) => write!(f, "class '{}'", name),
            Target::ById(id) => write!(f, "window {}", describe(*id)),
        }
    }
}

/// Find the window `target` refers to.
///
/// When several windows match, the first one in snapshot order wins.
pub fn resolve<'w>(target: &Target, windows: &'w [WindowInfo]) -> Option<&'w WindowInfo> {
    match target {
        Target::ByClass(name) => {
            let name = name.to_lowercase();
            windows
                .iter()
                .filter(|w| w.window_type() == WindowType::Normal)
                .find(|w| {
                    w.wm_class().to_lowercase() == name
                        || w.wm_class_instance().to_lowercase() == name
                })
        }
        Target::ById(id) => {
            // Any window type: an id names exactly one window
            let description = describe(*id);
            windows.iter().find(|w| w.description() == description)
        }
    }
}
