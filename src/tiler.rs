use anyhow::{Result, Context};

use crate::{
    command::Request,
    layout,
    target,
    window::{Timestamp, WindowInfo},
    xconnection::XConn,
};

/// How a request that reached the window manager ended
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
    /// The target window was found and brought into the requested state
    Applied,
    /// No live window matched the target; nothing was changed
    NotFound,
}

/**
 * Resolves requests against the live window list and applies them.
 *
 * Holds nothing between requests but the connection: every request reads a fresh
 * window snapshot, so a window closed or reconfigured since the last request is
 * never acted on from stale data.
 */
pub struct Tiler<'a, X: XConn> {
    conn: &'a X,
}

impl<'a, X: XConn> Tiler<'a, X> {
    pub fn new(conn: &'a X) -> Tiler<'a, X> {
        Tiler { conn }
    }

    /// Run one request, telling a missing window apart from a failed one
    pub fn execute(&self, request: &Request, time: Timestamp) -> Result<Outcome> {
        let windows = self.conn.list_windows()?;
        let win = match target::resolve(&request.target, &windows) {
            Some(win) => win,
            None => return Ok(Outcome::NotFound),
        };

        debug!("{} resolved to {:#x}, applying {:?}", request.target, win.id(), request.intent);
        layout::apply(self.conn, win, &request.intent, time)
            .context(format!("Failed to apply {:?} to {:#x}", request.intent, win.id()))?;
        self.conn.flush();
        Ok(Outcome::Applied)
    }

    /// Run one request, reporting only whether it succeeded.
    ///
    /// Failures of any kind are logged here and never reach the caller as anything but `false`.
    pub fn dispatch(&self, request: &Request, time: Timestamp) -> bool {
        match self.execute(request, time) {
            Ok(Outcome::Applied) => true,
            Ok(Outcome::NotFound) => {
                info!("no window matches {}", request.target);
                false
            }
            Err(e) => {
                warn!("{:#}", e);
                false
            }
        }
    }

    /// The current window snapshot
    pub fn windows(&self) -> Result<Vec<WindowInfo>> {
        self.conn.list_windows()
    }

    /// The reply to a List command: the snapshot described, or `false` when it can't be read
    pub fn list(&self) -> String {
        match self.windows() {
            Ok(windows) => describe_windows(&windows),
            Err(e) => {
                warn!("{:#}", e);
                false.to_string()
            }
        }
    }
}

/// One line per window: description, type, class, instance, state flags and frame geometry
pub fn describe_windows(windows: &[WindowInfo]) -> String {
    windows
        .iter()
        .map(|w| {
            let mut flags = Vec::new();
            if w.is_minimized() {
                flags.push("minimized");
            }
            if w.is_maximized() {
                flags.push("maximized");
            }
            let flags = if flags.is_empty() { "-".to_string() } else { flags.join(",") };
            format!(
                "{} {} {} {} {} {}",
                w.description(),
                w.window_type().name(),
                or_dash(w.wm_class()),
                or_dash(w.wm_class_instance()),
                flags,
                w.geometry(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command::{parse, Command},
        mock::{normal_window, Call, MockXConn},
        window::WindowType,
        xconnection::Rectangle,
    };

    fn request(line: &str) -> Request {
        match parse(line).unwrap() {
            Command::Run(request) => request,
            other => panic!("not a window request: {:?}", other),
        }
    }

    #[test]
    fn tiling_a_maximized_firefox() {
        let firefox = WindowInfo::new(
            0x1c00003, "Firefox", "Navigator", WindowType::Normal, false, true, Rectangle::new(0, 0, 1920, 1080),
        );
        let conn = MockXConn::new(vec![firefox]);
        let tiler = Tiler::new(&conn);

        assert!(tiler.dispatch(&request("Tile firefox 0 0 800 600"), 1234));

        let region = Rectangle::new(0, 0, 800, 600);
        assert_eq!(conn.calls(), vec![
            Call::Unmaximize(0x1c00003),
            Call::MoveResize(0x1c00003, region),
            Call::Activate(0x1c00003, 1234),
        ]);
        let after = conn.window(0x1c00003);
        assert!(!after.is_maximized());
        assert_eq!(after.geometry(), region);
    }

    #[test]
    fn maximizing_a_missing_xid_changes_nothing() {
        let conn = MockXConn::new(vec![normal_window(0x63, "Emacs"), normal_window(0x65, "Gimp")]);
        let before = conn.windows();
        let tiler = Tiler::new(&conn);

        assert_eq!(tiler.execute(&request("MaximizeXid 100"), 0).unwrap(), Outcome::NotFound);
        assert!(!tiler.dispatch(&request("MaximizeXid 100"), 0));
        assert!(conn.calls().is_empty());
        assert_eq!(conn.windows(), before);
    }

    #[test]
    fn minimize_by_class_never_activates() {
        let conn = MockXConn::new(vec![normal_window(0x10, "Emacs")]);
        let tiler = Tiler::new(&conn);

        assert!(tiler.dispatch(&request("Minimize emacs"), 5));
        assert_eq!(conn.calls(), vec![Call::Minimize(0x10)]);
        assert!(conn.window(0x10).is_minimized());
    }

    #[test]
    fn maximize_by_xid_reaches_any_window_type() {
        let dialog = WindowInfo::new(0x64, "Gimp", "gimp", WindowType::Dialog, true, false, Rectangle::new(1, 1, 2, 2));
        let conn = MockXConn::new(vec![dialog]);
        let tiler = Tiler::new(&conn);

        assert!(tiler.dispatch(&request("MaximizeXid 100"), 9));
        assert_eq!(conn.calls(), vec![Call::Unminimize(0x64), Call::Maximize(0x64), Call::Activate(0x64, 9)]);
        // a dialog is still out of reach by class
        assert!(!tiler.dispatch(&request("Maximize gimp"), 9));
    }

    #[test]
    fn every_request_reads_a_fresh_snapshot() {
        let conn = MockXConn::new(vec![normal_window(0x10, "Emacs")]);
        let tiler = Tiler::new(&conn);
        tiler.dispatch(&request("Maximize emacs"), 0);
        tiler.dispatch(&request("Maximize emacs"), 0);
        tiler.dispatch(&request("Maximize vim"), 0);
        assert_eq!(conn.list_count(), 3);
    }

    #[test]
    fn window_manager_failures_become_false_and_do_not_stick() {
        let conn = MockXConn::new(vec![normal_window(0x10, "Emacs")]);
        let tiler = Tiler::new(&conn);
        conn.break_windows();

        assert!(tiler.execute(&request("Maximize emacs"), 0).is_err());
        assert!(!tiler.dispatch(&request("Maximize emacs"), 0));
        // resolution still works for the next request
        assert_eq!(tiler.execute(&request("Maximize vim"), 0).unwrap(), Outcome::NotFound);
    }

    #[test]
    fn empty_snapshot_is_always_false() {
        let conn = MockXConn::new(Vec::new());
        let tiler = Tiler::new(&conn);
        for line in &["Tile a 0 0 1 1", "Maximize a", "Minimize a", "TileXid 1 0 0 1 1", "MaximizeXid 1", "MinimizeXid 1"] {
            assert!(!tiler.dispatch(&request(line), 0));
        }
        assert!(conn.calls().is_empty());
    }

    #[test]
    fn unreadable_window_list_replies_false() {
        let conn = MockXConn::new(vec![normal_window(0x10, "Emacs")]);
        let tiler = Tiler::new(&conn);
        assert_eq!(tiler.list(), "0x10 normal Emacs emacs - 640x480+100+100");

        conn.break_listing();
        assert_eq!(tiler.list(), "false");
    }

    #[test]
    fn window_listing() {
        let windows = vec![
            WindowInfo::new(0x64, "Firefox", "Navigator", WindowType::Normal, false, true, Rectangle::new(0, 0, 800, 600)),
            WindowInfo::new(0x65, "", "", WindowType::Dock, false, false, Rectangle::new(0, -30, 1920, 30)),
        ];
        assert_eq!(
            describe_windows(&windows),
            "0x64 normal Firefox Navigator maximized 800x600+0+0\n0x65 dock - - - 1920x30+0-30"
        );
    }
}
