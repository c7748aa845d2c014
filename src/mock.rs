//! In-memory XConn for tests: records every call and applies it to its windows.

use std::cell::{Cell, RefCell};

use anyhow::{Result, anyhow};

use crate::{
    window::{WindowInfo, WindowId, WindowType, Timestamp},
    xconnection::{XConn, Rectangle},
};

pub const SCREEN: Rectangle = Rectangle::new(0, 0, 1920, 1080);

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Call {
    Unminimize(WindowId),
    Unmaximize(WindowId),
    Maximize(WindowId),
    Minimize(WindowId),
    MoveResize(WindowId, Rectangle),
    Activate(WindowId, Timestamp),
}

pub struct MockXConn {
    windows: RefCell<Vec<WindowInfo>>,
    calls: RefCell<Vec<Call>>,
    lists: Cell<usize>,
    broken: Cell<bool>,
    unlistable: Cell<bool>,
}

impl MockXConn {
    pub fn new(windows: Vec<WindowInfo>) -> MockXConn {
        MockXConn {
            windows: RefCell::new(windows),
            calls: RefCell::new(Vec::new()),
            lists: Cell::new(0),
            broken: Cell::new(false),
            unlistable: Cell::new(false),
        }
    }

    /// Make every following mutation fail, as if the window died under us
    pub fn break_windows(&self) {
        self.broken.set(true);
    }

    /// Make every following list_windows fail, as if no window manager were running
    pub fn break_listing(&self) {
        self.unlistable.set(true);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn list_count(&self) -> usize {
        self.lists.get()
    }

    pub fn window(&self, id: WindowId) -> WindowInfo {
        self.windows
            .borrow()
            .iter()
            .find(|w| w.id() == id)
            .cloned()
            .expect("no such mock window")
    }

    pub fn windows(&self) -> Vec<WindowInfo> {
        self.windows.borrow().clone()
    }

    fn record(&self, call: Call) -> Result<()> {
        if self.broken.get() {
            return Err(anyhow!("mock window is gone: {:?}", call));
        }
        self.calls.borrow_mut().push(call);
        Ok(())
    }

    fn update(&self, id: WindowId, f: impl FnOnce(&mut bool, &mut bool, &mut Rectangle)) {
        let mut windows = self.windows.borrow_mut();
        if let Some(w) = windows.iter_mut().find(|w| w.id() == id) {
            let mut minimized = w.is_minimized();
            let mut maximized = w.is_maximized();
            let mut geometry = w.geometry();
            f(&mut minimized, &mut maximized, &mut geometry);
            *w = WindowInfo::new(
                w.id(),
                w.wm_class(),
                w.wm_class_instance(),
                w.window_type(),
                minimized,
                maximized,
                geometry,
            );
        }
    }
}

impl XConn for MockXConn {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        self.lists.set(self.lists.get() + 1);
        if self.unlistable.get() {
            return Err(anyhow!("no client list on the mock root window"));
        }
        Ok(self.windows())
    }

    fn unminimize(&self, win: WindowId) -> Result<()> {
        self.record(Call::Unminimize(win))?;
        self.update(win, |min, _, _| *min = false);
        Ok(())
    }

    fn unmaximize(&self, win: WindowId) -> Result<()> {
        self.record(Call::Unmaximize(win))?;
        self.update(win, |_, max, _| *max = false);
        Ok(())
    }

    fn maximize(&self, win: WindowId) -> Result<()> {
        self.record(Call::Maximize(win))?;
        self.update(win, |_, max, geometry| {
            *max = true;
            *geometry = SCREEN;
        });
        Ok(())
    }

    fn minimize(&self, win: WindowId) -> Result<()> {
        self.record(Call::Minimize(win))?;
        self.update(win, |min, _, _| *min = true);
        Ok(())
    }

    fn move_resize_frame(&self, win: WindowId, region: Rectangle) -> Result<()> {
        self.record(Call::MoveResize(win, region))?;
        self.update(win, |_, _, geometry| *geometry = region);
        Ok(())
    }

    fn activate(&self, win: WindowId, time: Timestamp) -> Result<()> {
        self.record(Call::Activate(win, time))
    }

    fn flush(&self) -> bool {
        true
    }
}

pub fn normal_window(id: WindowId, class: &str) -> WindowInfo {
    WindowInfo::new(id, class, class.to_lowercase(), WindowType::Normal, false, false, Rectangle::new(100, 100, 640, 480))
}
