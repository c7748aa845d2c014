use anyhow::Result;

use crate::{
    window::{WindowInfo, Timestamp},
    xconnection::{XConn, Rectangle},
};

/// What a request wants done to its window
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Intent {
    /// Place the window frame on a rectangle of the root window
    Tile(Rectangle),
    Maximize,
    Minimize,
}

/// A single window manager request made while applying an intent
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Step {
    Unminimize,
    Unmaximize,
    MoveResize(Rectangle),
    Maximize,
    Minimize,
    Activate,
}

/**
 * The requests that take `win`, in whatever state it is in now, to the state `intent` asks for.
 *
 * Order matters: a window that is minimized and maximized at once is restored before it
 * is unmaximized, and unmaximized before it is moved, so no geometry is ever applied to a
 * hidden or maximized window. Activation comes last so focus follows the final geometry.
 * A minimized window is never activated.
 */
pub fn plan(win: &WindowInfo, intent: &Intent) -> Vec<Step> {
    let mut steps = Vec::new();
    match *intent {
        Intent::Tile(region) => {
            if win.is_minimized() {
                steps.push(Step::Unminimize);
            }
            if win.is_maximized() {
                steps.push(Step::Unmaximize);
            }
            steps.push(Step::MoveResize(region));
            steps.push(Step::Activate);
        }
        Intent::Maximize => {
            if win.is_minimized() {
                steps.push(Step::Unminimize);
            }
            steps.push(Step::Maximize);
            steps.push(Step::Activate);
        }
        Intent::Minimize => steps.push(Step::Minimize),
    }
    steps
}

/// Bring `win` into the state `intent` asks for.
///
/// Stops at the first request the window manager refuses.
pub fn apply<X: XConn>(conn: &X, win: &WindowInfo, intent: &Intent, time: Timestamp) -> Result<()> {
    let id = win.id();
    for step in plan(win, intent) {
        debug!("{:#x}: {:?}", id, step);
        match step {
            Step::Unminimize => conn.unminimize(id)?,
            Step::Unmaximize => conn.unmaximize(id)?,
            Step::MoveResize(region) => conn.move_resize_frame(id, region)?,
            Step::Maximize => conn.maximize(id)?,
            Step::Minimize => conn.minimize(id)?,
            Step::Activate => conn.activate(id, time)?,
        }
    }
    Ok(())
}
