//! The text commands accepted over IPC.
//!
//! One command per message, whitespace separated, e.g. `Tile firefox 0 0 800 600`
//! or `MaximizeXid 0x3a00007`. Operation names are case-insensitive.

use anyhow::{Result, Context, anyhow};

use crate::{
    layout::Intent,
    target::Target,
    xconnection::Rectangle,
};

/// A window and what to do with it
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Request {
    pub target: Target,
    pub intent: Intent,
}

impl Request {
    pub fn new(target: Target, intent: Intent) -> Request {
        Request { target, intent }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    /// One of the six window operations, answered with `true` or `false`
    Run(Request),
    /// Describe the current window snapshot, one window per line
    List,
    /// Stop the service
    Quit,
}

/// Parse a command line received over IPC
pub fn parse(line: &str) -> Result<Command> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let (op, args) = args.split_first().context("Empty command")?;

    let command = match op.to_lowercase().as_str() {
        "tile" => {
            expect_args(op, args, 5)?;
            Command::Run(Request::new(class(args[0]), Intent::Tile(region(&args[1..])?)))
        }
        "maximize" => {
            expect_args(op, args, 1)?;
            Command::Run(Request::new(class(args[0]), Intent::Maximize))
        }
        "minimize" => {
            expect_args(op, args, 1)?;
            Command::Run(Request::new(class(args[0]), Intent::Minimize))
        }
        "tilexid" => {
            expect_args(op, args, 5)?;
            Command::Run(Request::new(xid(args[0])?, Intent::Tile(region(&args[1..])?)))
        }
        "maximizexid" => {
            expect_args(op, args, 1)?;
            Command::Run(Request::new(xid(args[0])?, Intent::Maximize))
        }
        "minimizexid" => {
            expect_args(op, args, 1)?;
            Command::Run(Request::new(xid(args[0])?, Intent::Minimize))
        }
        "list" => {
            expect_args(op, args, 0)?;
            Command::List
        }
        "quit" => {
            expect_args(op, args, 0)?;
            Command::Quit
        }
        _ => return Err(anyhow!("Invalid command {}", op)),
    };
    Ok(command)
}

fn expect_args(op: &str, args: &[&str], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(anyhow!("{} takes {} arguments, got {}", op, count, args.len()));
    }
    Ok(())
}

fn class(name: &str) -> Target {
    Target::ByClass(name.to_string())
}

/// Window ids are accepted in decimal or as `0x` prefixed hex, the way xprop and xwininfo print them
fn xid(arg: &str) -> Result<Target> {
    let id = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => arg.parse(),
    }
    .context(format!("Invalid window id {}", arg))?;
    Ok(Target::ById(id))
}

fn region(args: &[&str]) -> Result<Rectangle> {
    let x = args[0].parse().context(format!("Invalid x {}", args[0]))?;
    let y = args[1].parse().context(format!("Invalid y {}", args[1]))?;
    let w = args[2].parse().context(format!("Invalid width {}", args[2]))?;
    let h = args[3].parse().context(format!("Invalid height {}", args[3]))?;
    Ok(Rectangle::new(x, y, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(line: &str) -> Request {
        match parse(line).unwrap() {
            Command::Run(request) => request,
            other => panic!("expected a window request, got {:?}", other),
        }
    }

    #[test]
    fn class_operations() {
        assert_eq!(
            run("Tile firefox 0 0 800 600"),
            Request::new(Target::ByClass("firefox".into()), Intent::Tile(Rectangle::new(0, 0, 800, 600)))
        );
        assert_eq!(run("Maximize Emacs"), Request::new(Target::ByClass("Emacs".into()), Intent::Maximize));
        assert_eq!(run("Minimize Emacs"), Request::new(Target::ByClass("Emacs".into()), Intent::Minimize));
    }

    #[test]
    fn xid_operations() {
        assert_eq!(
            run("TileXid 100 -10 20 300 400"),
            Request::new(Target::ById(100), Intent::Tile(Rectangle::new(-10, 20, 300, 400)))
        );
        assert_eq!(run("MaximizeXid 0x3a00007"), Request::new(Target::ById(0x3a0_0007), Intent::Maximize));
        assert_eq!(run("MinimizeXid 0X64"), Request::new(Target::ById(100), Intent::Minimize));
    }

    #[test]
    fn operation_names_ignore_case() {
        assert_eq!(run("maximizexid 1"), run("MaximizeXid 1"));
        assert_eq!(run("TILE a 1 2 3 4"), run("Tile a 1 2 3 4"));
    }

    #[test]
    fn list_and_quit() {
        assert_eq!(parse("List").unwrap(), Command::List);
        assert_eq!(parse("quit").unwrap(), Command::Quit);
        assert!(parse("list now").is_err());
    }

    #[test]
    fn malformed_commands_are_errors() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("Close firefox").is_err());
        assert!(parse("Tile firefox 0 0 800").is_err());
        assert!(parse("Tile firefox 0 0 -800 600").is_err());
        assert!(parse("Maximize").is_err());
        assert!(parse("MaximizeXid firefox").is_err());
        assert!(parse("MaximizeXid 0xzz").is_err());
        assert!(parse("MinimizeXid 4294967296").is_err());
    }
}
