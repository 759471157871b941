use std::path::PathBuf;

use crate::params::Param;
use crate::workspace::Tab;

/// One line of console input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set(Param, f64),
    Tab(Tab),
    Upload(PathBuf),
    Batch(usize),
    Cancel,
    Reset,
    Show,
    Signal,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  hr <bpm> | qrs <ms> | st <mV> | pr <ms>   set a parameter
  tab manual|batch                          switch tab
  upload <dir>                              simulate a folder run
  batch <n>                                 simulate a run of n items
  cancel                                    stop the running batch
  reset                                     restore defaults
  show                                      print the workspace snapshot
  signal                                    print the signal window
  help | quit";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".to_string());
    };
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments for '{}'", head));
    }

    let need = |what: &str| arg.ok_or_else(|| format!("'{}' needs {}", head, what));
    let no_arg = |cmd: Command| match arg {
        Some(extra) => Err(format!("'{}' takes no argument, got '{}'", head, extra)),
        None => Ok(cmd),
    };

    match head {
        "hr" | "qrs" | "st" | "pr" => {
            let param: Param = head.parse()?;
            let raw = need("a number")?;
            let value: f64 = raw
                .parse()
                .map_err(|_| format!("'{}' is not a number", raw))?;
            Ok(Command::Set(param, value))
        }
        "tab" => Ok(Command::Tab(need("manual or batch")?.parse()?)),
        "upload" => Ok(Command::Upload(PathBuf::from(need("a directory")?))),
        "batch" => {
            let raw = need("an item count")?;
            let n = raw
                .parse()
                .map_err(|_| format!("'{}' is not a count", raw))?;
            Ok(Command::Batch(n))
        }
        "cancel" => no_arg(Command::Cancel),
        "reset" => no_arg(Command::Reset),
        "show" => no_arg(Command::Show),
        "signal" => no_arg(Command::Signal),
        "help" | "?" => no_arg(Command::Help),
        "quit" | "exit" => no_arg(Command::Quit),
        other => Err(format!("unknown command '{}'", other)),
    }
}
