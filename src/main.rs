//! Console stand-in for the demo panel.
//!
//! Reads one command per line on stdin and prints workspace snapshots as
//! JSON on stdout. Structured logs go to stderr and `LOG_DIR`.

use anyhow::Result;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use cardia::batch::BatchEvent;
use cardia::config::Config;
use cardia::console::{parse_command, Command, HELP};
use cardia::logging::{log, obj, run_id, v_str, Domain, Level};
use cardia::session::Session;
use cardia::source::{FixedCount, FolderSource};

fn print_snapshot(session: &Session) -> Result<()> {
    println!("{}", serde_json::to_string(&session.snapshot())?);
    Ok(())
}

/// Returns false when the session should end.
async fn handle(session: &mut Session, cmd: Command) -> Result<bool> {
    match cmd {
        Command::Set(param, value) => {
            if session.set_param(param, value) {
                print_snapshot(session)?;
            }
        }
        Command::Tab(tab) => {
            session.select_tab(tab);
            print_snapshot(session)?;
        }
        Command::Upload(dir) => {
            let source = FolderSource::new(dir);
            match session.upload(&source).await {
                Ok(true) => {}
                Ok(false) => eprintln!("nothing to process"),
                Err(e) => eprintln!("upload failed: {:#}", e),
            }
        }
        Command::Batch(n) => {
            if !session.upload(&FixedCount(n)).await? {
                eprintln!("nothing to process");
            }
        }
        Command::Cancel => {
            session.cancel();
        }
        Command::Reset => {
            session.reset().await;
            print_snapshot(session)?;
        }
        Command::Show => print_snapshot(session)?,
        Command::Signal => {
            println!("{}", json!({ "signal": session.signal() }));
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("run_id", v_str(&run_id())),
            ("tick_ms", json!(cfg.tick_ms)),
            ("signal_window", json!(cfg.signal_window)),
            ("seed", json!(cfg.seed)),
        ]),
    );

    let mut session = Session::new(cfg);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_snapshot(&session)?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(cmd) => {
                        if !handle(&mut session, cmd).await? {
                            break;
                        }
                    }
                    Err(msg) => eprintln!("{} (try 'help')", msg),
                }
            }
            Some(event) = session.pump(), if session.batch_running() => {
                let settled = matches!(
                    event,
                    BatchEvent::Started { .. }
                        | BatchEvent::Ingested
                        | BatchEvent::Finished
                        | BatchEvent::Cancelled { .. }
                );
                if settled {
                    print_snapshot(&session)?;
                } else if let BatchEvent::Scanning { current } = event {
                    if let Some(p) = session.workspace().progress() {
                        eprintln!("batch progress {}/{}", current, p.total);
                    }
                }
            }
        }
    }

    session.shutdown().await
}
