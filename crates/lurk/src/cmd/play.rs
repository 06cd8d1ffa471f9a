use std::io::BufRead;
use std::thread;

use lurk_session::SessionHandle;

use crate::cmd::{parse_duration, PlayArgs};
use crate::exit::{io_error, session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_summary, OutputFormat, TerminalSink};

/// Submitted when stdin closes so queued lines still reach the server.
const EOF_COMMAND: &str = "logout";

pub fn run(args: PlayArgs, format: OutputFormat) -> CliResult<i32> {
    let poll_interval = parse_duration(&args.poll_interval)?;
    let mut session = args.server.connect()?;
    let peer = session.peer().to_string();
    session
        .setup()
        .map_err(|err| session_error("setup failed", err))?;

    let handle = session.handle();
    install_ctrlc_handler(handle.clone())?;
    spawn_stdin_reader(handle.clone())?;

    let runner = thread::Builder::new()
        .name("lurk-session".to_string())
        .spawn(move || session.run())
        .map_err(|err| io_error("failed starting session", err))?;

    let mut sink = TerminalSink::new(format);
    while !runner.is_finished() {
        handle.pump_output(&mut sink);
        thread::sleep(poll_interval);
    }

    let result = runner
        .join()
        .map_err(|_| CliError::new(INTERNAL, "session thread panicked"))?;
    handle.pump_output(&mut sink);
    print_summary(&peer, handle.stats(), format);

    result.map_err(|err| session_error("session ended", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(handle: SessionHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        handle.request_end();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Forward stdin lines to the session until it finishes or stdin closes.
///
/// The thread is detached. It may stay blocked on stdin after the session
/// ends and is torn down with the process.
fn spawn_stdin_reader(handle: SessionHandle) -> CliResult<()> {
    thread::Builder::new()
        .name("lurk-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if handle.is_finished() {
                    return;
                }
                match line {
                    Ok(line) => handle.submit_input(line),
                    Err(err) => {
                        tracing::warn!(error = %err, "stdin read failed");
                        break;
                    }
                }
            }
            if !handle.is_finished() {
                tracing::debug!("stdin closed, logging out");
                handle.submit_input(EOF_COMMAND);
            }
        })
        .map(|_| ())
        .map_err(|err| io_error("failed starting stdin reader", err))
}
