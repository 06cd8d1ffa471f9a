use std::thread::{self, JoinHandle};

use lurk_frame::FrameParser;
use lurk_transport::{LurkStream, TransportError};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::query::read_delivery;
use crate::state::SessionHandle;

/// Start the background receive loop on its own thread.
pub(crate) fn spawn(
    stream: LurkStream,
    handle: SessionHandle,
    max_receive: usize,
) -> Result<JoinHandle<Result<()>>> {
    thread::Builder::new()
        .name("lurk-recv".to_string())
        .spawn(move || receive_loop(stream, handle, max_receive))
        .map_err(SessionError::Spawn)
}

/// Receive server deliveries until the session finishes.
///
/// The finished flag is checked before and after every blocking receive.
/// Undecodable deliveries are logged, counted and dropped; transport failures
/// end the session.
fn receive_loop(mut stream: LurkStream, handle: SessionHandle, max_receive: usize) -> Result<()> {
    let mut parser = FrameParser::new();

    while !handle.is_finished() {
        let chunk = match stream.receive(max_receive) {
            Ok(chunk) => chunk,
            Err(err) => return stop_on_transport_error(&handle, err),
        };
        if handle.is_finished() {
            break;
        }

        match read_delivery(&mut stream, &mut parser, &chunk, max_receive) {
            Ok(outcome) => handle.with(|shared| {
                shared.stats.bytes_skipped += outcome.skipped as u64;
                for block in &outcome.blocks {
                    shared.messages.push_back(block.text().into_owned());
                }
                shared.stats.frames_received += outcome.blocks.len() as u64;
            }),
            Err(SessionError::Transport(err)) => return stop_on_transport_error(&handle, err),
            Err(err) => {
                warn!(error = %err, size = chunk.len(), "discarding undecodable server data");
                handle.with(|shared| shared.stats.frames_discarded += 1);
            }
        }
    }

    debug!("receive loop stopped");
    Ok(())
}

fn stop_on_transport_error(handle: &SessionHandle, err: TransportError) -> Result<()> {
    if handle.is_finished() || matches!(err, TransportError::Shutdown) {
        debug!(error = %err, "receive loop stopped by shutdown");
        return Ok(());
    }
    warn!(error = %err, "receive failed, ending session");
    handle.fail(err.to_string());
    Err(err.into())
}
