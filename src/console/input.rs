use std::{io::BufRead, thread};

use tokio::sync::mpsc;
use tracing::warn;

/// Lines read ahead of the prompt before the reader thread blocks.
const READ_AHEAD: usize = 1;

/// Read `input` line by line on a dedicated OS thread.
///
/// The channel closes at end of input or on a read error. The thread is
/// detached, so a read that never returns (an idle terminal) does not hold
/// up runtime shutdown or process exit.
pub fn spawn_line_reader<R>(mut input: R) -> std::io::Result<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(READ_AHEAD);
    thread::Builder::new()
        .name("console-input".into())
        .spawn(move || loop {
            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    // Receiver gone: the console has exited.
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read console input");
                    break;
                }
            }
        })?;
    Ok(rx)
}
