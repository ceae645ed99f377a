use std::io::{self, Write};

use qtun_tunnel::{StatusEvent, StatusSink};

/// Clears the current terminal line and returns the cursor to its start.
const CLEAR_LINE: &str = "\x1b[2K\r";

/// Renders every event on a single, continuously overwritten line of stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl StatusSink for ConsoleSink {
    fn emit(&self, event: StatusEvent) {
        let mut stdout = io::stdout().lock();
        // A closed stdout must not stop the tunnel.
        let _ = write!(stdout, "{CLEAR_LINE}{event}").and_then(|()| stdout.flush());
    }
}
