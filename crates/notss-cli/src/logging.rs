//! Log destinations: stderr, the local syslog socket, or nowhere.
//!
//! The subscriber is returned as a [`Dispatch`] so `main` can scope it to
//! the handler run with `tracing::dispatcher::with_default` instead of
//! installing a process-wide global.

use std::io::{self, IsTerminal, Write};
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::sync::Arc;
use tracing::{Dispatch, Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::cli::LogDestination;

const SYSLOG_SOCKET: &str = "/dev/log";
const PROGRAM: &str = "notss-eh";
/// syslog facility "user".
const FACILITY_USER: u8 = 1;

pub fn dispatch(destination: LogDestination, verbose: bool) -> Dispatch {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match destination {
        LogDestination::None => Dispatch::none(),
        LogDestination::Stream => Dispatch::new(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(io::stderr().is_terminal())
                .with_writer(io::stderr)
                .finish(),
        ),
        LogDestination::Syslog => match SyslogWriter::connect(Path::new(SYSLOG_SOCKET)) {
            Ok(writer) => Dispatch::new(
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .with_ansi(false)
                    .without_time()
                    .with_writer(writer)
                    .finish(),
            ),
            Err(e) => {
                eprintln!("{PROGRAM}: syslog unavailable ({e}), logging to stderr");
                dispatch(LogDestination::Stream, verbose)
            }
        },
    }
}

/// Sends each formatted event as one RFC 3164 datagram.
#[derive(Clone)]
pub struct SyslogWriter {
    socket: Arc<UnixDatagram>,
}

impl SyslogWriter {
    pub fn connect(path: &Path) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(path)?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }
}

fn severity(level: &Level) -> u8 {
    match *level {
        Level::ERROR => 3,
        Level::WARN => 4,
        Level::INFO => 6,
        _ => 7,
    }
}

pub struct SyslogLine {
    socket: Arc<UnixDatagram>,
    priority: u8,
    buf: Vec<u8>,
}

impl SyslogLine {
    fn frame(&self) -> Vec<u8> {
        let message = String::from_utf8_lossy(&self.buf);
        format!("<{}>{PROGRAM}: {}", self.priority, message.trim_end()).into_bytes()
    }
}

impl Write for SyslogLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        // Nothing sensible to do if the syslog daemon went away mid-run.
        let _ = self.socket.send(&self.frame());
    }
}

impl<'a> MakeWriter<'a> for SyslogWriter {
    type Writer = SyslogLine;

    fn make_writer(&'a self) -> Self::Writer {
        self.line(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.line(*meta.level())
    }
}

impl SyslogWriter {
    fn line(&self, level: Level) -> SyslogLine {
        SyslogLine {
            socket: Arc::clone(&self.socket),
            priority: FACILITY_USER * 8 + severity(&level),
            buf: Vec::new(),
        }
    }
}
