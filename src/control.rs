//! Remote control via Unix socket
//!
//! Accepts one command per line:
//!
//! ```text
//! gravity <gx> <gy>
//! restore <0..1>
//! shake <impulse>
//! accel <ax> <ay>
//! state <idle|listening|thinking|showing-result>
//! result <text>
//! quit
//! ```
//!
//! Forcing commands are written straight into the shared forcing record from
//! the client thread. State changes are queued for the frame loop.

use std::io::{BufRead, BufReader, ErrorKind};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::forcing::SharedForcing;
use crate::state::{clean_result_text, DisplayState};

/// A parsed remote request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Gravity(f32, f32),
    Restore(f32),
    Shake(f32),
    Accel(f32, f32),
    State(DisplayState),
    Result(String),
    Quit,
}

/// Work for the frame loop
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetState(DisplayState),
    ShowResult(String),
    Quit,
}

impl Request {
    /// Apply forcing requests to `forcing`; everything else becomes a
    /// command for the frame loop
    pub fn apply(self, forcing: &SharedForcing) -> Option<Command> {
        match self {
            Request::Gravity(gx, gy) => forcing.set_gravity(gx, gy),
            Request::Restore(r) => forcing.set_restore_strength(r),
            Request::Shake(delta) => forcing.add_shake_impulse(delta),
            Request::Accel(ax, ay) => forcing.apply_accelerometer(ax, ay),
            Request::State(state) => return Some(Command::SetState(state)),
            Request::Result(text) => return Some(Command::ShowResult(clean_result_text(&text))),
            Request::Quit => return Some(Command::Quit),
        }
        None
    }
}

fn parse_f32(word: Option<&str>, line: &str) -> Result<f32> {
    word.and_then(|w| w.parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::Command(line.to_string()))
}

/// Parse one command line
pub fn parse_request(line: &str) -> Result<Request> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    let request = match verb.to_lowercase().as_str() {
        "gravity" | "g" => {
            Request::Gravity(parse_f32(args.next(), line)?, parse_f32(args.next(), line)?)
        }
        "restore" => Request::Restore(parse_f32(args.next(), line)?),
        "shake" => Request::Shake(parse_f32(args.next(), line)?),
        "accel" => Request::Accel(parse_f32(args.next(), line)?, parse_f32(args.next(), line)?),
        "state" => Request::State(rest.parse()?),
        "result" => Request::Result(rest.to_string()),
        "q" | "quit" | "exit" => Request::Quit,
        _ => return Err(Error::Command(line.to_string())),
    };
    Ok(request)
}

/// Controller that listens for commands on a Unix socket
pub struct Controller {
    receiver: Receiver<Command>,
    socket_path: PathBuf,
    _listener_thread: thread::JoinHandle<()>,
}

impl Controller {
    /// Listen on `socket_path`, writing forcing requests into `forcing`
    pub fn new(socket_path: impl AsRef<Path>, forcing: SharedForcing) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        // Stale socket from a previous run
        let _ = std::fs::remove_file(&socket_path);

        let listener = UnixListener::bind(&socket_path).map_err(|e| {
            Error::Socket(format!("failed to bind {}: {}", socket_path.display(), e))
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::Socket(format!("failed to set non-blocking: {}", e)))?;

        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || {
            Self::listener_loop(listener, sender, forcing);
        });

        log::info!("Control: listening on {}", socket_path.display());
        Ok(Self {
            receiver,
            socket_path,
            _listener_thread: handle,
        })
    }

    fn listener_loop(listener: UnixListener, sender: Sender<Command>, forcing: SharedForcing) {
        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    let sender = sender.clone();
                    let forcing = forcing.clone();
                    thread::spawn(move || {
                        Self::handle_client(stream, sender, forcing);
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    log::warn!("Control: listener stopped: {}", e);
                    break;
                }
            }
        }
    }

    fn handle_client(stream: UnixStream, sender: Sender<Command>, forcing: SharedForcing) {
        log::debug!("Control: client connected");
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(std::result::Result::ok) {
            if line.trim().is_empty() {
                continue;
            }
            match parse_request(&line) {
                Ok(request) => {
                    if let Some(cmd) = request.apply(&forcing) {
                        if sender.send(cmd).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => log::warn!("Control: {}", e),
            }
        }
    }

    /// Get any pending commands (non-blocking)
    pub fn poll(&self) -> Vec<Command> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
