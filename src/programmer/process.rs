use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};

/// How long output may keep arriving after the process itself is gone
///
/// A background process started by the programmer can hold on to its pipes for much longer.
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// One of the output streams of a process
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub(crate) fn index(self) -> usize {
        match self {
            Stream::Stdout => 0,
            Stream::Stderr => 1,
        }
    }
}

/// How a process that ran ended
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExitOutcome {
    /// The process exited on its own with the given code
    Exited(i32),
    /// The process was terminated, e.g. by a signal
    Crashed { signal: Option<i32> },
}

impl ExitOutcome {
    pub fn success(self) -> bool {
        self == ExitOutcome::Exited(0)
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> ExitOutcome {
        match status.code() {
            Some(code) => ExitOutcome::Exited(code),
            None => ExitOutcome::Crashed {
                signal: exit_signal(&status),
            },
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;

    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exit={}, status=Normal", code),
            ExitOutcome::Crashed { signal: Some(signal) } => {
                write!(f, "signal={}, status=Crashed", signal)
            }
            ExitOutcome::Crashed { signal: None } => write!(f, "status=Crashed"),
        }
    }
}

/// Something that happened to a running process
#[derive(Debug)]
pub enum ProcessEvent {
    /// A chunk of output was read
    Output { stream: Stream, data: String },
    /// The process ended, after all of its output has been reported
    Exited(ExitOutcome),
    /// The process could not be monitored any further
    Failed(io::Error),
}

/// What the orchestrator's event loop reacts to
#[derive(Debug)]
pub(crate) enum Signal {
    Process(ProcessEvent),
    Watchdog,
}

pub(crate) type SignalSender = mpsc::UnboundedSender<(u64, Signal)>;

/// Reports the events of a single launched process back to the orchestrator
#[derive(Debug, Clone)]
pub struct EventSink {
    run: u64,
    signals: SignalSender,
}

impl EventSink {
    pub(crate) fn new(run: u64, signals: SignalSender) -> EventSink {
        EventSink { run, signals }
    }

    /// Sends `event`, returning `false` if the orchestrator is gone
    pub fn send(&self, event: ProcessEvent) -> bool {
        self.signals
            .send((self.run, Signal::Process(event)))
            .is_ok()
    }
}

/// Asks a launched process to terminate
#[derive(Debug)]
pub struct KillSwitch {
    sender: Option<oneshot::Sender<()>>,
}

impl KillSwitch {
    /// Creates a kill switch and the receiver the process supervisor should listen on
    pub fn new() -> (KillSwitch, oneshot::Receiver<()>) {
        let (sender, receiver) = oneshot::channel();

        (
            KillSwitch {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Requests termination, only the first call has an effect
    pub fn kill(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(());
        }
    }
}

/// Everything needed to start the programmer
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LaunchRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Variables to set on top of the inherited environment
    pub env: Vec<(OsString, OsString)>,
}

/// Starts external processes on behalf of the orchestrator
///
/// A launched process must report its output and, finally, exactly one `Exited` or `Failed`
/// event through `events`. When the returned `KillSwitch` fires the process must be terminated
/// and its exit reported as usual.
pub trait Launcher {
    fn launch(&mut self, request: LaunchRequest, events: EventSink) -> io::Result<KillSwitch>;
}

/// Runs processes with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl Launcher for TokioLauncher {
    fn launch(&mut self, request: LaunchRequest, events: EventSink) -> io::Result<KillSwitch> {
        let mut command = tokio::process::Command::new(&request.program);

        command
            .args(&request.args)
            .envs(request.env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn()?;

        debug!("Started {:?} with pid {:?}", request.program, child.id());

        let (kill_switch, kill) = KillSwitch::new();

        tokio::spawn(supervise(child, kill, events));

        Ok(kill_switch)
    }
}

/// Forwards the output of `child` and reports its exit, killing it if asked to
async fn supervise(mut child: Child, mut kill: oneshot::Receiver<()>, events: EventSink) {
    let mut pumps = Vec::with_capacity(2);

    if let Some(stdout) = child.stdout.take() {
        pumps.push(tokio::spawn(pump(stdout, Stream::Stdout, events.clone())));
    }

    if let Some(stderr) = child.stderr.take() {
        pumps.push(tokio::spawn(pump(stderr, Stream::Stderr, events.clone())));
    }

    let exited = tokio::select! {
        status = child.wait() => Some(status),
        Ok(()) = &mut kill => None,
    };

    let status = match exited {
        Some(status) => status,
        None => {
            debug!("Killing process {:?}", child.id());

            match child.kill().await {
                Ok(()) => child.wait().await,
                Err(err) => Err(err),
            }
        }
    };

    // Report the remaining output before the exit, unless something else still holds the pipes
    let drained = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, async {
        for task in pumps.iter_mut() {
            let _ = task.await;
        }
    })
    .await;

    if drained.is_err() {
        warn!("Output pipes still open after the process ended, no longer reading them");

        for task in &pumps {
            task.abort();
        }
    }

    match status {
        Ok(status) => {
            trace!("Process exited with {}", status);
            events.send(ProcessEvent::Exited(status.into()));
        }
        Err(err) => {
            events.send(ProcessEvent::Failed(err));
        }
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, stream: Stream, events: EventSink) {
    let mut buf = [0u8; 4096];
    let mut pending = Vec::new();

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);

                let data = take_utf8(&mut pending);

                if data.is_empty() {
                    continue;
                }

                if !events.send(ProcessEvent::Output { stream, data }) {
                    return;
                }
            }
            Err(err) => {
                warn!("Could not read process {:?}: {}", stream, err);
                break;
            }
        }
    }

    if !pending.is_empty() {
        let data = String::from_utf8_lossy(&pending).into_owned();
        events.send(ProcessEvent::Output { stream, data });
    }
}

/// Decodes as much of `pending` as possible, leaving an incomplete trailing character behind
///
/// Invalid sequences are replaced with U+FFFD.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();

    loop {
        match std::str::from_utf8(pending) {
            Ok(valid) => {
                text.push_str(valid);
                pending.clear();

                return text;
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();

                match err.error_len() {
                    None => {
                        text.push_str(&String::from_utf8_lossy(&pending[..valid_up_to]));
                        pending.drain(..valid_up_to);

                        return text;
                    }
                    Some(len) => {
                        let end = valid_up_to + len;

                        text.push_str(&String::from_utf8_lossy(&pending[..end]));
                        pending.drain(..end);
                    }
                }
            }
        }
    }
}
