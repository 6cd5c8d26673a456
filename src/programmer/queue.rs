use std::collections::VecDeque;
use std::io;
use std::mem;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::command::Command;
use super::process::{
    EventSink, ExitOutcome, KillSwitch, Launcher, ProcessEvent, Signal, SignalSender, Stream,
    TokioLauncher,
};
use super::progress::{Output, ProgressTracker};
use super::Programmer;
use crate::Error;

/// What the orchestrator reports to the presentation layer
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum QueueEvent {
    /// A command was started, with its command line if it should be echoed
    Started {
        label: String,
        command_line: Option<String>,
    },
    /// A line of process output
    Line(String),
    /// Output of a passthrough command, exactly as it was read
    Output(String),
    /// The progress of the running command changed
    Progress(u8),
    /// A command exited successfully
    Succeeded { label: String },
    /// A command failed and the rest of the queue was dropped
    Failed {
        label: String,
        status: ExitOutcome,
        discarded: usize,
    },
    /// A command could not be started, the queue carries on with the next one
    StartFailed { label: String, error: String },
    /// A running command could not be monitored, the queue carries on with the next one
    ProcessError { label: String, error: String },
    /// A command ran out of time, was killed, and the rest of the queue was dropped
    TimedOut {
        label: String,
        timeout: Duration,
        discarded: usize,
    },
}

/// The command that is currently being run
#[derive(Debug)]
struct ActiveRun {
    id: u64,
    label: String,
    timeout: Option<Duration>,
    passthrough: bool,
    kill_switch: KillSwitch,
}

#[derive(Debug)]
enum State {
    Idle,
    Running(ActiveRun),
    /// The watchdog killed the given run and its exit has not been seen yet
    Terminating(u64),
}

/// Runs programmer commands one at a time, in the order they were queued
///
/// A command that exits with a failure (or is killed by its watchdog) drops every command
/// queued after it, so that e.g. a failed erase is never followed by a write. A command that
/// cannot be started at all is skipped and the queue carries on.
///
/// All state is owned by the orchestrator and only changed from `&mut self`, while process
/// output, exits and watchdog timeouts arrive on an internal channel that is drained by
/// [`step`](Orchestrator::step). Launching requires a running tokio runtime.
pub struct Orchestrator<L = TokioLauncher> {
    launcher: L,
    programmer: Programmer,
    queue: VecDeque<Command>,
    state: State,
    progress: ProgressTracker,
    watchdog: Option<JoinHandle<()>>,
    signals_tx: SignalSender,
    signals_rx: mpsc::UnboundedReceiver<(u64, Signal)>,
    events: mpsc::UnboundedSender<QueueEvent>,
    next_run: u64,
    failure: Option<Error>,
}

impl<L: Launcher> Orchestrator<L> {
    /// Creates an idle orchestrator and the receiving end of its event channel
    pub fn new(
        launcher: L,
        programmer: Programmer,
    ) -> (Orchestrator<L>, mpsc::UnboundedReceiver<QueueEvent>) {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let orchestrator = Orchestrator {
            launcher,
            programmer,
            queue: VecDeque::new(),
            state: State::Idle,
            progress: ProgressTracker::new(),
            watchdog: None,
            signals_tx,
            signals_rx,
            events,
            next_run: 0,
            failure: None,
        };

        (orchestrator, events_rx)
    }

    pub fn programmer(&self) -> &Programmer {
        &self.programmer
    }

    /// Appends `command` to the queue, starting it right away if nothing is running
    pub fn enqueue(&mut self, command: Command) {
        debug!(
            "Queueing {} ({} already queued)",
            command.label(),
            self.queue.len()
        );

        self.queue.push_back(command);

        if !self.is_running() {
            self.run_next();
        }
    }

    /// Whether a process is active
    pub fn is_running(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    /// The number of commands waiting to be started
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The progress of the running command
    pub fn progress(&self) -> u8 {
        self.progress.percent()
    }

    /// Starts the command at the head of the queue, unless one is already running
    pub fn run_next(&mut self) {
        while !self.is_running() {
            let command = match self.queue.pop_front() {
                Some(command) => command,
                None => return,
            };

            self.next_run += 1;

            let run = self.next_run;
            let label = command.label().to_string();

            self.reset_progress();

            let command_line = if command.should_log() {
                let line = self.programmer.command_line(&command);
                info!("$ {}", line);
                Some(line)
            } else {
                None
            };

            let request = self.programmer.launch_request(&command);
            let events = EventSink::new(run, self.signals_tx.clone());

            match self.launcher.launch(request, events) {
                Ok(kill_switch) => {
                    debug!("Process started for {} (run {})", label, run);

                    let timeout = command.timeout_duration();

                    self.start_watchdog(run, timeout);
                    self.state = State::Running(ActiveRun {
                        id: run,
                        label: label.clone(),
                        timeout,
                        passthrough: command.is_passthrough(),
                        kill_switch,
                    });
                    self.emit(QueueEvent::Started {
                        label,
                        command_line,
                    });
                }
                Err(err) => {
                    error!("Could not start {}: {}", label, err);

                    self.emit(QueueEvent::StartFailed {
                        label: label.clone(),
                        error: err.to_string(),
                    });
                    self.record_failure(Error::ProcessStart { label, source: err });
                }
            }
        }
    }

    /// Waits for the next process event and handles it
    ///
    /// Returns `false` without waiting when nothing is running and the queue is empty.
    pub async fn step(&mut self) -> bool {
        if !self.is_running() {
            self.run_next();

            if !self.is_running() {
                return false;
            }
        }

        match self.signals_rx.recv().await {
            Some((run, signal)) => {
                self.handle(run, signal);
                true
            }
            None => false,
        }
    }

    /// Runs queued commands until the queue is empty and no process is active
    ///
    /// Returns the first failure recorded since the previous call.
    pub async fn run_until_idle(&mut self) -> Result<(), Error> {
        while self.step().await {}

        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn handle(&mut self, run: u64, signal: Signal) {
        let (current, passthrough, terminating) = match &self.state {
            State::Running(active) => (active.id, active.passthrough, false),
            State::Terminating(id) => (*id, false, true),
            State::Idle => {
                trace!("Ignoring {:?} from finished run {}", signal, run);
                return;
            }
        };

        if run != current {
            trace!("Ignoring {:?} from stale run {}", signal, run);
            return;
        }

        match signal {
            Signal::Process(ProcessEvent::Output { .. }) if terminating => {
                trace!("Dropping output of killed run {}", run);
            }
            Signal::Process(ProcessEvent::Output { data, .. }) if passthrough => {
                self.emit(QueueEvent::Output(data));
            }
            Signal::Process(ProcessEvent::Output { stream, data }) => {
                let outputs = self.progress.feed(stream, &data);
                self.publish(outputs);
            }
            Signal::Process(ProcessEvent::Exited(outcome)) => self.on_exit(outcome),
            Signal::Process(ProcessEvent::Failed(err)) => self.on_process_error(err),
            Signal::Watchdog => self.on_watchdog(),
        }
    }

    fn on_exit(&mut self, outcome: ExitOutcome) {
        for stream in &[Stream::Stdout, Stream::Stderr] {
            let outputs = self.progress.flush(*stream);
            self.publish(outputs);
        }

        self.stop_watchdog();

        match mem::replace(&mut self.state, State::Idle) {
            State::Running(active) if outcome.success() => {
                info!("Command completed successfully.");

                self.emit(QueueEvent::Succeeded {
                    label: active.label,
                });
                self.run_next();
            }
            State::Running(active) => {
                let discarded = self.queue.len();

                error!("Command failed ({}). Aborting queue.", outcome);

                self.queue.clear();
                self.reset_progress();
                self.emit(QueueEvent::Failed {
                    label: active.label.clone(),
                    status: outcome,
                    discarded,
                });
                self.record_failure(Error::ProcessExit {
                    label: active.label,
                    status: outcome,
                });
            }
            State::Terminating(run) => {
                debug!("Killed run {} is gone ({})", run, outcome);

                self.run_next();
            }
            State::Idle => {}
        }
    }

    // A process that could not be monitored does not abort the queue, unlike a failed exit.
    // This mirrors how start failures are treated.
    fn on_process_error(&mut self, err: io::Error) {
        self.stop_watchdog();

        if let State::Running(active) = mem::replace(&mut self.state, State::Idle) {
            error!("Process error during {}: {}", active.label, err);

            self.emit(QueueEvent::ProcessError {
                label: active.label.clone(),
                error: err.to_string(),
            });
            self.record_failure(Error::Process {
                label: active.label,
                source: err,
            });
        }

        self.run_next();
    }

    fn on_watchdog(&mut self) {
        self.watchdog = None;

        let mut active = match mem::replace(&mut self.state, State::Idle) {
            State::Running(active) => active,
            other => {
                self.state = other;
                return;
            }
        };

        warn!("Watchdog: Timed out. Killing process and clearing queue.");

        active.kill_switch.kill();

        let discarded = self.queue.len();
        let timeout = active.timeout.unwrap_or_default();

        self.queue.clear();
        self.reset_progress();
        self.state = State::Terminating(active.id);
        self.emit(QueueEvent::TimedOut {
            label: active.label.clone(),
            timeout,
            discarded,
        });
        self.record_failure(Error::WatchdogTimeout {
            label: active.label,
            timeout,
        });
    }

    fn start_watchdog(&mut self, run: u64, timeout: Option<Duration>) {
        self.stop_watchdog();

        if let Some(timeout) = timeout {
            let signals = self.signals_tx.clone();

            self.watchdog = Some(tokio::spawn(async move {
                tokio::time::sleep(timeout).await;

                let _ = signals.send((run, Signal::Watchdog));
            }));
        }
    }

    fn stop_watchdog(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
    }

    fn reset_progress(&mut self) {
        self.progress.reset();
        self.emit(QueueEvent::Progress(0));
    }

    fn publish(&mut self, outputs: Vec<Output>) {
        for output in outputs {
            match output {
                Output::Progress(percent) => self.emit(QueueEvent::Progress(percent)),
                Output::Line(line) => self.emit(QueueEvent::Line(line)),
            }
        }
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }

    fn record_failure(&mut self, err: Error) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }
}

impl<L> Drop for Orchestrator<L> {
    fn drop(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::programmer::{DeviceSelection, LaunchRequest};

    /// What a scripted process does once it is launched
    enum Behaviour {
        Exit {
            output: Vec<&'static str>,
            code: i32,
        },
        ExitAfter(Duration),
        Crash,
        FailToStart,
        Hang,
        /// Prints its output only once it is killed
        HangThenPrint(&'static str),
        LoseTrack,
    }

    fn exit(code: i32) -> Behaviour {
        Behaviour::Exit {
            output: Vec::new(),
            code,
        }
    }

    #[derive(Clone, Default)]
    struct ScriptedLauncher {
        behaviours: Arc<Mutex<VecDeque<Behaviour>>>,
        launched: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl ScriptedLauncher {
        fn new(behaviours: Vec<Behaviour>) -> ScriptedLauncher {
            ScriptedLauncher {
                behaviours: Arc::new(Mutex::new(behaviours.into())),
                launched: Arc::default(),
            }
        }

        fn launched(&self) -> Vec<Vec<String>> {
            self.launched.lock().unwrap().clone()
        }
    }

    impl Launcher for ScriptedLauncher {
        fn launch(&mut self, request: LaunchRequest, events: EventSink) -> io::Result<KillSwitch> {
            let behaviour = self.behaviours.lock().unwrap().pop_front().unwrap_or(exit(0));

            if let Behaviour::FailToStart = behaviour {
                return Err(io::Error::new(io::ErrorKind::NotFound, "mxprog not found"));
            }

            self.launched.lock().unwrap().push(request.args);

            let (kill_switch, kill) = KillSwitch::new();

            match behaviour {
                Behaviour::Exit { output, code } => {
                    for data in output {
                        events.send(ProcessEvent::Output {
                            stream: Stream::Stdout,
                            data: data.to_string(),
                        });
                    }

                    events.send(ProcessEvent::Exited(ExitOutcome::Exited(code)));
                }
                Behaviour::ExitAfter(delay) => {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        events.send(ProcessEvent::Exited(ExitOutcome::Exited(0)));
                    });
                }
                Behaviour::Crash => {
                    events.send(ProcessEvent::Exited(ExitOutcome::Crashed {
                        signal: Some(11),
                    }));
                }
                Behaviour::Hang => {
                    tokio::spawn(async move {
                        if kill.await.is_ok() {
                            events.send(ProcessEvent::Exited(ExitOutcome::Crashed {
                                signal: Some(9),
                            }));
                        }
                    });
                }
                Behaviour::HangThenPrint(output) => {
                    tokio::spawn(async move {
                        if kill.await.is_ok() {
                            events.send(ProcessEvent::Output {
                                stream: Stream::Stdout,
                                data: output.to_string(),
                            });
                            events.send(ProcessEvent::Exited(ExitOutcome::Crashed {
                                signal: Some(9),
                            }));
                        }
                    });
                }
                Behaviour::LoseTrack => {
                    events.send(ProcessEvent::Failed(io::Error::new(
                        io::ErrorKind::Other,
                        "wait failed",
                    )));
                }
                Behaviour::FailToStart => unreachable!(),
            }

            Ok(kill_switch)
        }
    }

    fn orchestrator(
        launcher: &ScriptedLauncher,
    ) -> (
        Orchestrator<ScriptedLauncher>,
        mpsc::UnboundedReceiver<QueueEvent>,
    ) {
        Orchestrator::new(launcher.clone(), Programmer::new("mxprog"))
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<QueueEvent>) -> Vec<QueueEvent> {
        let mut drained = Vec::new();

        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }

        drained
    }

    fn erase_write_verify() -> Vec<Command> {
        vec![
            Command::erase().timeout(Duration::from_secs(90)),
            Command::write_bank(0, "/tmp/slot0_512k.bin").timeout(Duration::from_secs(240)),
            Command::verify_bank(0, "/tmp/slot0_512k.bin").timeout(Duration::from_secs(120)),
        ]
    }

    #[tokio::test]
    async fn it_should_run_commands_in_order() {
        let launcher = ScriptedLauncher::default();
        let (mut orchestrator, _events) = orchestrator(&launcher);

        for command in erase_write_verify() {
            orchestrator.enqueue(command);
        }

        assert!(orchestrator.is_running());
        assert_eq!(orchestrator.pending(), 2);

        orchestrator.run_until_idle().await.unwrap();

        assert_eq!(
            launcher.launched(),
            vec![
                vec!["-y", "-e"],
                vec!["-b", "0", "-w", "/tmp/slot0_512k.bin"],
                vec!["-b", "0", "-v", "/tmp/slot0_512k.bin"],
            ]
        );
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn it_should_abort_the_queue_when_a_command_fails() {
        let launcher = ScriptedLauncher::new(vec![exit(1)]);
        let (mut orchestrator, mut events) = orchestrator(&launcher);

        for command in erase_write_verify() {
            orchestrator.enqueue(command);
        }

        let result = orchestrator.run_until_idle().await;

        assert!(matches!(
            result,
            Err(Error::ProcessExit {
                status: ExitOutcome::Exited(1),
                ..
            })
        ));
        assert_eq!(launcher.launched(), vec![vec!["-y", "-e"]]);
        assert_eq!(orchestrator.pending(), 0);
        assert!(drain(&mut events).contains(&QueueEvent::Failed {
            label: "erase".to_string(),
            status: ExitOutcome::Exited(1),
            discarded: 2,
        }));
    }

    #[tokio::test]
    async fn it_should_treat_a_crash_as_a_failure() {
        let launcher = ScriptedLauncher::new(vec![Behaviour::Crash]);
        let (mut orchestrator, _events) = orchestrator(&launcher);

        orchestrator.enqueue(Command::write_all("/tmp/full.bin"));
        orchestrator.enqueue(Command::verify_all("/tmp/full.bin"));

        let result = orchestrator.run_until_idle().await;

        assert!(matches!(
            result,
            Err(Error::ProcessExit {
                status: ExitOutcome::Crashed { signal: Some(11) },
                ..
            })
        ));
        assert_eq!(launcher.launched().len(), 1);
    }

    #[tokio::test]
    async fn it_should_continue_the_queue_when_a_command_cannot_start() {
        let launcher = ScriptedLauncher::new(vec![Behaviour::FailToStart, exit(0)]);
        let (mut orchestrator, mut events) = orchestrator(&launcher);

        orchestrator.enqueue(Command::identify());
        orchestrator.enqueue(Command::erase());

        let result = orchestrator.run_until_idle().await;

        assert!(matches!(result, Err(Error::ProcessStart { .. })));
        assert_eq!(launcher.launched(), vec![vec!["-y", "-e"]]);

        let events = drain(&mut events);

        assert!(events.contains(&QueueEvent::StartFailed {
            label: "identify".to_string(),
            error: "mxprog not found".to_string(),
        }));
        assert!(events.contains(&QueueEvent::Succeeded {
            label: "erase".to_string(),
        }));
    }

    #[tokio::test]
    async fn it_should_continue_the_queue_after_a_process_error() {
        let launcher = ScriptedLauncher::new(vec![Behaviour::LoseTrack, exit(0)]);
        let (mut orchestrator, _events) = orchestrator(&launcher);

        orchestrator.enqueue(Command::identify());
        orchestrator.enqueue(Command::erase());

        let result = orchestrator.run_until_idle().await;

        assert!(matches!(result, Err(Error::Process { .. })));
        assert_eq!(launcher.launched().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_kill_a_command_that_times_out() {
        let launcher = ScriptedLauncher::new(vec![Behaviour::Hang]);
        let (mut orchestrator, mut events) = orchestrator(&launcher);

        for command in erase_write_verify() {
            orchestrator.enqueue(command);
        }

        let result = orchestrator.run_until_idle().await;

        match result {
            Err(Error::WatchdogTimeout { label, timeout }) => {
                assert_eq!(label, "erase");
                assert_eq!(timeout, Duration::from_secs(90));
            }
            other => panic!("expected a watchdog timeout, got {:?}", other),
        }

        assert_eq!(launcher.launched().len(), 1);
        assert_eq!(orchestrator.pending(), 0);
        assert!(!orchestrator.is_running());
        assert!(drain(&mut events).contains(&QueueEvent::TimedOut {
            label: "erase".to_string(),
            timeout: Duration::from_secs(90),
            discarded: 2,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_not_time_out_commands_that_finish_in_time() {
        let launcher = ScriptedLauncher::new(vec![
            Behaviour::ExitAfter(Duration::from_secs(1)),
            Behaviour::ExitAfter(Duration::from_secs(20)),
        ]);
        let (mut orchestrator, _events) = orchestrator(&launcher);

        orchestrator.enqueue(Command::identify().timeout(Duration::from_secs(5)));
        orchestrator.enqueue(Command::erase().timeout(Duration::from_secs(30)));

        orchestrator.run_until_idle().await.unwrap();

        assert_eq!(launcher.launched().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_not_let_an_earlier_timeout_kill_the_next_command() {
        let launcher = ScriptedLauncher::new(vec![
            Behaviour::ExitAfter(Duration::from_secs(9)),
            Behaviour::ExitAfter(Duration::from_secs(5)),
        ]);
        let (mut orchestrator, mut events) = orchestrator(&launcher);

        // The first deadline passes at 10s while the second command runs from 9s to 14s
        orchestrator.enqueue(Command::identify().timeout(Duration::from_secs(10)));
        orchestrator.enqueue(Command::erase().timeout(Duration::from_secs(30)));

        orchestrator.run_until_idle().await.unwrap();

        let events = drain(&mut events);

        assert_eq!(launcher.launched().len(), 2);
        assert!(events.contains(&QueueEvent::Succeeded {
            label: "erase".to_string(),
        }));
        assert!(!events
            .iter()
            .any(|event| matches!(event, QueueEvent::TimedOut { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_ignore_output_of_a_killed_command() {
        let launcher = ScriptedLauncher::new(vec![Behaviour::HangThenPrint("55%\nbye\n")]);
        let (mut orchestrator, mut events) = orchestrator(&launcher);

        orchestrator.enqueue(Command::write_all("/tmp/full.bin").timeout(Duration::from_secs(1)));

        assert!(orchestrator.run_until_idle().await.is_err());

        let events = drain(&mut events);

        assert_eq!(orchestrator.progress(), 0);
        assert!(!events.contains(&QueueEvent::Progress(55)));
        assert!(!events.contains(&QueueEvent::Line("bye".to_string())));
    }

    #[tokio::test]
    async fn it_should_forward_terminal_output_as_it_arrives() {
        let launcher = ScriptedLauncher::new(vec![Behaviour::Exit {
            output: vec!["mxprog> ", "42%"],
            code: 0,
        }]);
        let (mut orchestrator, mut events) = orchestrator(&launcher);

        orchestrator.enqueue(Command::terminal());
        orchestrator.run_until_idle().await.unwrap();

        let events = drain(&mut events);

        assert!(events.contains(&QueueEvent::Output("mxprog> ".to_string())));
        assert!(events.contains(&QueueEvent::Output("42%".to_string())));
        assert!(!events.contains(&QueueEvent::Progress(42)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn it_should_recover_from_a_timeout_while_a_background_process_holds_the_pipes() {
        let programmer = Programmer::new("/bin/sh");
        let (mut orchestrator, _events) = Orchestrator::new(TokioLauncher, programmer);

        orchestrator.enqueue(
            Command::new("hung")
                .args(vec!["-c", "sleep 5 & sleep 10"])
                .timeout(Duration::from_millis(200)),
        );

        let result = tokio::time::timeout(Duration::from_secs(3), orchestrator.run_until_idle())
            .await
            .expect("the killed command was never reaped");

        assert!(matches!(result, Err(Error::WatchdogTimeout { .. })));
        assert!(!orchestrator.is_running());

        orchestrator.enqueue(Command::new("true").args(vec!["-c", "exit 0"]));

        let result = tokio::time::timeout(Duration::from_secs(3), orchestrator.run_until_idle())
            .await
            .expect("the next command was never started");

        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_run_commands_without_a_timeout_indefinitely() {
        let launcher = ScriptedLauncher::new(vec![Behaviour::ExitAfter(Duration::from_secs(3600))]);
        let (mut orchestrator, _events) = orchestrator(&launcher);

        orchestrator.enqueue(Command::terminal());

        orchestrator.run_until_idle().await.unwrap();
    }

    #[tokio::test]
    async fn it_should_report_output_and_progress() {
        let launcher = ScriptedLauncher::new(vec![Behaviour::Exit {
            output: vec!["Writing\n", "\n\n", "10%\n", "142%\n", "abc\n", "\n"],
            code: 0,
        }]);
        let (mut orchestrator, mut events) = orchestrator(&launcher);

        orchestrator.enqueue(Command::write_all("/tmp/full.bin"));
        orchestrator.run_until_idle().await.unwrap();

        assert_eq!(orchestrator.progress(), 100);
        assert_eq!(
            drain(&mut events),
            vec![
                QueueEvent::Progress(0),
                QueueEvent::Started {
                    label: "write-all".to_string(),
                    command_line: Some("mxprog -w /tmp/full.bin".to_string()),
                },
                QueueEvent::Line("Writing".to_string()),
                QueueEvent::Line(String::new()),
                QueueEvent::Progress(10),
                QueueEvent::Progress(100),
                QueueEvent::Line("abc".to_string()),
                QueueEvent::Line(String::new()),
                QueueEvent::Succeeded {
                    label: "write-all".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn it_should_prepend_the_selected_device() {
        let launcher = ScriptedLauncher::default();
        let programmer =
            Programmer::new("mxprog").device(DeviceSelection::Port("/dev/ttyACM0".to_string()));
        let (mut orchestrator, _events) = Orchestrator::new(launcher.clone(), programmer);

        orchestrator.enqueue(Command::identify().quiet());
        orchestrator.run_until_idle().await.unwrap();

        assert_eq!(launcher.launched(), vec![vec!["-d", "/dev/ttyACM0", "-i"]]);
    }

    #[tokio::test]
    async fn it_should_accept_new_commands_after_a_failure() {
        let launcher = ScriptedLauncher::new(vec![exit(2), exit(0)]);
        let (mut orchestrator, _events) = orchestrator(&launcher);

        orchestrator.enqueue(Command::erase());
        orchestrator.enqueue(Command::identify());

        assert!(orchestrator.run_until_idle().await.is_err());

        orchestrator.enqueue(Command::identify());

        assert!(orchestrator.run_until_idle().await.is_ok());
        assert_eq!(launcher.launched(), vec![vec!["-y", "-e"], vec!["-i"]]);
    }
}
