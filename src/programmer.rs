//! Drives the external `mxprog` device programmer

mod command;
pub mod discover;
mod process;
mod progress;
mod queue;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use command::{Command, DeviceSelection};
pub use process::{
    EventSink, ExitOutcome, KillSwitch, LaunchRequest, Launcher, ProcessEvent, Stream,
    TokioLauncher,
};
pub use progress::{LineKind, Output, ProgressParser, ProgressTracker};
pub use queue::{Orchestrator, QueueEvent};

/// How to invoke the programmer executable
#[derive(Debug, Clone)]
pub struct Programmer {
    program: PathBuf,
    device: DeviceSelection,
    env: Vec<(OsString, OsString)>,
}

impl Programmer {
    /// Creates a programmer that runs `program` with the inherited environment
    pub fn new<P: Into<PathBuf>>(program: P) -> Programmer {
        Programmer {
            program: program.into(),
            device: DeviceSelection::Auto,
            env: Vec::new(),
        }
    }

    /// Resolves the programmer executable, preferring `explicit` over the one found on `PATH`
    ///
    /// The child environment gets the platform's usual install directories appended to `PATH`.
    pub fn discover(explicit: Option<PathBuf>) -> Programmer {
        Programmer {
            program: discover::resolve_programmer(explicit),
            device: DeviceSelection::Auto,
            env: discover::child_environment(),
        }
    }

    /// Pins every command to `device`
    pub fn device(mut self, device: DeviceSelection) -> Programmer {
        self.device = device;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn device_selection(&self) -> &DeviceSelection {
        &self.device
    }

    /// Returns the full argument list for `command`, with the device selection in front
    pub fn argv(&self, command: &Command) -> Vec<String> {
        let mut argv = self.device.args();
        argv.extend(command.arguments().iter().cloned());

        argv
    }

    /// Returns the command line as it would be typed in a shell, for logging
    pub fn command_line(&self, command: &Command) -> String {
        let mut line = self.program.display().to_string();

        for arg in self.argv(command) {
            line.push(' ');
            line.push_str(&arg);
        }

        line
    }

    pub(crate) fn launch_request(&self, command: &Command) -> LaunchRequest {
        LaunchRequest {
            program: self.program.clone(),
            args: self.argv(command),
            env: self.env.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_prepend_the_device_selection() {
        let programmer =
            Programmer::new("mxprog").device(DeviceSelection::Port("/dev/ttyACM0".into()));

        assert_eq!(
            programmer.argv(&Command::identify()),
            vec!["-d", "/dev/ttyACM0", "-i"]
        );
        assert_eq!(
            programmer.command_line(&Command::identify()),
            "mxprog -d /dev/ttyACM0 -i"
        );
    }

    #[test]
    fn it_should_omit_the_device_when_automatic() {
        let programmer = Programmer::new("/usr/local/bin/mxprog");

        assert_eq!(programmer.argv(&Command::erase()), vec!["-y", "-e"]);
    }
}
