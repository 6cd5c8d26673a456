use std::convert::Infallible;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// A single invocation of the programmer
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Command {
    args: Vec<String>,
    label: String,
    should_log: bool,
    passthrough: bool,
    timeout: Option<Duration>,
}

impl Command {
    /// Creates a command without arguments that is echoed when it starts and never times out
    pub fn new<S: Into<String>>(label: S) -> Command {
        Command {
            args: Vec::new(),
            label: label.into(),
            should_log: true,
            passthrough: false,
            timeout: None,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Command {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kills the command if it runs for longer than `timeout`
    pub fn timeout(mut self, timeout: Duration) -> Command {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the timeout in milliseconds, where `0` disables it
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Command {
        self.timeout = if timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(timeout_ms))
        };
        self
    }

    /// Don't echo the command line when the command starts
    pub fn quiet(mut self) -> Command {
        self.should_log = false;
        self
    }

    /// Forward output as it arrives instead of line by line, for interactive use
    pub fn passthrough(mut self) -> Command {
        self.passthrough = true;
        self
    }

    /// Identify the connected device (`-i`)
    pub fn identify() -> Command {
        Command::new("identify").arg("-i")
    }

    /// Erase the whole device without asking for confirmation (`-y -e`)
    pub fn erase() -> Command {
        Command::new("erase").args(vec!["-y", "-e"])
    }

    /// Write the image at `path` to a single bank
    pub fn write_bank<P: AsRef<Path>>(bank: usize, path: P) -> Command {
        Command::new("write")
            .args(vec!["-b".to_string(), bank.to_string(), "-w".to_string()])
            .arg(path_arg(path))
    }

    /// Verify a single bank against the image at `path`
    pub fn verify_bank<P: AsRef<Path>>(bank: usize, path: P) -> Command {
        Command::new("verify")
            .args(vec!["-b".to_string(), bank.to_string(), "-v".to_string()])
            .arg(path_arg(path))
    }

    /// Write the image at `path` to the whole device, starting at address 0
    pub fn write_all<P: AsRef<Path>>(path: P) -> Command {
        Command::new("write-all").arg("-w").arg(path_arg(path))
    }

    /// Verify the whole device against the image at `path`
    pub fn verify_all<P: AsRef<Path>>(path: P) -> Command {
        Command::new("verify-all").arg("-v").arg(path_arg(path))
    }

    /// Read `length` bytes from the device into the file at `path`
    pub fn read<P: AsRef<Path>>(path: P, length: usize) -> Command {
        Command::new("read")
            .arg("-r")
            .arg(path_arg(path))
            .arg("-l")
            .arg(length.to_string())
    }

    /// Open the programmer's terminal passthrough
    pub fn terminal() -> Command {
        Command::new("term").arg("-t").passthrough()
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn should_log(&self) -> bool {
        self.should_log
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }
}

fn path_arg<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().into_owned()
}

/// Which device the programmer should talk to
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DeviceSelection {
    /// Let the programmer pick the device
    Auto,
    /// Pin the device with `-d <port>`
    Port(String),
}

impl DeviceSelection {
    /// The arguments that select this device
    pub fn args(&self) -> Vec<String> {
        match self {
            DeviceSelection::Auto => Vec::new(),
            DeviceSelection::Port(port) => vec!["-d".to_string(), port.clone()],
        }
    }
}

impl Default for DeviceSelection {
    fn default() -> DeviceSelection {
        DeviceSelection::Auto
    }
}

impl FromStr for DeviceSelection {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            Ok(DeviceSelection::Auto)
        } else {
            Ok(DeviceSelection::Port(s.to_string()))
        }
    }
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelection::Auto => write!(f, "auto"),
            DeviceSelection::Port(port) => write!(f, "{}", port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_build_bank_commands() {
        let write = Command::write_bank(2, "/tmp/slot2_512k.bin");
        let verify = Command::verify_bank(2, "/tmp/slot2_512k.bin");

        assert_eq!(write.label(), "write");
        assert_eq!(write.arguments(), &["-b", "2", "-w", "/tmp/slot2_512k.bin"]);
        assert_eq!(verify.arguments(), &["-b", "2", "-v", "/tmp/slot2_512k.bin"]);
    }

    #[test]
    fn it_should_build_whole_device_commands() {
        assert_eq!(Command::write_all("a.bin").arguments(), &["-w", "a.bin"]);
        assert_eq!(Command::verify_all("a.bin").arguments(), &["-v", "a.bin"]);
        assert_eq!(
            Command::read("dump.bin", 2 * 1024 * 1024).arguments(),
            &["-r", "dump.bin", "-l", "2097152"]
        );
        assert_eq!(Command::terminal().arguments(), &["-t"]);
        assert!(Command::terminal().is_passthrough());
        assert!(!Command::read("dump.bin", 16).is_passthrough());
        assert_eq!(Command::erase().arguments(), &["-y", "-e"]);
    }

    #[test]
    fn it_should_treat_a_zero_timeout_as_none() {
        assert_eq!(Command::identify().timeout_ms(0).timeout_duration(), None);
        assert_eq!(
            Command::identify().timeout_ms(15_000).timeout_duration(),
            Some(Duration::from_secs(15))
        );
    }

    #[test]
    fn it_should_parse_device_selections() {
        assert_eq!("auto".parse::<DeviceSelection>(), Ok(DeviceSelection::Auto));
        assert_eq!("Auto".parse::<DeviceSelection>(), Ok(DeviceSelection::Auto));
        assert_eq!("".parse::<DeviceSelection>(), Ok(DeviceSelection::Auto));
        assert_eq!(
            "/dev/ttyUSB0".parse::<DeviceSelection>(),
            Ok(DeviceSelection::Port("/dev/ttyUSB0".to_string()))
        );
    }
}
