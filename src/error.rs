use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::programmer::ExitOutcome;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "{} ({} bytes) does not fit in slot {} - only {} bytes available",
        name,
        size,
        bank,
        available
    )]
    CapacityExceeded {
        bank: usize,
        name: String,
        size: usize,
        available: usize,
    },

    #[error("Slot {} has no fragment at index {} ({} fragments)", bank, index, len)]
    IndexOutOfRange { bank: usize, index: usize, len: usize },

    #[error("Slot {} does not exist - the device has {} banks", bank, count)]
    InvalidBank { bank: usize, count: usize },

    #[error("Could not start {}: {}", label, source)]
    ProcessStart {
        label: String,
        #[source]
        source: io::Error,
    },

    #[error("Process error during {}: {}", label, source)]
    Process {
        label: String,
        #[source]
        source: io::Error,
    },

    #[error("{} failed ({})", label, status)]
    ProcessExit { label: String, status: ExitOutcome },

    #[error("{} timed out after {:?}", label, timeout)]
    WatchdogTimeout { label: String, timeout: Duration },

    #[error("Could not write image file {}: {}", path.display(), source)]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
