//! Programming actions on top of the bank layout and the programmer queue

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use directories::UserDirs;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::image::{image_digest, load_fragment, BankSet, Geometry};
use crate::programmer::{
    Command, DeviceSelection, Launcher, Orchestrator, Programmer, QueueEvent, TokioLauncher,
};
use crate::Error;

pub const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(15);
pub const ERASE_TIMEOUT: Duration = Duration::from_secs(120);
pub const READ_TIMEOUT: Duration = Duration::from_secs(240);

pub const SLOT_ERASE_TIMEOUT: Duration = Duration::from_secs(90);
pub const SLOT_WRITE_TIMEOUT: Duration = Duration::from_secs(240);
pub const SLOT_VERIFY_TIMEOUT: Duration = Duration::from_secs(120);

pub const FULL_ERASE_TIMEOUT: Duration = Duration::from_secs(120);
pub const FULL_WRITE_TIMEOUT: Duration = Duration::from_secs(300);
pub const FULL_VERIFY_TIMEOUT: Duration = Duration::from_secs(180);

/// The name of the last resort buffer file for a full write
pub const FALLBACK_DUMP_NAME: &str = "romdump_fallback.bin";

/// User choices that shape the commands sent to the programmer
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The programmer executable, discovered when not set
    pub programmer: Option<PathBuf>,
    pub device: DeviceSelection,
    /// Erase the device before writing
    pub erase_first: bool,
    /// Verify the device after writing
    pub verify_after: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            programmer: None,
            device: DeviceSelection::Auto,
            erase_first: true,
            verify_after: true,
        }
    }
}

impl Settings {
    /// Resolves the programmer these settings describe
    pub fn programmer(&self) -> Programmer {
        Programmer::discover(self.programmer.clone()).device(self.device.clone())
    }
}

/// Returns a timestamped file name for a full image, e.g. `romdump_20240131_235959.bin`
pub fn timestamped_dump_name() -> String {
    format!("romdump_{}.bin", Local::now().format("%Y%m%d_%H%M%S"))
}

/// The directory full images are saved to by default: the documents directory, or home
pub fn default_dump_dir() -> PathBuf {
    UserDirs::new()
        .map(|dirs| {
            dirs.document_dir()
                .unwrap_or_else(|| dirs.home_dir())
                .to_path_buf()
        })
        .unwrap_or_else(env::temp_dir)
}

/// The banks being assembled together with the queue that programs them
pub struct Session<L = TokioLauncher> {
    banks: BankSet,
    orchestrator: Orchestrator<L>,
    erase_first: bool,
    verify_after: bool,
    temp_dir: PathBuf,
    dump_dir: Option<PathBuf>,
}

impl<L: Launcher> Session<L> {
    /// Creates a session with empty banks, returning the receiving end of the queue events
    pub fn new(
        geometry: Geometry,
        settings: &Settings,
        launcher: L,
        programmer: Programmer,
    ) -> (Session<L>, mpsc::UnboundedReceiver<QueueEvent>) {
        let (orchestrator, events) = Orchestrator::new(launcher, programmer);

        let session = Session {
            banks: BankSet::new(geometry),
            orchestrator,
            erase_first: settings.erase_first,
            verify_after: settings.verify_after,
            temp_dir: env::temp_dir(),
            dump_dir: None,
        };

        (session, events)
    }

    /// Writes per-bank images to `dir` instead of the system's temporary directory
    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Session<L> {
        self.temp_dir = dir.into();
        self
    }

    /// Saves full images for programming to `dir` instead of the documents directory
    pub fn with_dump_dir<P: Into<PathBuf>>(mut self, dir: P) -> Session<L> {
        self.dump_dir = Some(dir.into());
        self
    }

    pub fn banks(&self) -> &BankSet {
        &self.banks
    }

    pub fn banks_mut(&mut self) -> &mut BankSet {
        &mut self.banks
    }

    pub fn orchestrator(&self) -> &Orchestrator<L> {
        &self.orchestrator
    }

    /// Loads `paths` into `bank` in order, returning how many were added
    ///
    /// Files that cannot be read or don't fit are reported and skipped.
    pub fn add_files<P: AsRef<Path>>(&mut self, bank: usize, paths: &[P]) -> Result<usize, Error> {
        let bank = self.banks.bank_mut(bank)?;
        let mut added = 0;

        for path in paths {
            let path = path.as_ref();

            let raw = match load_fragment(path) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("Could not read {}: {}", path.display(), err);
                    continue;
                }
            };

            match bank.add_raw(&raw) {
                Ok(_) => added += 1,
                Err(err) => warn!("{}", err),
            }
        }

        Ok(added)
    }

    /// Builds the image of `bank` into a temporary file and queues programming it
    ///
    /// Returns the path of the temporary file.
    pub fn write_slot(&mut self, bank: usize) -> Result<PathBuf, Error> {
        let geometry = self.banks.geometry();
        let image = self.banks.bank(bank)?.build_image();
        let path = self
            .temp_dir
            .join(format!("slot{}_{}k.bin", bank, geometry.slot_size_kib()));

        if let Err(err) = fs::write(&path, &image) {
            warn!("Temp file creation failed: {}", path.display());

            return Err(Error::Persistence { path, source: err });
        }

        debug!(
            "Wrote slot {} image to {} (sha256 {})",
            bank,
            path.display(),
            image_digest(&image)
        );

        if self.erase_first {
            self.orchestrator
                .enqueue(Command::erase().timeout(SLOT_ERASE_TIMEOUT));
        }

        self.orchestrator
            .enqueue(Command::write_bank(bank, &path).timeout(SLOT_WRITE_TIMEOUT));

        if self.verify_after {
            self.orchestrator
                .enqueue(Command::verify_bank(bank, &path).timeout(SLOT_VERIFY_TIMEOUT));
        }

        Ok(path)
    }

    /// Saves the full image and queues programming the whole device from it
    ///
    /// The image goes to the dump directory under a timestamped name, then to the temporary
    /// directory under the same name, and finally to a fixed name in the temporary directory.
    /// Nothing is queued when none of these can be written. Returns the path that was used.
    pub fn write_all(&mut self) -> Result<PathBuf, Error> {
        let image = self.banks.build_full_image();
        let name = timestamped_dump_name();
        let primary = self.dump_dir().join(&name);

        let path = match self.persist(&primary, &image) {
            Ok(()) => primary,
            Err(err) => {
                debug!("Could not save to {}: {}", primary.display(), err);

                let temp = self.temp_dir.join(&name);

                match self.persist(&temp, &image) {
                    Ok(()) => {
                        info!("Primary save failed, used temp path instead.");
                        temp
                    }
                    Err(_) => {
                        warn!("Save failed in Documents and Temp. Will program from a temp path without persisting.");

                        let fallback = self.temp_dir.join(FALLBACK_DUMP_NAME);

                        if let Err(err) = fs::write(&fallback, &image) {
                            return Err(Error::Persistence {
                                path: fallback,
                                source: err,
                            });
                        }

                        fallback
                    }
                }
            }
        };

        if self.erase_first {
            self.orchestrator
                .enqueue(Command::erase().timeout(FULL_ERASE_TIMEOUT));
        }

        self.orchestrator
            .enqueue(Command::write_all(&path).timeout(FULL_WRITE_TIMEOUT));

        if self.verify_after {
            self.orchestrator
                .enqueue(Command::verify_all(&path).timeout(FULL_VERIFY_TIMEOUT));
        }

        Ok(path)
    }

    /// Saves the full image to `path` without programming anything
    pub fn save_full_image<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let image = self.banks.build_full_image();

        self.persist(path, &image).map_err(|err| {
            warn!("Save failed: {}", path.display());

            Error::Persistence {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }

    /// Queues identifying the connected device
    pub fn identify(&mut self) {
        self.orchestrator
            .enqueue(Command::identify().timeout(IDENTIFY_TIMEOUT));
    }

    /// Queues erasing the whole device
    pub fn erase(&mut self) {
        self.orchestrator
            .enqueue(Command::erase().timeout(ERASE_TIMEOUT));
    }

    /// Queues reading the whole device into the file at `path`
    pub fn read_dump<P: AsRef<Path>>(&mut self, path: P) {
        let total = self.banks.geometry().total_size();

        self.orchestrator
            .enqueue(Command::read(path, total).timeout(READ_TIMEOUT));
    }

    /// Queues the programmer's terminal passthrough, which runs until it is closed
    pub fn terminal(&mut self) {
        self.orchestrator.enqueue(Command::terminal());
    }

    /// Runs every queued command, see [`Orchestrator::run_until_idle`]
    pub async fn run_until_idle(&mut self) -> Result<(), Error> {
        self.orchestrator.run_until_idle().await
    }

    fn dump_dir(&self) -> PathBuf {
        self.dump_dir.clone().unwrap_or_else(default_dump_dir)
    }

    fn persist(&self, path: &Path, image: &[u8]) -> std::io::Result<()> {
        fs::write(path, image)?;

        info!(
            "Saved {} MiB buffer to: {}",
            image.len() / (1024 * 1024),
            path.display()
        );
        debug!("Buffer sha256: {}", image_digest(image));

        Ok(())
    }
}
