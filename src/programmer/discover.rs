//! Finding the programmer executable and preparing its environment

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, warn};

/// The name of the programmer executable
pub const PROGRAMMER_NAME: &str = "mxprog";

/// Install locations that are searched after `PATH`, and appended to the child's `PATH`
#[cfg(target_os = "macos")]
const EXTRA_DIRS: &[&str] = &["/usr/local/bin", "/opt/homebrew/bin"];
#[cfg(all(unix, not(target_os = "macos")))]
const EXTRA_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin"];
#[cfg(not(unix))]
const EXTRA_DIRS: &[&str] = &[];

/// Directories that GUI launched processes tend to be missing from their `PATH`
#[cfg(target_os = "macos")]
const CHILD_PATH_DIRS: &[&str] = &["/usr/local/bin", "/opt/homebrew/bin"];
#[cfg(all(unix, not(target_os = "macos")))]
const CHILD_PATH_DIRS: &[&str] = &["/usr/local/bin"];
#[cfg(not(unix))]
const CHILD_PATH_DIRS: &[&str] = &[];

/// Searches `PATH` and then the platform's usual install directories for the programmer
pub fn discover_programmer() -> Option<PathBuf> {
    let path = env::var_os("PATH");
    let dirs = path
        .iter()
        .flat_map(env::split_paths)
        .chain(EXTRA_DIRS.iter().map(PathBuf::from));

    find_executable(PROGRAMMER_NAME, dirs)
}

/// Returns the first executable file called `name` in `dirs`
pub fn find_executable<I>(name: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    dirs.into_iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| candidates(&dir, name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(format!("{}.exe", name)), dir.join(name)]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Picks the programmer executable to run
///
/// A non-empty `explicit` path always wins. Otherwise the discovered executable is used, and
/// if there is none the bare name is left for the operating system to resolve.
pub fn resolve_programmer(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(explicit) = explicit.filter(|path| !path.as_os_str().is_empty()) {
        debug!("Using programmer {}", explicit.display());
        return explicit;
    }

    match discover_programmer() {
        Some(path) => {
            debug!("Found programmer at {}", path.display());
            path
        }
        None => {
            warn!(
                "Could not find {} in PATH, relying on the system to resolve it",
                PROGRAMMER_NAME
            );
            PathBuf::from(PROGRAMMER_NAME)
        }
    }
}

/// Returns `current` with the platform's install directories appended, unless already present
pub fn augmented_path(current: Option<OsString>) -> OsString {
    let mut dirs: Vec<PathBuf> = current.iter().flat_map(env::split_paths).collect();

    for extra in CHILD_PATH_DIRS {
        let extra = Path::new(extra);

        if !dirs.iter().any(|dir| dir == extra) {
            dirs.push(extra.to_path_buf());
        }
    }

    match env::join_paths(&dirs) {
        Ok(path) => path,
        Err(err) => {
            warn!("Could not extend PATH: {}", err);
            current.unwrap_or_default()
        }
    }
}

/// The environment variables to set for the programmer on top of the inherited ones
pub fn child_environment() -> Vec<(OsString, OsString)> {
    vec![(
        OsString::from("PATH"),
        augmented_path(env::var_os("PATH")),
    )]
}
