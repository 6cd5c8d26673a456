use std::path::PathBuf;
use std::str::FromStr;

use structopt::StructOpt;

use mxrom::DeviceSelection;

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Identify the connected device
    Info,
    /// Erase the whole device
    Erase,
    /// Read the whole device into a file
    Read {
        /// The name of the file to save the contents to
        #[structopt(default_value = "eeprom_dump.bin")]
        filename: PathBuf,
    },
    /// Open the programmer's terminal passthrough
    Terminal,
    /// Assemble a single bank and program it
    WriteSlot(WriteSlotOpts),
    /// Assemble every bank and program the whole device
    WriteAll(LayoutOpts),
    /// Assemble every bank and save the full image without programming
    Save(SaveOpts),
    /// Assemble every bank and print the resulting layout
    Layout(LayoutOpts),
}

#[derive(StructOpt, Debug)]
pub struct WriteSlotOpts {
    /// The bank to program
    pub bank: usize,
    /// The fragments to place in the bank, in order. Files ending in .rom are byte swapped
    #[structopt(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(StructOpt, Debug)]
pub struct LayoutOpts {
    /// A fragment to place in a bank, as `<bank>:<file>`. May be repeated
    #[structopt(short = "f", long = "fragment", number_of_values = 1)]
    pub fragments: Vec<FragmentArg>,
}

#[derive(StructOpt, Debug)]
pub struct SaveOpts {
    /// The file to save the image to, defaults to a timestamped file in the documents directory
    pub filename: Option<PathBuf>,
    #[structopt(flatten)]
    pub layout: LayoutOpts,
}

/// A fragment file destined for a bank
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FragmentArg {
    pub bank: usize,
    pub path: PathBuf,
}

impl FromStr for FragmentArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bank, path) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <bank>:<file>, got {:?}", s))?;

        let bank = bank
            .trim()
            .parse()
            .map_err(|err| format!("invalid bank {:?}: {}", bank, err))?;

        if path.is_empty() {
            return Err(format!("missing file name in {:?}", s));
        }

        Ok(FragmentArg {
            bank,
            path: PathBuf::from(path),
        })
    }
}

#[derive(StructOpt, Debug)]
pub struct Opts {
    #[structopt(subcommand)]
    pub command: Command,

    /// The programmer executable, searched for in PATH when not given
    #[structopt(env = "MXPROG", long = "programmer")]
    pub programmer: Option<PathBuf>,
    /// The device to program, or `auto` to let the programmer pick one
    #[structopt(
        env = "MXPROG_DEVICE",
        short = "d",
        long = "device",
        default_value = "auto"
    )]
    pub device: DeviceSelection,
    /// Don't erase the device before writing
    #[structopt(long = "no-erase")]
    pub no_erase: bool,
    /// Don't verify the device after writing
    #[structopt(long = "no-verify")]
    pub no_verify: bool,
}
