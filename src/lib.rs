//! Assembles ROM images for a multi-bank EEPROM and programs them with the external `mxprog`
//! device programmer.
//!
//! Fragments are added to banks in [`image`], where each bank is turned into an image of exactly
//! one slot and all banks together into a full image of the device. The [`programmer`] module
//! runs the programmer one command at a time through a queue that drops the remaining commands
//! when one of them fails. [`session`] ties both together into the actions of the tool.

pub mod image;
pub mod programmer;
pub mod session;

mod error;

pub use error::Error;
pub use image::{Bank, BankSet, Geometry};
pub use programmer::{Command, DeviceSelection, Orchestrator, Programmer, QueueEvent};
pub use session::{Session, Settings};
