pub mod msr;
pub mod pci;

use std::io;

use pmdiag::Errno;

pub use msr::{Msr, MsrHandle};
pub use pci::{Pci, PciAddress, PciHandle};

/// OS error behind an I/O failure; short reads and writes count as `EIO`
pub(crate) fn errno_of(e: io::Error) -> Errno {
    e.raw_os_error().map(Errno::from_i32).unwrap_or(Errno::EIO)
}
