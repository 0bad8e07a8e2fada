//! Wrappers turning one fallible register operation into a logged outcome

use nix::errno::Errno;

use crate::context::Diagnostics;
use crate::emit::Site;
use crate::error::{DiagError, Result};
use crate::report::format_check;

pub const MSR_WRITE_FAILED: &str = "MSR write operation failed";
pub const MSR_READ_FAILED: &str = "MSR read operation failed";
pub const PCI_WRITE_FAILED: &str = "PCI write operation failed";
pub const PCI_READ_FAILED: &str = "PCI read operation failed";
pub const POWER_READ_FAILED: &str = "Power register read operation failed";
pub const TEMP_READ_FAILED: &str = "Temperature register read operation failed";

/// Result of a raw register operation.
///
/// Signed integers fail when negative and take their cause from `errno`,
/// which must be inspected right after the operation returns. A
/// `nix::Result` carries its cause directly.
pub trait Status: Sized {
    type Value;

    /// Cause of the failure, or `None` on success
    fn failure(&self) -> Option<Errno>;

    fn into_result(self) -> std::result::Result<Self::Value, Errno>;
}

macro_rules! signed_status {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Status for $ty {
                type Value = $ty;

                #[inline]
                fn failure(&self) -> Option<Errno> {
                    (*self < 0).then(Errno::last)
                }

                #[inline]
                fn into_result(self) -> std::result::Result<$ty, Errno> {
                    if self < 0 {
                        Err(Errno::last())
                    } else {
                        Ok(self)
                    }
                }
            }
        )*
    };
}

signed_status!(i8, i16, i32, i64, isize);

impl<T> Status for nix::Result<T> {
    type Value = T;

    fn failure(&self) -> Option<Errno> {
        self.as_ref().err().copied()
    }

    fn into_result(self) -> std::result::Result<T, Errno> {
        self
    }
}

/// Generates a named `check_propagate` with a fixed message
macro_rules! check_specialization {
    ($($(#[$meta:meta])* $name:ident => $message:ident),* $(,)?) => {
        impl Diagnostics {
            $(
                $(#[$meta])*
                pub fn $name<S: Status>(
                    &self,
                    site: Site,
                    op: impl FnOnce() -> S,
                ) -> Result<S::Value> {
                    self.check_propagate(site, op, $message)
                }
            )*
        }
    };
}

impl Diagnostics {
    fn log_failure(&self, site: &Site, message: &str, errno: Errno) {
        self.write_error(&format_check(site, message, errno));
    }

    /// Run `op`; on failure log `message` with the cause and hand the status
    /// back unchanged. Never finalizes.
    pub fn check_log<S: Status>(&self, site: Site, op: impl FnOnce() -> S, message: &str) -> S {
        let status = op();
        if let Some(errno) = status.failure() {
            self.log_failure(&site, message, errno);
        }
        status
    }

    /// Run `op`; on failure log it and return [`DiagError::Io`] carrying the
    /// cause. Never finalizes.
    pub fn check_propagate<S: Status>(
        &self,
        site: Site,
        op: impl FnOnce() -> S,
        message: &str,
    ) -> Result<S::Value> {
        op().into_result().map_err(|errno| {
            self.log_failure(&site, message, errno);
            DiagError::io(message, errno)
        })
    }

    /// Run `op`; on failure log it, finalize both subsystems and exit
    pub fn check_fatal<S: Status>(
        &self,
        site: Site,
        op: impl FnOnce() -> S,
        message: &str,
    ) -> S::Value {
        match op().into_result() {
            Ok(value) => value,
            Err(errno) => {
                self.report_fatal(site, Some(message), errno);
                self.terminate()
            }
        }
    }

    /// Top-level boundary: unwrap `result` or report and terminate.
    ///
    /// Errors without an OS cause are reported as `EIO`.
    pub fn exit_on_error<T>(&self, site: Site, result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => {
                let (message, errno) = fatal_parts(&err);
                self.report_fatal(site, Some(&message), errno);
                self.terminate()
            }
        }
    }
}

/// Message and cause an error line is rendered from
fn fatal_parts(err: &DiagError) -> (String, Errno) {
    match err {
        DiagError::Io { message, errno } => (message.clone(), *errno),
        other => (other.to_string(), Errno::EIO),
    }
}

check_specialization! {
    check_msr_write => MSR_WRITE_FAILED,
    check_msr_read => MSR_READ_FAILED,
    check_pci_write => PCI_WRITE_FAILED,
    check_pci_read => PCI_READ_FAILED,
    /// RAPL energy and power-unit registers
    check_power_read => POWER_READ_FAILED,
    /// Thermal status and temperature target registers
    check_temp_read => TEMP_READ_FAILED,
}
