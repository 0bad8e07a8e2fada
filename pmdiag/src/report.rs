//! Error reports with call site and OS cause
//!
//! Error lines bypass the verbosity gate. Every report mode in this module
//! runs the finalize actions; only [`Diagnostics::report_and_terminate`] and
//! [`Diagnostics::terminate`] end the process.

use nix::errno::Errno;

use crate::context::Diagnostics;
use crate::emit::Site;
use crate::sink::Channel;

pub(crate) fn format_plain(site: &Site, message: &str) -> String {
    format!(
        "ERROR - [{}:{}:{}] {}",
        site.file, site.module, site.line, message
    )
}

pub(crate) fn format_with_cause(site: &Site, message: &str, errno: Errno) -> String {
    format!(
        "ERROR - [{}:{}:{}] {}. {}",
        site.file,
        site.module,
        site.line,
        errno.desc(),
        message
    )
}

/// Line used by the wrappers: caller message followed by the OS cause
pub(crate) fn format_check(site: &Site, message: &str, errno: Errno) -> String {
    format!(
        "ERROR - [{}:{}] {} - {}",
        site.file,
        site.line,
        message,
        errno.desc()
    )
}

pub(crate) fn format_cause(site: &Site, errno: Errno) -> String {
    format!("ERROR - [{}:{}] {}", site.file, site.line, errno.desc())
}

impl Diagnostics {
    pub(crate) fn write_error(&self, line: &str) {
        self.sink().write_line(Channel::Error, line);
    }

    /// Log `message`, then finalize both subsystems
    pub fn report_plain(&self, site: Site, message: &str) {
        self.write_error(&format_plain(&site, message));
        self.finalize_all();
    }

    /// Log `message` with the description of `errno`, then finalize
    pub fn report_with_cause(&self, site: Site, message: &str, errno: Errno) {
        self.write_error(&format_with_cause(&site, message, errno));
        self.finalize_all();
    }

    /// Everything a fatal path does short of exiting: one error line, then
    /// both finalize actions.
    pub fn report_fatal(&self, site: Site, message: Option<&str>, errno: Errno) {
        let line = match message {
            Some(message) => format_check(&site, message, errno),
            None => format_cause(&site, errno),
        };
        self.write_error(&line);
        self.finalize_all();
    }

    /// Log the OS cause, finalize and exit with a failure status
    pub fn report_and_terminate(&self, site: Site, errno: Errno) -> ! {
        self.report_fatal(site, None, errno);
        self.terminate()
    }

    /// The single process exit point of the diagnostic layer
    pub fn terminate(&self) -> ! {
        tracing::debug!("Terminating after fatal register access failure");
        std::process::exit(libc::EXIT_FAILURE)
    }
}
