//! Verbosity-gated trace/debug emission

use std::fmt;

use crate::context::Diagnostics;
use crate::sink::Channel;
use crate::verbosity::Verbosity;

/// Source location of a diagnostic, captured by [`site!`](crate::site)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub file: &'static str,
    pub line: u32,
    pub module: &'static str,
}

impl Site {
    pub const fn new(file: &'static str, line: u32, module: &'static str) -> Self {
        Self { file, line, module }
    }
}

/// Register and bit pattern involved in a hardware access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterAccess {
    pub cpu: u32,
    /// PCI device index; `None` for MSR accesses
    pub device: Option<u32>,
    pub register: u64,
    pub flags: u64,
}

impl RegisterAccess {
    pub fn msr(cpu: u32, register: u64, flags: u64) -> Self {
        Self {
            cpu,
            device: None,
            register,
            flags,
        }
    }

    pub fn pci(cpu: u32, device: u32, register: u64, flags: u64) -> Self {
        Self {
            cpu,
            device: Some(device),
            register,
            flags,
        }
    }
}

pub(crate) fn format_plain(site: &Site, args: fmt::Arguments<'_>) -> String {
    format!("DEBUG - [{}:{}] {}", site.file, site.line, args)
}

pub(crate) fn format_register(
    site: &Site,
    access: &RegisterAccess,
    args: fmt::Arguments<'_>,
) -> String {
    match access.device {
        Some(device) => format!(
            "DEBUG - [{}:{}] {} [{}] Device {} Register 0x{:X} , Flags: 0x{:X}",
            site.module, site.line, args, access.cpu, device, access.register, access.flags
        ),
        None => format!(
            "DEBUG - [{}:{}] {} [{}] Register 0x{:X} , Flags: 0x{:X}",
            site.module, site.line, args, access.cpu, access.register, access.flags
        ),
    }
}

impl Diagnostics {
    /// Whether a diagnostic at `severity` would currently be written
    #[inline]
    pub fn enabled(&self, severity: Verbosity) -> bool {
        self.gate().enabled(severity)
    }

    /// Write a plain diagnostic line if `severity` passes the gate
    pub fn emit(&self, severity: Verbosity, site: Site, args: fmt::Arguments<'_>) {
        if !self.enabled(severity) {
            return;
        }
        let line = format_plain(&site, args);
        self.sink()
            .write_line(Channel::Diagnostic(severity), &line);
    }

    /// Write a diagnostic annotated with the register and flags involved
    pub fn emit_register(
        &self,
        severity: Verbosity,
        site: Site,
        access: RegisterAccess,
        args: fmt::Arguments<'_>,
    ) {
        if !self.enabled(severity) {
            return;
        }
        let line = format_register(&site, &access, args);
        self.sink()
            .write_line(Channel::Diagnostic(severity), &line);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::finalize::Finalizer;
    use crate::sink::MemorySink;

    fn diagnostics(level: Verbosity) -> (Diagnostics, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let diag = Diagnostics::new(level, sink.clone(), Finalizer::default());
        (diag, sink)
    }

    #[test]
    fn test_detail_suppressed_at_info() {
        let (diag, sink) = diagnostics(Verbosity::Info);

        diag.emit(Verbosity::Detail, crate::site!(), format_args!("hidden"));
        assert!(sink.lines().is_empty());

        diag.emit(Verbosity::Info, crate::site!(), format_args!("shown {}", 1));
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("DEBUG - ["));
        assert!(lines[0].contains(file!()));
        assert!(lines[0].ends_with("shown 1"));
    }

    #[test]
    fn test_only_error_messages_always_pass() {
        for level in Verbosity::all() {
            let (diag, sink) = diagnostics(level);
            diag.emit(Verbosity::OnlyError, crate::site!(), format_args!("always"));
            assert_eq!(sink.lines().len(), 1, "level {level}");
        }
    }

    #[test]
    fn test_emit_matrix() {
        for level in Verbosity::all() {
            for severity in Verbosity::all() {
                let (diag, sink) = diagnostics(level);
                diag.emit(severity, crate::site!(), format_args!("msg"));
                assert_eq!(sink.lines().len() == 1, severity <= level);
            }
        }
    }

    #[test]
    fn test_msr_register_line() {
        let (diag, sink) = diagnostics(Verbosity::Develop);
        let site = Site::new("src/msr.rs", 42, "agent::msr");

        diag.emit_register(
            Verbosity::Develop,
            site,
            RegisterAccess::msr(3, 0x38F, 0x7000000FF),
            format_args!("SETUP_FIXED"),
        );

        assert_eq!(
            sink.lines(),
            vec!["DEBUG - [agent::msr:42] SETUP_FIXED [3] Register 0x38F , Flags: 0x7000000FF"]
        );
    }

    #[test]
    fn test_pci_register_line() {
        let (diag, sink) = diagnostics(Verbosity::Develop);
        let site = Site::new("src/pci.rs", 7, "agent::pci");

        diag.emit_register(
            Verbosity::Develop,
            site,
            RegisterAccess::pci(0, 2, 0xD8, 0x10),
            format_args!("RESET_CTR"),
        );

        assert_eq!(
            sink.lines(),
            vec!["DEBUG - [agent::pci:7] RESET_CTR [0] Device 2 Register 0xD8 , Flags: 0x10"]
        );
    }

    #[test]
    fn test_register_line_gated() {
        let (diag, sink) = diagnostics(Verbosity::Detail);
        diag.emit_register(
            Verbosity::Develop,
            crate::site!(),
            RegisterAccess::msr(0, 0x10, 0),
            format_args!("TSC"),
        );
        assert!(sink.lines().is_empty());
    }
}
