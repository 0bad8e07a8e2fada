//! Declarative macros capturing the call site for diagnostics

/// Capture the current file, line and module as a [`Site`](crate::Site)
///
/// # Example
/// ```
/// let site = pmdiag::site!();
/// assert!(site.line > 0);
/// assert!(site.file.ends_with(".rs"));
/// ```
#[macro_export]
macro_rules! site {
    () => {
        $crate::Site::new(file!(), line!(), module_path!())
    };
}

/// Emit a plain diagnostic when `$level` passes the verbosity gate
///
/// The gate is checked before the format arguments are evaluated, so a
/// suppressed call costs one atomic load.
///
/// # Example
/// ```
/// use pmdiag::{diag, Verbosity};
///
/// diag!(Verbosity::Info, "Opened {} MSR handles", 4);
///
/// // Against an explicit context
/// let ctx = pmdiag::Diagnostics::default();
/// diag!(in &ctx, Verbosity::Detail, "suppressed at the default level");
/// ```
#[macro_export]
macro_rules! diag {
    (in $ctx:expr, $level:expr, $($arg:tt)+) => {{
        let __ctx: &$crate::Diagnostics = $ctx;
        let __level: $crate::Verbosity = $level;
        if __ctx.enabled(__level) {
            __ctx.emit(__level, $crate::site!(), format_args!($($arg)+));
        }
    }};
    ($level:expr, $($arg:tt)+) => {
        $crate::diag!(in $crate::Diagnostics::global(), $level, $($arg)+)
    };
}

/// Emit a diagnostic annotated with an MSR address and bit pattern
///
/// # Example
/// ```ignore
/// diag_reg!(Verbosity::Develop, cpu, MSR_PERF_GLOBAL_CTRL, flags, "SETUP_GLOBAL_CTRL");
/// ```
#[macro_export]
macro_rules! diag_reg {
    (in $ctx:expr, $level:expr, $cpu:expr, $reg:expr, $flags:expr, $($arg:tt)+) => {{
        let __ctx: &$crate::Diagnostics = $ctx;
        let __level: $crate::Verbosity = $level;
        if __ctx.enabled(__level) {
            __ctx.emit_register(
                __level,
                $crate::site!(),
                $crate::RegisterAccess::msr($cpu, $reg, $flags),
                format_args!($($arg)+),
            );
        }
    }};
    ($level:expr, $cpu:expr, $reg:expr, $flags:expr, $($arg:tt)+) => {
        $crate::diag_reg!(in $crate::Diagnostics::global(), $level, $cpu, $reg, $flags, $($arg)+)
    };
}

/// Emit a diagnostic annotated with a PCI device, register offset and bit pattern
///
/// # Example
/// ```ignore
/// diag_pci_reg!(Verbosity::Develop, socket, device, offset, value, "PCI_WRITE");
/// ```
#[macro_export]
macro_rules! diag_pci_reg {
    (in $ctx:expr, $level:expr, $cpu:expr, $dev:expr, $reg:expr, $flags:expr, $($arg:tt)+) => {{
        let __ctx: &$crate::Diagnostics = $ctx;
        let __level: $crate::Verbosity = $level;
        if __ctx.enabled(__level) {
            __ctx.emit_register(
                __level,
                $crate::site!(),
                $crate::RegisterAccess::pci($cpu, $dev, $reg, $flags),
                format_args!($($arg)+),
            );
        }
    }};
    ($level:expr, $cpu:expr, $dev:expr, $reg:expr, $flags:expr, $($arg:tt)+) => {
        $crate::diag_pci_reg!(
            in $crate::Diagnostics::global(), $level, $cpu, $dev, $reg, $flags, $($arg)+
        )
    };
}
