use anyhow::Context;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;

use pmdiag::check::{MSR_READ_FAILED, MSR_WRITE_FAILED, PCI_READ_FAILED, PCI_WRITE_FAILED};
use pmdiag::{diag, site, DiagConfig, DiagError, Diagnostics, SinkKind, Verbosity};
use pmdiag_agent::{
    AgentConfig, AgentError, Msr, Pci, PciAddress, PowerDomain, RaplMonitor, ThermalMonitor,
};

#[derive(Parser, Debug)]
#[command(name = "pmdiag")]
#[command(about = "Read and write MSR/PCI registers with diagnosable failures")]
struct Args {
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase diagnostic detail (-v info, -vv detail, -vvv develop: every register access)"
    )]
    verbose: u8,

    #[arg(long, help = "Route diagnostic lines through tracing instead of stdout/stderr")]
    tracing: bool,

    #[arg(
        long,
        help = "Treat any register access failure as fatal: report, finalize and exit immediately"
    )]
    fatal: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read an MSR on one or more CPUs
    ReadMsr {
        #[arg(long, default_value = "0", help = "CPU list, e.g. 0-3,8")]
        cpu: String,
        #[arg(long, value_parser = parse_u64)]
        reg: u64,
    },
    /// Write an MSR on one or more CPUs
    WriteMsr {
        #[arg(long, default_value = "0", help = "CPU list, e.g. 0-3,8")]
        cpu: String,
        #[arg(long, value_parser = parse_u64)]
        reg: u64,
        #[arg(long, value_parser = parse_u64)]
        value: u64,
    },
    /// Read a 32-bit PCI configuration register
    ReadPci {
        #[arg(long, help = "PCI address as [segment:]bus:device.function")]
        address: String,
        #[arg(long, value_parser = parse_u32)]
        offset: u32,
    },
    /// Write a 32-bit PCI configuration register
    WritePci {
        #[arg(long, help = "PCI address as [segment:]bus:device.function")]
        address: String,
        #[arg(long, value_parser = parse_u32)]
        offset: u32,
        #[arg(long, value_parser = parse_u32)]
        value: u32,
    },
    /// Print RAPL energy counters of a CPU's package
    Power {
        #[arg(long, default_value_t = 0)]
        cpu: u32,
        #[arg(
            long,
            default_value_t = 0,
            help = "Sample twice this many milliseconds apart and print average power"
        )]
        interval_ms: u64,
    },
    /// Print core temperatures
    Temp {
        #[arg(long, default_value = "0", help = "CPU list, e.g. 0-3,8")]
        cpu: String,
    },
}

/// Parse a number given in hex (`0x` prefix) or decimal
fn parse_u64(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let value = parse_u64(s)?;
    u32::try_from(value).map_err(|_| format!("'{s}' does not fit in 32 bits"))
}

fn parse_cpus(list: &str) -> pmdiag_agent::Result<Vec<u32>> {
    AgentConfig::parse_cpu_list(list)
        .ok_or_else(|| AgentError::ParseError(format!("invalid CPU list '{list}'")))
}

fn run(args: &Args, diag: &Diagnostics) -> anyhow::Result<()> {
    let msr = Msr::instance();
    let pci = Pci::instance();

    match &args.command {
        Command::ReadMsr { cpu, reg } => {
            for cpu in parse_cpus(cpu)? {
                let value = if args.fatal {
                    diag.check_fatal(site!(), || msr.read(cpu, *reg), MSR_READ_FAILED)
                } else {
                    msr.read_checked(diag, cpu, *reg)
                        .with_context(|| format!("reading MSR 0x{reg:X} on CPU {cpu}"))?
                };
                println!("cpu {cpu} msr 0x{reg:X} = 0x{value:016X}");
            }
        }
        Command::WriteMsr { cpu, reg, value } => {
            for cpu in parse_cpus(cpu)? {
                if args.fatal {
                    diag.check_fatal(site!(), || msr.write(cpu, *reg, *value), MSR_WRITE_FAILED);
                } else {
                    msr.write_checked(diag, cpu, *reg, *value)
                        .with_context(|| format!("writing MSR 0x{reg:X} on CPU {cpu}"))?;
                }
                diag!(in diag, Verbosity::Info, "Wrote 0x{value:X} to MSR 0x{reg:X} on CPU {cpu}");
            }
        }
        Command::ReadPci { address, offset } => {
            let address: PciAddress = address.parse()?;
            let value = if args.fatal {
                diag.check_fatal(site!(), || pci.read32(address, *offset), PCI_READ_FAILED)
            } else {
                pci.read32_checked(diag, address, *offset)
                    .with_context(|| format!("reading PCI {address} offset 0x{offset:X}"))?
            };
            println!("pci {address} 0x{offset:X} = 0x{value:08X}");
        }
        Command::WritePci {
            address,
            offset,
            value,
        } => {
            let address: PciAddress = address.parse()?;
            if args.fatal {
                diag.check_fatal(site!(), || pci.write32(address, *offset, *value), PCI_WRITE_FAILED);
            } else {
                pci.write32_checked(diag, address, *offset, *value)
                    .with_context(|| format!("writing PCI {address} offset 0x{offset:X}"))?;
            }
            diag!(in diag, Verbosity::Info, "Wrote 0x{value:X} to PCI {address} offset 0x{offset:X}");
        }
        Command::Power { cpu, interval_ms } => {
            let monitor = RaplMonitor::new(msr, diag, *cpu)?;
            if *interval_ms == 0 {
                let energy = monitor.get_current_energy()?;
                println!("cpu {cpu} PKG energy {:.6} J", energy.package_energy);
                println!("cpu {cpu} PP0 energy {:.6} J", energy.core_energy);
                println!("cpu {cpu} DRAM energy {:.6} J", energy.dram_energy);
            } else {
                let before = PowerDomain::all()
                    .into_iter()
                    .map(|domain| monitor.read_raw(domain))
                    .collect::<pmdiag::Result<Vec<_>>>()?;
                std::thread::sleep(Duration::from_millis(*interval_ms));
                let seconds = *interval_ms as f64 / 1000.0;
                for (domain, before) in PowerDomain::all().into_iter().zip(before) {
                    let after = monitor.read_raw(domain)?;
                    let watts = monitor.energy_delta(before, after) / seconds;
                    println!("cpu {cpu} {} power {watts:.3} W", domain.name());
                }
            }
        }
        Command::Temp { cpu } => {
            for cpu in parse_cpus(cpu)? {
                let monitor = ThermalMonitor::new(msr, diag, cpu)?;
                println!("cpu {cpu} temperature {} C", monitor.read_celsius()?);
            }
        }
    }

    Ok(())
}

/// Register access failures are logged by the wrapper that caught them
fn already_reported(err: &anyhow::Error) -> bool {
    err.chain().any(|e| {
        matches!(e.downcast_ref::<DiagError>(), Some(DiagError::Io { .. }))
            || matches!(
                e.downcast_ref::<AgentError>(),
                Some(AgentError::Diag(DiagError::Io { .. }))
            )
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = DiagConfig::from_env();
    if args.verbose > 0 {
        config.verbosity = Verbosity::from_occurrences(args.verbose);
    }
    if args.tracing {
        config.sink = SinkKind::Tracing;
    }

    tracing_subscriber::fmt()
        .with_max_level(config.verbosity.tracing_level())
        .with_writer(std::io::stderr)
        .init();

    let diag = match pmdiag_agent::init(&config) {
        Ok(diag) => diag,
        Err(e) => {
            eprintln!("pmdiag: {e}");
            return ExitCode::FAILURE;
        }
    };

    diag!(in diag, Verbosity::Info, "Diagnostics enabled at level {}", config.verbosity);

    match run(&args, diag) {
        Ok(()) => {
            diag.finalize_all();
            ExitCode::SUCCESS
        }
        Err(err) if already_reported(&err) => {
            diag.finalize_all();
            diag.terminate()
        }
        Err(err) => {
            diag.report_plain(site!(), &format!("{err:#}"));
            diag.terminate()
        }
    }
}
