use pmdiag::{diag, site, Diagnostics, Verbosity};

use crate::common::Msr;

pub const MSR_RAPL_POWER_UNIT: u64 = 0x606;
pub const MSR_PKG_ENERGY_STATUS: u64 = 0x611;
pub const MSR_PP0_ENERGY_STATUS: u64 = 0x639;
pub const MSR_DRAM_ENERGY_STATUS: u64 = 0x619;

/// The energy status counters are 32 bits wide
const ENERGY_COUNTER_MASK: u64 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerDomain {
    Package,
    Core,
    Dram,
}

impl PowerDomain {
    pub fn name(&self) -> &'static str {
        match self {
            PowerDomain::Package => "PKG",
            PowerDomain::Core => "PP0",
            PowerDomain::Dram => "DRAM",
        }
    }

    pub fn status_register(&self) -> u64 {
        match self {
            PowerDomain::Package => MSR_PKG_ENERGY_STATUS,
            PowerDomain::Core => MSR_PP0_ENERGY_STATUS,
            PowerDomain::Dram => MSR_DRAM_ENERGY_STATUS,
        }
    }

    pub fn all() -> Vec<PowerDomain> {
        vec![PowerDomain::Package, PowerDomain::Core, PowerDomain::Dram]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RaplData {
    pub package_energy: f64,
    pub core_energy: f64,
    pub dram_energy: f64,
}

/// Energy readings of one socket through a representative CPU
pub struct RaplMonitor<'a> {
    msr: &'a Msr,
    diag: &'a Diagnostics,
    cpu: u32,
    energy_unit: f64,
}

impl<'a> RaplMonitor<'a> {
    pub fn new(msr: &'a Msr, diag: &'a Diagnostics, cpu: u32) -> pmdiag::Result<Self> {
        let rapl_unit = diag.check_power_read(site!(), || msr.read(cpu, MSR_RAPL_POWER_UNIT))?;
        let energy_unit = energy_unit(rapl_unit);

        diag!(
            in diag,
            Verbosity::Info,
            "RAPL energy unit on CPU {cpu}: {energy_unit:e} J"
        );

        Ok(Self {
            msr,
            diag,
            cpu,
            energy_unit,
        })
    }

    pub fn energy_unit(&self) -> f64 {
        self.energy_unit
    }

    /// Raw 32-bit counter value of `domain`
    pub fn read_raw(&self, domain: PowerDomain) -> pmdiag::Result<u64> {
        let raw = self.diag.check_power_read(site!(), || {
            self.msr.read(self.cpu, domain.status_register())
        })?;
        Ok(raw & ENERGY_COUNTER_MASK)
    }

    /// Energy consumed by `domain` since the counter last wrapped, in joules
    pub fn read_energy(&self, domain: PowerDomain) -> pmdiag::Result<f64> {
        Ok(self.read_raw(domain)? as f64 * self.energy_unit)
    }

    pub fn get_current_energy(&self) -> pmdiag::Result<RaplData> {
        Ok(RaplData {
            package_energy: self.read_energy(PowerDomain::Package)?,
            core_energy: self.read_energy(PowerDomain::Core)?,
            dram_energy: self.read_energy(PowerDomain::Dram)?,
        })
    }

    /// Joules between two raw readings, accounting for one counter wrap
    pub fn energy_delta(&self, before: u64, after: u64) -> f64 {
        raw_delta(before, after) as f64 * self.energy_unit
    }
}

/// Energy status unit: 1 / 2^ESU joules, ESU in bits 12:8
pub fn energy_unit(rapl_unit: u64) -> f64 {
    1.0 / (1u64 << ((rapl_unit >> 8) & 0x1F)) as f64
}

fn raw_delta(before: u64, after: u64) -> u64 {
    let before = before & ENERGY_COUNTER_MASK;
    let after = after & ENERGY_COUNTER_MASK;
    if after >= before {
        after - before
    } else {
        after + (ENERGY_COUNTER_MASK + 1) - before
    }
}
