use pmdiag::{diag, site, Diagnostics, Verbosity};

use crate::common::Msr;

pub const IA32_THERM_STATUS: u64 = 0x19C;
pub const MSR_TEMPERATURE_TARGET: u64 = 0x1A2;

const READING_VALID: u64 = 1 << 31;

/// Digital thermal sensor of one core
pub struct ThermalMonitor<'a> {
    msr: &'a Msr,
    diag: &'a Diagnostics,
    cpu: u32,
    tj_max: u32,
}

impl<'a> ThermalMonitor<'a> {
    pub fn new(msr: &'a Msr, diag: &'a Diagnostics, cpu: u32) -> pmdiag::Result<Self> {
        let target = diag.check_temp_read(site!(), || msr.read(cpu, MSR_TEMPERATURE_TARGET))?;
        let tj_max = tj_max(target);

        diag!(in diag, Verbosity::Info, "TjMax of CPU {cpu}: {tj_max} C");

        Ok(Self {
            msr,
            diag,
            cpu,
            tj_max,
        })
    }

    pub fn tj_max(&self) -> u32 {
        self.tj_max
    }

    /// Current core temperature in degrees Celsius
    pub fn read_celsius(&self) -> pmdiag::Result<u32> {
        let status = self
            .diag
            .check_temp_read(site!(), || self.msr.read(self.cpu, IA32_THERM_STATUS))?;

        if status & READING_VALID == 0 {
            diag!(
                in self.diag,
                Verbosity::Info,
                "Thermal reading of CPU {} not marked valid (0x{status:X})",
                self.cpu
            );
        }

        Ok(self.tj_max.saturating_sub(digital_readout(status)))
    }
}

/// TjMax in bits 23:16 of the temperature target
pub fn tj_max(target: u64) -> u32 {
    ((target >> 16) & 0xFF) as u32
}

/// Degrees below TjMax in bits 22:16 of the thermal status
pub fn digital_readout(status: u64) -> u32 {
    ((status >> 16) & 0x7F) as u32
}
