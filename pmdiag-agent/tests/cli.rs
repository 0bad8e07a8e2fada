mod common;

use std::process::{Command, Output};

use pmdiag_agent::config::DEVICE_ROOT_ENV;

use common::FakeDevices;

fn pmdiag(devices: &FakeDevices, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pmdiag"))
        .args(args)
        .env(DEVICE_ROOT_ENV, devices.root())
        .env_remove("PMDIAG_VERBOSITY")
        .env_remove("PMDIAG_SINK")
        .output()
        .unwrap()
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn test_read_msr_success() {
    let devices = FakeDevices::new("cli-read");
    devices.add_msr(0, 0x1000);
    devices.add_msr(1, 0x1000);
    devices.set_msr(0, 0x10, 0xCAFE);
    devices.set_msr(1, 0x10, 0xBEEF);

    let output = pmdiag(&devices, &["read-msr", "--cpu", "0-1", "--reg", "0x10"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("cpu 0 msr 0x10 = 0x000000000000CAFE"));
    assert!(stdout.contains("cpu 1 msr 0x10 = 0x000000000000BEEF"));
    assert!(!stdout.contains("DEBUG"));
}

#[test]
fn test_develop_traces_register_access() {
    let devices = FakeDevices::new("cli-develop");
    devices.add_msr(0, 0x1000);
    devices.set_msr(0, 0x186, 0x41003C);

    let output = pmdiag(&devices, &["-vvv", "read-msr", "--reg", "0x186"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("MSR read [0] Register 0x186 , Flags: 0x41003C"));
    // Clean shutdown also releases both subsystems
    assert_eq!(count(&stdout, "Finalized MSR subsystem, released 1 handles"), 1);
    assert_eq!(count(&stdout, "Finalized PCI subsystem, released 0 handles"), 1);
}

#[test]
fn test_write_msr_then_read_back() {
    let devices = FakeDevices::new("cli-write");
    devices.add_msr(3, 0x1000);

    let output = pmdiag(
        &devices,
        &["write-msr", "--cpu", "3", "--reg", "0x38F", "--value", "0x70000000F"],
    );
    assert!(output.status.success());
    assert_eq!(devices.get_msr(3, 0x38F), 0x7_0000_000F);
}

#[test]
fn test_propagated_failure_exits_nonzero() {
    let devices = FakeDevices::new("cli-propagate");

    let output = pmdiag(&devices, &["read-msr", "--cpu", "5", "--reg", "0x10"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(count(&stderr, "ERROR - ["), 1);
    assert_eq!(
        count(&stderr, "MSR read operation failed - No such file or directory"),
        1
    );
    assert!(output.stdout.is_empty());
}

#[test]
fn test_propagated_failure_finalizes_each_subsystem_once() {
    let devices = FakeDevices::new("cli-propagate-detail");
    devices.add_msr(0, 0x1000);

    let output = pmdiag(&devices, &["-vv", "read-msr", "--cpu", "0,6", "--reg", "0x10"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(count(&stderr, "ERROR - ["), 1);
    assert!(stdout.contains("cpu 0 msr 0x10"));
    assert_eq!(count(&stdout, "Finalized MSR subsystem, released 1 handles"), 1);
    assert_eq!(count(&stdout, "Finalized PCI subsystem, released 0 handles"), 1);
}

#[test]
fn test_tracing_sink_keeps_gate_output() {
    let devices = FakeDevices::new("cli-tracing");
    devices.add_msr(0, 0x1000);

    let output = pmdiag(&devices, &["--tracing", "-vv", "read-msr", "--reg", "0x10"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success());
    assert!(stderr.contains("Diagnostics enabled at level"));
    assert!(stderr.contains("Finalized MSR subsystem, released 1 handles"));
}

#[test]
fn test_huge_cpu_range_is_rejected() {
    let devices = FakeDevices::new("cli-huge-range");

    let output = pmdiag(&devices, &["read-msr", "--cpu", "0-4294967295", "--reg", "0x10"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(count(&stderr, "ERROR - ["), 1);
    assert!(stderr.contains("invalid CPU list '0-4294967295'"));
}

#[test]
fn test_fatal_wrapper_finalizes_each_subsystem_once() {
    let devices = FakeDevices::new("cli-fatal");

    let output = pmdiag(
        &devices,
        &["-vv", "--fatal", "read-msr", "--cpu", "7", "--reg", "0x10"],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(count(&stderr, "ERROR - ["), 1);
    assert!(stderr.contains("MSR read operation failed - No such file or directory"));
    assert_eq!(count(&stdout, "Finalized MSR subsystem, released 0 handles"), 1);
    assert_eq!(count(&stdout, "Finalized PCI subsystem, released 0 handles"), 1);
    assert!(!stdout.contains("cpu 7 msr"));
}

#[test]
fn test_fatal_after_partial_success_releases_open_handles() {
    let devices = FakeDevices::new("cli-fatal-partial");
    devices.add_msr(0, 0x1000);

    let output = pmdiag(
        &devices,
        &["-vv", "--fatal", "read-msr", "--cpu", "0,4", "--reg", "0x10"],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("cpu 0 msr 0x10"));
    assert_eq!(count(&stdout, "Finalized MSR subsystem, released 1 handles"), 1);
    assert_eq!(count(&stdout, "Finalized PCI subsystem"), 1);
}

#[test]
fn test_read_pci() {
    let devices = FakeDevices::new("cli-pci");
    let address = pmdiag_agent::PciAddress::new(0, 0x7f, 0x08, 2);
    devices.add_pci(address);
    devices.set_pci(address, 0x0, 0x2066_8086);

    let output = pmdiag(&devices, &["read-pci", "--address", "7f:08.2", "--offset", "0"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("pci 0000:7F:08.2 0x0 = 0x20668086"));
}

#[test]
fn test_bad_pci_address_is_reported() {
    let devices = FakeDevices::new("cli-bad-pci");

    let output = pmdiag(&devices, &["read-pci", "--address", "nonsense", "--offset", "0"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("invalid PCI address 'nonsense'"));
}
