//! Text front end over the kernel context.
//!
//! Each command parses its arguments, calls one kernel operation and formats
//! the outcome into any [`fmt::Write`]. Failures are reported as text; the
//! only `Err` a command returns is a failed write.

use crate::kernel::Kernel;
use core::fmt::{self, Write};
use kernel_alloc::HeapError;
use kernel_info::process::MAX_PROCESSES;
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};
use kernel_proc::{ContextSwitch, Pid, ProcessError};
use kernel_vmem::PhysMapper;

/// Commands understood by [`execute`], for `help`.
pub const COMMANDS: &[(&str, &str)] = &[
    ("ps", "List processes"),
    ("kill <pid>", "Terminate a process"),
    ("priority <pid> <level>", "Set a process priority (1-4)"),
    ("malloc <size>", "Allocate kernel heap memory"),
    ("free <addr>", "Free kernel heap memory (hex address)"),
    ("memory", "Show memory usage"),
    ("memmap", "Show heap blocks and page tables"),
    ("help", "Show this list"),
];

/// Run one command line.
///
/// Returns `false` for an unknown command, after printing a hint.
///
/// # Errors
/// Only if writing to `out` fails.
pub fn execute<M, C, W>(kernel: &mut Kernel<M, C>, line: &str, out: &mut W) -> Result<bool, fmt::Error>
where
    M: PhysMapper,
    C: ContextSwitch,
    W: Write,
{
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(true);
    };
    let mut args = [""; 3];
    let mut argc = 0;
    for (slot, word) in args.iter_mut().zip(words) {
        *slot = word;
        argc += 1;
    }
    let args = &args[..argc];

    match command {
        "ps" => ps(kernel, out)?,
        "kill" => kill(kernel, args, out)?,
        "priority" => priority(kernel, args, out)?,
        "malloc" => malloc(kernel, args, out)?,
        "free" => free(kernel, args, out)?,
        "memory" => memory(kernel, out)?,
        "memmap" => memmap(kernel, out)?,
        "help" => help(out)?,
        other => {
            writeln!(out, "Unknown command: {other}")?;
            writeln!(out, "Type 'help' for a list of commands")?;
            return Ok(false);
        }
    }
    Ok(true)
}

fn help(out: &mut impl Write) -> fmt::Result {
    writeln!(out, "Available commands:")?;
    for (usage, what) in COMMANDS {
        writeln!(out, "  {usage:<24} {what}")?;
    }
    Ok(())
}

fn parse_decimal(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_hex(s: &str) -> Option<u32> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

fn ps<M: PhysMapper, C: ContextSwitch>(kernel: &Kernel<M, C>, out: &mut impl Write) -> fmt::Result {
    writeln!(out, "Process List:")?;
    writeln!(out, "PID | Name                | State     | Priority  | CPU Time")?;
    writeln!(out, "----|---------------------|-----------|-----------|---------")?;
    let mut count = 0;
    for pcb in kernel.scheduler().list(MAX_PROCESSES) {
        let name = pcb.name().as_str();
        let name = name.get(..20).unwrap_or(name);
        writeln!(
            out,
            "{:<3} | {:<20}| {:<9} | {:<9} | {}",
            pcb.pid().as_u32(),
            name,
            pcb.state().as_str(),
            pcb.priority().as_str(),
            pcb.cpu_time()
        )?;
        count += 1;
    }
    writeln!(out, "Total processes: {count}")
}

fn kill<M: PhysMapper, C: ContextSwitch>(
    kernel: &mut Kernel<M, C>,
    args: &[&str],
    out: &mut impl Write,
) -> fmt::Result {
    let [pid] = args else {
        return writeln!(out, "Usage: kill <pid>");
    };
    let Some(pid) = parse_decimal(pid).map(Pid::new) else {
        return writeln!(out, "Invalid PID format");
    };
    if pid.is_idle() {
        return writeln!(out, "Cannot kill idle process (PID 0)");
    }
    match kernel.kill(pid) {
        Ok(()) => writeln!(out, "Process killed successfully"),
        Err(ProcessError::NotFound(_)) => writeln!(out, "Process not found"),
        Err(e) => writeln!(out, "Failed to kill process: {e}"),
    }
}

fn priority<M: PhysMapper, C: ContextSwitch>(
    kernel: &mut Kernel<M, C>,
    args: &[&str],
    out: &mut impl Write,
) -> fmt::Result {
    let [pid, level] = args else {
        writeln!(out, "Usage: priority <pid> <level>")?;
        return writeln!(out, "Levels: 1=Low, 2=Normal, 3=High, 4=Critical");
    };
    let Some(pid) = parse_decimal(pid).map(Pid::new) else {
        return writeln!(out, "Invalid PID format");
    };
    let Some(level) = parse_decimal(level) else {
        return writeln!(out, "Invalid priority level format");
    };
    if !(1..=4).contains(&level) {
        return writeln!(out, "Priority level must be 1-4");
    }
    match kernel.scheduler_mut().set_priority(pid, level) {
        Ok(()) => writeln!(out, "Process priority updated successfully"),
        Err(ProcessError::NotFound(_)) => writeln!(out, "Process not found"),
        Err(e) => writeln!(out, "Failed to set priority: {e}"),
    }
}

fn malloc<M: PhysMapper, C: ContextSwitch>(
    kernel: &mut Kernel<M, C>,
    args: &[&str],
    out: &mut impl Write,
) -> fmt::Result {
    let [size] = args else {
        return writeln!(out, "Usage: malloc <size_in_bytes>");
    };
    let Some(size) = parse_decimal(size) else {
        return writeln!(out, "Invalid size format!");
    };
    match kernel.kmalloc(size) {
        Ok(addr) => writeln!(out, "Allocated {size} bytes at address: {:#010x}", addr.as_u32()),
        Err(HeapError::ZeroSize) => writeln!(out, "Size must be greater than 0!"),
        Err(_) => writeln!(out, "Memory allocation failed!"),
    }
}

fn free<M: PhysMapper, C: ContextSwitch>(
    kernel: &mut Kernel<M, C>,
    args: &[&str],
    out: &mut impl Write,
) -> fmt::Result {
    let [addr] = args else {
        return writeln!(out, "Usage: free <address>");
    };
    let Some(addr) = parse_hex(addr) else {
        return writeln!(out, "Invalid address format!");
    };
    match kernel.kfree(VirtualAddress::new(addr)) {
        Ok(size) => writeln!(out, "Freed memory at address: {addr:#010x} ({size} bytes)"),
        Err(e) => writeln!(out, "Free failed: {e}"),
    }
}

fn memory<M: PhysMapper, C: ContextSwitch>(kernel: &Kernel<M, C>, out: &mut impl Write) -> fmt::Result {
    let report = kernel.memory_report();
    let kib = |frames: u32| u64::from(frames) * u64::from(PAGE_SIZE) / 1024;

    writeln!(out, "=== Memory Information ===")?;
    writeln!(out, "Total Memory: {} KB", kib(report.total_frames))?;
    writeln!(out, "Used Memory:  {} KB", kib(report.used_frames()))?;
    writeln!(out, "Free Memory:  {} KB", kib(report.free_frames))?;
    writeln!(out, "Page Allocations:   {}", report.frame_stats.allocations)?;
    writeln!(out, "Page Deallocations: {}", report.frame_stats.deallocations)?;
    writeln!(out, "Page Tables: {}", report.page_tables)?;
    writeln!(
        out,
        "Paging: {}",
        if report.paging_enabled { "enabled" } else { "disabled" }
    )?;
    writeln!(out, "=== Kernel Heap ===")?;
    writeln!(
        out,
        "Heap Window: {:#010x} - {:#010x}",
        report.heap_start.as_u32(),
        report.heap_start.as_u32() + report.heap_size
    )?;
    writeln!(out, "Heap Used: {} bytes", report.heap_used)?;
    writeln!(out, "Heap Free: {} bytes", report.heap_free)?;
    writeln!(out, "Largest Free Block: {} bytes", report.heap_largest_free)?;
    writeln!(out, "Heap Blocks: {}", report.heap_blocks)?;
    writeln!(
        out,
        "Heap Allocations: {} ({} failed), Frees: {}",
        report.heap_stats.allocations, report.heap_stats.failed_allocations, report.heap_stats.frees
    )
}

fn memmap<M: PhysMapper, C: ContextSwitch>(kernel: &Kernel<M, C>, out: &mut impl Write) -> fmt::Result {
    writeln!(out, "=== Memory Map ===")?;
    writeln!(out, "Heap blocks:")?;
    for block in kernel.heap_blocks() {
        writeln!(
            out,
            "  {:#010x}  {:>8} bytes  {}",
            block.start.as_u32(),
            block.size,
            block.tag.as_str()
        )?;
    }
    writeln!(out, "Page tables:")?;
    for table in kernel.page_tables() {
        writeln!(
            out,
            "  {:#010x} -> table at {:#010x}, {} pages present",
            table.base.as_u32(),
            table.frame.base().as_u32(),
            table.present_pages
        )?;
    }
    Ok(())
}
