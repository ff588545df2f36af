//! Error types for ia32vm.
//!
//! `VmError` is both the Rust error type returned from fallible operations
//! and the fatal-condition taxonomy surfaced to the caller when the run
//! loop unwinds. There is no in-VM recovery: every variant here is fatal
//! except the I/O failures the syscall gate catches locally and reports
//! back to the guest as EAX=-1.

use thiserror::Error;

/// Errors generated during VM execution.
#[derive(Debug, Error)]
pub enum VmError {
    /// Memory access outside `[0, size)`. Fatal.
    #[error("bounds violation: access of {len} byte(s) at 0x{addr:08X} (memory size 0x{size:X}), at eip=0x{eip:08X}")]
    Bounds {
        addr: u64,
        len: usize,
        size: usize,
        eip: u32,
    },

    /// `pop` when ESP would leave memory bounds. A semantic subclass of
    /// `Bounds`, reported distinctly for diagnostic clarity.
    #[error("stack underflow: esp=0x{esp:08X} exceeds memory size 0x{size:X}, at eip=0x{eip:08X}")]
    StackUnderflow { esp: u32, size: usize, eip: u32 },

    /// No handler for the decoded opcode. Fatal.
    #[error("unknown opcode 0x{opcode:02X} at eip=0x{eip:08X}")]
    UnknownOpcode { opcode: u8, eip: u32 },

    /// `div`/`idiv` by zero or quotient overflow. Fatal.
    #[error("divide error at eip=0x{eip:08X}")]
    DivideError { eip: u32 },

    /// `int 0x80` with an EAX not in `{1, 3, 4}`. Fatal.
    #[error("unsupported syscall eax=0x{eax:08X} at eip=0x{eip:08X}")]
    UnsupportedSyscall { eax: u32, eip: u32 },

    /// Host stream read/write failed. Non-fatal: caught at the syscall
    /// gate and reported to the guest as EAX=-1.
    #[error("syscall i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for VM operations.
pub type Result<T> = std::result::Result<T, VmError>;
