//! ia32vm — a software interpreter for a documented subset of the IA-32
//! instruction set.
//!
//! Provides a flat, byte-addressable virtual machine executing 32-bit x86
//! machine code: the eight general-purpose registers and their 16/8-bit
//! aliases, EFLAGS, ModR/M + SIB operand decoding, and the move/arithmetic/
//! logical/shift/control/stack/string instruction categories an unhosted
//! straight-line program needs. A minimal Linux-like `int 0x80` syscall
//! gate (`exit`/`read`/`write`) is the only interface to the host.
//!
//! There is no segmentation, paging beyond a flat bounds check, FPU/MMX/SSE,
//! privileged instructions, or dynamic translation — see `SPEC_FULL.md` for
//! the full scope and rationale.
//!
//! # Architecture
//!
//! - **Decoder** (`decoder.rs`) — variable-length instruction decoding
//! - **Executor** (`executor/`) — instruction execution grouped by category
//! - **Memory** (`memory.rs`) — flat, bounds-checked guest RAM
//! - **Registers** (`registers.rs`) — GPRs, EIP, EFLAGS
//! - **CPU** (`cpu.rs`) — ties everything together in the fetch-decode-execute loop
//!
//! # Example
//!
//! ```no_run
//! use ia32vm::Cpu;
//!
//! let mut cpu = Cpu::new(1 << 16);
//! let program = [0xB8, 0x01, 0x00, 0x00, 0x00, 0xCD, 0x80]; // mov eax,1 ; int 0x80
//! cpu.execute_bytes(&program, 0).unwrap();
//! assert_eq!(cpu.exit_code, 0);
//! ```

pub mod cpu;
pub mod decoder;
pub mod error;
pub mod executor;
pub mod flags;
pub mod instruction;
pub mod memory;
pub mod registers;

pub use cpu::{Cpu, ExitReason};
pub use decoder::Decoder;
pub use error::{Result, VmError};
pub use flags::OperandSize;
pub use instruction::{DecodedInst, Operand};
pub use memory::Memory;
pub use registers::{GprIndex, RegisterFile};
