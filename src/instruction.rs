//! Decoded x86 instruction representation.
//!
//! The decoder produces a `DecodedInst` that fully describes the
//! instruction: opcode, operands, prefix state, and sizes. The executor
//! consumes this struct to carry out the operation. Memory operands carry
//! an already-resolved effective address rather than unresolved
//! base/index/scale/displacement components — the decoder does that
//! arithmetic once, against the register file, so every handler reads a
//! uniform operand handle.

use crate::flags::OperandSize;

/// An x86 instruction fully decoded from its byte encoding.
#[derive(Debug, Clone)]
pub struct DecodedInst {
    /// Length of the encoded instruction in bytes.
    pub length: u8,

    /// Primary opcode byte (after any prefix bytes).
    /// Two-byte (`0F xx`) opcodes are stored as `0x0F00 | byte2`.
    pub opcode: u16,

    /// Operand size (32 bits by default, 16 with the `0x66` prefix).
    pub operand_size: OperandSize,

    /// Decoded operands. Up to two for this subset (three-operand `imul`
    /// is the only instruction using all three slots).
    pub operands: [Operand; 3],

    /// Number of valid operands.
    pub operand_count: u8,

    /// Prefix state (size override, REP/REPNE, LOCK).
    pub prefix: PrefixState,

    /// ModR/M byte if present.
    pub modrm: Option<u8>,

    /// Displacement value (sign-extended to i64), if the instruction had one.
    pub displacement: i64,

    /// REP/REPNE prefix for string operations.
    pub rep: RepPrefix,
}

impl DecodedInst {
    /// Create a zeroed instruction (used by the decoder as a starting point).
    pub fn empty() -> Self {
        DecodedInst {
            length: 0,
            opcode: 0,
            operand_size: OperandSize::Dword,
            operands: [Operand::None, Operand::None, Operand::None],
            operand_count: 0,
            prefix: PrefixState::default(),
            modrm: None,
            displacement: 0,
            rep: RepPrefix::None,
        }
    }

    /// ModR/M reg field (bits `[5:3]`).
    #[inline]
    pub fn modrm_reg(&self) -> u8 {
        self.modrm.map(|m| (m >> 3) & 7).unwrap_or(0)
    }

    /// ModR/M r/m field (bits `[2:0]`).
    #[inline]
    pub fn modrm_rm(&self) -> u8 {
        self.modrm.map(|m| m & 7).unwrap_or(0)
    }

    /// ModR/M mod field (bits `[7:6]`).
    #[inline]
    pub fn modrm_mod(&self) -> u8 {
        self.modrm.map(|m| (m >> 6) & 3).unwrap_or(0)
    }
}

/// Decoded prefix state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixState {
    /// Operand-size override (`0x66` prefix).
    pub operand_size_override: bool,
    /// Address-size override (`0x67` prefix). Decoded but unsupported: no
    /// instruction in this subset requires 16-bit addressing.
    pub address_size_override: bool,
    /// LOCK prefix (`0xF0`). Decoded and ignored — the core is
    /// single-threaded, so LOCK has no observable effect.
    pub lock: bool,
}

/// REP prefix type for string operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepPrefix {
    /// No REP prefix.
    #[default]
    None,
    /// REP/REPE prefix (`0xF3`).
    Rep,
    /// REPNE prefix (`0xF2`).
    Repne,
}

/// An instruction operand: the uniform handle every handler reads/writes
/// through, regardless of whether it names a register, a resolved memory
/// address, or an immediate.
#[derive(Debug, Clone, Copy)]
pub enum Operand {
    /// Unused operand slot.
    None,
    /// Register operand (3-bit encoding, high_byte selects AH/CH/DH/BH for
    /// byte width when the encoding is 4..7).
    Register { idx: u8, width: OperandSize },
    /// Memory operand with an already-resolved effective address.
    Memory { addr: u32, width: OperandSize },
    /// Immediate value.
    Immediate { value: u64, width: OperandSize },
    /// Relative displacement (for `jmp`/`jcc`/`call` — sign-extended).
    RelativeOffset(i32),
}
