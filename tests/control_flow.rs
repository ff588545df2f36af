//! P5: call/ret round-trips EIP through the full fetch-decode-execute loop.

use ia32vm::{DecodedInst, Decoder};

#[test]
fn call_rel_then_ret_returns_to_the_following_instruction() {
    // call +5 ; nop ; nop ; nop ; nop ; nop (callee) ; ret
    let code = [
        0xE8, 0x01, 0x00, 0x00, 0x00, // call +1 -> callee at offset 10
        0x90, 0x90, 0x90, 0x90, // padding, never executed
        0xC3, // callee: ret
    ];
    let mut cpu = ia32vm::Cpu::new(64);
    cpu.regs.set_sp(64);
    cpu.memory.set(0, &code, 0).unwrap();
    cpu.regs.eip = 0;

    // Step through: call (eip -> 10), ret (eip -> 5, esp restored)
    for _ in 0..2 {
        let inst: DecodedInst = Decoder::decode(&cpu.memory, &cpu.regs, cpu.regs.eip).unwrap();
        ia32vm::executor::execute(&mut cpu, &inst).unwrap();
    }

    assert_eq!(cpu.regs.eip, 5);
    assert_eq!(cpu.regs.sp(), 64);
}

#[test]
fn jcc_chain_skips_or_falls_through_by_condition() {
    // mov eax,0 ; cmp eax,0 ; je +1 ; mov ebx,0xFF (skipped) ; mov ecx,1
    let code = [
        0xB8, 0x00, 0x00, 0x00, 0x00, // mov eax,0
        0x83, 0xF8, 0x00, // cmp eax,0
        0x74, 0x05, // je +5 (skips the 5-byte mov ebx)
        0xBB, 0xFF, 0x00, 0x00, 0x00, // mov ebx,0xFF (skipped)
        0xB9, 0x01, 0x00, 0x00, 0x00, // mov ecx,1
    ];
    let mut cpu = ia32vm::Cpu::new(64);
    cpu.memory.set(0, &code, 0).unwrap();
    cpu.regs.eip = 0;

    for _ in 0..4 {
        let inst: DecodedInst = Decoder::decode(&cpu.memory, &cpu.regs, cpu.regs.eip).unwrap();
        ia32vm::executor::execute(&mut cpu, &inst).unwrap();
    }

    assert_eq!(cpu.regs.read_gpr32(3), 0); // ebx never touched
    assert_eq!(cpu.regs.read_gpr32(1), 1); // ecx
}
