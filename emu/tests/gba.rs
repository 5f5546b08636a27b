//! Whole-system runs over hand-assembled cartridges.

use emu::{
    cpu::{
        cpu_modes::Mode,
        hardware::{
            internal_memory::BIOS_SIZE,
            interrupt_control::Interrupt,
            lcd::{CYCLES_PER_FRAME, CYCLES_PER_LINE},
        },
    },
    gba::{Gba, GbaConfig},
};
use pretty_assertions::assert_eq;

const BRANCH_TO_SELF: u32 = 0xEAFF_FFFE;

fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// System booted straight into `program`, with an IRQ handler that spins
/// at the vector.
fn booted(program: &[u32], config: GbaConfig) -> Gba {
    let mut bios = vec![0; BIOS_SIZE];
    bios[0x18..0x1C].copy_from_slice(&BRANCH_TO_SELF.to_le_bytes());
    let config = GbaConfig {
        skip_bios: true,
        ..config
    };

    Gba::new(bios, words_to_bytes(program), config).unwrap_or_else(|e| panic!("{e}"))
}

#[test]
fn branch_refills_the_pipeline() {
    let mut gba = booted(
        &[
            0xEA00_0004, // b 0x08000018
            0xE3A0_00FF, // mov r0, #0xFF (skipped)
            0,
            0,
            0,
            0,
            0xE3A0_0042, // mov r0, #0x42
            BRANCH_TO_SELF,
        ],
        GbaConfig::default(),
    );

    gba.step();
    assert_eq!(gba.cpu().current_instruction_address(), 0x0800_0018);
    assert_eq!(gba.cpu().registers.program_counter(), 0x0800_0020);

    gba.step();
    assert_eq!(gba.cpu().registers.register_at(0), 0x42);
}

#[test]
fn timer_overflow_reaches_the_irq_vector() {
    let mut gba = booted(
        &[
            0xE3A0_0301, // mov r0, #0x04000000
            0xE280_2C02, // add r2, r0, #0x200
            0xE3A0_1008, // mov r1, #8
            0xE582_1000, // str r1, [r2]       IE = timer 0
            0xE3A0_3001, // mov r3, #1
            0xE582_3008, // str r3, [r2, #8]   IME = 1
            0xE3A0_48C0, // mov r4, #0x00C00000
            0xE384_4CFF, // orr r4, r4, #0xFF00
            0xE384_40F0, // orr r4, r4, #0xF0
            0xE280_5C01, // add r5, r0, #0x100
            0xE585_4000, // str r4, [r5]       TM0 reload 0xFFF0, irq, start
            BRANCH_TO_SELF,
        ],
        GbaConfig::default(),
    );

    for _ in 0..200 {
        if gba.cpu().cpsr.mode() == Mode::Irq {
            break;
        }
        gba.step();
    }

    assert_eq!(gba.cpu().cpsr.mode(), Mode::Irq);
    assert!(gba.cpu().cpsr.irq_disable());
    assert_eq!(gba.cpu().spsr().mode(), Mode::System);
    assert_eq!(gba.cpu().current_instruction_address(), 0x18);
    assert_eq!(gba.cpu().registers.register_at(14), 0x0800_0030);
}

#[test]
fn halt_sleeps_until_vblank() {
    let mut gba = booted(
        &[
            0xE3A0_0301, // mov r0, #0x04000000
            0xE3A0_7008, // mov r7, #8
            0xE1C0_70B4, // strh r7, [r0, #4]     DISPSTAT vblank irq
            0xE280_2C02, // add r2, r0, #0x200
            0xE3A0_1001, // mov r1, #1
            0xE1C2_10B0, // strh r1, [r2]         IE = vblank
            0xE3A0_1000, // mov r1, #0
            0xE5C2_1101, // strb r1, [r2, #0x101] HALTCNT
            0xE3A0_6001, // mov r6, #1
            BRANCH_TO_SELF,
        ],
        GbaConfig::default(),
    );

    for _ in 0..8 {
        gba.step();
    }
    assert!(gba.cpu().is_halted());
    assert_eq!(gba.cpu().registers.register_at(6), 0);

    let mut steps = 0;
    while gba.cpu().is_halted() && steps < 10_000 {
        gba.step();
        steps += 1;
    }

    // IME is off: the core wakes up and carries on without taking the IRQ.
    assert_eq!(gba.cpu().registers.register_at(6), 1);
    assert_eq!(gba.cpu().cpsr.mode(), Mode::System);
    assert!(gba.cycles() >= 160 * CYCLES_PER_LINE);
    assert_eq!(
        gba.cpu().pending_interrupts() & Interrupt::VBlank.mask(),
        Interrupt::VBlank.mask()
    );
}

#[test]
fn frames_and_audio_keep_pace() {
    let config = GbaConfig {
        audio_buffer_len: 64,
        ..GbaConfig::default()
    };
    let mut gba = booted(&[BRANCH_TO_SELF], config);

    gba.run_frame();
    let frame = gba.run_frame();
    assert!(frame.abs_diff(CYCLES_PER_FRAME) < 32, "frame took {frame}");
    assert_eq!(gba.lcd().frames(), 2);

    let samples = gba.take_audio_samples();
    assert!(!samples.is_empty());
    assert_eq!(samples.len() % 64, 0);
    assert!(samples.iter().all(|s| s.left == 0 && s.right == 0));
}

#[test]
fn swi_after_skip_bios_uses_the_supervisor_stack() {
    let mut gba = booted(&[0xEF00_0000, BRANCH_TO_SELF], GbaConfig::default());

    gba.step();

    assert_eq!(gba.cpu().cpsr.mode(), Mode::Supervisor);
    assert_eq!(gba.cpu().registers.register_at(13), 0x0300_7FE0);
    assert_eq!(gba.cpu().registers.register_at(14), 0x0800_0004);
}
