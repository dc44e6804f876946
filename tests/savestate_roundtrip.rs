/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Tests that a saved machine, once restored, is indistinguishable from the
//! original: it serializes identically and keeps running identically.

extern crate chip8vm;

use std::env;
use std::fs;
use std::io::Cursor;

use chip8vm::emulator::Options;
use chip8vm::{Emulator, Register, SaveState};

/// A program that touches every part of the machine state: the display, the
/// random generator, the stack, both timers and memory.
static PROGRAM: &[u8] = &[
    0x60, 0x05, // 200: LD V0, #05
    0x61, 0x0A, // 202: LD V1, #0A
    0xF0, 0x29, // 204: LD F, V0
    0xD0, 0x15, // 206: DRW V0, V1, 5
    0xC1, 0xFF, // 208: RND V1, #FF
    0x22, 0x10, // 20A: CALL #210
    0x12, 0x0C, // 20C: JP #20C
    0x00, 0x00, // 20E
    0x72, 0x81, // 210: ADD V2, #81
    0xF2, 0x15, // 212: LD DT, V2
    0xF2, 0x18, // 214: LD ST, V2
    0xA3, 0x00, // 216: LD I, #300
    0xF2, 0x33, // 218: LD B, V2
    0xF2, 0x55, // 21A: LD [I], V2
    0xC4, 0xFF, // 21C: RND V4, #FF
    0x00, 0xEE, // 21E: RET
];

fn running_emulator(steps: usize) -> Emulator {
    let mut emulator = Emulator::new(Options::testing()).unwrap();
    emulator.load_rom(&mut Cursor::new(PROGRAM)).unwrap();
    for _ in 0..steps {
        emulator.step().unwrap();
    }
    emulator
}

fn step_all(emulators: &[&Emulator], steps: usize) {
    for emulator in emulators.iter() {
        for _ in 0..steps {
            emulator.step().unwrap();
        }
    }
}

#[test]
fn restored_machine_serializes_identically() {
    // Stop inside the subroutine, with a frame on the stack.
    let original = running_emulator(8);
    let text = original.save_state().to_string();

    let state = text.parse::<SaveState>().unwrap();
    let restored = Emulator::new(Options::testing()).unwrap();
    restored.load_state(&state).unwrap();

    assert_eq!(restored.save_state().to_string(), text);
    assert_eq!(restored.state(), original.state());
    assert_eq!(restored.display().to_string(), original.display().to_string());
}

#[test]
fn restored_machine_runs_identically() {
    let original = running_emulator(8);
    let restored = Emulator::new(Options::testing()).unwrap();
    restored.load_state(&original.save_state()).unwrap();

    // The rest of the subroutine includes another random draw.
    step_all(&[&original, &restored], 10);
    assert_eq!(
        restored.save_state().to_string(),
        original.save_state().to_string()
    );
    assert_eq!(
        restored.with_cpu(|cpu| cpu.register(Register::V4)),
        original.with_cpu(|cpu| cpu.register(Register::V4))
    );
    assert!(original.with_cpu(|cpu| cpu.stack().is_empty()));
}

#[test]
fn state_files() {
    let dir = env::temp_dir().join(format!("chip8vm-states-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let good = dir.join("good.state");
    let bad = dir.join("bad.state");

    let original = running_emulator(12);
    original.save_state_to(&good).unwrap();
    let text = fs::read_to_string(&good).unwrap();
    assert!(text.starts_with("v{1}\nc{12}\n"), "{}", text);

    let restored = running_emulator(3);
    restored.load_state_from(&good).unwrap();
    assert_eq!(restored.save_state(), original.save_state());

    // A damaged state is rejected and leaves the machine alone.
    fs::write(&bad, text.replace("r{", "r{1,")).unwrap();
    let before = restored.save_state();
    assert!(restored.load_state_from(&bad).is_err());
    assert!(restored.load_state_from(dir.join("missing.state")).is_err());
    assert_eq!(restored.save_state(), before);

    fs::remove_dir_all(&dir).unwrap();
}
