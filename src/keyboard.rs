//! PS/2 keyboard input.
//!
//! `translate` is pure: each call decodes the byte with a fresh scan-code
//! state machine and default modifiers, so the same byte always gives the
//! same answer. Shift/caps state is not tracked.

use core::sync::atomic::{AtomicBool, Ordering};

use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, KeyboardLayout, ScancodeSet1};
use x86_64::instructions::port::Port;

use crate::console::Console;
use crate::interrupts::registry::{InterruptContext, InterruptHandler};

pub const PS2_DATA_PORT: u16 = 0x60;
/// Set 1 prefix for the grey cursor/editing keys
pub const EXTENDED_PREFIX: u8 = 0xE0;

/// Scan code set 1 on a US 104-key layout.
pub fn translate(scancode: u8) -> Option<char> {
    translate_with(layouts::Us104Key, scancode)
}

pub fn translate_with<L: KeyboardLayout>(layout: L, scancode: u8) -> Option<char> {
    let mut keyboard = Keyboard::new(ScancodeSet1::new(), layout, HandleControl::Ignore);
    // 0xE0 などのプレフィックスは単体ではイベントにならない
    let event = keyboard.add_byte(scancode).ok().flatten()?;
    match keyboard.process_keyevent(event)? {
        DecodedKey::Unicode(character) if is_printable(character) => Some(character),
        _ => None,
    }
}

fn is_printable(character: char) -> bool {
    character == '\n' || !character.is_control()
}

/// Where the keyboard handler reads its byte from.
pub trait ScancodeSource: Sync {
    fn read_scancode(&self) -> u8;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ps2DataPort;

impl ScancodeSource for Ps2DataPort {
    fn read_scancode(&self) -> u8 {
        let mut port = Port::<u8>::new(PS2_DATA_PORT);
        unsafe { port.read() }
    }
}

/// IRQ1 handler: read, translate, echo.
///
/// The byte after an 0xE0 prefix is dropped. Translated on its own it would
/// come out as the numpad key sharing its code (Up arrow as '8').
pub struct KeyboardHandler<'c, S: ScancodeSource> {
    source: S,
    console: &'c dyn Console,
    extended_pending: AtomicBool,
}

impl<'c, S: ScancodeSource> KeyboardHandler<'c, S> {
    pub const fn new(source: S, console: &'c dyn Console) -> Self {
        Self {
            source,
            console,
            extended_pending: AtomicBool::new(false),
        }
    }
}

impl<S: ScancodeSource> InterruptHandler for KeyboardHandler<'_, S> {
    fn handle(&self, _context: &InterruptContext) {
        // バイトは必ず読む。読まないとコントローラが次を送ってこない
        let scancode = self.source.read_scancode();
        if scancode == EXTENDED_PREFIX {
            self.extended_pending.store(true, Ordering::SeqCst);
            return;
        }
        if self.extended_pending.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(character) = translate(scancode) {
            self.console.print(format_args!("{}", character));
        }
    }
}
