//! Keypad input (KEYINPUT at `0x0400_0130`, KEYCNT at `0x0400_0132`).
//!
//! KEYINPUT is active low: a cleared bit means the key is held down. KEYCNT
//! selects a subset of keys (bits 0-9), enables the interrupt (bit 14) and
//! picks how the selection is matched (bit 15):
//!
//! | Bit 15 | Condition                                   |
//! |--------|---------------------------------------------|
//! | 0      | any selected key pressed (logical OR)       |
//! | 1      | every selected key pressed (logical AND)    |

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::interrupt_control::{Interrupt, IrqHandle};

/// All 10 keys released.
pub const KEYS_RELEASED: u16 = 0x03FF;

/// GBA button bit positions in KEYINPUT register (when pressed are set to 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GbaButton {
    A = 1 << 0,
    B = 1 << 1,
    Select = 1 << 2,
    Start = 1 << 3,
    Right = 1 << 4,
    Left = 1 << 5,
    Up = 1 << 6,
    Down = 1 << 7,
    R = 1 << 8,
    L = 1 << 9,
}

impl GbaButton {
    #[must_use]
    pub const fn mask(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCondition {
    Any,
    All,
}

impl From<bool> for KeyCondition {
    fn from(value: bool) -> Self {
        if value { Self::All } else { Self::Any }
    }
}

/// Evaluates the KEYCNT condition against a released-key mask.
///
/// Only pressed keys (cleared bits in `released`) count toward the match. An
/// empty selection never matches.
#[must_use]
pub fn condition_met(released: u16, selected: u16, condition: KeyCondition) -> bool {
    let selected = selected & KEYS_RELEASED;
    let pressed = !released & selected;

    match condition {
        KeyCondition::Any => pressed != 0,
        KeyCondition::All => selected != 0 && pressed == selected,
    }
}

#[derive(Debug)]
pub struct Keypad {
    key_input: u16,
    key_interrupt_control: u16,
    irq: IrqHandle,
}

impl Keypad {
    /// Create a new Keypad with all buttons released (all bits set to 1).
    #[must_use]
    pub const fn new(irq: IrqHandle) -> Self {
        Self {
            key_input: KEYS_RELEASED,
            key_interrupt_control: 0,
            irq,
        }
    }

    #[must_use]
    pub const fn key_input(&self) -> u16 {
        self.key_input
    }

    /// Set button state: pressed = true, released = false.
    pub fn set_button(&mut self, button: GbaButton, pressed: bool) {
        let mut released = self.key_input;
        if pressed {
            released &= !button.mask();
        } else {
            released |= button.mask();
        }
        self.set_key_input(released);
    }

    /// Replaces the whole released-key mask at once.
    pub fn set_key_input(&mut self, released: u16) {
        let released = released & KEYS_RELEASED;
        if released != self.key_input {
            self.key_input = released;
            self.check_interrupt();
        }
    }

    #[must_use]
    pub fn condition(&self) -> KeyCondition {
        KeyCondition::from(self.key_interrupt_control.get_bit(15))
    }

    fn check_interrupt(&self) {
        if self.key_interrupt_control.get_bit(14)
            && condition_met(
                self.key_input,
                self.key_interrupt_control,
                self.condition(),
            )
        {
            self.irq.request(Interrupt::Keypad);
        }
    }

    /// `offset` is relative to KEYINPUT.
    #[must_use]
    pub fn read_register(&self, offset: u32) -> u8 {
        match offset {
            0 => self.key_input.get_byte(0),
            1 => self.key_input.get_byte(1),
            2 => self.key_interrupt_control.get_byte(0),
            3 => self.key_interrupt_control.get_byte(1),
            _ => 0,
        }
    }

    /// KEYINPUT is read only.
    pub fn write_register(&mut self, offset: u32, value: u8) {
        match offset {
            2 | 3 => {
                self.key_interrupt_control
                    .set_byte((offset & 1) as u8, value);
                self.key_interrupt_control &= 0xC3FF;
                self.check_interrupt();
            }
            _ => tracing::debug!("write to read-only KEYINPUT byte {offset}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::interrupt_control::InterruptControl;
    use pretty_assertions::assert_eq;

    #[test]
    fn any_and_all_strategies() {
        let selected = GbaButton::A.mask() | GbaButton::B.mask();

        assert!(!condition_met(KEYS_RELEASED, selected, KeyCondition::Any));
        assert!(!condition_met(KEYS_RELEASED, selected, KeyCondition::All));

        let a_pressed = KEYS_RELEASED & !GbaButton::A.mask();
        assert!(condition_met(a_pressed, selected, KeyCondition::Any));
        assert!(!condition_met(a_pressed, selected, KeyCondition::All));

        let both_pressed = a_pressed & !GbaButton::B.mask();
        assert!(condition_met(both_pressed, selected, KeyCondition::All));
    }

    #[test]
    fn empty_selection_never_matches() {
        assert!(!condition_met(0, 0, KeyCondition::Any));
        assert!(!condition_met(0, 0, KeyCondition::All));
    }

    #[test]
    fn set_button_is_active_low() {
        let control = InterruptControl::new();
        let mut keypad = Keypad::new(control.handle());

        keypad.set_button(GbaButton::Start, true);
        assert_eq!(keypad.key_input(), 0x03F7);
        assert_eq!(keypad.read_register(0), 0xF7);

        keypad.set_button(GbaButton::Start, false);
        assert_eq!(keypad.key_input(), KEYS_RELEASED);
    }

    #[test]
    fn interrupt_only_when_enabled() {
        let control = InterruptControl::new();
        let mut keypad = Keypad::new(control.handle());

        // Select A, AND strategy, irq disabled.
        keypad.write_register(2, 0x01);
        keypad.write_register(3, 0x80);
        keypad.set_button(GbaButton::A, true);
        assert_eq!(control.pending(), 0);

        // Enabling the irq re-evaluates the condition immediately.
        keypad.write_register(3, 0xC0);
        assert_eq!(control.pending(), Interrupt::Keypad.mask());
        assert_eq!(keypad.condition(), KeyCondition::All);
    }

    #[test]
    fn all_strategy_waits_for_every_key() {
        let control = InterruptControl::new();
        let mut keypad = Keypad::new(control.handle());
        keypad.write_register(2, 0x03);
        keypad.write_register(3, 0xC0);

        keypad.set_button(GbaButton::A, true);
        assert_eq!(control.pending(), 0);

        keypad.set_button(GbaButton::B, true);
        assert_eq!(control.pending(), Interrupt::Keypad.mask());
    }
}
