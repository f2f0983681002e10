use x86_64::instructions::port::Port;

use super::ToneOutput;
use crate::timer::pit_divisor;

const PIT_CHANNEL2_PORT: u16 = 0x42;
const PIT_COMMAND_PORT: u16 = 0x43;
const SPEAKER_GATE_PORT: u16 = 0x61;
// チャネル2、square waveモード、low/highバイト両方
const PIT_CHANNEL2_SQUARE_WAVE: u8 = 0xB6;
// bit0: PIT ch2 gate, bit1: speaker data
const SPEAKER_ENABLE_BITS: u8 = 0b11;

/// PC speaker driven by PIT channel 2.
pub struct PcSpeaker {
    command: Port<u8>,
    channel2: Port<u8>,
    gate: Port<u8>,
}

impl PcSpeaker {
    pub const fn new() -> Self {
        Self {
            command: Port::new(PIT_COMMAND_PORT),
            channel2: Port::new(PIT_CHANNEL2_PORT),
            gate: Port::new(SPEAKER_GATE_PORT),
        }
    }
}

impl Default for PcSpeaker {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneOutput for PcSpeaker {
    fn start_tone(&mut self, frequency: u32) {
        let divisor = pit_divisor(frequency);

        unsafe {
            self.command.write(PIT_CHANNEL2_SQUARE_WAVE);
            self.channel2.write((divisor & 0xFF) as u8);
            self.channel2.write((divisor >> 8) as u8);

            let gate = self.gate.read();
            if gate & SPEAKER_ENABLE_BITS != SPEAKER_ENABLE_BITS {
                self.gate.write(gate | SPEAKER_ENABLE_BITS);
            }
        }
    }

    fn stop_tone(&mut self) {
        unsafe {
            let gate = self.gate.read();
            self.gate.write(gate & !SPEAKER_ENABLE_BITS);
        }
    }
}
