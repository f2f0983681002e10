use core::sync::atomic::{AtomicU64, Ordering};
use x86_64::instructions::port::Port;

pub const PIT_FREQUENCY: u32 = 1193182; // PITの基本周波数
pub const TIMER_HZ: u32 = 100; // 1 tick = 10ms

const PIT_CHANNEL0_PORT: u16 = 0x40;
const PIT_COMMAND_PORT: u16 = 0x43;
// チャネル0、square waveモード、low/highバイト両方
const PIT_CHANNEL0_SQUARE_WAVE: u8 = 0x36;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// PIT 分周値。16bit に収まらない周波数は端に寄せる。
pub fn pit_divisor(frequency: u32) -> u16 {
    if frequency == 0 {
        return u16::MAX;
    }
    let divisor = PIT_FREQUENCY / frequency;
    divisor.clamp(1, u16::MAX as u32) as u16
}

pub const fn ms_to_ticks(ms: u32) -> u32 {
    ms.saturating_mul(TIMER_HZ).div_ceil(1000)
}

// PITを初期化してタイマー割り込みを開始
pub fn init() {
    let divisor = pit_divisor(TIMER_HZ);

    unsafe {
        let mut command_port = Port::<u8>::new(PIT_COMMAND_PORT);
        command_port.write(PIT_CHANNEL0_SQUARE_WAVE);

        let mut data_port = Port::<u8>::new(PIT_CHANNEL0_PORT);
        // 下位バイト
        data_port.write((divisor & 0xFF) as u8);
        // 上位バイト
        data_port.write((divisor >> 8) as u8);
    }

    crate::println!("TIMER: PIT initialized at {}Hz", TIMER_HZ);
}

/// タイマー割り込みから呼ばれる
pub fn increment_tick() -> u64 {
    TICKS.fetch_add(1, Ordering::Relaxed) + 1
}

pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// 次の tick まで眠る。割り込みが有効でないと戻らない。
pub fn wait_for_tick() {
    let start = ticks();
    while ticks() == start {
        crate::wait_for_interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_for_timer_rate() {
        assert_eq!(pit_divisor(TIMER_HZ), 11931);
    }

    #[test]
    fn divisor_is_clamped() {
        assert_eq!(pit_divisor(0), u16::MAX);
        assert_eq!(pit_divisor(1), u16::MAX);
        assert_eq!(pit_divisor(PIT_FREQUENCY * 2), 1);
        assert_eq!(pit_divisor(440), 2711);
    }

    #[test]
    fn milliseconds_round_up_to_whole_ticks() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(10), 1);
        assert_eq!(ms_to_ticks(15), 2);
        assert_eq!(ms_to_ticks(250), 25);
    }

    #[test]
    fn tick_counts_can_be_computed_at_compile_time() {
        const HALF_SECOND: u32 = ms_to_ticks(500);
        assert_eq!(HALF_SECOND, 50);
    }
}
