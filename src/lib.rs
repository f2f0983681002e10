#![cfg_attr(not(test), no_std)]
#![feature(abi_x86_interrupt)]

#[macro_use]
// 画面出力
pub mod vga_buffer;
pub mod serial;
pub mod console;
pub mod error;
// 割り込み
pub mod interrupts;
pub mod gdt;
pub mod timer;
// 割り込みハンドラ
pub mod fault;
pub mod keyboard;
pub mod song;

pub mod boot_check;

pub fn init() {
    serial::init();
    interrupts::init_idt();
    gdt::init();
    unsafe { interrupts::PICS.lock().initialize() };
    timer::init();
    x86_64::instructions::interrupts::enable();
}

/// 次の割り込みまで眠る
pub fn wait_for_interrupt() {
    x86_64::instructions::hlt();
}

/// 割り込み駆動のメインループ
pub fn idle_loop() -> ! {
    loop {
        wait_for_interrupt();
    }
}

/// 復帰しない停止。割り込みも止める。
pub fn hlt_loop() -> ! {
    x86_64::instructions::interrupts::disable();
    loop {
        x86_64::instructions::hlt();
    }
}
