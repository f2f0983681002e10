#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

// ベアメタル向けにビルドしたときだけカーネルになる
#[cfg(target_os = "none")]
mod kernel {
    use core::panic::PanicInfo;

    use bootloader::{BootInfo, entry_point};
    use x86_64::instructions::interrupts::without_interrupts;

    use vandrere::boot_check::{BootChecker, DeliveryProbe};
    use vandrere::console::KERNEL_CONSOLE;
    use vandrere::error::{self, KernelResult, RecoveryStrategy};
    use vandrere::fault::PageFaultHandler;
    use vandrere::interrupts::{self, registry};
    use vandrere::keyboard::{KeyboardHandler, Ps2DataPort};
    use vandrere::println;
    use vandrere::song::speaker::PcSpeaker;
    use vandrere::song::{self, Note, Song, SongTickHandler};
    use vandrere::timer;
    use vandrere::vga_buffer::{Color, WRITER};

    static PROBE: DeliveryProbe<'static> = DeliveryProbe::new(&KERNEL_CONSOLE);
    static PAGE_FAULT: PageFaultHandler<'static> = PageFaultHandler::new(&KERNEL_CONSOLE);
    static KEYBOARD: KeyboardHandler<'static, Ps2DataPort> =
        KeyboardHandler::new(Ps2DataPort, &KERNEL_CONSOLE);
    static SONG: SongTickHandler<'static, PcSpeaker> = SongTickHandler::new(PcSpeaker::new());

    const fn note(frequency: u32, ms: u32) -> Note {
        Note::new(frequency, timer::ms_to_ticks(ms))
    }

    static BOOT_CHIME: [Note; 3] = [note(523, 80), note(659, 80), note(784, 120)];

    static DEMO_SONG: [Note; 9] = [
        note(262, 200),
        note(330, 200),
        note(392, 200),
        note(523, 400),
        Note::rest(timer::ms_to_ticks(100)),
        note(392, 200),
        note(523, 600),
        Note::rest(timer::ms_to_ticks(200)),
        note(262, 400),
    ];

    const BANNER: &str = r"
 __   __  _    _  _  ___   ___  ___  ___  ___
 \ \ / / /_\  | \| ||   \ | _ \| __|| _ \| __|
  \ V / / _ \ | .` || |) ||   /| _| |   /| _|
   \_/ /_/ \_\|_|\_||___/ |_|_\|___||_|_\|___|
";

    // パニック時のハンドラ
    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        without_interrupts(|| WRITER.lock().set_color(Color::LightRed, Color::Black));
        println!("{}", info);

        vandrere::hlt_loop(); // ハルトループに入る
    }

    fn register_handlers() -> KernelResult<()> {
        interrupts::register_interrupt_handler(registry::BREAKPOINT_VECTOR, &PROBE)?;
        interrupts::register_interrupt_handler(registry::OVERFLOW_VECTOR, &PROBE)?;
        interrupts::register_interrupt_handler(registry::PAGE_FAULT_VECTOR, &PAGE_FAULT)?;
        interrupts::register_irq_handler(registry::KEYBOARD_IRQ, &KEYBOARD)?;
        interrupts::register_irq_handler(registry::TIMER_IRQ, &SONG)?;
        Ok(())
    }

    entry_point!(kernel_main);

    fn kernel_main(_boot_info: &'static BootInfo) -> ! {
        println!("Starting Vandrere {}", env!("CARGO_PKG_VERSION"));
        vandrere::init(); // 割り込みの初期化

        if let Err(err) = register_handlers() {
            error::log_error(&err);
            panic!("interrupt handler registration failed");
        }

        let mut checker = BootChecker::new();
        if let Err(err) = checker.run_all_checks(&PROBE) {
            error::log_error(&err);
            if error::get_recovery_strategy(&err) == RecoveryStrategy::Panic {
                panic!("boot check failed");
            }
        }

        // タイマーの tick を待ちながら同期再生する。IRQ0 のプレイヤーはまだ空
        song::play_song(Song::new(&BOOT_CHIME), &mut PcSpeaker::new(), timer::wait_for_tick);

        println!("SONG: playing demo song ({} ticks)", Song::new(&DEMO_SONG).total_ticks());
        // タイマー割り込みと同じロックを取るので割り込みを止める
        without_interrupts(|| SONG.assign(Some(Song::new(&DEMO_SONG))));

        println!("{}", BANNER);
        println!("Vandrere is ready. Type something!");

        // あとは割り込み駆動
        vandrere::idle_loop();
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("vandrere is a kernel image; build it for a bare-metal x86_64 target with bootimage");
}
