use uart_16550::SerialPort;
use spin::Mutex;
use lazy_static::lazy_static;

const COM1: u16 = 0x3F8;

lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        let mut serial_port = unsafe { SerialPort::new(COM1) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

/// 呼び出し側で割り込みを止めていない場合はここで止める。
#[doc(hidden)]
#[cfg(not(test))]
pub fn _print(args: ::core::fmt::Arguments) {
    use core::fmt::Write;
    use x86_64::instructions::interrupts;

    interrupts::without_interrupts(|| {
        // シリアルが死んでいても画面には出ているので無視
        let _ = SERIAL1.lock().write_fmt(args);
    });
}

#[doc(hidden)]
#[cfg(test)]
pub fn _print(args: ::core::fmt::Arguments) {
    std::eprint!("{}", args);
}

/// Prints to the host through the serial interface.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*));
    };
}

/// Prints to the host through the serial interface, adding a newline.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => {
        $crate::serial_print!(
            concat!($fmt, "\n"),
            $($arg)*
        )
    };
}

/// シリアルポートを初期化する便利関数
pub fn init() {
    // lazy_staticが初回アクセスで初期化してくれる
    lazy_static::initialize(&SERIAL1);
    serial_println!("Serial port initialized");
}
