//! Diagnostic output sink handed to interrupt handlers.
//!
//! Handlers never touch the VGA buffer directly; they print through a
//! [`Console`] so the same handler can run against the real screen or a
//! recording buffer.

use core::fmt;

pub trait Console: Sync {
    fn print(&self, args: fmt::Arguments<'_>);
}

/// VGA + COM1 (see `print!`).
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelConsole;

impl Console for KernelConsole {
    fn print(&self, args: fmt::Arguments<'_>) {
        crate::vga_buffer::_print(args);
    }
}

pub static KERNEL_CONSOLE: KernelConsole = KernelConsole;

#[cfg(test)]
pub(crate) mod recording {
    use super::Console;
    use core::fmt;
    use spin::Mutex;
    use std::string::String;

    /// Keeps everything printed so tests can inspect it.
    pub struct RecordingConsole {
        output: Mutex<String>,
    }

    impl RecordingConsole {
        pub fn new() -> Self {
            Self {
                output: Mutex::new(String::new()),
            }
        }

        pub fn output(&self) -> String {
            self.output.lock().clone()
        }
    }

    impl Console for RecordingConsole {
        fn print(&self, args: fmt::Arguments<'_>) {
            use core::fmt::Write;
            let _ = self.output.lock().write_fmt(args);
        }
    }
}
