//! Page fault decoding.
//!
//! The kernel has no demand paging, so every page fault is fatal: the
//! handler prints a one-line diagnosis and halts.

use core::fmt;

use x86_64::structures::idt::PageFaultErrorCode;

use crate::console::Console;
use crate::interrupts::registry::{InterruptContext, InterruptHandler};

/// Decoded page-fault error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultDiagnosis {
    /// bit 0: protection violation on a present page
    pub present: bool,
    /// bit 1: the access was a write
    pub writable: bool,
    /// bit 2: raised while in user mode
    pub user_mode: bool,
    /// bit 3: a reserved bit was set in a paging entry
    pub reserved_bit_set: bool,
    /// bit 4: the access was an instruction fetch
    pub instruction_fetch: bool,
}

impl FaultDiagnosis {
    pub fn from_error_code(error_code: u64) -> Self {
        let code = PageFaultErrorCode::from_bits_truncate(error_code);
        Self {
            present: code.contains(PageFaultErrorCode::PROTECTION_VIOLATION),
            writable: code.contains(PageFaultErrorCode::CAUSED_BY_WRITE),
            user_mode: code.contains(PageFaultErrorCode::USER_MODE),
            reserved_bit_set: code.contains(PageFaultErrorCode::MALFORMED_TABLE),
            instruction_fetch: code.contains(PageFaultErrorCode::INSTRUCTION_FETCH),
        }
    }
}

/// Flag words in report order. Instruction fetch is decoded but not printed.
impl fmt::Display for FaultDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.present {
            f.write_str("present")?;
        }
        if self.writable {
            f.write_str("read-only")?;
        }
        if self.user_mode {
            f.write_str("user-mode")?;
        }
        if self.reserved_bit_set {
            f.write_str("reserved")?;
        }
        Ok(())
    }
}

/// Vector 14 handler: report, then halt.
pub struct PageFaultHandler<'c> {
    console: &'c dyn Console,
}

impl<'c> PageFaultHandler<'c> {
    pub const fn new(console: &'c dyn Console) -> Self {
        Self { console }
    }

    pub fn report(&self, diagnosis: &FaultDiagnosis) {
        self.console
            .print(format_args!("Page fault! ({})\n", diagnosis));
    }

    pub fn fail(&self, context: &InterruptContext) -> ! {
        let diagnosis = FaultDiagnosis::from_error_code(context.error_code);
        self.report(&diagnosis);

        // 復帰しない。panic_handler が hlt_loop に入る
        match context.faulting_address {
            Some(address) => panic!("Page fault at {:#x}", address),
            None => panic!("Page fault"),
        }
    }
}

impl InterruptHandler for PageFaultHandler<'_> {
    fn handle(&self, context: &InterruptContext) {
        self.fail(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::recording::RecordingConsole;
    use crate::interrupts::registry::{InterruptRegistry, TrapFrame, PAGE_FAULT_VECTOR};
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::panic::{self, AssertUnwindSafe};
    use std::string::{String, ToString};

    #[test]
    fn zero_error_code_sets_no_flags() {
        let diagnosis = FaultDiagnosis::from_error_code(0b00000);
        assert_eq!(
            diagnosis,
            FaultDiagnosis {
                present: false,
                writable: false,
                user_mode: false,
                reserved_bit_set: false,
                instruction_fetch: false,
            }
        );
        assert_eq!(diagnosis.to_string(), "");
    }

    #[test]
    fn write_to_present_page() {
        let diagnosis = FaultDiagnosis::from_error_code(0b00011);
        assert!(diagnosis.present);
        assert!(diagnosis.writable);
        assert!(!diagnosis.user_mode);
        assert!(!diagnosis.reserved_bit_set);
        assert!(!diagnosis.instruction_fetch);
        assert_eq!(diagnosis.to_string(), "presentread-only");
    }

    #[test]
    fn every_flag_in_fixed_order() {
        let diagnosis = FaultDiagnosis::from_error_code(0b11111);
        assert!(diagnosis.instruction_fetch);
        assert_eq!(diagnosis.to_string(), "presentread-onlyuser-modereserved");
    }

    #[test]
    fn unrelated_high_bits_are_ignored() {
        let diagnosis = FaultDiagnosis::from_error_code(1 << 40 | 0b100);
        assert_eq!(diagnosis.to_string(), "user-mode");
    }

    #[test]
    fn page_fault_reports_then_halts() {
        let console = RecordingConsole::new();
        let handler = PageFaultHandler::new(&console);
        let mut registry = InterruptRegistry::new();
        registry
            .register_interrupt_handler(PAGE_FAULT_VECTOR, &handler)
            .unwrap();

        let resumed = AtomicBool::new(false);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            registry.dispatch_interrupt(PAGE_FAULT_VECTOR, &TrapFrame::new(0b00001, 0xdead_b000));
            resumed.store(true, Ordering::SeqCst);
        }));

        let payload = result.expect_err("page fault handler returned");
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert_eq!(message, "Page fault at 0xdeadb000");
        assert_eq!(console.output(), "Page fault! (present)\n");
        assert!(!resumed.load(Ordering::SeqCst));
    }
}
