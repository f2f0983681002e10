//! Boot Check System
//!
//! Self-checks run once interrupts are live, before the kernel goes idle.
//! They exercise the real IDT → registry → handler path with software
//! interrupts.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::console::Console;
use crate::error::{GeneralError, HardwareError, KernelResult};
use crate::interrupts::{self, registry::{InterruptContext, InterruptHandler, IRQ_COUNT, PAGE_FAULT_VECTOR}};
use crate::keyboard;

/// Announces each delivery and counts it. Registered on the software
/// interrupt vectors so the boot check can see them arrive.
pub struct DeliveryProbe<'c> {
    console: &'c dyn Console,
    delivered: AtomicUsize,
}

impl<'c> DeliveryProbe<'c> {
    pub const fn new(console: &'c dyn Console) -> Self {
        Self {
            console,
            delivered: AtomicUsize::new(0),
        }
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

impl InterruptHandler for DeliveryProbe<'_> {
    fn handle(&self, context: &InterruptContext) {
        self.delivered.fetch_add(1, Ordering::SeqCst);
        self.console
            .print(format_args!("Interrupt {} - Working\n", context.number));
    }
}

/// Boot checker - counts passes and failures, prints every result
pub struct BootChecker {
    pub passed: usize,
    pub failed: usize,
}

impl BootChecker {
    pub const fn new() -> Self {
        Self { passed: 0, failed: 0 }
    }

    /// `probe` must already be registered on vectors 3 and 4.
    pub fn run_all_checks(&mut self, probe: &'static DeliveryProbe<'static>) -> KernelResult<()> {
        crate::println!("BOOT_CHECK: starting");

        self.check_fault_handler()?;
        self.check_registration_bounds(probe)?;
        self.check_software_interrupts(probe)?;
        self.check_translation();

        crate::println!("BOOT_CHECK: {} passed, {} failed", self.passed, self.failed);
        Ok(())
    }

    fn check_fault_handler(&mut self) -> KernelResult<()> {
        let registered = interrupts::is_interrupt_handler_registered(PAGE_FAULT_VECTOR);
        self.add_result("page fault handler registered", registered);
        if !registered {
            return crate::kerror!(HardwareError::HandlerMissing);
        }
        Ok(())
    }

    fn check_registration_bounds(&mut self, probe: &'static DeliveryProbe<'static>) -> KernelResult<()> {
        let rejected = interrupts::register_irq_handler(IRQ_COUNT, probe).is_err();
        self.add_result("out-of-range IRQ rejected", rejected);
        if !rejected {
            // 範囲外が通ったなら表が壊れている
            return crate::kerror!(GeneralError::Internal);
        }
        Ok(())
    }

    fn check_software_interrupts(&mut self, probe: &DeliveryProbe<'_>) -> KernelResult<()> {
        let before = probe.delivered();
        interrupts::raise_breakpoint();
        interrupts::raise_overflow();
        let delivered = probe.delivered() - before;

        self.add_result("int3 / int 4 delivered once each", delivered == 2);
        if delivered != 2 {
            return crate::kerror!(HardwareError::InterruptLost);
        }
        Ok(())
    }

    fn check_translation(&mut self) {
        let first = keyboard::translate(0x1E);
        let stable = first == Some('a') && keyboard::translate(0x1E) == first;
        self.add_result("scancode translation", stable);
    }

    fn add_result(&mut self, name: &str, passed: bool) {
        if passed {
            self.passed += 1;
            crate::println!("BOOT_CHECK: {} ... ok", name);
        } else {
            self.failed += 1;
            crate::println!("BOOT_CHECK: {} ... FAILED", name);
        }
    }
}

impl Default for BootChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::recording::RecordingConsole;
    use crate::interrupts::registry::{InterruptRegistry, TrapFrame, BREAKPOINT_VECTOR, OVERFLOW_VECTOR};

    #[test]
    fn probe_announces_each_delivery() {
        let console = RecordingConsole::new();
        let probe = DeliveryProbe::new(&console);
        let mut registry = InterruptRegistry::new();
        registry.register_interrupt_handler(BREAKPOINT_VECTOR, &probe).unwrap();
        registry.register_interrupt_handler(OVERFLOW_VECTOR, &probe).unwrap();

        registry.dispatch_interrupt(BREAKPOINT_VECTOR, &TrapFrame::empty());
        registry.dispatch_interrupt(OVERFLOW_VECTOR, &TrapFrame::empty());

        assert_eq!(probe.delivered(), 2);
        assert_eq!(
            console.output(),
            "Interrupt 3 - Working\nInterrupt 4 - Working\n"
        );
    }

    #[test]
    fn checker_tallies_results() {
        let mut checker = BootChecker::new();
        checker.add_result("passes", true);
        checker.add_result("fails", false);
        checker.add_result("passes again", true);
        assert_eq!((checker.passed, checker.failed), (2, 1));
    }
}
