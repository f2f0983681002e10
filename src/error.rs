//! Vandrere Error Handling
//!
//! Kernel-wide error types. Only configuration mistakes are reported as
//! values; anything that goes wrong inside interrupt context is escalated to
//! a halt instead (see [`RecoveryStrategy::Panic`]).

use core::fmt;

pub use crate::interrupts::registry::TableKind;

/// Kernel-wide error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Interrupt registry errors
    Interrupt(InterruptError),
    /// Hardware/IO errors
    Hardware(HardwareError),
    /// General kernel errors
    General(GeneralError),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelError::Interrupt(e) => write!(f, "Interrupt error: {}", e),
            KernelError::Hardware(e) => write!(f, "Hardware error: {}", e),
            KernelError::General(e) => write!(f, "General error: {}", e),
        }
    }
}

/// Interrupt registry errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptError {
    /// Slot number outside the table. Detected at registration time.
    InvalidVector {
        table: TableKind,
        number: usize,
        limit: usize,
    },
}

impl fmt::Display for InterruptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InterruptError::InvalidVector { table, number, limit } => {
                write!(f, "Invalid {} {} (supported: 0..{})", table, number, limit)
            }
        }
    }
}

/// Hardware and IO errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// A software interrupt did not reach its handler
    InterruptLost,
    /// A required handler slot is empty
    HandlerMissing,
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HardwareError::InterruptLost => write!(f, "Interrupt was not delivered"),
            HardwareError::HandlerMissing => write!(f, "No handler registered"),
        }
    }
}

/// General kernel errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneralError {
    /// Internal error
    Internal,
    /// Invalid state
    InvalidState,
}

impl fmt::Display for GeneralError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GeneralError::Internal => write!(f, "Internal error"),
            GeneralError::InvalidState => write!(f, "Invalid state"),
        }
    }
}

/// Result type alias for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

#[macro_export]
macro_rules! kerror {
    ($error:expr) => {
        Err($crate::error::KernelError::from($error))
    };
}

impl From<InterruptError> for KernelError {
    fn from(err: InterruptError) -> Self {
        KernelError::Interrupt(err)
    }
}

impl From<HardwareError> for KernelError {
    fn from(err: HardwareError) -> Self {
        KernelError::Hardware(err)
    }
}

impl From<GeneralError> for KernelError {
    fn from(err: GeneralError) -> Self {
        KernelError::General(err)
    }
}

pub fn log_error(err: &KernelError) {
    crate::println!("KERNEL ERROR: {}", err);

    match err {
        KernelError::Interrupt(e) => crate::println!("  Interrupt subsystem: {}", e),
        KernelError::Hardware(e) => crate::println!("  Hardware subsystem: {}", e),
        KernelError::General(e) => crate::println!("  General: {}", e),
    }
}

/// Error recovery strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Skip the operation and keep going
    Skip,
    /// Abort the current operation
    Abort,
    /// Halt the kernel
    Panic,
}

pub fn get_recovery_strategy(err: &KernelError) -> RecoveryStrategy {
    match err {
        // 登録ミスは呼び出し側で直せる
        KernelError::Interrupt(InterruptError::InvalidVector { .. }) => RecoveryStrategy::Skip,

        KernelError::Hardware(HardwareError::InterruptLost) => RecoveryStrategy::Panic,
        KernelError::Hardware(_) => RecoveryStrategy::Abort,

        KernelError::General(GeneralError::Internal) => RecoveryStrategy::Panic,
        KernelError::General(_) => RecoveryStrategy::Abort,
    }
}
