//! Interrupt Registry
//!
//! Two bounded tables, one slot per CPU vector (0..256) and one per PIC line
//! (0..16). Lookup is an array index, so dispatch never allocates and runs in
//! constant time, which is what the trap stubs need.
//!
//! Handlers are *borrowed* for `'h`. The kernel uses `InterruptRegistry<'static>`
//! and registers statics; tests register locals.

use core::fmt;

use crate::error::InterruptError;

pub const VECTOR_COUNT: usize = 256;
pub const IRQ_COUNT: usize = 16;

pub const BREAKPOINT_VECTOR: usize = 3;
pub const OVERFLOW_VECTOR: usize = 4;
pub const PAGE_FAULT_VECTOR: usize = 14;

pub const TIMER_IRQ: usize = 0;
pub const KEYBOARD_IRQ: usize = 1;

/// Which dispatch table a slot number refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// CPU exception / software interrupt vectors
    Vector,
    /// Interrupt controller lines
    Irq,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TableKind::Vector => write!(f, "vector"),
            TableKind::Irq => write!(f, "IRQ"),
        }
    }
}

/// Raw state captured by a trap stub before dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub error_code: u64,
    /// CR2 at the time of the trap. Only meaningful for page faults.
    pub fault_address: u64,
}

impl TrapFrame {
    pub const fn new(error_code: u64, fault_address: u64) -> Self {
        Self {
            error_code,
            fault_address,
        }
    }

    pub const fn empty() -> Self {
        Self::new(0, 0)
    }
}

/// Per-event snapshot handed to a handler. Built fresh for every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptContext {
    pub kind: TableKind,
    /// Vector or IRQ line, depending on `kind`
    pub number: usize,
    pub error_code: u64,
    /// `Some` only for page faults
    pub faulting_address: Option<u64>,
}

impl InterruptContext {
    fn new(kind: TableKind, number: usize, frame: &TrapFrame) -> Self {
        let is_fault = kind == TableKind::Vector && number == PAGE_FAULT_VECTOR;
        Self {
            kind,
            number,
            error_code: frame.error_code,
            faulting_address: is_fault.then_some(frame.fault_address),
        }
    }
}

/// Something that can be registered against a vector or IRQ line.
///
/// Handlers run with interrupts disabled and must not block. Mutable state
/// lives behind the handler's own lock.
pub trait InterruptHandler: Sync {
    fn handle(&self, context: &InterruptContext);

    /// IRQ handlers that return `true` run with interrupts re-enabled, after
    /// end-of-interrupt has been sent. Other interrupts can then nest inside
    /// the handler, so it must tolerate that.
    fn reentrant(&self) -> bool {
        false
    }
}

/// Stateless handlers are plain functions.
impl InterruptHandler for fn(&InterruptContext) {
    fn handle(&self, context: &InterruptContext) {
        self(context)
    }
}

/// Outcome of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    /// Nothing registered for that slot; the event is ignored.
    Dropped,
}

/// Calls `handler` once with a context built from `frame`, or drops the
/// event when there is no handler.
pub fn invoke(
    handler: Option<&dyn InterruptHandler>,
    kind: TableKind,
    number: usize,
    frame: &TrapFrame,
) -> Dispatch {
    match handler {
        Some(handler) => {
            handler.handle(&InterruptContext::new(kind, number, frame));
            Dispatch::Handled
        }
        None => Dispatch::Dropped,
    }
}

pub struct HandlerTable<'h, const N: usize> {
    kind: TableKind,
    slots: [Option<&'h dyn InterruptHandler>; N],
}

impl<'h, const N: usize> HandlerTable<'h, N> {
    pub const fn new(kind: TableKind) -> Self {
        Self {
            kind,
            slots: [None; N],
        }
    }

    fn slot(&self, number: usize) -> Result<usize, InterruptError> {
        if number < N {
            Ok(number)
        } else {
            Err(InterruptError::InvalidVector {
                table: self.kind,
                number,
                limit: N,
            })
        }
    }

    /// Last registration wins.
    pub fn register(
        &mut self,
        number: usize,
        handler: &'h dyn InterruptHandler,
    ) -> Result<(), InterruptError> {
        let index = self.slot(number)?;
        self.slots[index] = Some(handler);
        Ok(())
    }

    pub fn unregister(
        &mut self,
        number: usize,
    ) -> Result<Option<&'h dyn InterruptHandler>, InterruptError> {
        let index = self.slot(number)?;
        Ok(self.slots[index].take())
    }

    pub fn get(&self, number: usize) -> Option<&'h dyn InterruptHandler> {
        self.slots.get(number).copied().flatten()
    }

    pub fn is_registered(&self, number: usize) -> bool {
        self.get(number).is_some()
    }

    pub fn registered_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

pub struct InterruptRegistry<'h> {
    vectors: HandlerTable<'h, VECTOR_COUNT>,
    irqs: HandlerTable<'h, IRQ_COUNT>,
}

impl<'h> InterruptRegistry<'h> {
    pub const fn new() -> Self {
        Self {
            vectors: HandlerTable::new(TableKind::Vector),
            irqs: HandlerTable::new(TableKind::Irq),
        }
    }

    pub fn register_interrupt_handler(
        &mut self,
        vector: usize,
        handler: &'h dyn InterruptHandler,
    ) -> Result<(), InterruptError> {
        self.vectors.register(vector, handler)
    }

    pub fn register_irq_handler(
        &mut self,
        irq: usize,
        handler: &'h dyn InterruptHandler,
    ) -> Result<(), InterruptError> {
        self.irqs.register(irq, handler)
    }

    pub fn unregister_interrupt_handler(
        &mut self,
        vector: usize,
    ) -> Result<Option<&'h dyn InterruptHandler>, InterruptError> {
        self.vectors.unregister(vector)
    }

    pub fn unregister_irq_handler(
        &mut self,
        irq: usize,
    ) -> Result<Option<&'h dyn InterruptHandler>, InterruptError> {
        self.irqs.unregister(irq)
    }

    pub fn interrupt_handler(&self, vector: usize) -> Option<&'h dyn InterruptHandler> {
        self.vectors.get(vector)
    }

    pub fn irq_handler(&self, irq: usize) -> Option<&'h dyn InterruptHandler> {
        self.irqs.get(irq)
    }

    pub fn vectors(&self) -> &HandlerTable<'h, VECTOR_COUNT> {
        &self.vectors
    }

    pub fn irqs(&self) -> &HandlerTable<'h, IRQ_COUNT> {
        &self.irqs
    }

    pub fn dispatch_interrupt(&self, vector: usize, frame: &TrapFrame) -> Dispatch {
        invoke(self.interrupt_handler(vector), TableKind::Vector, vector, frame)
    }

    pub fn dispatch_irq(&self, irq: usize, frame: &TrapFrame) -> Dispatch {
        invoke(self.irq_handler(irq), TableKind::Irq, irq, frame)
    }
}

impl Default for InterruptRegistry<'_> {
    fn default() -> Self {
        Self::new()
    }
}
