use x86_64::instructions::interrupts;
use x86_64::instructions::port::Port;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};
use pic8259::ChainedPics;

use lazy_static::lazy_static;

use crate::error::KernelResult;
use crate::gdt;

pub mod registry;

use registry::{
    Dispatch, InterruptHandler, InterruptRegistry, TableKind, TrapFrame, BREAKPOINT_VECTOR,
    OVERFLOW_VECTOR, PAGE_FAULT_VECTOR,
};

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

pub static PICS: spin::Mutex<ChainedPics> =
    spin::Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

// 書き換えは割り込みを止めた状態でのみ行う。
// ディスパッチ側はスロットを読むだけで、ハンドラ呼び出し中はロックを持たない。
static REGISTRY: spin::Mutex<InterruptRegistry<'static>> =
    spin::Mutex::new(InterruptRegistry::new());

// 割り込み記述子テーブル(IDT)の初期化
lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        idt.overflow.set_handler_fn(overflow_handler);
        idt.page_fault.set_handler_fn(page_fault_handler);
        unsafe {
            idt.double_fault.set_handler_fn(double_fault_handler)
                .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
        }
        idt[InterruptIndex::Timer.as_u8()].set_handler_fn(timer_interrupt_handler);
        idt[InterruptIndex::Keyboard.as_u8()].set_handler_fn(keyboard_interrupt_handler);
        idt
    };
}

pub fn init_idt() {
    IDT.load();
}

pub fn register_interrupt_handler(
    vector: usize,
    handler: &'static dyn InterruptHandler,
) -> KernelResult<()> {
    interrupts::without_interrupts(|| REGISTRY.lock().register_interrupt_handler(vector, handler))?;
    Ok(())
}

pub fn register_irq_handler(irq: usize, handler: &'static dyn InterruptHandler) -> KernelResult<()> {
    interrupts::without_interrupts(|| REGISTRY.lock().register_irq_handler(irq, handler))?;
    Ok(())
}

pub fn unregister_interrupt_handler(vector: usize) -> KernelResult<bool> {
    let removed =
        interrupts::without_interrupts(|| REGISTRY.lock().unregister_interrupt_handler(vector))?;
    Ok(removed.is_some())
}

pub fn unregister_irq_handler(irq: usize) -> KernelResult<bool> {
    let removed = interrupts::without_interrupts(|| REGISTRY.lock().unregister_irq_handler(irq))?;
    Ok(removed.is_some())
}

pub fn is_interrupt_handler_registered(vector: usize) -> bool {
    interrupts::without_interrupts(|| REGISTRY.lock().vectors().is_registered(vector))
}

/// 割り込みコンテキストから呼ぶ
pub fn dispatch_interrupt(vector: usize, frame: &TrapFrame) -> Dispatch {
    let handler = REGISTRY.lock().interrupt_handler(vector);
    registry::invoke(handler, TableKind::Vector, vector, frame)
}

fn dispatch_irq(index: InterruptIndex) -> Dispatch {
    let irq = index.irq();
    let handler = REGISTRY.lock().irq_handler(irq);

    if handler.is_some_and(|handler| handler.reentrant()) {
        // EOIを先に送ってから割り込みを許可する
        notify_end_of_interrupt(index);
        interrupts::enable();
        let outcome = registry::invoke(handler, TableKind::Irq, irq, &TrapFrame::empty());
        interrupts::disable();
        outcome
    } else {
        let outcome = registry::invoke(handler, TableKind::Irq, irq, &TrapFrame::empty());
        notify_end_of_interrupt(index);
        outcome
    }
}

fn notify_end_of_interrupt(index: InterruptIndex) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(index.as_u8());
    }
}

/// int3 を発行する（起動時チェック用）
pub fn raise_breakpoint() {
    interrupts::int3();
}

/// int 4 を発行する（起動時チェック用）
pub fn raise_overflow() {
    unsafe {
        core::arch::asm!("int 4", options(nomem, nostack));
    }
}

// ブレークポイント例外ハンドラ
extern "x86-interrupt" fn breakpoint_handler(_stack_frame: InterruptStackFrame) {
    dispatch_interrupt(BREAKPOINT_VECTOR, &TrapFrame::empty());
}

extern "x86-interrupt" fn overflow_handler(_stack_frame: InterruptStackFrame) {
    dispatch_interrupt(OVERFLOW_VECTOR, &TrapFrame::empty());
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame, _error_code: u64)
    -> !
{
    panic!("EXCEPTION: DOUBLE FAULT\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    let fault_address = Cr2::read_raw();
    let frame = TrapFrame::new(error_code.bits(), fault_address);

    // 登録済みのハンドラは戻ってこない。戻ってきても再開はできない
    if dispatch_interrupt(PAGE_FAULT_VECTOR, &frame) == Dispatch::Dropped {
        crate::println!("EXCEPTION: PAGE FAULT (no handler)");
    }
    crate::println!("Accessed Address: {:#x}", fault_address);
    crate::println!("Error Code: {:?}", error_code);
    panic!("EXCEPTION: PAGE FAULT\n{:#?}", stack_frame);
}

// タイマー割り込み: tickを進めてからIRQ0を配送
extern "x86-interrupt" fn timer_interrupt_handler(_stack_frame: InterruptStackFrame) {
    crate::timer::increment_tick();
    dispatch_irq(InterruptIndex::Timer);
}

extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    if dispatch_irq(InterruptIndex::Keyboard) == Dispatch::Dropped {
        // 読み捨てないと次のスキャンコードが来ない
        let mut port = Port::<u8>::new(crate::keyboard::PS2_DATA_PORT);
        let _: u8 = unsafe { port.read() };
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,
    Keyboard,
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.as_u8())
    }

    /// PIC上のIRQ番号
    pub fn irq(self) -> usize {
        self.as_usize() - usize::from(PIC_1_OFFSET)
    }
}
