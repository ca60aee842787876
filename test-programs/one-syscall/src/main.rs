#![no_std]
#![no_main]

use core::arch::asm;

const MSG: &[u8] = b"ok\n";

#[no_mangle]
pub extern "C" fn _start() -> ! {
    unsafe {
        asm!(
            "syscall",
            inlateout("rax") nr::WRITE => _,
            in("rdi") 1,
            in("rsi") MSG.as_ptr(),
            in("rdx") MSG.len(),
            lateout("rcx") _,
            lateout("r11") _,
        );
        asm!(
            "syscall",
            in("rax") nr::EXIT,
            in("rdi") 0,
            options(noreturn),
        );
    }
}

mod nr {
    pub const WRITE: usize = 1;
    pub const EXIT: usize = 60;
}

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}
