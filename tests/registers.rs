use std::mem::{align_of, size_of};

use memoffset::offset_of;
use stoptrace::Registers;

type Kernel = libc::user_regs_struct;

macro_rules! assert_same_offsets {
    ($($field: ident),* $(,)?) => {
        $(
            assert_eq!(
                offset_of!(Registers, $field),
                offset_of!(Kernel, $field),
                stringify!($field),
            );
        )*
    };
}

#[test]
fn test_layout_matches_kernel() {
    assert_eq!(size_of::<Registers>(), size_of::<Kernel>());
    assert_eq!(align_of::<Registers>(), align_of::<Kernel>());

    assert_same_offsets!(
        r15, r14, r13, r12, rbp, rbx, r11, r10, r9, r8, rax, rcx, rdx, rsi, rdi, orig_rax,
        rip, cs, eflags, rsp, ss, fs_base, gs_base, ds, es, fs, gs,
    );
}

#[test]
fn test_conversion_keeps_every_field() {
    // SAFETY: `user_regs_struct` is plain integers, so all-zero is a valid value.
    let mut kernel: Kernel = unsafe { std::mem::zeroed() };
    kernel.orig_rax = 59;
    kernel.rax = 0;
    kernel.rip = 0x7f00_0000_1000;
    kernel.rsp = 0x7ffc_0000_0000;
    kernel.eflags = 0x246;
    kernel.gs = 1;
    kernel.r15 = u64::MAX;

    let regs = Registers::from(kernel);

    assert_eq!(regs.syscall_number(), 59);
    assert_eq!(regs.instruction_pointer(), 0x7f00_0000_1000);
    assert_eq!(regs.stack_pointer(), 0x7ffc_0000_0000);
    assert_eq!(regs.flags(), 0x246);
    assert_eq!(regs.gs, 1);
    assert_eq!(regs.r15, u64::MAX);

    let values: Vec<u64> = regs.iter().map(|(_, v)| v).collect();
    assert_eq!(values.len(), 27);
    assert_eq!(values.iter().filter(|&&v| v != 0).count(), 6);
}
