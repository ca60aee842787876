fn main() {
    // No libc startup code: the only syscalls are the ones `_start` makes.
    println!("cargo:rustc-link-arg-bins=-nostartfiles");
    println!("cargo:rustc-link-arg-bins=-static");
}
