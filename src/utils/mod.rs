pub mod styles;

pub use styles::*;

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn warn(mesg: &str) {
    eprintln!("{}", mesg.warn());
}

/// Progress information, only printed with --verbose.
pub fn note(mesg: &str) {
    if VERBOSE.load(Ordering::Relaxed) {
        eprintln!("{}", mesg.note());
    }
}

pub fn align_to_word(n: usize) -> usize {
    (n + 3) & !3
}
