//! Audio-thread-safe diagnostics.
//!
//! `gf_log!` formats into a fixed stack buffer and pushes it onto a
//! single-producer ring; `drain_to_file` runs off the audio thread
//! (initialize/reset) and appends everything to `/tmp/ghostfader.log`.
//! Without the `debug` feature the macro only evaluates `format_args!`
//! into a no-op call.

use std::fmt;

#[cfg(feature = "debug")]
pub mod logger {
    use std::cell::UnsafeCell;
    use std::fmt;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::OnceLock;

    const RING_CAPACITY: usize = 128;
    const MESSAGE_MAX: usize = 256;
    pub const LOG_PATH: &str = "/tmp/ghostfader.log";

    #[derive(Copy, Clone)]
    struct Message {
        len: u16,
        bytes: [u8; MESSAGE_MAX],
    }

    impl Message {
        const EMPTY: Message = Message {
            len: 0,
            bytes: [0; MESSAGE_MAX],
        };

        fn text(&self) -> &str {
            let len = (self.len as usize).min(MESSAGE_MAX);
            std::str::from_utf8(&self.bytes[..len]).unwrap_or("<invalid utf-8>")
        }
    }

    impl fmt::Write for Message {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let start = self.len as usize;
            let room = MESSAGE_MAX - start;
            // Truncate on a char boundary so the drained text stays valid
            let mut n = s.len().min(room);
            while n > 0 && !s.is_char_boundary(n) {
                n -= 1;
            }
            self.bytes[start..start + n].copy_from_slice(&s.as_bytes()[..n]);
            self.len = (start + n) as u16;
            Ok(())
        }
    }

    /// Single producer (audio thread), single consumer (drain).
    struct Ring {
        head: AtomicUsize,
        tail: AtomicUsize,
        dropped: AtomicUsize,
        slots: Box<[UnsafeCell<Message>]>,
    }

    unsafe impl Sync for Ring {}

    impl Ring {
        fn new() -> Self {
            let slots: Vec<UnsafeCell<Message>> = (0..RING_CAPACITY)
                .map(|_| UnsafeCell::new(Message::EMPTY))
                .collect();
            Self {
                head: AtomicUsize::new(0),
                tail: AtomicUsize::new(0),
                dropped: AtomicUsize::new(0),
                slots: slots.into_boxed_slice(),
            }
        }

        fn push(&self, msg: &Message) {
            let head = self.head.load(Ordering::Relaxed);
            let next = (head + 1) % self.slots.len();
            if next == self.tail.load(Ordering::Acquire) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            unsafe {
                *self.slots[head].get() = *msg;
            }
            self.head.store(next, Ordering::Release);
        }

        fn pop(&self) -> Option<Message> {
            let tail = self.tail.load(Ordering::Relaxed);
            if tail == self.head.load(Ordering::Acquire) {
                return None;
            }
            let msg = unsafe { *self.slots[tail].get() };
            self.tail.store((tail + 1) % self.slots.len(), Ordering::Release);
            Some(msg)
        }
    }

    static RING: OnceLock<Ring> = OnceLock::new();
    static ENABLED: AtomicBool = AtomicBool::new(false);

    /// Allocates the ring. Call from `initialize`, never from `process`.
    pub fn init_logger() {
        let _ = RING.get_or_init(Ring::new);
        ENABLED.store(true, Ordering::Relaxed);
    }

    pub fn log_args(args: fmt::Arguments) {
        if !ENABLED.load(Ordering::Relaxed) {
            return;
        }
        let Some(ring) = RING.get() else {
            return;
        };
        let mut msg = Message::EMPTY;
        let _ = fmt::write(&mut msg, args);
        ring.push(&msg);
    }

    /// Move queued messages into the log file. Silently gives up on IO errors.
    pub fn drain_to_file() {
        let Some(ring) = RING.get() else {
            return;
        };
        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(LOG_PATH) else {
            return;
        };
        while let Some(msg) = ring.pop() {
            if msg.len > 0 {
                let _ = writeln!(file, "{}", msg.text());
            }
        }
        let dropped = ring.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            let _ = writeln!(file, "({} messages dropped)", dropped);
        }
    }

}

#[cfg(feature = "debug")]
pub(crate) fn gf_log_inner(args: fmt::Arguments) {
    logger::log_args(args);
}

#[cfg(not(feature = "debug"))]
#[inline(always)]
pub(crate) fn gf_log_inner(_args: fmt::Arguments) {}

/// Real-time safe diagnostic line. No-op unless built with `--features debug`.
#[macro_export]
macro_rules! gf_log {
    ($($arg:tt)*) => {
        $crate::debug::gf_log_inner(format_args!($($arg)*))
    };
}
