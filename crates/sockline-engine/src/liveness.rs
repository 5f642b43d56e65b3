//! Single-writer liveness cell.

use parking_lot::Mutex;

/// Liveness flag that starts `true` and can only ever be cleared once.
///
/// There is no setter: [`Liveness::compare_and_close`] is the only
/// transition, and exactly one caller observes it succeed.
#[derive(Debug)]
pub struct Liveness {
    alive: Mutex<bool>,
}

impl Liveness {
    /// A live cell.
    pub fn new() -> Self {
        Self {
            alive: Mutex::new(true),
        }
    }

    /// Whether the cell has not been closed yet.
    pub fn is_alive(&self) -> bool {
        *self.alive.lock()
    }

    /// Clear the flag. Returns `true` only for the caller that cleared it.
    pub fn compare_and_close(&self) -> bool {
        let mut alive = self.alive.lock();
        std::mem::replace(&mut *alive, false)
    }

    /// Run `f` while holding the lock, only if still alive.
    ///
    /// Anything `f` does happens-before a concurrent close.
    pub fn while_alive<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let alive = self.alive.lock();
        (*alive).then(f)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn starts_alive() {
        assert!(Liveness::new().is_alive());
    }

    #[test]
    fn close_succeeds_once() {
        let cell = Liveness::new();
        assert!(cell.compare_and_close());
        assert!(!cell.is_alive());
        assert!(!cell.compare_and_close());
        assert!(!cell.is_alive());
    }

    #[test]
    fn while_alive_skips_after_close() {
        let cell = Liveness::new();
        assert_eq!(cell.while_alive(|| 7), Some(7));
        let _ = cell.compare_and_close();
        assert_eq!(cell.while_alive(|| 7), None);
    }

    #[test]
    fn concurrent_close_has_one_winner() {
        let cell = Arc::new(Liveness::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..16)
            .map(|_| {
                let cell = cell.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    if cell.compare_and_close() {
                        let _ = winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
