//! Critical-section protected cell.

use core::cell::RefCell;
use critical_section::Mutex;

/// Cell providing interior mutability with critical section protection.
///
/// Combines `critical_section::Mutex` with `RefCell` for safe mutable access
/// from any thread. On the host the critical section is a global mutex.
pub(crate) struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    /// Create a new cell (const, suitable for static initialization).
    pub(crate) const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Execute a closure with exclusive mutable access.
    #[inline]
    pub(crate) fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            let mut value = self.inner.borrow_ref_mut(cs);
            f(&mut value)
        })
    }
}

// SAFETY: CriticalSectionCell uses critical sections to protect all access.
unsafe impl<T: Send> Sync for CriticalSectionCell<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_returns_closure_result() {
        let cell = CriticalSectionCell::new(1u32);
        let doubled = cell.with(|v| {
            *v *= 2;
            *v
        });
        assert_eq!(doubled, 2);
        assert_eq!(cell.with(|v| *v), 2);
    }

    #[test]
    fn static_cell_is_shared_across_threads() {
        static COUNTER: CriticalSectionCell<u32> = CriticalSectionCell::new(0);

        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| COUNTER.with(|v| *v += 1)))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(COUNTER.with(|v| *v), 4);
    }
}
