//! Generic single-producer single-consumer channel for typed messages.
//!
//! The byte-addressed [`crate::ring::RingBuffer`] carries audio; this
//! typed channel carries log records between the hot path and the
//! drain thread (see [`crate::logring`]). Same cache-padding and
//! acquire/release discipline, adapted for a fixed-size `T` slot array
//! instead of raw bytes.

use core::{cell::UnsafeCell, mem::MaybeUninit};
#[cfg(not(loom))]
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

#[cfg(loom)]
use loom::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

#[repr(align(64))]
struct CachePadded<T>(T);

impl<T> CachePadded<T> {
    const fn new(value: T) -> Self {
        CachePadded(value)
    }
}

impl<T> core::ops::Deref for CachePadded<T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

struct Inner<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    capacity: usize,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Inner<T> {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(1);
        let mask = capacity - 1;
        let buffer: Vec<UnsafeCell<MaybeUninit<T>>> =
            (0..capacity).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect();
        Self {
            buffer: buffer.into_boxed_slice(),
            capacity,
            mask,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        for i in tail..head {
            let index = i & self.mask;
            // SAFETY: slots in [tail, head) are initialized.
            unsafe {
                let ptr = (*self.buffer[index].get()).as_mut_ptr();
                core::ptr::drop_in_place(ptr);
            }
        }
    }
}

/// Creates a bounded typed SPSC channel, rounding `capacity` up to a
/// power of two.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(Inner::new(capacity));
    (
        Sender { inner: Arc::clone(&inner) },
        Receiver { inner },
    )
}

/// Producer handle. Not `Clone`; one sender per channel.
pub struct Sender<T> {
    inner: Arc<Inner<T>>,
}

unsafe impl<T: Send> Send for Sender<T> {}

impl<T> Sender<T> {
    /// Pushes a value, or returns it back if the channel is full.
    /// Never blocks.
    #[inline]
    pub fn try_send(&self, value: T) -> Result<(), T> {
        let head = self.inner.head.load(Ordering::Relaxed);
        let tail = self.inner.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= self.inner.capacity {
            return Err(value);
        }
        let index = head & self.inner.mask;
        // SAFETY: slot is free (verified above), only the producer writes it.
        unsafe {
            (*self.inner.buffer[index].get()).write(value);
        }
        self.inner.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

/// Consumer handle. Not `Clone`; one receiver per channel.
pub struct Receiver<T> {
    inner: Arc<Inner<T>>,
}

unsafe impl<T: Send> Send for Receiver<T> {}

impl<T> Receiver<T> {
    /// Pops a value, or `None` if the channel is empty. Never blocks.
    #[inline]
    pub fn try_recv(&self) -> Option<T> {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        let head = self.inner.head.load(Ordering::Acquire);
        if tail >= head {
            return None;
        }
        let index = tail & self.inner.mask;
        // SAFETY: slot is initialized (verified above), only the consumer reads it.
        let value = unsafe { (*self.inner.buffer[index].get()).assume_init_read() };
        self.inner.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn basic_send_recv() {
        let (tx, rx) = channel::<i32>(4);
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        assert_eq!(rx.try_recv(), Some(1));
        assert_eq!(rx.try_recv(), Some(2));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn full_channel_returns_value() {
        let (tx, _rx) = channel::<i32>(2);
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        assert_eq!(tx.try_send(3), Err(3));
    }

    #[test]
    fn capacity_rounds_up() {
        let (tx, _rx) = channel::<i32>(3);
        assert_eq!(tx.capacity(), 4);
    }
}
