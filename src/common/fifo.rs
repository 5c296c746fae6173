//! Fixed-capacity byte FIFO for one producer and one consumer.
//!
//! One slot is always left unused, so a buffer of `N` bytes holds at most
//! `N - 1` of them and full/empty are told apart with the two indices alone.
//!
//! The buffer itself does no locking. Sharing it across execution contexts is
//! only sound when `head` has exactly one writer and `tail` has exactly one
//! writer. [`CircularByteBuffer::split`] hands out a [`Producer`] (the only
//! writer of `head`) and a [`Consumer`] (the only writer of `tail`), and since
//! it needs `&mut self`, only one pair can exist per borrow.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct CircularByteBuffer<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    /// Next slot to write. Only the producer stores it.
    head: AtomicUsize,
    /// Next slot to read. Only the consumer stores it.
    tail: AtomicUsize,
}

// Slots between `tail` and `head` belong to the consumer, the others to the
// producer. Each side only touches its own slots and its own index.
unsafe impl<const N: usize> Sync for CircularByteBuffer<N> {}

impl<const N: usize> Default for CircularByteBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CircularByteBuffer<N> {
    pub const fn new() -> Self {
        const { assert!(N >= 2, "a circular buffer needs at least one usable slot") };
        Self {
            buf: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Number of bytes it can hold, `N - 1`.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        occupied::<N>(self.head.load(Ordering::Acquire), self.tail.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        next::<N>(self.head.load(Ordering::Acquire)) == self.tail.load(Ordering::Acquire)
    }

    /// Append a byte. Returns `false` and leaves everything untouched if full.
    pub fn enqueue(&mut self, byte: u8) -> bool {
        // `&mut self` excludes every other accessor
        unsafe { self.push(byte) }
    }

    /// Take the oldest byte, or `None` if empty.
    pub fn dequeue(&mut self) -> Option<u8> {
        unsafe { self.pop() }
    }

    /// Split into the writer view and the reader view.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let rb: &Self = self;
        (
            Producer {
                rb,
                _not_sync: PhantomData,
            },
            Consumer {
                rb,
                _not_sync: PhantomData,
            },
        )
    }

    /// # Safety
    ///
    /// No other context may call `push` concurrently.
    unsafe fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = next::<N>(head);
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }
        // The slot at `head` is outside `tail..head`, so the consumer is not reading it.
        unsafe { self.buf.get().cast::<u8>().add(head).write(byte) };
        self.head.store(next, Ordering::Release);
        true
    }

    /// # Safety
    ///
    /// No other context may call `pop` concurrently.
    unsafe fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let byte = unsafe { self.buf.get().cast::<u8>().add(tail).read() };
        self.tail.store(next::<N>(tail), Ordering::Release);
        Some(byte)
    }
}

#[inline(always)]
const fn next<const N: usize>(idx: usize) -> usize {
    (idx + 1) % N
}

#[inline(always)]
const fn occupied<const N: usize>(head: usize, tail: usize) -> usize {
    (head + N - tail) % N
}

// Producer -------------------------------------------------------------------

/// Write side. The only code path that advances `head`.
pub struct Producer<'a, const N: usize> {
    rb: &'a CircularByteBuffer<N>,
    // Send but not Sync: the view may move to another context, not be shared.
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl<const N: usize> Producer<'_, N> {
    /// Returns `false` without side effects if the buffer is full.
    #[inline]
    pub fn enqueue(&mut self, byte: u8) -> bool {
        // This view is unique and `&mut self` keeps it from being used twice at once.
        unsafe { self.rb.push(byte) }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.rb.capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rb.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rb.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.rb.is_full()
    }
}

// Consumer -------------------------------------------------------------------

/// Read side. The only code path that advances `tail`.
pub struct Consumer<'a, const N: usize> {
    rb: &'a CircularByteBuffer<N>,
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Returns `None` without side effects if the buffer is empty.
    #[inline]
    pub fn dequeue(&mut self) -> Option<u8> {
        unsafe { self.rb.pop() }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.rb.capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rb.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rb.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.rb.is_full()
    }
}
