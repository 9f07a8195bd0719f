//! `SharedRegion<T>`: the typed region abstraction backing the file table
//! and group lock table (`spec.md` §5, "Concurrency model" in
//! `SPEC_FULL.md`).
//!
//! Two interchangeable backends implement the same `acquire()` interface
//! and hand back a `RegionGuard<T>` with the same `Deref`/`DerefMut`
//! shape, so callers never know which one is active. The default, used by
//! every test and CLI in this workspace, is a process-local `Mutex<T>`.
//! Behind the `shared_mmap` feature, the region instead lives in an
//! anonymous `MAP_SHARED` mapping guarded by a `pthread_mutex_t` built
//! with `PTHREAD_PROCESS_SHARED`, so the same table can be inherited
//! across `fork()` and coordinate unrelated processes the way the
//! original engine's SysV segment did. No caller on either backend ever
//! sees a raw pointer.

#[cfg(not(feature = "shared_mmap"))]
mod mutex_backend {
    use std::sync::{Mutex, MutexGuard};

    pub struct SharedRegion<T> {
        inner: Mutex<T>,
    }

    pub struct RegionGuard<'a, T> {
        inner: MutexGuard<'a, T>,
    }

    impl<'a, T> std::ops::Deref for RegionGuard<'a, T> {
        type Target = T;
        fn deref(&self) -> &T {
            &self.inner
        }
    }

    impl<'a, T> std::ops::DerefMut for RegionGuard<'a, T> {
        fn deref_mut(&mut self) -> &mut T {
            &mut self.inner
        }
    }

    impl<T> SharedRegion<T> {
        pub fn new(value: T) -> Self {
            Self { inner: Mutex::new(value) }
        }

        /// Acquires exclusive access to the region, blocking if another
        /// caller holds it. A poisoned lock (from a panic while held) is
        /// recovered from rather than propagated, matching the original
        /// engine's stance that a held `FILE_TABLE_LOCK` must never wedge
        /// every other process out permanently.
        pub fn acquire(&self) -> RegionGuard<'_, T> {
            let inner = self.inner.lock().unwrap_or_else(|poison| poison.into_inner());
            RegionGuard { inner }
        }
    }
}

#[cfg(not(feature = "shared_mmap"))]
pub use mutex_backend::{RegionGuard, SharedRegion};

#[cfg(feature = "shared_mmap")]
mod mmap_backend {
    use std::cell::UnsafeCell;
    use std::mem::MaybeUninit;
    use std::ptr;

    /// `SharedRegion<T>` backed by an anonymous `MAP_SHARED` mapping and a
    /// `PTHREAD_PROCESS_SHARED` mutex, both living inside the mapping
    /// itself so a `fork()`'d child inherits working synchronization.
    ///
    /// `T` must be `Copy` and contain no pointers or `Drop` logic: the
    /// memory is shared raw bytes across address spaces.
    pub struct SharedRegion<T> {
        map: *mut u8,
        map_len: usize,
        mutex: *mut libc::pthread_mutex_t,
        value: *mut UnsafeCell<T>,
    }

    unsafe impl<T: Send> Send for SharedRegion<T> {}
    unsafe impl<T: Send> Sync for SharedRegion<T> {}

    impl<T: Copy> SharedRegion<T> {
        pub fn new(value: T) -> Self {
            let mutex_len = std::mem::size_of::<libc::pthread_mutex_t>();
            let value_len = std::mem::size_of::<T>();
            let map_len = mutex_len + value_len;

            let map = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    map_len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            assert!(map != libc::MAP_FAILED, "mmap for SharedRegion failed");
            let map = map as *mut u8;

            let mutex = map as *mut libc::pthread_mutex_t;
            unsafe {
                let mut attr: MaybeUninit<libc::pthread_mutexattr_t> = MaybeUninit::uninit();
                libc::pthread_mutexattr_init(attr.as_mut_ptr());
                libc::pthread_mutexattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
                libc::pthread_mutex_init(mutex, attr.as_ptr());
                libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
            }

            let value_ptr = unsafe { map.add(mutex_len) } as *mut UnsafeCell<T>;
            unsafe {
                value_ptr.write(UnsafeCell::new(value));
            }

            Self { map, map_len, mutex, value: value_ptr }
        }

        pub fn acquire(&self) -> RegionGuard<'_, T> {
            unsafe {
                libc::pthread_mutex_lock(self.mutex);
            }
            RegionGuard { region: self }
        }
    }

    impl<T> Drop for SharedRegion<T> {
        fn drop(&mut self) {
            unsafe {
                libc::pthread_mutex_destroy(self.mutex);
                libc::munmap(self.map as *mut _, self.map_len);
            }
        }
    }

    /// Deref target handed out through `acquire()`; unlocks the pthread
    /// mutex on drop.
    pub struct RegionGuard<'a, T> {
        region: &'a SharedRegion<T>,
    }

    impl<'a, T> std::ops::Deref for RegionGuard<'a, T> {
        type Target = T;
        fn deref(&self) -> &T {
            unsafe { &*(*self.region.value).get() }
        }
    }

    impl<'a, T> std::ops::DerefMut for RegionGuard<'a, T> {
        fn deref_mut(&mut self) -> &mut T {
            unsafe { &mut *(*self.region.value).get() }
        }
    }

    impl<'a, T> Drop for RegionGuard<'a, T> {
        fn drop(&mut self) {
            unsafe {
                libc::pthread_mutex_unlock(self.region.mutex);
            }
        }
    }
}

#[cfg(feature = "shared_mmap")]
pub use mmap_backend::{RegionGuard, SharedRegion};

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mutex_backend_serializes_access() {
        let region = SharedRegion::new(0u32);
        {
            let mut g = region.acquire();
            *g += 1;
        }
        assert_eq!(*region.acquire(), 1);
    }
}
