//! Shared memory pixel buffers
//!
//! A [`PixelBuffer`] is a POSIX shared memory segment mapped into this process
//! and wrapped into a `wl_buffer` the compositor can read without copying. Each
//! buffer gets a segment of its own, sized exactly `width * height * 4` bytes.

use std::{
    ffi::c_void,
    os::unix::io::{AsFd, OwnedFd},
    ptr::{self, NonNull},
    slice,
};

use rand::{distributions::Alphanumeric, Rng};
use rustix::{
    fs::Mode,
    io::Errno,
    mm::{MapFlags, ProtFlags},
    shm::ShmOFlags,
};
use tracing::{debug, trace};
use wayland_client::{
    protocol::{
        wl_buffer::WlBuffer,
        wl_shm::{self, WlShm},
        wl_shm_pool::WlShmPool,
    },
    Dispatch, QueueHandle,
};

use crate::{
    render::{Canvas, BYTES_PER_PIXEL},
    utils::{Physical, Size},
};

/// How many fresh names are tried when a segment name is already taken
const SHM_NAME_RETRIES: usize = 100;

/// Errors that can occur while allocating a [`PixelBuffer`]
#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    /// Width or height is zero
    #[error("cannot allocate an empty buffer")]
    Empty,
    /// The buffer does not fit into a `wl_shm_pool`
    #[error("buffer of {0} is too large")]
    TooLarge(Size<u32, Physical>),
    /// Every generated segment name was already in use
    #[error("no free shared memory name after 100 attempts")]
    NameExhausted,
    /// The segment could not be created
    #[error("failed to create shared memory segment")]
    Open(#[source] Errno),
    /// The segment could not be grown to the buffer size
    #[error("failed to resize shared memory segment")]
    Resize(#[source] Errno),
    /// The segment could not be mapped
    #[error("failed to map shared memory segment")]
    Map(#[source] Errno),
}

/// Computes the byte length of a tightly packed `Argb8888` buffer
pub fn buffer_len(size: Size<u32, Physical>) -> Result<usize, ShmError> {
    if size.is_empty() {
        return Err(ShmError::Empty);
    }
    (size.w as usize)
        .checked_mul(size.h as usize)
        .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
        .filter(|&len| len <= i32::MAX as usize)
        .ok_or(ShmError::TooLarge(size))
}

/// A shared memory segment mapped read-write into this process
///
/// The mapping outlives the descriptor returned by [`ShmSegment::create`]; it is
/// released by [`ShmSegment::unmap`] or on drop.
#[derive(Debug)]
pub struct ShmSegment {
    ptr: Option<NonNull<u8>>,
    len: usize,
}

impl ShmSegment {
    /// Creates a segment of exactly `len` bytes
    ///
    /// Returns the mapping along with the segment's descriptor, which is only
    /// needed to hand the segment over to the compositor.
    pub fn create(len: usize) -> Result<(ShmSegment, OwnedFd), ShmError> {
        if len == 0 {
            return Err(ShmError::Empty);
        }

        let fd = open_shm_file()?;
        rustix::fs::ftruncate(&fd, len as u64).map_err(ShmError::Resize)?;

        // SAFETY: a fresh shared mapping of a descriptor we own, no existing memory is aliased
        let ptr = unsafe {
            rustix::mm::mmap(
                ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &fd,
                0,
            )
        }
        .map_err(ShmError::Map)?;

        trace!(len, "Mapped shared memory segment");
        Ok((
            ShmSegment {
                ptr: NonNull::new(ptr.cast::<u8>()),
                len,
            },
            fd,
        ))
    }

    /// Length of the mapping in bytes, 0 once unmapped
    pub fn len(&self) -> usize {
        if self.ptr.is_some() {
            self.len
        } else {
            0
        }
    }

    /// Whether the segment has been unmapped
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The mapped memory, empty once unmapped
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.ptr {
            // SAFETY: the mapping is `len` bytes long, readable and writable, and
            // exclusively borrowed through `self` until it is unmapped
            Some(ptr) => unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), self.len) },
            None => &mut [],
        }
    }

    /// Releases the mapping, does nothing if already released
    pub fn unmap(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: the pointer came from `mmap` with this length and no slice into it outlives `&mut self`
            if let Err(err) = unsafe { rustix::mm::munmap(ptr.as_ptr().cast::<c_void>(), self.len) } {
                debug!(?err, "Failed to unmap shared memory segment");
            }
        }
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        self.unmap();
    }
}

/// Opens an anonymous shared memory file
///
/// The name is unlinked right away, only the descriptor keeps the segment alive.
fn open_shm_file() -> Result<OwnedFd, ShmError> {
    let mut rng = rand::thread_rng();

    for _ in 0..SHM_NAME_RETRIES {
        let suffix = (0..7).map(|_| rng.sample(Alphanumeric) as char).collect::<String>();
        let name = format!("/wlrsetroot-{:x}-{}", std::process::id(), suffix);

        match rustix::shm::shm_open(
            name.as_str(),
            ShmOFlags::RDWR | ShmOFlags::CREATE | ShmOFlags::EXCL,
            Mode::RUSR | Mode::WUSR,
        ) {
            Ok(fd) => {
                let _ = rustix::shm::shm_unlink(name.as_str());
                return Ok(fd);
            }
            Err(Errno::EXIST) => continue,
            Err(err) => return Err(ShmError::Open(err)),
        }
    }

    Err(ShmError::NameExhausted)
}

/// The server side object a [`PixelBuffer`] hands to the compositor
pub trait BufferHandle {
    /// Asks the server to destroy the object
    fn destroy(&self);
}

impl BufferHandle for WlBuffer {
    fn destroy(&self) {
        WlBuffer::destroy(self);
    }
}

/// A `wl_buffer` backed by its own [`ShmSegment`]
#[derive(Debug)]
pub struct PixelBuffer<B: BufferHandle = WlBuffer> {
    segment: ShmSegment,
    buffer: Option<B>,
    size: Size<u32, Physical>,
}

impl PixelBuffer<WlBuffer> {
    /// Allocates a buffer of `size` device pixels and registers it with the compositor
    pub fn create<D>(
        shm: &WlShm,
        qh: &QueueHandle<D>,
        size: Size<u32, Physical>,
        format: wl_shm::Format,
    ) -> Result<PixelBuffer, ShmError>
    where
        D: Dispatch<WlShmPool, ()> + Dispatch<WlBuffer, ()> + 'static,
    {
        let len = buffer_len(size)?;
        let stride = size.w as i32 * BYTES_PER_PIXEL as i32;
        let (segment, fd) = ShmSegment::create(len)?;

        let pool = shm.create_pool(fd.as_fd(), len as i32, qh, ());
        let buffer = pool.create_buffer(0, size.w as i32, size.h as i32, stride, format, qh, ());
        // the buffer keeps the pool's memory alive on the compositor side
        pool.destroy();
        drop(fd);

        debug!(%size, len, "Created pixel buffer");
        Ok(PixelBuffer::from_parts(segment, buffer, size))
    }
}

impl<B: BufferHandle> PixelBuffer<B> {
    fn from_parts(segment: ShmSegment, buffer: B, size: Size<u32, Physical>) -> PixelBuffer<B> {
        PixelBuffer {
            segment,
            buffer: Some(buffer),
            size,
        }
    }

    /// The `wl_buffer`, `None` once destroyed
    pub fn wl_buffer(&self) -> Option<&B> {
        self.buffer.as_ref()
    }

    /// Destroys the `wl_buffer` and unmaps the memory, does nothing if already destroyed
    pub fn destroy(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            buffer.destroy();
            debug!(size = %self.size, "Destroyed pixel buffer");
        }
        self.segment.unmap();
    }
}

impl<B: BufferHandle> Canvas for PixelBuffer<B> {
    fn size(&self) -> Size<u32, Physical> {
        self.size
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        self.segment.as_mut_slice()
    }
}

impl<B: BufferHandle> Drop for PixelBuffer<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}
