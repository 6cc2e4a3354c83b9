//! System V shared-memory segments with a 4-byte size header.
//!
//! Layout of every segment:
//!
//! ```text
//! ┌─────────────────┬──────────────────────────┐
//! │ Size S (4B LE)  │ Payload (S bytes)        │
//! └─────────────────┴──────────────────────────┘
//!   offset 0          offset 4 .. 4 + capacity
//! ```
//!
//! The producer creates, writes and eventually destroys a segment; consumers
//! only attach, read and detach via [`read_by_key`].

use std::ffi::CString;
use std::io::ErrorKind;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Size of the payload-length header at the start of every segment.
pub const HEADER_BYTES: usize = 4;

const SEGMENT_MODE: libc::c_int = 0o666;

/// A shared-memory segment created by this process.
///
/// The segment is removed from the system when the handle is dropped or
/// [`destroy`](Self::destroy)ed, unless ownership was given up with
/// [`into_key`](Self::into_key).
#[derive(Debug)]
pub struct SharedSegment {
    key: i32,
    id: i32,
    capacity: usize,
    owned: bool,
}

impl SharedSegment {
    /// Create a segment able to hold `capacity` payload bytes under a fresh key.
    ///
    /// Keys are drawn at random until one is free.
    pub fn create(capacity: usize) -> Result<Self> {
        loop {
            let key = random_key();
            match Self::create_with_key(key, capacity) {
                Err(TransportError::SegmentExists { .. }) => continue,
                other => return other,
            }
        }
    }

    /// Create a segment under an explicit key.
    ///
    /// Fails with [`TransportError::SegmentExists`] if the key is taken.
    pub fn create_with_key(key: i32, capacity: usize) -> Result<Self> {
        if key == libc::IPC_PRIVATE {
            return Err(TransportError::Shm {
                op: "shmget",
                key,
                source: std::io::Error::new(
                    ErrorKind::InvalidInput,
                    "IPC_PRIVATE cannot be attached by key",
                ),
            });
        }

        let size = capacity
            .checked_add(HEADER_BYTES)
            .ok_or(TransportError::SegmentSize {
                key,
                size: capacity,
                capacity: usize::MAX - HEADER_BYTES,
            })?;

        // SAFETY: shmget takes plain integer arguments and has no memory effects here.
        let id = unsafe {
            libc::shmget(
                key,
                size,
                SEGMENT_MODE | libc::IPC_CREAT | libc::IPC_EXCL,
            )
        };
        if id == -1 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::AlreadyExists {
                return Err(TransportError::SegmentExists { key });
            }
            return Err(TransportError::Shm {
                op: "shmget",
                key,
                source: err,
            });
        }

        debug!(key, id, capacity, "created shared-memory segment");
        Ok(Self {
            key,
            id,
            capacity,
            owned: true,
        })
    }

    /// Create a segment under the key `ftok(3)` derives from `path` and `project_id`.
    ///
    /// Producer and consumer that agree on the path find the same segment
    /// without exchanging the key. See [`key_for_path`].
    pub fn create_for_path(
        path: impl AsRef<Path>,
        project_id: u8,
        capacity: usize,
    ) -> Result<Self> {
        let key = key_for_path(path, project_id)?;
        Self::create_with_key(key, capacity)
    }

    /// Key consumers use to find this segment.
    pub fn key(&self) -> i32 {
        self.key
    }

    /// Payload capacity in bytes (excluding the size header).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write `data` behind a fresh size header.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        if data.len() > self.capacity || data.len() > u32::MAX as usize {
            return Err(TransportError::SegmentSize {
                key: self.key,
                size: data.len(),
                capacity: self.capacity,
            });
        }

        let mut attachment = Attachment::attach(self.id, self.key, false)?;
        let region = attachment.as_mut_slice();
        region[..HEADER_BYTES].copy_from_slice(&(data.len() as u32).to_le_bytes());
        region[HEADER_BYTES..HEADER_BYTES + data.len()].copy_from_slice(data);

        debug!(key = self.key, size = data.len(), "wrote shared-memory payload");
        Ok(())
    }

    /// Read the current payload back.
    pub fn read(&self) -> Result<Vec<u8>> {
        read_by_id(self.id, self.key)
    }

    /// Replace the segment with an empty one of `new_capacity` under the same key.
    ///
    /// Readers still attached to the old segment keep their mapping; new
    /// readers see the new one.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        remove_id(self.id, self.key)?;
        self.owned = false;
        let replacement = Self::create_with_key(self.key, new_capacity)?;
        *self = replacement;
        Ok(())
    }

    /// Remove the segment from the system.
    pub fn destroy(mut self) -> Result<()> {
        self.owned = false;
        remove_id(self.id, self.key)
    }

    /// Give up ownership and return the key; the segment outlives this process.
    pub fn into_key(mut self) -> i32 {
        self.owned = false;
        self.key
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        if self.owned {
            if let Err(err) = remove_id(self.id, self.key) {
                debug!(key = self.key, error = %err, "failed to remove shared-memory segment");
            }
        }
    }
}

/// Attach to the segment for `key`, copy its payload out and detach.
///
/// Fails with [`TransportError::SegmentNotFound`] if no segment exists and
/// with [`TransportError::SegmentSize`] if the header claims more bytes than
/// the segment holds.
pub fn read_by_key(key: i32) -> Result<Vec<u8>> {
    let id = lookup(key)?;
    read_by_id(id, key)
}

/// Payload capacity of the segment for `key` (segment size minus header).
pub fn segment_capacity(key: i32) -> Result<usize> {
    let id = lookup(key)?;
    Ok(stat_size(id, key)?.saturating_sub(HEADER_BYTES))
}

/// Remove the segment for `key`, whoever created it.
pub fn remove_by_key(key: i32) -> Result<()> {
    let id = lookup(key)?;
    remove_id(id, key)
}

/// Derive the System V key for `path` and `project_id` with `ftok(3)`.
///
/// `path` must exist; the key depends on its inode. `project_id` must be
/// nonzero.
pub fn key_for_path(path: impl AsRef<Path>, project_id: u8) -> Result<i32> {
    let path = path.as_ref();
    let key_error = |source: std::io::Error| TransportError::KeyPath {
        path: path.to_path_buf(),
        source,
    };

    if project_id == 0 {
        return Err(key_error(std::io::Error::new(
            ErrorKind::InvalidInput,
            "project id must be nonzero",
        )));
    }
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        key_error(std::io::Error::new(
            ErrorKind::InvalidInput,
            "path contains a NUL byte",
        ))
    })?;

    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    let key = unsafe { libc::ftok(c_path.as_ptr(), libc::c_int::from(project_id)) };
    if key == -1 {
        return Err(key_error(std::io::Error::last_os_error()));
    }
    debug!(?path, project_id, key, "derived segment key");
    Ok(key)
}

fn read_by_id(id: i32, key: i32) -> Result<Vec<u8>> {
    let attachment = Attachment::attach(id, key, true)?;
    let region = attachment.as_slice();
    if region.len() < HEADER_BYTES {
        return Err(TransportError::SegmentSize {
            key,
            size: HEADER_BYTES,
            capacity: region.len(),
        });
    }

    let mut header = [0u8; HEADER_BYTES];
    header.copy_from_slice(&region[..HEADER_BYTES]);
    let size = u32::from_le_bytes(header) as usize;
    let capacity = region.len() - HEADER_BYTES;
    if size > capacity {
        return Err(TransportError::SegmentSize {
            key,
            size,
            capacity,
        });
    }

    let payload = region[HEADER_BYTES..HEADER_BYTES + size].to_vec();
    debug!(key, size, "read shared-memory payload");
    Ok(payload)
}

fn lookup(key: i32) -> Result<i32> {
    // SAFETY: shmget takes plain integer arguments; size 0 and no flags only look up.
    let id = unsafe { libc::shmget(key, 0, 0) };
    if id == -1 {
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::NotFound {
            return Err(TransportError::SegmentNotFound { key });
        }
        return Err(TransportError::Shm {
            op: "shmget",
            key,
            source: err,
        });
    }
    Ok(id)
}

fn stat_size(id: i32, key: i32) -> Result<usize> {
    // SAFETY: shmid_ds is plain old data; all-zero is a valid bit pattern.
    let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
    // SAFETY: `ds` is a valid, writable shmid_ds for IPC_STAT to fill in.
    let rc = unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) };
    if rc == -1 {
        return Err(TransportError::Shm {
            op: "shmctl(IPC_STAT)",
            key,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(ds.shm_segsz as usize)
}

fn remove_id(id: i32, key: i32) -> Result<()> {
    // SAFETY: IPC_RMID ignores the buffer argument, so a null pointer is allowed.
    let rc = unsafe { libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINVAL) || err.raw_os_error() == Some(libc::EIDRM) {
            return Err(TransportError::SegmentNotFound { key });
        }
        return Err(TransportError::Shm {
            op: "shmctl(IPC_RMID)",
            key,
            source: err,
        });
    }
    debug!(key, id, "removed shared-memory segment");
    Ok(())
}

fn random_key() -> i32 {
    loop {
        let key: i32 = rand::random();
        if key != libc::IPC_PRIVATE {
            return key;
        }
    }
}

/// A mapping of a segment into this process, detached on drop.
struct Attachment {
    addr: *mut libc::c_void,
    len: usize,
}

impl Attachment {
    fn attach(id: i32, key: i32, read_only: bool) -> Result<Self> {
        let len = stat_size(id, key)?;
        let flags = if read_only { libc::SHM_RDONLY } else { 0 };

        // SAFETY: a null address lets the kernel pick the mapping location.
        let addr = unsafe { libc::shmat(id, std::ptr::null(), flags) };
        if addr as isize == -1 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINVAL) || err.raw_os_error() == Some(libc::EIDRM) {
                return Err(TransportError::SegmentNotFound { key });
            }
            return Err(TransportError::Shm {
                op: "shmat",
                key,
                source: err,
            });
        }
        Ok(Self { addr, len })
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: `addr` maps `len` bytes (the segment size from IPC_STAT) for
        // as long as `self` is alive.
        unsafe { std::slice::from_raw_parts(self.addr.cast::<u8>(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`; attached read-write by `SharedSegment::write`.
        unsafe { std::slice::from_raw_parts_mut(self.addr.cast::<u8>(), self.len) }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        // SAFETY: `addr` was returned by a successful shmat and is detached once.
        unsafe {
            libc::shmdt(self.addr);
        }
    }
}
