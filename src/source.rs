//! Shared, seekable byte source.
//!
//! A compiled markup stream is read through a single underlying `Read + Seek`
//! object. Deferred content created during the main decode keeps reading from
//! the same bytes long after the main pass finished, so the reader is held by an
//! explicitly reference-counted [`SharedSource`]: every borrower calls
//! [`SharedSource::release`] (or drops its handle) and the reader is closed when
//! the last borrower is gone.
//!
//! Jeder [`ByteCursor`] merkt sich seine eigene logische Position. Hat ein anderer
//! Borrower den physischen Cursor verschoben, wird vor dem Lesen neu positioniert.

use std::cell::{Cell, RefCell};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::rc::Rc;

use crate::{Error, Result};

/// Object-safe combination of `Read + Seek`.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

struct SourceState {
    /// `None` nachdem der letzte Borrower freigegeben hat.
    reader: Option<Box<dyn ReadSeek>>,
    /// Physische Position des Readers.
    position: u64,
}

struct SourceInner {
    state: RefCell<SourceState>,
    /// Gesamtlaenge in Bytes (einmalig beim Oeffnen bestimmt).
    len: u64,
    borrowers: Cell<usize>,
    /// Der letzte Borrower hat freigegeben, waehrend der Reader in Benutzung war.
    close_pending: Cell<bool>,
}

impl SourceInner {
    /// Drops the reader unless it is borrowed right now. Returns true once closed.
    fn try_close(&self) -> bool {
        match self.state.try_borrow_mut() {
            Ok(mut state) => {
                if state.reader.take().is_some() {
                    log::debug!("byte source closed");
                }
                self.close_pending.set(false);
                true
            }
            Err(_) => {
                self.close_pending.set(true);
                false
            }
        }
    }

    fn close_if_pending(&self) {
        if self.close_pending.get() {
            self.try_close();
        }
    }
}

/// Reference-counted handle to the underlying byte reader.
pub struct SharedSource {
    inner: Rc<SourceInner>,
    released: bool,
}

impl SharedSource {
    /// Wraps a seekable reader. The handle starts with one borrower.
    pub fn new<R: Read + Seek + 'static>(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: Rc::new(SourceInner {
                state: RefCell::new(SourceState { reader: Some(Box::new(reader)), position: 0 }),
                len,
                borrowers: Cell::new(1),
                close_pending: Cell::new(false),
            }),
            released: false,
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self {
            inner: Rc::new(SourceInner {
                state: RefCell::new(SourceState {
                    reader: Some(Box::new(Cursor::new(bytes))),
                    position: 0,
                }),
                len,
                borrowers: Cell::new(1),
                close_pending: Cell::new(false),
            }),
            released: false,
        }
    }

    /// Registers another borrower and returns its handle.
    pub fn share(&self) -> Result<Self> {
        if self.released || self.is_closed() {
            return Err(Error::Disposed);
        }
        self.inner.borrowers.set(self.inner.borrowers.get() + 1);
        Ok(Self { inner: Rc::clone(&self.inner), released: false })
    }

    /// Gives up this handle's claim. Closes the reader when it was the last one.
    ///
    /// Idempotent per handle. If the reader is in use at that moment, it is
    /// closed as soon as the pending read returns.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let remaining = self.inner.borrowers.get().saturating_sub(1);
        self.inner.borrowers.set(remaining);
        if remaining == 0 && !self.inner.try_close() {
            log::debug!("byte source busy, close deferred");
        }
    }

    /// Number of handles that have not been released yet.
    pub fn borrowers(&self) -> usize {
        self.inner.borrowers.get()
    }

    /// True once the underlying reader has been dropped.
    pub fn is_closed(&self) -> bool {
        self.inner.close_if_pending();
        self.inner.state.try_borrow().map(|s| s.reader.is_none()).unwrap_or(false)
    }

    /// Total length of the source in bytes.
    pub fn len(&self) -> u64 {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Reads up to `buf.len()` bytes at absolute offset `pos`.
    pub(crate) fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        if self.released {
            return Err(Error::Disposed);
        }
        let result = self.read_locked(pos, buf);
        self.inner.close_if_pending();
        result
    }

    fn read_locked(&self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.inner.state.try_borrow_mut().map_err(|_| Error::SourceBusy)?;
        let state = &mut *state;
        let reader = state.reader.as_mut().ok_or(Error::Disposed)?;
        if state.position != pos {
            reader.seek(SeekFrom::Start(pos))?;
            state.position = pos;
        }
        let mut filled = 0;
        while filled < buf.len() {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        state.position = pos + filled as u64;
        Ok(filled)
    }
}

impl Drop for SharedSource {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SharedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSource")
            .field("len", &self.inner.len)
            .field("borrowers", &self.inner.borrowers.get())
            .field("released", &self.released)
            .finish()
    }
}

/// Positioned view on a [`SharedSource`], bounded by an end offset.
#[derive(Debug)]
pub struct ByteCursor {
    source: SharedSource,
    pos: u64,
    end: u64,
}

impl ByteCursor {
    /// Cursor over the whole source.
    pub fn new(source: SharedSource) -> Self {
        let end = source.len();
        Self { source, pos: 0, end }
    }

    /// Cursor restricted to `start..end`.
    pub fn with_bounds(source: SharedSource, start: u64, end: u64) -> Self {
        let end = end.min(source.len());
        Self { source, pos: start.min(end), end }
    }

    /// Absolute position of the next byte.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Exclusive end offset of this view.
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn remaining(&self) -> u64 {
        self.end - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.end
    }

    /// Moves to an absolute position inside the view.
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        if pos > self.end {
            return Err(Error::PrematureEndOfStream);
        }
        self.pos = pos;
        Ok(())
    }

    /// The shared source behind this cursor.
    pub fn source(&self) -> &SharedSource {
        &self.source
    }

    /// Releases the cursor's claim on the source.
    pub fn release(&mut self) {
        self.source.release();
    }

    /// Reads a single byte; `None` at the end of the view.
    pub fn read_u8_opt(&mut self) -> Result<Option<u8>> {
        if self.is_at_end() {
            return Ok(None);
        }
        let mut buf = [0u8; 1];
        let n = self.source.read_at(self.pos, &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.pos += 1;
        Ok(Some(buf[0]))
    }

    /// Reads exactly `len` bytes.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        if (len as u64) > self.remaining() {
            return Err(Error::PrematureEndOfStream);
        }
        let mut buf = vec![0u8; len];
        let n = self.source.read_at(self.pos, &mut buf)?;
        if n != len {
            return Err(Error::PrematureEndOfStream);
        }
        self.pos += len as u64;
        Ok(buf)
    }
}

impl Read for ByteCursor {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let want = buf.len().min(self.remaining() as usize);
        if want == 0 {
            return Ok(0);
        }
        let n = self
            .source
            .read_at(self.pos, &mut buf[..want])
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        self.pos += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_handles_keep_reader_alive() {
        let mut first = SharedSource::from_bytes(vec![1, 2, 3]);
        let mut second = first.share().unwrap();
        assert_eq!(first.borrowers(), 2);

        first.release();
        assert!(!second.is_closed());
        let mut buf = [0u8; 2];
        assert_eq!(second.read_at(1, &mut buf).unwrap(), 2);
        assert_eq!(buf, [2, 3]);

        second.release();
        assert_eq!(second.borrowers(), 0);
        assert!(second.is_closed());
    }

    #[test]
    fn release_is_idempotent() {
        let mut a = SharedSource::from_bytes(vec![0]);
        let b = a.share().unwrap();
        a.release();
        a.release();
        assert_eq!(b.borrowers(), 1);
        assert!(!b.is_closed());
    }

    #[test]
    fn released_handle_is_disposed() {
        let mut a = SharedSource::from_bytes(vec![0]);
        let _b = a.share().unwrap();
        a.release();
        let mut buf = [0u8; 1];
        assert_eq!(a.read_at(0, &mut buf), Err(Error::Disposed));
        assert!(matches!(a.share(), Err(Error::Disposed)));
    }

    #[test]
    fn drop_releases() {
        let a = SharedSource::from_bytes(vec![0]);
        {
            let _b = a.share().unwrap();
            assert_eq!(a.borrowers(), 2);
        }
        assert_eq!(a.borrowers(), 1);
    }

    #[test]
    fn cursors_repositions_after_foreign_read() {
        let source = SharedSource::from_bytes(vec![10, 11, 12, 13, 14]);
        let mut a = ByteCursor::new(source.share().unwrap());
        let mut b = ByteCursor::with_bounds(source.share().unwrap(), 3, 5);

        assert_eq!(a.read_u8_opt().unwrap(), Some(10));
        assert_eq!(b.read_u8_opt().unwrap(), Some(13));
        assert_eq!(a.read_u8_opt().unwrap(), Some(11));
        assert_eq!(b.read_u8_opt().unwrap(), Some(14));
        assert_eq!(b.read_u8_opt().unwrap(), None);
        assert!(b.is_at_end());
    }

    #[test]
    fn read_vec_past_end_fails() {
        let mut c = ByteCursor::new(SharedSource::from_bytes(vec![1, 2]));
        assert_eq!(c.read_vec(3), Err(Error::PrematureEndOfStream));
        assert_eq!(c.read_vec(2).unwrap(), vec![1, 2]);
        assert_eq!(c.position(), 2);
    }

    #[test]
    fn close_waits_for_a_busy_reader() {
        let mut a = SharedSource::from_bytes(vec![0]);
        let inner = Rc::clone(&a.inner);
        let in_use = inner.state.borrow();
        a.release();
        assert!(inner.close_pending.get());
        assert!(!a.is_closed());

        drop(in_use);
        assert!(a.is_closed());
        assert!(!inner.close_pending.get());
    }

    #[test]
    fn new_measures_length() {
        let source = SharedSource::new(Cursor::new(vec![0u8; 42])).unwrap();
        assert_eq!(source.len(), 42);
    }
}
