//! Segmented blob reader and writer.
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    Result, Transaction,
    common::{span, suppressed, verbose},
    error::StateError,
    gds::codes::{MAX_SEGMENT_SIZE, RBL_CREATE, RBL_EOF, RBL_EOF_PENDING, RBL_SEGMENT},
    transport::{BlobHandle, SegmentStatus},
    types::BlobId,
};

/// Lifecycle of a [`Blob`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobState {
    Unopened,
    Creating,
    Opening,
    Active,
    Closed,
    Cancelled,
}

/// Blob content, scoped to a transaction.
///
/// Content is moved in segments of the attachment packet size.
///
/// ```no_run
/// # fn app(tx: &firebro::Transaction) -> firebro::Result<()> {
/// use firebro::Blob;
///
/// let mut blob = Blob::new(tx);
/// blob.write(b"content")?;
///
/// let mut blob = Blob::with_id(tx, blob.id());
/// assert_eq!(&blob.read()?[..], b"content");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Blob {
    transaction: Transaction,
    id: BlobId,
    handle: Option<BlobHandle>,
    state: BlobState,
    flags: u8,
    position: usize,
    segment_size: usize,
}

impl Blob {
    /// New blob, [`write`][Blob::write] assigns the id.
    pub fn new(transaction: &Transaction) -> Self {
        Self::with_id(transaction, BlobId::NULL)
    }

    /// Existing blob.
    pub fn with_id(transaction: &Transaction, id: BlobId) -> Self {
        Self {
            segment_size: transaction.attachment().packet_size().clamp(1, MAX_SEGMENT_SIZE),
            transaction: transaction.clone(),
            id,
            handle: None,
            state: BlobState::Unopened,
            flags: 0,
            position: 0,
        }
    }

    pub fn id(&self) -> BlobId {
        self.id
    }

    pub fn state(&self) -> BlobState {
        self.state
    }

    /// Bytes moved since the blob was opened or created.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Maximum bytes per segment.
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Clamped to `1..=65535`.
    pub fn set_segment_size(&mut self, size: usize) {
        self.segment_size = size.clamp(1, MAX_SEGMENT_SIZE);
    }

    /// Read the whole content.
    pub fn read(&mut self) -> Result<Bytes> {
        span!("blob_read", id = ?self.id);
        self.open()?;
        match self.read_segments() {
            Ok(data) => {
                self.close()?;
                Ok(data)
            },
            Err(err) => {
                self.cancel();
                Err(err)
            },
        }
    }

    /// Read the whole content as text in the attachment charset.
    pub fn read_string(&mut self) -> Result<String> {
        let data = self.read()?;
        Ok(self.transaction.attachment().charset().decode(&data))
    }

    /// Replace the content with a new blob, [`id`][Blob::id] returns the new id.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        span!("blob_write", len = data.len());
        self.create()?;
        match self.write_segments(data) {
            Ok(()) => self.close(),
            Err(err) => {
                self.cancel();
                Err(err)
            },
        }
    }

    /// Write text encoded in the attachment charset.
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        let data = self.transaction.attachment().charset().encode(text)?;
        self.write(&data)
    }

    fn create(&mut self) -> Result<()> {
        self.begin(BlobState::Creating)?;
        let tx = self.transaction.handle()?;
        let (handle, id) = self.transaction.attachment().call(|t| t.create_blob(tx)).inspect_err(|_| {
            self.state = BlobState::Unopened;
        })?;
        self.handle = Some(handle);
        self.id = id;
        self.flags = RBL_CREATE;
        self.state = BlobState::Active;
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        self.begin(BlobState::Opening)?;
        let tx = self.transaction.handle()?;
        let id = self.id;
        let handle = self.transaction.attachment().call(|t| t.open_blob(tx, id)).inspect_err(|_| {
            self.state = BlobState::Unopened;
        })?;
        self.handle = Some(handle);
        self.flags = 0;
        self.state = BlobState::Active;
        Ok(())
    }

    fn begin(&mut self, next: BlobState) -> Result<()> {
        if self.state == BlobState::Active {
            return Err(StateError::new("blob is already open").into());
        }
        self.state = next;
        self.position = 0;
        Ok(())
    }

    fn active(&self) -> Result<BlobHandle> {
        match (self.state, self.handle) {
            (BlobState::Active, Some(handle)) => Ok(handle),
            _ => Err(StateError::new("blob is not open").into()),
        }
    }

    fn read_segments(&mut self) -> Result<Bytes> {
        let handle = self.active()?;
        let max = self.segment_size;
        let mut data = BytesMut::new();

        while self.flags & RBL_EOF == 0 {
            let (segment, status) = self.transaction.attachment().call(|t| t.get_segment(handle, max))?;
            verbose!(len = segment.len(), ?status, "get_segment");

            self.position += segment.len();
            data.put(segment);

            match status {
                SegmentStatus::Complete => self.flags &= !RBL_SEGMENT,
                SegmentStatus::Partial => self.flags |= RBL_SEGMENT,
                SegmentStatus::Eof => self.flags |= RBL_EOF_PENDING | RBL_EOF,
            }
        }

        Ok(data.freeze())
    }

    fn write_segments(&mut self, data: &[u8]) -> Result<()> {
        let handle = self.active()?;
        for chunk in data.chunks(self.segment_size) {
            self.transaction.attachment().call(|t| t.put_segment(handle, chunk))?;
            self.position += chunk.len();
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let handle = self.active()?;
        self.transaction.attachment().call(|t| t.close_blob(handle))?;
        self.handle = None;
        self.state = BlobState::Closed;
        Ok(())
    }

    /// Best effort cancel, errors are suppressed.
    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = self.transaction.attachment().call(|t| t.cancel_blob(handle)) {
                suppressed!("cancel blob", err);
            }
        }
        self.state = BlobState::Cancelled;
    }
}

impl Drop for Blob {
    fn drop(&mut self) {
        if self.state == BlobState::Active {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::mock;

    #[test]
    fn roundtrip_segments() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();
        let data = (0..1000u32).map(|i| i as u8).collect::<Vec<_>>();

        let mut blob = Blob::new(&tx);
        blob.set_segment_size(300);
        blob.write(&data).unwrap();
        assert_eq!(blob.state(), BlobState::Closed);
        assert_eq!(blob.position(), 1000);
        assert_eq!(mock::with(&attachment, |m| m.calls("put_segment")), 4);

        let mut read = Blob::with_id(&tx, blob.id());
        read.set_segment_size(300);
        assert_eq!(&read.read().unwrap()[..], &data[..]);
        assert_eq!(mock::with(&attachment, |m| m.calls("get_segment")), 4);
    }

    #[test]
    fn segment_size_limit() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut blob = Blob::new(&tx);
        blob.set_segment_size(70_000);
        assert_eq!(blob.segment_size(), 65535);
        blob.write(&vec![7; 70_000]).unwrap();
        assert_eq!(mock::with(&attachment, |m| m.calls("put_segment")), 2);

        blob.set_segment_size(0);
        assert_eq!(blob.segment_size(), 1);
    }

    #[test]
    fn text_in_attachment_charset() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut blob = Blob::new(&tx);
        blob.write_str("héllo").unwrap();
        let mut read = Blob::with_id(&tx, blob.id());
        assert_eq!(read.read_string().unwrap(), "héllo");
    }

    #[test]
    fn read_failure_cancels() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        mock::with(&attachment, |m| m.fail_next("get_segment"));
        let mut blob = Blob::new(&tx);
        blob.write(b"abc").unwrap();

        let mut read = Blob::with_id(&tx, blob.id());
        assert!(read.read().is_err());
        assert_eq!(read.state(), BlobState::Cancelled);
        assert_eq!(mock::with(&attachment, |m| m.calls("cancel_blob")), 1);
    }

    #[test]
    fn unknown_id() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut blob = Blob::with_id(&tx, BlobId::new(42));
        assert!(blob.read().is_err());
        assert_eq!(blob.state(), BlobState::Unopened);
    }
}
