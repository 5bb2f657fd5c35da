//! Bounded reader for CGI request bodies.
//!
//! The server promises at least CONTENT_LENGTH bytes on standard input.
//! Read exactly that many. A short read is an error, never a silent
//! truncation.
//
use crate::CgiError;
use std::io::Read;

/// Reads exactly `limit` bytes from the wrapped stream, and no more.
pub struct BoundedReader<R: Read> {
    inner: R,
    limit: usize,
}

impl<R: Read> BoundedReader<R> {
    const INITIAL_CAPACITY: usize = 64 * 1024;

    pub fn new(inner: R, limit: usize) -> Self {
        Self { inner, limit }
    }

    /// Read the whole bounded body.
    /// Blocks until `limit` bytes are in or the stream ends.
    pub fn read_body(self) -> Result<Vec<u8>, CgiError> {
        //  Don't trust the declared length for the allocation. Grow as data arrives.
        let mut buf = Vec::with_capacity(self.limit.min(Self::INITIAL_CAPACITY));
        self.inner.take(self.limit as u64).read_to_end(&mut buf)?;
        if buf.len() < self.limit {
            log::error!("Body ended after {} of {} bytes", buf.len(), self.limit);
            return Err(CgiError::IncompleteBody {
                expected: self.limit,
                received: buf.len(),
            });
        }
        log::debug!("Read {} body bytes", buf.len());
        Ok(buf)
    }
}

#[test]
fn read_exact_or_fail() {
    use std::io::Cursor;
    //  More available than declared: exactly n bytes
    let body = BoundedReader::new(Cursor::new(b"hello world".to_vec()), 5)
        .read_body()
        .expect("read failed");
    assert_eq!(body, b"hello");
    //  Exactly as declared
    let body = BoundedReader::new(Cursor::new(b"hello".to_vec()), 5)
        .read_body()
        .expect("read failed");
    assert_eq!(body, b"hello");
    //  Zero length never touches the stream
    let body = BoundedReader::new(Cursor::new(Vec::new()), 0)
        .read_body()
        .expect("read failed");
    assert!(body.is_empty());
    //  Short
    match BoundedReader::new(Cursor::new(b"abc".to_vec()), 10).read_body() {
        Err(CgiError::IncompleteBody { expected, received }) => {
            assert_eq!(expected, 10);
            assert_eq!(received, 3);
        }
        other => panic!("Expected IncompleteBody, got {:?}", other),
    }
}

#[test]
fn read_across_short_chunks() {
    //  A pipe delivers data in pieces.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
    }
    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }
    let trickle = Trickle { data: b"a=1&b=2".to_vec(), pos: 0 };
    let body = BoundedReader::new(trickle, 7).read_body().expect("read failed");
    assert_eq!(body, b"a=1&b=2");
}
