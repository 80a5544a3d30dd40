//! Splits a Motion JPEG byte stream into individual JPEG images.
//!
//! The camera wraps each image in a `multipart/x-mixed-replace` part, but
//! boundary strings and part headers vary between firmware releases. The
//! extractor ignores them and cuts frames on the JPEG Start-Of-Image and
//! End-Of-Image markers instead. Entropy-coded JPEG data byte-stuffs every
//! `0xFF`, so `FF D9` cannot occur inside a frame.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Error, Result};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

fn find(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

/// Incremental JPEG frame extractor.
#[derive(Debug)]
pub struct FrameExtractor {
    buf: BytesMut,
    /// True once `buf` starts with an SOI marker.
    in_frame: bool,
    /// Offset in `buf` where the next EOI search resumes.
    scan: usize,
    max_frame_bytes: usize,
}

impl FrameExtractor {
    pub fn new(max_frame_bytes: usize) -> Self {
        FrameExtractor {
            buf: BytesMut::new(),
            in_frame: false,
            scan: 0,
            max_frame_bytes,
        }
    }

    /// Append bytes received from the camera.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes held back waiting for more input.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete JPEG out of the buffer, if there is one.
    ///
    /// Call repeatedly after each [`push`](Self::push) until it returns
    /// `Ok(None)`. On [`Error::FrameTooLarge`] the partial frame is
    /// discarded and the extractor resynchronises on the next SOI.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if !self.in_frame {
            match find(&self.buf, SOI) {
                Some(start) => {
                    self.buf.advance(start);
                    self.in_frame = true;
                    self.scan = SOI.len();
                }
                None => {
                    // Keep a trailing 0xFF: it may be the first half of an SOI.
                    let keep = usize::from(self.buf.last() == Some(&SOI[0]));
                    let drop = self.buf.len() - keep;
                    self.buf.advance(drop);
                    return Ok(None);
                }
            }
        }

        match find(&self.buf[self.scan..], EOI) {
            Some(offset) => {
                let end = self.scan + offset + EOI.len();
                let frame = self.buf.split_to(end).freeze();
                self.in_frame = false;
                self.scan = 0;
                if frame.len() > self.max_frame_bytes {
                    return Err(self.too_large());
                }
                Ok(Some(frame))
            }
            None => {
                if self.buf.len() > self.max_frame_bytes {
                    self.buf.clear();
                    self.in_frame = false;
                    self.scan = 0;
                    return Err(self.too_large());
                }
                // Re-examine the last byte next time in case EOI straddles pushes.
                self.scan = self.buf.len().saturating_sub(1).max(SOI.len());
                Ok(None)
            }
        }
    }

    fn too_large(&self) -> Error {
        Error::FrameTooLarge {
            limit: self.max_frame_bytes,
        }
    }
}
