use std::io::{self, BufRead, ErrorKind, Seek, SeekFrom};

use crate::EOS;

fn is_delimiter(b: u8) -> bool {
    matches!(b, b' ' | b'\n' | b'\r' | b'\t' | 0x0b | 0x0c | 0)
}

/// A stream of whitespace-separated tokens.
///
/// Every newline produces one `</s>` token. The reader remembers when it has
/// hit end of file so that training can start over from the beginning.
pub struct Corpus<R> {
    inner: R,
    eof: bool,
    scratch: Vec<u8>,
}

impl<R: BufRead> Corpus<R> {
    pub fn new(inner: R) -> Self {
        Corpus {
            inner,
            eof: false,
            scratch: Vec::new(),
        }
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read the next token into `word`.
    ///
    /// Returns `Ok(false)` once the stream is exhausted. A newline that ends
    /// a word is left in the stream, so the next call returns `</s>`.
    pub fn read_word(&mut self, word: &mut String) -> io::Result<bool> {
        self.scratch.clear();
        word.clear();
        loop {
            let buf = match self.inner.fill_buf() {
                Ok(buf) => buf,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if buf.is_empty() {
                self.eof = true;
                break;
            }

            let mut used = 0;
            let mut done = false;
            for &b in buf {
                if is_delimiter(b) {
                    if self.scratch.is_empty() {
                        used += 1;
                        if b == b'\n' {
                            self.scratch.extend_from_slice(EOS.as_bytes());
                            done = true;
                            break;
                        }
                        continue;
                    }
                    if b != b'\n' {
                        used += 1;
                    }
                    done = true;
                    break;
                }
                self.scratch.push(b);
                used += 1;
            }
            self.inner.consume(used);
            if done {
                break;
            }
        }

        word.push_str(&String::from_utf8_lossy(&self.scratch));
        Ok(!word.is_empty())
    }
}

impl<R: BufRead + Seek> Corpus<R> {
    /// Rewind to the start of the stream, but only if it was exhausted.
    pub fn reset(&mut self) -> io::Result<()> {
        if self.eof {
            self.eof = false;
            self.inner.seek(SeekFrom::Start(0))?;
        }
        Ok(())
    }

    /// Jump to a byte offset. The offset need not be on a token boundary.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.eof = false;
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}
