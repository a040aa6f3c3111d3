use crate::encoding::tag::Tag;
use crate::DecodeError;

/// Cursor over a received byte slice. Every read is bounds-checked and
/// fails with [`DecodeError::UnexpectedEof`] rather than panicking.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub const fn position(&self) -> usize {
        self.pos
    }

    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::UnexpectedEof)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = self.peek_u8()?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(DecodeError::UnexpectedEof)?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn read_be_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.read_exact(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_be_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.read_exact(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Decodes the next tag without consuming it.
    pub fn peek_tag(&self) -> Result<Tag, DecodeError> {
        let mut peek = *self;
        Tag::decode(&mut peek)
    }

    pub fn read_tag(&mut self) -> Result<Tag, DecodeError> {
        Tag::decode(self)
    }

    pub fn expect_opening(&mut self, tag_num: u8) -> Result<(), DecodeError> {
        match self.read_tag()? {
            Tag::Opening { tag_num: n } if n == tag_num => Ok(()),
            _ => Err(DecodeError::InvalidTag),
        }
    }

    pub fn expect_closing(&mut self, tag_num: u8) -> Result<(), DecodeError> {
        match self.read_tag()? {
            Tag::Closing { tag_num: n } if n == tag_num => Ok(()),
            _ => Err(DecodeError::InvalidTag),
        }
    }

    /// True if the next byte is the closing tag `tag_num`. Returns `false` at
    /// end of input so callers surface the EOF on their next read.
    pub fn at_closing(&self, tag_num: u8) -> bool {
        matches!(self.peek_tag(), Ok(Tag::Closing { tag_num: n }) if n == tag_num)
    }
}

#[cfg(test)]
mod tests {
    use super::Reader;
    use crate::encoding::tag::Tag;
    use crate::DecodeError;

    #[test]
    fn reads_are_bounds_checked() {
        let mut r = Reader::new(&[0x01, 0x02, 0x03]);
        assert_eq!(r.read_be_u16().unwrap(), 0x0102);
        assert_eq!(r.remaining(), 1);
        assert_eq!(r.read_be_u16(), Err(DecodeError::UnexpectedEof));
        assert_eq!(r.read_u8().unwrap(), 0x03);
        assert!(r.is_empty());
        assert_eq!(r.peek_u8(), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn peek_tag_does_not_advance() {
        let r = Reader::new(&[0x1E, 0x1F]);
        assert_eq!(r.peek_tag().unwrap(), Tag::Opening { tag_num: 1 });
        assert_eq!(r.position(), 0);
        assert!(!r.at_closing(1));

        let mut r = r;
        r.expect_opening(1).unwrap();
        assert!(r.at_closing(1));
        r.expect_closing(1).unwrap();
        assert!(!r.at_closing(1));
    }
}
