/// Growable output buffer for outgoing frames.
///
/// Frames handled by a browse client are small (a few hundred bytes at
/// most), so the writer owns a `Vec` and every write is infallible.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_written(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, b: u8) {
        self.buf.push(b);
    }

    pub fn write_all(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn write_be_u16(&mut self, v: u16) {
        self.write_all(&v.to_be_bytes());
    }

    pub fn write_be_u32(&mut self, v: u32) {
        self.write_all(&v.to_be_bytes());
    }

    /// Overwrites two bytes at `offset` with `v`. Used to back-patch length
    /// fields once the payload size is known.
    pub fn patch_be_u16(&mut self, offset: usize, v: u16) {
        if let Some(slot) = self.buf.get_mut(offset..offset + 2) {
            slot.copy_from_slice(&v.to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Writer;

    #[test]
    fn patch_rewrites_in_place() {
        let mut w = Writer::new();
        w.write_u8(0x81);
        w.write_be_u16(0);
        w.write_be_u32(0xDEAD_BEEF);
        w.patch_be_u16(1, 7);
        assert_eq!(w.as_written(), &[0x81, 0x00, 0x07, 0xDE, 0xAD, 0xBE, 0xEF]);
    }
}
