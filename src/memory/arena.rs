/// Append-only byte arena. Strings are addressed by `(offset, length)`, never
/// by pointer, so the backing buffer may grow and move freely.
#[derive(Debug, Default, Clone)]
pub struct StringArena {
    bytes: Vec<u8>,
}

const MIN_CAPACITY: usize = 256;

impl StringArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `s`; returns the offset it was stored at
    pub fn append(&mut self, s: &str) -> u64 {
        let offset = self.bytes.len();
        let needed = offset + s.len();
        if needed > self.bytes.capacity() {
            // Capacity doubles so repeated appends stay amortized O(1)
            let target = needed.max(self.bytes.capacity() * 2).max(MIN_CAPACITY);
            self.bytes.reserve_exact(target - offset);
        }
        self.bytes.extend_from_slice(s.as_bytes());
        offset as u64
    }

    pub fn get(&self, offset: u64, length: u32) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(length as usize)?;
        self.bytes.get(start..end)
    }

    /// Stored strings are whole `&str`s, so any recorded range is valid UTF-8
    pub fn get_str(&self, offset: u64, length: u32) -> Option<&str> {
        std::str::from_utf8(self.get(offset, length)?).ok()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn clear(&mut self) {
        self.bytes = Vec::new();
    }
}
