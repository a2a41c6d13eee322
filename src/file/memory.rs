//! Host-supplied buffers.
//!
//! Used when assembly bytes are already in memory, for example embedded in the executable or
//! produced at run time. The assembly loader treats a [`Memory`] exactly like a mapped file.

use super::Backend;

/// An owned byte buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Wraps `data`
    pub fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl From<Vec<u8>> for Memory {
    fn from(data: Vec<u8>) -> Self {
        Memory::new(data)
    }
}

impl Backend for Memory {
    fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_exposed_unchanged() {
        let image = Memory::from(b"MZ\x90\x00".to_vec());

        assert_eq!(image.len(), 4);
        assert!(!image.is_empty());
        assert_eq!(image.data(), b"MZ\x90\x00");
    }

    #[test]
    fn empty_buffer() {
        let image = Memory::new(Vec::new());
        assert!(image.is_empty());
        assert!(crate::file::inspect_image(image.data()).is_err());
    }
}
