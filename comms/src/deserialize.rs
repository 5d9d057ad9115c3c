use crate::Result;

/// Types that can be read back from the payload of a single protocol message.
pub trait Deserialize: Sized {
    fn deserialize(buf: &[u8]) -> Result<Self>;
}
