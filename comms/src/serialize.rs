use bytes::BufMut;

/// Types that can be written as the payload of a single protocol message.
pub trait Serialize {
    fn serialize<B: BufMut>(&self, buf: &mut B);
}
