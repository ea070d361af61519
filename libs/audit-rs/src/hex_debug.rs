use std::fmt::Debug;

use tracing::field::DebugValue;

pub(crate) struct HexDebug<T: AsRef<[u8]>>(pub T);

impl<T: AsRef<[u8]>> Debug for HexDebug<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0.as_ref()))
    }
}

/// Wraps a `tracing` field value so that bytes such as digests show up as a
/// lowercase hex string.
///
/// # Example
///
/// ```ignore
/// use crate::hex_debug::hex_debug;
///
/// let digest = vec![0xde, 0xad];
/// tracing::debug!(digest = hex_debug(&digest));
/// ```
pub(crate) fn hex_debug<T: AsRef<[u8]>>(t: T) -> DebugValue<HexDebug<T>> {
    tracing::field::debug(HexDebug(t))
}
