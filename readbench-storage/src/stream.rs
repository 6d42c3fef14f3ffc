//! Payload stream type and test utilities.

use futures_util::stream::BoxStream;

/// Type alias for data streams returned by [`Backend`](crate::Backend) reads.
///
/// An `Err` item signals a transport failure. Exhaustion of the stream signals end-of-data.
pub type PayloadStream = BoxStream<'static, std::io::Result<bytes::Bytes>>;

/// Collects a [`PayloadStream`] into a `Vec<u8>`.
#[cfg(test)]
pub(crate) async fn read_to_vec(mut stream: PayloadStream) -> std::io::Result<Vec<u8>> {
    use futures_util::TryStreamExt;
    let mut payload = Vec::new();
    while let Some(chunk) = stream.try_next().await? {
        payload.extend(&chunk);
    }
    Ok(payload)
}
