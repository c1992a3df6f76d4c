//! MessageSource trait - inbound payload source abstraction
//!
//! Decouples the ingestion pipeline from where raw payloads come from
//! (stdin, a file, an in-process channel, a test fixture).

use crate::ContractError;

/// Asynchronous source of raw serialized payloads
///
/// The ingestion pipeline pulls one payload at a time and hands it to its
/// worker pool; `Ok(None)` means the source is exhausted.
#[trait_variant::make(MessageSource: Send)]
pub trait LocalMessageSource {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Next raw payload, or `None` at end of stream
    ///
    /// # Errors
    /// Returns a read error; the pipeline stops pulling from this source.
    async fn next_payload(&mut self) -> Result<Option<String>, ContractError>;
}
