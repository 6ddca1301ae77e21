//! Widget id generation.
//!
//! Ids are dispatch keys, not secrets: they only need a negligible collision
//! probability across the cache's live population.

use rand::Rng;
use widget_bridge_core::config::IdFormat;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_ID_LEN: usize = 128;

/// Mints fresh widget ids.
pub trait IdFactory: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random lowercase base-36 ids (default 16 characters, ~82 bits).
#[derive(Debug, Clone)]
pub struct Base36IdFactory {
    len: usize,
}

impl Base36IdFactory {
    pub fn new(len: usize) -> Self {
        Self {
            len: len.clamp(8, MAX_ID_LEN),
        }
    }
}

impl Default for Base36IdFactory {
    fn default() -> Self {
        Self::new(16)
    }
}

impl IdFactory for Base36IdFactory {
    fn next_id(&self) -> String {
        let mut rng = rand::rng();
        (0..self.len)
            .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
            .collect()
    }
}

/// Simple-form v4 UUIDs (32 hex characters).
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdFactory;

impl IdFactory for UuidIdFactory {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Build the factory selected in config.
pub fn factory_for(format: IdFormat) -> Box<dyn IdFactory> {
    match format {
        IdFormat::Base36 => Box::new(Base36IdFactory::default()),
        IdFormat::Uuid => Box::new(UuidIdFactory),
    }
}

/// Whether `id` can name a cache entry: 1-128 characters of `[A-Za-z0-9_-]`.
///
/// Anything else could escape the cache directory and is treated as absent.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
