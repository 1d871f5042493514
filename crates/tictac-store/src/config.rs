//! Store configuration.

/// Settings for a [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the actor's command channel. When it is full, callers
    /// wait (backpressure) rather than queueing without bound.
    pub channel_size: usize,

    /// Length of generated document ids.
    ///
    /// Ids double as invite codes, so they must be hard to guess:
    /// 20 alphanumeric characters is about 119 bits.
    pub id_length: usize,

    /// How many snapshots each watch holds for a subscriber that hasn't
    /// read them yet. Past that, the oldest is dropped: it is superseded by
    /// the newer ones, so the subscriber still ends on the latest commit.
    pub snapshot_buffer: usize,
}

/// Default for [`StoreConfig::snapshot_buffer`]. Remote clients use it for
/// their own per-watch queues.
pub const DEFAULT_SNAPSHOT_BUFFER: usize = 32;

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            channel_size: 64,
            id_length: 20,
            snapshot_buffer: DEFAULT_SNAPSHOT_BUFFER,
        }
    }
}
