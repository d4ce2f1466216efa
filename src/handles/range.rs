use bytes::Bytes;

/// One key-value pair copied out of a range read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Bytes,
    pub value: Bytes,
}

/// One batch of a range read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeResult {
    pub kvs: Vec<KeyValue>,
    /// More pairs exist past this batch
    pub more: bool,
}

/// Resolves to a key relative to a reference key.
///
/// The native library resolves `(key, or_equal, offset)` as: take the last key
/// `<= key` (or `< key` when `or_equal` is false), then step `offset` keys
/// forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySelector {
    pub key: Bytes,
    pub or_equal: bool,
    pub offset: i32,
}

impl KeySelector {
    pub fn new(
        key: impl Into<Bytes>,
        or_equal: bool,
        offset: i32,
    ) -> Self {
        Self {
            key: key.into(),
            or_equal,
            offset,
        }
    }

    pub fn first_greater_or_equal(key: impl Into<Bytes>) -> Self {
        Self::new(key, false, 1)
    }

    pub fn first_greater_than(key: impl Into<Bytes>) -> Self {
        Self::new(key, true, 1)
    }

    pub fn last_less_than(key: impl Into<Bytes>) -> Self {
        Self::new(key, false, 0)
    }

    pub fn last_less_or_equal(key: impl Into<Bytes>) -> Self {
        Self::new(key, true, 0)
    }
}

/// `FDBStreamingMode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum StreamingMode {
    WantAll = -2,
    #[default]
    Iterator = -1,
    Exact = 0,
    Small = 1,
    Medium = 2,
    Large = 3,
    Serial = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeOptions {
    /// Maximum pairs to return; 0 for no limit
    pub limit: i32,
    /// Soft byte limit; 0 for no limit
    pub target_bytes: i32,
    pub mode: StreamingMode,
    /// 1-based batch counter, used by [`StreamingMode::Iterator`]
    pub iteration: i32,
    pub snapshot: bool,
    pub reverse: bool,
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self {
            limit: 0,
            target_bytes: 0,
            mode: StreamingMode::Iterator,
            iteration: 1,
            snapshot: false,
            reverse: false,
        }
    }
}

impl RangeOptions {
    pub fn limit(
        mut self,
        limit: i32,
    ) -> Self {
        self.limit = limit;
        self
    }

    pub fn mode(
        mut self,
        mode: StreamingMode,
    ) -> Self {
        self.mode = mode;
        self
    }

    pub fn reverse(
        mut self,
        reverse: bool,
    ) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn snapshot(
        mut self,
        snapshot: bool,
    ) -> Self {
        self.snapshot = snapshot;
        self
    }
}

/// `FDBMutationType` for [`crate::Transaction::atomic_op`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MutationType {
    /// Little-endian integer addition
    Add = 2,
    BitAnd = 6,
    BitOr = 7,
    BitXor = 8,
    /// Little-endian unsigned maximum
    Max = 12,
    /// Little-endian unsigned minimum
    Min = 13,
    /// Lexicographic minimum
    ByteMin = 16,
    /// Lexicographic maximum
    ByteMax = 17,
    /// Clears the key if its value equals the parameter
    CompareAndClear = 20,
}
