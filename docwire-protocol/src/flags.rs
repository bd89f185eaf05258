//! Bit flags carried in update, delete and reply payloads.

/// Flags for an update request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateFlags(i32);

impl UpdateFlags {
    /// Insert the update document if no document matches the selector.
    pub const UPSERT: i32 = 1 << 0;
    /// Update every matching document instead of the first one.
    pub const MULTI_UPDATE: i32 = 1 << 1;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_upsert(mut self) -> Self {
        self.0 |= Self::UPSERT;
        self
    }

    pub fn with_multi(mut self) -> Self {
        self.0 |= Self::MULTI_UPDATE;
        self
    }

    pub fn is_upsert(&self) -> bool {
        self.0 & Self::UPSERT != 0
    }

    pub fn is_multi(&self) -> bool {
        self.0 & Self::MULTI_UPDATE != 0
    }

    pub fn bits(&self) -> i32 {
        self.0
    }
}

/// Flags for a delete request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteFlags(i32);

impl DeleteFlags {
    /// Remove only the first matching document.
    pub const SINGLE_REMOVE: i32 = 1 << 0;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_single_remove(mut self) -> Self {
        self.0 |= Self::SINGLE_REMOVE;
        self
    }

    pub fn is_single_remove(&self) -> bool {
        self.0 & Self::SINGLE_REMOVE != 0
    }

    pub fn bits(&self) -> i32 {
        self.0
    }
}

/// Flags reported by the server in a reply.
///
/// Unknown bits are preserved but carry no meaning for this client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseFlags(i32);

impl ResponseFlags {
    /// The cursor id named by a get-more no longer exists on the server.
    pub const CURSOR_NOT_FOUND: i32 = 1 << 0;
    /// The query failed; the single returned document holds `$err`.
    pub const QUERY_FAILURE: i32 = 1 << 1;

    pub fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    pub fn is_cursor_not_found(&self) -> bool {
        self.0 & Self::CURSOR_NOT_FOUND != 0
    }

    pub fn is_query_failure(&self) -> bool {
        self.0 & Self::QUERY_FAILURE != 0
    }

    pub fn bits(&self) -> i32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_flag_combinations() {
        assert_eq!(UpdateFlags::new().bits(), 0);
        assert_eq!(UpdateFlags::new().with_upsert().bits(), 1);
        assert_eq!(UpdateFlags::new().with_multi().bits(), 2);

        let both = UpdateFlags::new().with_upsert().with_multi();
        assert_eq!(both.bits(), 3);
        assert!(both.is_upsert());
        assert!(both.is_multi());
    }

    #[test]
    fn test_delete_flags() {
        assert!(!DeleteFlags::new().is_single_remove());
        assert_eq!(DeleteFlags::new().with_single_remove().bits(), 1);
    }

    #[test]
    fn test_response_flags() {
        let flags = ResponseFlags::from_bits(0b1001);
        assert!(flags.is_cursor_not_found());
        assert!(!flags.is_query_failure());
        assert_eq!(flags.bits(), 0b1001);

        assert!(ResponseFlags::from_bits(2).is_query_failure());
    }
}
