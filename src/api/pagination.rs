use serde::Serialize;

pub(crate) const MAX_LIMIT: i64 = 100;

pub(crate) const fn default_limit() -> i64 {
    20
}

/// Negative offsets become 0; limits are kept within 1..=MAX_LIMIT.
pub(crate) fn clamp(skip: i64, limit: i64) -> (i64, i64) {
    (skip.max(0), limit.clamp(1, MAX_LIMIT))
}

#[derive(Debug, Serialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

impl<T> PaginatedResponse<T> {
    pub(crate) fn new(items: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        Self { items, total_count, skip, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds_paging() {
        assert_eq!(clamp(-3, 0), (0, 1));
        assert_eq!(clamp(10, 500), (10, MAX_LIMIT));
        assert_eq!(clamp(0, default_limit()), (0, 20));
    }
}
