//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Paging parameters of a listing, as supplied by the caller.
///
/// Values are kept raw and normalized on use: a missing, unparsable or non-positive limit falls
/// back to the configured default, and a missing, unparsable or negative offset becomes zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ListParams {
    /// Creates paging parameters from numeric values.
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// Creates paging parameters from query-string values. Unparsable values count as absent.
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Self {
        Self {
            limit: limit.and_then(|l| l.trim().parse().ok()),
            offset: offset.and_then(|o| o.trim().parse().ok()),
        }
    }

    /// The effective page size.
    pub fn limit(&self, default: usize) -> usize {
        self.limit
            .filter(|limit| *limit > 0)
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(default)
    }

    /// The effective number of records to skip.
    pub fn offset(&self) -> usize {
        self.offset
            .and_then(|offset| usize::try_from(offset).ok())
            .unwrap_or(0)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_limit_uses_default() {
        assert_eq!(ListParams::new(0, 0).limit(10), 10);
        assert_eq!(ListParams::new(-3, 0).limit(10), 10);
        assert_eq!(ListParams::new(25, 0).limit(10), 25);
        assert_eq!(ListParams::default().limit(10), 10);
    }

    #[test]
    fn test_negative_offset_is_zero() {
        assert_eq!(ListParams::new(5, -1).offset(), 0);
        assert_eq!(ListParams::new(5, 7).offset(), 7);
    }

    #[test]
    fn test_unparsable_values_count_as_absent() {
        let params = ListParams::parse(Some("ten"), Some("-"));
        assert_eq!(params.limit(10), 10);
        assert_eq!(params.offset(), 0);

        let params = ListParams::parse(Some(" 3 "), Some("4"));
        assert_eq!(params.limit(10), 3);
        assert_eq!(params.offset(), 4);
    }
}
