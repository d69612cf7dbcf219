//! Partitioning of a table's scan space into disjoint segments.

use crate::error::CopyError;

/// One of N disjoint slices of a table's full scan space.
///
/// A segment is owned by exactly one scan worker for the lifetime of
/// a job; the pair `(index, total)` is what the table service uses to
/// route a parallel scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    pub index: u32,
    pub total: u32,
}

/// Divide the scan space into `parallelism` segments labeled
/// `0..parallelism`, all sharing the same total-segment count.
///
/// # Errors
///
/// Rejects a parallelism of zero as invalid configuration.
pub fn plan_segments(parallelism: u32) -> Result<Vec<Segment>, CopyError> {
    if parallelism == 0 {
        return Err(CopyError::Infrastructure(anyhow::anyhow!(
            "parallelism must be at least 1"
        )));
    }
    Ok((0..parallelism)
        .map(|index| Segment {
            index,
            total: parallelism,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_single_segment() {
        let segments = plan_segments(1).unwrap();
        assert_eq!(segments, vec![Segment { index: 0, total: 1 }]);
    }

    #[test]
    fn test_plan_default_parallelism() {
        let segments = plan_segments(5).unwrap();
        assert_eq!(segments.len(), 5);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index, i as u32);
            assert_eq!(segment.total, 5);
        }
    }

    #[test]
    fn test_plan_rejects_zero() {
        let err = plan_segments(0).unwrap_err();
        assert!(err.is_fatal());
        assert!(format!("{err}").contains("parallelism"));
    }
}
