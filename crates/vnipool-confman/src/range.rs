//! VNI range specifications
//!
//! Parses administrator-authored lists such as `"100-200,305"` into a
//! normalized set of intervals and offers the members lazily in ascending
//! order. The order is the tie-break for "first free VNI".

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Range parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// An element between two commas is empty
    #[error("empty element in range list")]
    EmptyElement,

    /// Not a decimal u32
    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    /// Start above end
    #[error("range start {start} is greater than range end {end}")]
    Reversed { start: u32, end: u32 },

    /// More than one dash in an element
    #[error("malformed range element {0:?}")]
    TooManyDashes(String),
}

/// Normalized VNI range: sorted, merged, inclusive intervals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VniRange {
    intervals: Vec<(u32, u32)>,
}

impl VniRange {
    /// Parse a range list. Empty text is the empty range.
    pub fn parse(spec: &str) -> Result<Self, RangeError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(Self::default());
        }

        let mut intervals = spec
            .split(',')
            .map(parse_element)
            .collect::<Result<Vec<_>, _>>()?;
        intervals.sort_unstable();

        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(intervals.len());
        for (start, end) in intervals {
            match merged.last_mut() {
                Some(last) if start <= last.1.saturating_add(1) => {
                    last.1 = last.1.max(end);
                }
                _ => merged.push((start, end)),
            }
        }
        Ok(Self { intervals: merged })
    }

    /// Candidates in ascending order, each once
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.intervals.iter().flat_map(|&(start, end)| start..=end)
    }

    /// Number of VNIs in the range
    pub fn len(&self) -> u64 {
        self.intervals
            .iter()
            .map(|&(start, end)| u64::from(end - start) + 1)
            .sum()
    }

    /// True when the range holds no VNI
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Whether `vni` belongs to the range
    pub fn contains(&self, vni: u32) -> bool {
        self.intervals
            .binary_search_by(|&(start, end)| {
                if end < vni {
                    std::cmp::Ordering::Less
                } else if start > vni {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }
}

fn parse_element(element: &str) -> Result<(u32, u32), RangeError> {
    let element = element.trim();
    if element.is_empty() {
        return Err(RangeError::EmptyElement);
    }

    let mut bounds = element.splitn(3, '-');
    let start = parse_number(bounds.next().unwrap_or_default())?;
    let end = match bounds.next() {
        Some(end) => parse_number(end)?,
        None => start,
    };
    if bounds.next().is_some() {
        return Err(RangeError::TooManyDashes(element.to_string()));
    }
    if start > end {
        return Err(RangeError::Reversed { start, end });
    }
    Ok((start, end))
}

fn parse_number(token: &str) -> Result<u32, RangeError> {
    let token = token.trim();
    token
        .parse()
        .map_err(|_| RangeError::InvalidNumber(token.to_string()))
}

impl FromStr for VniRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VniRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &(start, end)) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if start == end {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}-{}", start, end)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_list() {
        let range = VniRange::parse("100-102,305").unwrap();
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![100, 101, 102, 305]);
        assert_eq!(range.len(), 4);
        assert!(range.contains(305));
        assert!(!range.contains(200));
    }

    #[test]
    fn test_overlaps_merged_and_sorted() {
        let range = VniRange::parse("20, 7-12,5-10 ,13").unwrap();
        assert_eq!(range.to_string(), "5-13,20");
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![5, 6, 7, 8, 9, 10, 11, 12, 13, 20]);
    }

    #[test]
    fn test_empty_spec() {
        let range = VniRange::parse("  ").unwrap();
        assert!(range.is_empty());
        assert_eq!(range.iter().next(), None);
    }

    #[test]
    fn test_malformed_specs() {
        assert_eq!(VniRange::parse("1,,2"), Err(RangeError::EmptyElement));
        assert_eq!(VniRange::parse("12-3"), Err(RangeError::Reversed { start: 12, end: 3 }));
        assert_eq!(VniRange::parse("a-3"), Err(RangeError::InvalidNumber("a".into())));
        assert_eq!(VniRange::parse("-3"), Err(RangeError::InvalidNumber("".into())));
        assert_eq!(VniRange::parse("1-2-3"), Err(RangeError::TooManyDashes("1-2-3".into())));
        assert!(VniRange::parse("99999999999").is_err());
    }

    #[test]
    fn test_full_vxlan_space_is_lazy() {
        let range = VniRange::parse("1-16777215").unwrap();
        assert_eq!(range.len(), 16_777_215);
        assert_eq!(range.iter().take(3).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_upper_bound_does_not_overflow() {
        let range = VniRange::parse("4294967294-4294967295,0").unwrap();
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![0, u32::MAX - 1, u32::MAX]);
    }

    proptest! {
        #[test]
        fn prop_candidates_ascending_and_distinct(bounds in prop::collection::vec((0u32..500, 0u32..50), 1..8)) {
            let spec = bounds
                .iter()
                .map(|(start, width)| format!("{}-{}", start, start + width))
                .collect::<Vec<_>>()
                .join(",");
            let range = VniRange::parse(&spec).unwrap();
            let candidates: Vec<u32> = range.iter().collect();

            prop_assert!(candidates.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(candidates.len() as u64, range.len());
            for (start, width) in &bounds {
                prop_assert!(range.contains(*start));
                prop_assert!(range.contains(start + width));
            }
        }
    }
}
