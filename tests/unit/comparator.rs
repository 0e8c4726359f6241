use dbpatcher::version::{Standing, Version, is_up_to_date, standing};
use rstest::rstest;

use crate::helpers::HIGHLANDER_VERSIONS;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

/// Every earlier release is behind every later one, and never the reverse
#[test]
fn test_release_history_is_totally_ordered() {
    for (i, earlier) in HIGHLANDER_VERSIONS.iter().enumerate() {
        for later in &HIGHLANDER_VERSIONS[i + 1..] {
            assert_eq!(
                standing(&v(earlier), &v(later)),
                Standing::Behind,
                "{earlier} should be behind {later}"
            );
            assert_eq!(
                standing(&v(later), &v(earlier)),
                Standing::EqualOrAhead,
                "{later} should already contain {earlier}"
            );
        }
        assert!(is_up_to_date(&v(earlier), &v(earlier)));
    }
}

#[rstest]
#[case::same("17.12", "17.12", true)]
#[case::padded_current("17", "17.0", true)]
#[case::padded_candidate("17.0", "17", true)]
#[case::numeric_not_text("1.9", "1.10", false)]
#[case::newer_major("17", "14.10", true)]
#[case::older_major("14.10", "17", false)]
#[case::minor_ahead("14.10", "14.8", true)]
#[case::unreleased_between("14.9", "14.10", false)]
#[case::three_segments("17.12.1", "17.12", true)]
#[case::three_segments_behind("17.12", "17.12.1", false)]
fn test_is_up_to_date(#[case] current: &str, #[case] candidate: &str, #[case] expected: bool) {
    assert_eq!(is_up_to_date(&v(current), &v(candidate)), expected);
}

#[rstest]
#[case("1.10", "1.9")]
#[case("14.10", "14.8")]
#[case("17", "14.10")]
fn test_ordering_matches_release_order(#[case] greater: &str, #[case] lesser: &str) {
    assert!(v(greater) > v(lesser));
}

#[test]
fn test_textual_equality() {
    assert_ne!(v("17"), v("17.0"));
    assert_eq!(v("17"), v(" 17 "));
}

#[rstest]
#[case("")]
#[case("17.")]
#[case("v17")]
#[case("17..12")]
#[case("-1")]
fn test_rejects_malformed(#[case] raw: &str) {
    assert!(Version::parse(raw).is_err());
}
