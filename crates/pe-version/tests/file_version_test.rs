use pe_version::{FileVersion, ParsedVersion, compare_versions, meets_minimum};
use std::cmp::Ordering;

mod parsing {
    use super::*;

    #[test]
    fn parses_dotted() {
        assert_eq!(
            ParsedVersion::parse("3.17.20"),
            ParsedVersion::Parsed(FileVersion::new(3, 17, 20))
        );
    }

    #[test]
    fn ignores_extra_components() {
        assert_eq!(FileVersion::parse("1.2.3.4"), FileVersion::parse("1.2.3"));
        assert_eq!(
            FileVersion::parse("3.17.20.0"),
            FileVersion::new(3, 17, 20)
        );
    }

    #[test]
    fn normalizes_commas() {
        assert_eq!(FileVersion::parse("1,2,3"), FileVersion::parse("1.2.3"));
        assert_eq!(FileVersion::parse("2, 1, 0, 0"), FileVersion::new(2, 1, 0));
    }

    #[test]
    fn pads_missing_components() {
        assert_eq!(FileVersion::parse("3.1"), FileVersion::new(3, 1, 0));
        assert_eq!(FileVersion::parse("7"), FileVersion::new(7, 0, 0));
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(FileVersion::parse("  2.5.1 \n"), FileVersion::new(2, 5, 1));
    }

    #[test]
    fn malformed_collapses_to_minimum() {
        for raw in ["", "   ", "abc", "1.x.3", "v1.2.3", "1..2", "-1.0.0", "1.2.3-beta", "..."] {
            let parsed = ParsedVersion::parse(raw);

            assert!(!parsed.is_parsed(), "{raw} should not parse");
            assert_eq!(parsed.effective(), FileVersion::MIN);
            assert_eq!(FileVersion::parse(raw), FileVersion::MIN);
        }
    }

    #[test]
    fn unparseable_keeps_raw_value() {
        assert_eq!(
            ParsedVersion::parse("garbage"),
            ParsedVersion::Unparseable {
                raw: "garbage".into()
            }
        );
    }

    #[test]
    fn extra_components_are_not_validated() {
        assert_eq!(FileVersion::parse("1.2.3.beta"), FileVersion::new(1, 2, 3));
    }

    #[test]
    fn strict_from_str() {
        assert_eq!("1.2.3".parse::<FileVersion>().unwrap(), FileVersion::new(1, 2, 3));
        assert!("nope".parse::<FileVersion>().is_err());
    }

    #[test]
    fn displays_three_components() {
        assert_eq!(FileVersion::parse("3,8,1,0").to_string(), "3.8.1");
    }
}

mod ordering {
    use super::*;

    #[test]
    fn lexicographic_over_components() {
        assert_eq!(compare_versions("2.1.0", "3.5.0"), Ordering::Less);
        assert_eq!(compare_versions("3.10.0", "3.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("3.1.2", "3.1.10"), Ordering::Less);
        assert_eq!(compare_versions("1,2,3", "1.2.3.9"), Ordering::Equal);
    }

    #[test]
    fn reflexive() {
        for raw in ["0.0.0", "1.2.3", "junk", "310.1.0"] {
            assert_eq!(compare_versions(raw, raw), Ordering::Equal);
        }
    }

    #[test]
    fn transitive() {
        let samples = [
            "0.0.0", "junk", "1.0", "1.0.1", "1.9.0", "2.0.0", "2.0.0.5", "3.1.0", "3.17.20",
            "10.0.0",
        ];

        for a in samples {
            for b in samples {
                for c in samples {
                    if compare_versions(a, b) != Ordering::Less
                        && compare_versions(b, c) != Ordering::Less
                    {
                        assert_ne!(compare_versions(a, c), Ordering::Less, "{a} >= {b} >= {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn malformed_sorts_first() {
        assert_eq!(compare_versions("garbage", "0.0.1"), Ordering::Less);
        assert_eq!(compare_versions("garbage", "0.0.0"), Ordering::Equal);
    }
}

mod minimum_gate {
    use super::*;

    #[test]
    fn accepts_equal_or_newer() {
        let minimum = FileVersion::new(3, 1, 0);

        assert!(meets_minimum(Some("3.1.0"), &minimum));
        assert!(meets_minimum(Some("3.1.4.0"), &minimum));
        assert!(meets_minimum(Some("4,0,0,0"), &minimum));
    }

    #[test]
    fn rejects_older_unknown_or_unparseable() {
        let minimum = FileVersion::new(3, 1, 0);

        assert!(!meets_minimum(Some("3.0.9"), &minimum));
        assert!(!meets_minimum(None, &minimum));
        assert!(!meets_minimum(Some("latest"), &minimum));
    }
}
