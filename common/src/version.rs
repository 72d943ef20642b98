// Version comparison and required-version range matching
//
// Version strings are dotted numbers with an optional `-QUALIFIER` suffix
// (maven convention, e.g. `1.9.2-SNAPSHOT`). Range expressions are used by
// modules to declare which platform versions they can run on:
//
// - `1.2.3`          1.2.3 and above
// - `1.2.*`          any version of the 1.2.x branch
// - `1.2.2 - 1.2.3`  1.2.2 up to 1.2.3, inclusive
// - `1.2.* - 1.3.*`  any version of the 1.2.x and 1.3.x branches
// - `a, b`           either alternative

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Value substituted for `*` in the upper bound of a range
pub const MAX_REVISION_NUMBER: i64 = i32::MAX as i64;

const QUALIFIER_SEPARATOR: char = '-';

const RANGE_SEPARATOR: char = '-';

const ALTERNATIVE_SEPARATOR: char = ',';

fn qualifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]+)\.([0-9]+)(\.([0-9]+))?-([A-Za-z]+)$").expect("Invalid regex pattern")
    })
}

fn bound_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s?[0-9]+[.0-9*]*").expect("Invalid regex pattern"))
}

/// A parsed version: numeric components plus the qualifier, if any.
///
/// Parsing never fails. Components that are not numbers become `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    components: Vec<i64>,
    qualifier: Option<String>,
}

impl Version {
    pub fn parse(text: &str) -> Self {
        let (numeric, qualifier) = match text.split_once(QUALIFIER_SEPARATOR) {
            Some((numeric, qualifier)) => (numeric, Some(qualifier.to_string())),
            None => (text, None),
        };

        let components = numeric
            .split('.')
            .map(|component| component.trim().parse::<i64>().unwrap_or(0))
            .collect();

        Self {
            components,
            qualifier,
        }
    }

    pub fn components(&self) -> &[i64] {
        &self.components
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Compare numeric components only; missing trailing components count as zero
    /// and the qualifier is ignored.
    pub fn compare(&self, other: &Version) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let ours = self.components.get(i).copied().unwrap_or(0);
                let theirs = other.components.get(i).copied().unwrap_or(0);
                ours.cmp(&theirs)
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numeric: Vec<String> = self.components.iter().map(i64::to_string).collect();
        write!(f, "{}", numeric.join("."))?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, "-{}", qualifier)?;
        }
        Ok(())
    }
}

/// Compare two version strings such as `1.9.2.0`.
pub fn compare_version(version: &str, value: &str) -> Ordering {
    Version::parse(version).compare(&Version::parse(value))
}

/// Like [`compare_version`], but an absent side compares as equal.
pub fn compare_optional_versions(version: Option<&str>, value: Option<&str>) -> Ordering {
    match (version, value) {
        (Some(version), Some(value)) => compare_version(version, value),
        _ => Ordering::Equal,
    }
}

/// True for versions like `1.9.2-SNAPSHOT` or `2.0-ALPHA`
pub fn is_version_with_qualifier(version: &str) -> bool {
    qualifier_pattern().is_match(version)
}

/// One comma-separated alternative of a range expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeExpr {
    /// The bound itself or anything newer
    SingleBound(Version),
    /// Inclusive on both ends, wildcards already substituted
    RangePair { lower: Version, upper: Version },
}

impl RangeExpr {
    pub fn parse(element: &str) -> Self {
        if !is_bounded_range(element) {
            return RangeExpr::SingleBound(Version::parse(element));
        }

        let (lower, upper) = split_bounds(element);
        let lower = numeric_prefix(lower).replace('*', "0");
        let upper = numeric_prefix(upper).replace('*', &MAX_REVISION_NUMBER.to_string());

        RangeExpr::RangePair {
            lower: Version::parse(&lower),
            upper: Version::parse(&upper),
        }
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self {
            RangeExpr::SingleBound(bound) => {
                let matched = version.compare(bound).is_ge();
                if !matched {
                    debug!(version = %version, bound = %bound, "Version is below required bound");
                }
                matched
            }
            RangeExpr::RangePair { lower, upper } => {
                let matched = version.compare(lower).is_ge() && version.compare(upper).is_le();
                if !matched {
                    debug!(
                        version = %version,
                        lower = %lower,
                        upper = %upper,
                        "Version is not within required range"
                    );
                }
                matched
            }
        }
    }
}

/// A full required-version expression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VersionRange {
    /// No requirement was declared
    #[default]
    Any,
    Alternatives(Vec<RangeExpr>),
}

impl VersionRange {
    pub fn parse(expression: &str) -> Self {
        if expression.is_empty() {
            return VersionRange::Any;
        }

        let mut elements: Vec<&str> = expression.split(ALTERNATIVE_SEPARATOR).collect();
        // trailing empty alternatives carry no bound
        while elements.last().is_some_and(|element| element.is_empty()) {
            elements.pop();
        }

        VersionRange::Alternatives(elements.into_iter().map(RangeExpr::parse).collect())
    }

    pub fn matches(&self, version: &str) -> bool {
        match self {
            VersionRange::Any => true,
            VersionRange::Alternatives(alternatives) => {
                let version = Version::parse(version);
                alternatives.iter().any(|alternative| alternative.matches(&version))
            }
        }
    }
}

/// Check `version` against a module's required version expression.
///
/// An absent or empty expression places no constraint on the version.
pub fn match_required_versions(version: &str, version_range: Option<&str>) -> bool {
    version_range
        .map_or(VersionRange::Any, VersionRange::parse)
        .matches(version)
}

fn is_bounded_range(element: &str) -> bool {
    let has_wildcard = element.find('*').is_some_and(|index| index > 0);
    let has_separator = element.find(RANGE_SEPARATOR).is_some_and(|index| index > 0);
    has_wildcard || (has_separator && !is_version_with_qualifier(element))
}

/// Split at the first separator whose right side starts with a number, so that
/// qualifier suffixes like `-SNAPSHOT` are skipped.
fn split_bounds(element: &str) -> (&str, &str) {
    match element.find(RANGE_SEPARATOR) {
        Some(first) if first > 0 => element[first..]
            .match_indices(RANGE_SEPARATOR)
            .map(|(offset, _)| first + offset)
            .find(|&index| starts_numeric(&element[index + 1..]))
            .map(|index| (&element[..index], &element[index + 1..]))
            .unwrap_or((element, element)),
        _ => (element, element),
    }
}

fn starts_numeric(text: &str) -> bool {
    let text = text.strip_prefix(char::is_whitespace).unwrap_or(text);
    text.starts_with(|c: char| c.is_ascii_digit())
}

/// Keep the leading `xx.yy.zz` / `xx.yy.*` part of a bound
fn numeric_prefix(bound: &str) -> &str {
    bound_prefix_pattern()
        .find(bound)
        .map_or("", |found| found.as_str())
}
