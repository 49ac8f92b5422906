use std::cmp::Ordering;

/// Version representation tolerant of the formats dependents declare.
///
/// Semantic versions order via `semver`; purely numeric versions compare
/// component-wise; anything else falls back to lexicographic order so the
/// comparison is still total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub original: String,
    parsed: VersionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionKind {
    Semantic(semver::Version),
    Numeric(Vec<u32>),
    Unknown(String),
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let trimmed = version.strip_prefix('v').unwrap_or(version);

        let parsed = if let Ok(v) = semver::Version::parse(trimmed) {
            VersionKind::Semantic(v)
        } else if let Some(numeric) = Self::parse_numeric(trimmed) {
            VersionKind::Numeric(numeric)
        } else {
            VersionKind::Unknown(version.to_string())
        };

        Version {
            original: version.to_string(),
            parsed,
        }
    }

    fn parse_numeric(version: &str) -> Option<Vec<u32>> {
        let mut numbers = Vec::new();
        for part in version.split('.') {
            match part.parse::<u32>() {
                Ok(num) => numbers.push(num),
                Err(_) => return None,
            }
        }

        if numbers.is_empty() { None } else { Some(numbers) }
    }

    pub fn is_stable(&self) -> bool {
        let lower = self.original.to_lowercase();

        let unstable_markers = ["alpha", "beta", "rc", "snapshot", "dev", "preview", "canary"];
        if unstable_markers.iter().any(|m| lower.contains(m)) {
            return false;
        }

        match &self.parsed {
            VersionKind::Semantic(v) => v.pre.is_empty(),
            _ => true,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (VersionKind::Semantic(a), VersionKind::Semantic(b)) => a.cmp(b),
            (VersionKind::Numeric(a), VersionKind::Numeric(b)) => {
                for (av, bv) in a.iter().zip(b.iter()) {
                    match av.cmp(bv) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.original.cmp(&other.original),
        }
    }
}

pub struct VersionComparator;

impl VersionComparator {
    /// True when `declared` already satisfies `target` (equal or newer).
    pub fn satisfies(declared: &str, target: &str) -> bool {
        declared == target || Self::is_newer(declared, target)
    }

    /// Check if version `a` is newer than version `b`.
    pub fn is_newer(a: &str, b: &str) -> bool {
        Version::parse(a) > Version::parse(b)
    }
}
