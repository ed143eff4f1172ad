use std::cmp::Ordering;
use std::fmt;

/// Version string ordered section by section (`.`-separated).
///
/// Each section is a leading number plus a string remainder. Two numeric sections compare
/// by number, then by remainder; anything else compares as plain text. Missing trailing
/// sections count as `0`, so `1.0 == 1.0.0`.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    sections: Vec<Section>,
}

#[derive(Debug, Clone)]
struct Section {
    full: String,
    number: Option<u64>,
    rest: String,
}

impl Section {
    fn new(full: &str) -> Self {
        let cutoff = full
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(full.len());
        let digits = &full[..cutoff];
        let number = if digits.is_empty() {
            None
        } else {
            Some(digits.parse::<u64>().unwrap_or(u64::MAX))
        };
        Self {
            full: full.to_string(),
            number,
            rest: full[cutoff..].to_string(),
        }
    }

    fn cmp_section(&self, other: &Section) -> Ordering {
        match (self.number, other.number) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.rest.cmp(&other.rest)),
            _ => self.full.cmp(&other.full),
        }
    }
}

impl Version {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            sections: raw.split('.').map(Section::new).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = Section::new("0");
        let len = self.sections.len().max(other.sections.len());
        for i in 0..len {
            let a = self.sections.get(i).unwrap_or(&zero);
            let b = other.sections.get(i).unwrap_or(&zero);
            match a.cmp_section(b) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Version::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::new(s)
    }

    #[test]
    fn numeric_sections_compare_as_numbers() {
        assert!(v("2.0") > v("1.0"));
        assert!(v("1.10") > v("1.9"));
        assert!(v("3.2.1") > v("3.2"));
        assert!(v("9.7") > v("9.1"));
    }

    #[test]
    fn missing_sections_pad_with_zero() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0"));
    }

    #[test]
    fn suffix_breaks_ties_between_equal_numbers() {
        assert!(v("2.9.4-nightly-20150209") > v("2.9.4"));
        assert!(v("1.0b") > v("1.0a"));
    }

    #[test]
    fn non_numeric_sections_compare_as_text() {
        assert!(v("1.b") > v("1.a"));
        assert_eq!(v("1.x").cmp(&v("1.x")), Ordering::Equal);
    }
}
