// Structured references
// The minimal reference surface needed at the tag-data interface boundary

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A structured reference identifying one entity.
///
/// Wire form is the JSON string `"r:<name>"`, optionally followed by a
/// space and a display text: `"r:ahu1 AHU 1"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    name: String,
    dis: Option<String>,
}

impl Ref {
    pub fn new(name: impl Into<String>) -> Self {
        Ref {
            name: name.into(),
            dis: None,
        }
    }

    pub fn with_dis(name: impl Into<String>, dis: impl Into<String>) -> Self {
        Ref {
            name: name.into(),
            dis: Some(dis.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dis(&self) -> Option<&str> {
        self.dis.as_deref()
    }

    /// Parse the wire form. Returns `None` when the string is not a
    /// reference at all (a bare name, for instance).
    pub fn parse(s: &str) -> Option<Ref> {
        let rest = s.strip_prefix("r:")?;
        match rest.split_once(' ') {
            Some((name, dis)) => Some(Ref::with_dis(name, dis)),
            None => Some(Ref::new(rest)),
        }
    }

    /// The JSON wire encoding.
    pub fn wire(&self) -> String {
        match &self.dis {
            Some(dis) => format!("r:{} {}", self.name, dis),
            None => format!("r:{}", self.name),
        }
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.name)
    }
}

impl Serialize for Ref {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wire())
    }
}

impl<'de> Deserialize<'de> for Ref {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ref::parse(&s).ok_or_else(|| D::Error::custom(format!("not a reference: {}", s)))
    }
}

/// Canonical local name of an id: the trailing segment of a dotted,
/// namespace-qualified form.
pub fn local_name(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_reference() {
        let r = Ref::parse("r:ahu1").unwrap();
        assert_eq!(r.name(), "ahu1");
        assert_eq!(r.dis(), None);
    }

    #[test]
    fn test_parse_reference_with_dis() {
        let r = Ref::parse("r:ahu1 AHU 1").unwrap();
        assert_eq!(r.name(), "ahu1");
        assert_eq!(r.dis(), Some("AHU 1"));
    }

    #[test]
    fn test_parse_rejects_plain_strings() {
        assert!(Ref::parse("ahu1").is_none());
    }

    #[test]
    fn test_wire_round_trip() {
        for r in [Ref::new("ahu1"), Ref::with_dis("ahu1", "AHU 1")] {
            assert_eq!(Ref::parse(&r.wire()), Some(r));
        }
    }

    #[test]
    fn test_serde_wire_form() {
        let json = serde_json::to_string(&Ref::new("ahu1")).unwrap();
        assert_eq!(json, "\"r:ahu1\"");

        let r: Ref = serde_json::from_str("\"r:ahu1 AHU 1\"").unwrap();
        assert_eq!(r, Ref::with_dis("ahu1", "AHU 1"));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("proj.equip.ahu1"), "ahu1");
        assert_eq!(local_name("ahu1"), "ahu1");
    }
}
