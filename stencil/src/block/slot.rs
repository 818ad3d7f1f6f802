use std::fmt;

const SCHEME: &str = "slot://";

/// Address of an insertion point: `slot://<group>/<pack>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    pub group: String,
    pub pack: String,
    pub name: String,
}

impl SlotId {
    pub fn new(group: impl Into<String>, pack: impl Into<String>, name: impl Into<String>) -> Self {
        SlotId {
            group: group.into(),
            pack: pack.into(),
            name: name.into(),
        }
    }

    /// Parse a full `slot://` URI. Every segment must be non-empty.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(SCHEME)?;
        let mut segments = rest.split('/');
        let group = segments.next().filter(|s| !s.is_empty())?;
        let pack = segments.next().filter(|s| !s.is_empty())?;
        let name = segments.next().filter(|s| !s.is_empty())?;
        if segments.next().is_some() {
            return None;
        }
        Some(SlotId::new(group, pack, name))
    }

    pub fn is_uri(s: &str) -> bool {
        s.starts_with(SCHEME)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}/{}", SCHEME, self.group, self.pack, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_uri() {
        let id = SlotId::parse("slot://source/ktor-server/routes").unwrap();
        assert_eq!(id, SlotId::new("source", "ktor-server", "routes"));
        assert_eq!(id.to_string(), "slot://source/ktor-server/routes");
    }

    #[test]
    fn rejects_malformed_uris() {
        assert_eq!(SlotId::parse("source/core/routes"), None);
        assert_eq!(SlotId::parse("slot://source/core"), None);
        assert_eq!(SlotId::parse("slot://source//routes"), None);
        assert_eq!(SlotId::parse("slot://a/b/c/d"), None);
    }
}
