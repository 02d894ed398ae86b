//! Channel name parsing and rendering.
//!
//! Channel names cross two boundaries with different private-channel
//! conventions: the server wire uses a `$` marker, the application's
//! broadcasting layer uses a `private-` prefix. The two constructors
//! ([`Channel::from_wire`] and [`Channel::from_app`]) make the boundary
//! explicit at every call site; the conventions are never mixed within
//! one parse.
//!
//! See <https://centrifugal.dev/docs/server/channels#channel-namespaces>
//! for the namespace convention.

const WIRE_PRIVATE_MARKER: char = '$';
const APP_PRIVATE_PREFIX: &str = "private-";

/// A parsed channel name.
///
/// Parsing and rendering are lossless for names that already match the
/// configured namespace: `Channel::from_wire(c.wire_name(), ns)` produces
/// the same wire name again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    raw: String,
    name: String,
    private: bool,
    namespace: Option<String>,
}

impl Channel {
    /// Parses a server-wire channel name, where private channels start
    /// with `$`.
    pub fn from_wire(raw: &str, namespace: Option<&str>) -> Self {
        let private = raw.starts_with(WIRE_PRIVATE_MARKER);
        let bare = if private { &raw[1..] } else { raw };
        Self::build(raw, bare, private, namespace)
    }

    /// Parses an application-level channel name, where private channels
    /// start with `private-`.
    pub fn from_app(raw: &str, namespace: Option<&str>) -> Self {
        let private = raw.starts_with(APP_PRIVATE_PREFIX);
        let bare = if private { &raw[APP_PRIVATE_PREFIX.len()..] } else { raw };
        Self::build(raw, bare, private, namespace)
    }

    fn build(raw: &str, bare: &str, private: bool, namespace: Option<&str>) -> Self {
        // strip the namespace only on an exact first-segment match,
        // never on a partial prefix
        let name = match namespace {
            Some(ns) => match bare.split_once(':') {
                Some((first, rest)) if first == ns => rest.to_string(),
                _ => bare.to_string(),
            },
            None => bare.to_string(),
        };

        Channel {
            raw: raw.to_string(),
            name,
            private,
            namespace: namespace.map(str::to_string),
        }
    }

    /// The original string this channel was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The bare channel name, with no marker and no namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether subscribing requires a per-user channel token.
    pub fn is_private(&self) -> bool {
        self.private
    }

    /// The complete channel name sent to the server.
    pub fn wire_name(&self) -> String {
        let marker = if self.private { "$" } else { "" };
        match &self.namespace {
            Some(ns) => format!("{marker}{ns}:{}", self.name),
            None => format!("{marker}{}", self.name),
        }
    }
}
