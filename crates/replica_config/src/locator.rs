//! Remote locators and wildcard resolution.
//!
//! A locator is an absolute URL naming a remote store on the object
//! server, e.g. `realms://example.org/~/path/to/store`. The path may hold
//! a single `~` segment, which is replaced with the authority's identity
//! when the configuration is constructed.

use crate::error::{ValidationError, ValidationResult};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Path segment replaced with the authority's identity.
pub const WILDCARD: &str = "~";

/// Scheme for plain-text connections.
pub const SCHEME_PLAIN: &str = "realm";

/// Scheme for TLS connections.
pub const SCHEME_SECURE: &str = "realms";

/// Bytes escaped when the identity is written into a path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-decodes one path or path segment.
pub(crate) fn decode(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}

/// An absolute reference to a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    url: Url,
}

impl Locator {
    /// Parses and checks an absolute locator.
    ///
    /// # Errors
    ///
    /// - `InvalidLocator` if the input is not an absolute URL with a host
    /// - `UnsupportedScheme` for schemes other than `realm` and `realms`
    /// - `MultipleWildcards` if more than one path segment is `~`
    pub fn parse(input: &str) -> ValidationResult<Self> {
        let url = Url::parse(input)
            .map_err(|e| ValidationError::InvalidLocator(format!("{input}: {e}")))?;

        match url.scheme() {
            SCHEME_PLAIN | SCHEME_SECURE => {}
            other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ValidationError::InvalidLocator(format!(
                "{input}: missing host"
            )));
        }

        let locator = Self { url };
        let count = locator.wildcard_count();
        if count > 1 {
            return Err(ValidationError::MultipleWildcards { count });
        }

        Ok(locator)
    }

    /// Returns the locator as a string.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns the host name.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Returns the explicit port, if any.
    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    /// Returns the path component, still percent-encoded.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Returns the percent-decoded path component.
    pub fn decoded_path(&self) -> Cow<'_, str> {
        decode(self.url.path())
    }

    /// Iterates over the non-empty path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|segment| !segment.is_empty())
    }

    /// Returns true if the connection uses TLS.
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == SCHEME_SECURE
    }

    /// Returns true if the path still holds the wildcard segment.
    pub fn has_wildcard(&self) -> bool {
        self.wildcard_count() > 0
    }

    fn wildcard_count(&self) -> usize {
        self.segments().filter(|segment| *segment == WILDCARD).count()
    }

    /// Replaces the wildcard segment with `identity`.
    ///
    /// The identity is percent-encoded as a single segment, so it cannot
    /// introduce extra path levels. A locator without a wildcard is
    /// returned unchanged.
    pub fn resolve(&self, identity: &str) -> Locator {
        if !self.has_wildcard() {
            return self.clone();
        }

        let encoded = utf8_percent_encode(identity, SEGMENT).to_string();
        let path = self
            .url
            .path_segments()
            .into_iter()
            .flatten()
            .map(|segment| {
                if segment == WILDCARD {
                    encoded.as_str()
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/");

        let mut url = self.url.clone();
        url.set_path(&format!("/{path}"));
        Locator { url }
    }
}

impl FromStr for Locator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
