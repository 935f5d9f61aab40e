///
/// A minimal parsed URI: scheme plus everything after the first `:`.
///
/// Used to give remote file locations a consistent, qualified form when they're reported
/// to the message bus - so a downstream consumer on a different host can resolve a `file:`
/// URI unambiguously.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Uri {
    scheme: String,
    body: String,
}

impl Uri {
    pub fn parse(uri: &str) -> Uri {
        let uri = uri.trim();

        let (scheme, body) = match uri.split_once(':') {
            Some((scheme, body)) if !scheme.contains('/') && !scheme.contains(' ') =>
                (scheme.to_lowercase(), body.to_string()),
            _ => ("file".to_string(), format!("//{}", uri)),
        };

        Uri { scheme, body }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The local filesystem path, if this is a `file:` URI.
    pub fn to_local_path(&self) -> Option<String> {
        if self.scheme != "file" {
            return None;
        }

        let parts: Vec<&str> = self.body.splitn(4, '/').collect();
        if self.body.matches('/').count() < 3 {
            return None;
        }

        parts.get(3).map(|rest| format!("/{}", rest))
    }

    /// Qualify a local `file:` uri with this host's fully-qualified domain name, so the
    /// location is still meaningful to a consumer running elsewhere.
    pub fn qualified(&self, local_fqdn: &str) -> Uri {
        if self.scheme == "file" {
            if let Some(path) = self.to_local_path() {
                return Uri { scheme: "file".into(), body: format!("//{}{}", local_fqdn, path) };
            }
        }

        self.clone()
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scheme, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_path_as_file_uri() {
        let uri = Uri::parse("/etc/something.txt");
        assert_eq!(uri.scheme(), "file");
        assert_eq!(uri.to_local_path().as_deref(), Some("/etc/something.txt"));
    }

    #[test]
    fn parses_scheme_and_body() {
        let uri = Uri::parse("ftp://example.org/file.txt");
        assert_eq!(uri.scheme(), "ftp");
        assert_eq!(uri.to_local_path(), None);
    }

    #[test]
    fn qualifies_local_file_uri_with_hostname() {
        let uri = Uri::parse("file:///tmp/test.txt");
        let qualified = uri.qualified("host.example.org");
        assert_eq!(qualified.to_string(), "file://host.example.org/tmp/test.txt");
    }
}
