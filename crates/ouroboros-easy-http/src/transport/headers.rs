//! Per-request header list built from raw `"Name: value"` lines

use http::header::{HeaderName, HeaderValue};

use super::{TransportCode, TransportError};

/// Ordered request headers.
///
/// Lives for exactly one request; duplicates are kept and sent in order.
/// A line with a name and nothing after the colon (`"Name:"`) sends nothing
/// and suppresses any value the transport would otherwise supply for it.
#[derive(Debug, Default, Clone)]
pub struct HeaderList {
    entries: Vec<(HeaderName, HeaderValue)>,
    removed: Vec<HeaderName>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from raw header lines, failing on the first bad line.
    pub fn from_raw<S: AsRef<str>>(lines: &[S]) -> Result<Self, TransportError> {
        let mut list = Self {
            entries: Vec::with_capacity(lines.len()),
            removed: Vec::new(),
        };
        for line in lines {
            list.append(line.as_ref())?;
        }
        tracing::trace!(count = list.len(), "built request header list");
        Ok(list)
    }

    /// Append one raw line.
    ///
    /// Accepts `"Name: value"` (value trimmed), `"Name;"` for an empty value
    /// and `"Name:"` to suppress the header.
    pub fn append(&mut self, line: &str) -> Result<(), TransportError> {
        let (name, value, remove) = match line.split_once(':') {
            Some((name, value)) => {
                let value = value.trim();
                (name, value, value.is_empty())
            }
            None => match line.trim_end().strip_suffix(';') {
                Some(name) => (name, "", false),
                None => return Err(bad_header(line, "missing ':' separator")),
            },
        };

        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| bad_header(line, "invalid header name"))?;
        if remove {
            self.removed.push(name);
            return Ok(());
        }
        let value =
            HeaderValue::from_str(value).map_err(|_| bad_header(line, "invalid header value"))?;
        self.entries.push((name, value));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.entries.iter().map(|(name, value)| (name, value))
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Whether a `"Name:"` line asked for this header to be left out.
    pub fn is_removed(&self, name: &HeaderName) -> bool {
        self.removed.contains(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for HeaderList {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            tracing::trace!(count = self.entries.len(), "released request header list");
        }
    }
}

fn bad_header(line: &str, reason: &str) -> TransportError {
    TransportError::new(
        TransportCode::BadFunctionArgument,
        format!("{} in header {:?}", reason, line),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;

    #[test]
    fn test_order_and_duplicates_preserved() {
        let list = HeaderList::from_raw(&["X-First: 1", "X-Second: 2", "X-First: 3"]).unwrap();
        let pairs: Vec<_> = list
            .iter()
            .map(|(n, v)| (n.as_str().to_string(), v.to_str().unwrap().to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("x-first".to_string(), "1".to_string()),
                ("x-second".to_string(), "2".to_string()),
                ("x-first".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_value_is_trimmed() {
        let list = HeaderList::from_raw(&["Accept-Encoding:   gzip  "]).unwrap();
        let (_, value) = list.iter().next().unwrap();
        assert_eq!(value, "gzip");
    }

    #[test]
    fn test_semicolon_form_sends_empty_value() {
        let list = HeaderList::from_raw(&["X-Empty;"]).unwrap();
        let (name, value) = list.iter().next().unwrap();
        assert_eq!(name.as_str(), "x-empty");
        assert!(value.is_empty());
    }

    #[test]
    fn test_colon_without_value_suppresses_header() {
        let list = HeaderList::from_raw(&["Content-Type:", "X-Kept: 1", "Accept:   "]).unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.is_removed(&CONTENT_TYPE));
        assert!(list.is_removed(&http::header::ACCEPT));
        assert!(!list.contains(&CONTENT_TYPE));
        assert!(!list.is_removed(&HeaderName::from_static("x-kept")));
    }

    #[test]
    fn test_missing_separator_rejected() {
        let err = HeaderList::from_raw(&["Accept: */*", "no separator here"]).unwrap_err();
        assert_eq!(err.code(), TransportCode::BadFunctionArgument);
        assert!(err.detail().contains("no separator here"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = HeaderList::from_raw(&["Bad Name: x"]).unwrap_err();
        assert_eq!(err.code(), TransportCode::BadFunctionArgument);
    }

    #[test]
    fn test_contains() {
        let list = HeaderList::from_raw(&["content-type: text/plain"]).unwrap();
        assert!(list.contains(&CONTENT_TYPE));
        assert!(!HeaderList::new().contains(&CONTENT_TYPE));
    }

    #[test]
    fn test_empty_input() {
        let list = HeaderList::from_raw::<&str>(&[]).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
    }
}
