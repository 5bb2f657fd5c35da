//! Form-urlencoded parameters.
//!
//! Used for both QUERY_STRING and application/x-www-form-urlencoded
//! POST bodies. A name may repeat; values for one name keep the
//! order they appeared in.
//
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered multimap of decoded form parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormParams {
    /// Names in order of first appearance, each with all its values.
    entries: Vec<(String, Vec<String>)>,
}

impl FormParams {
    /// Decode `&`-separated `name=value` pairs.
    ///
    /// `+` is a space and percent escapes are decoded. A name with no `=`
    /// gets an empty value. Invalid UTF-8 after decoding is replaced, not fatal.
    pub fn parse(b: &[u8]) -> Self {
        let mut params = Self::default();
        for (k, v) in form_urlencoded::parse(b) {
            params.push(k.into_owned(), v.into_owned());
        }
        params
    }

    /// Add one value.
    pub fn push(&mut self, name: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// All values for a name.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// First value for a name.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Names in order of first appearance.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Flattened (name, value) pairs, grouped by name.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-encode as form-urlencoded text.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }
}

/// Serializes as a JSON-style object of name -> list of values.
impl Serialize for FormParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, vs) in &self.entries {
            map.serialize_entry(k, vs)?;
        }
        map.end()
    }
}

#[test]
fn parse_query() {
    let params = FormParams::parse(b"a=1&b=hello%21&a=2&flag&name=Jane+Doe&empty=");
    assert_eq!(params.get_all("a"), ["1", "2"]);
    assert_eq!(params.get_first("b"), Some("hello!"));
    assert_eq!(params.get_first("flag"), Some(""));
    assert_eq!(params.get_first("name"), Some("Jane Doe"));
    assert_eq!(params.get_first("empty"), Some(""));
    assert_eq!(params.get_first("missing"), None);
    assert!(params.get_all("missing").is_empty());
    assert_eq!(params.names().collect::<Vec<_>>(), ["a", "b", "flag", "name", "empty"]);
}

#[test]
fn parse_empty_and_degenerate() {
    assert!(FormParams::parse(b"").is_empty());
    assert!(FormParams::parse(b"&&").is_empty());
    let params = FormParams::parse(b"k=v=w&%3D=%26");
    assert_eq!(params.get_first("k"), Some("v=w"));
    assert_eq!(params.get_first("="), Some("&"));
}

#[test]
fn reencode_preserves_pairs() {
    //  Decode, encode, decode again. Same pairs, same order per name.
    for q in ["a=1&b=2&a=3", "x=%C3%A9t%C3%A9&y=a+b&x=", "k=%26%3D%2B&k=plain&z"] {
        let first = FormParams::parse(q.as_bytes());
        let second = FormParams::parse(first.encode().as_bytes());
        assert_eq!(first, second, "query {:?}", q);
        let mut a: Vec<_> = first.pairs().collect();
        let mut b: Vec<_> = second.pairs().collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }
}

#[test]
fn serialize_as_json() {
    let params = FormParams::parse(b"a=1&a=2&b=x");
    let json = serde_json::to_string(&params).expect("serialize failed");
    assert_eq!(json, r#"{"a":["1","2"],"b":["x"]}"#);
}
