use std::{borrow::Cow, fmt, time::SystemTime};

/// An owned or borrowed string, as used for metric names, tag keys and tag values.
pub type SharedString = Cow<'static, str>;

/// Metric kind.
///
/// Defines the kind, or type, of a metric as reported by the source that produced it.  Sinks may
/// use the kind to pick an encoding, but tracking never looks at it.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricKind {
    /// No type information was available.
    #[default]
    Untyped,
    /// Counter type.
    Counter,
    /// Gauge type.
    Gauge,
    /// Summary type.
    Summary,
    /// Histogram type.
    Histogram,
}

/// Metadata for a metric in the form of a key/value pair.
///
/// Tags describe the context a measurement was taken in: the host it came from, the request path
/// being served, the queue being consumed, and so on.
#[derive(PartialEq, Eq, Hash, Clone, Debug, PartialOrd, Ord)]
pub struct Tag(pub(crate) SharedString, pub(crate) SharedString);

impl Tag {
    /// Creates a [`Tag`] from a key and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<SharedString>,
        V: Into<SharedString>,
    {
        Tag(key.into(), value.into())
    }

    /// Creates a [`Tag`] from a static key and value.
    pub const fn from_static_parts(key: &'static str, value: &'static str) -> Self {
        Tag(Cow::Borrowed(key), Cow::Borrowed(value))
    }

    /// Key of this tag.
    pub fn key(&self) -> &str {
        self.0.as_ref()
    }

    /// Value of this tag.
    pub fn value(&self) -> &str {
        self.1.as_ref()
    }

    /// Consumes this [`Tag`], returning the key and value.
    pub fn into_parts(self) -> (SharedString, SharedString) {
        (self.0, self.1)
    }
}

impl<K, V> From<&(K, V)> for Tag
where
    K: Into<SharedString> + Clone,
    V: Into<SharedString> + Clone,
{
    fn from(pair: &(K, V)) -> Tag {
        Tag::new(pair.0.clone(), pair.1.clone())
    }
}

impl<K, V> From<(K, V)> for Tag
where
    K: Into<SharedString>,
    V: Into<SharedString>,
{
    fn from(pair: (K, V)) -> Tag {
        Tag::new(pair.0, pair.1)
    }
}

/// A value that can be converted to [`Tag`]s.
pub trait IntoTags {
    /// Consumes this value, turning it into a vector of [`Tag`]s.
    fn into_tags(self) -> Vec<Tag>;
}

impl IntoTags for Vec<Tag> {
    fn into_tags(self) -> Vec<Tag> {
        self
    }
}

impl<T, L> IntoTags for &T
where
    Self: IntoIterator<Item = L>,
    L: Into<Tag>,
{
    fn into_tags(self) -> Vec<Tag> {
        self.into_iter().map(|l| l.into()).collect()
    }
}

/// The value of a single metric field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Floating-point value.
    Float(f64),
    /// Signed integer value.
    Int(i64),
    /// Unsigned integer value.
    Uint(u64),
    /// Boolean value.
    Bool(bool),
    /// String value.
    String(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Uint(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}i", v),
            FieldValue::Uint(v) => write!(f, "{}u", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// A single measurement.
///
/// A metric always has a name and a timestamp, and carries any number of tags and fields.  Tags are
/// kept sorted by key, and both tags and fields are unique by key: adding a tag or field whose key
/// already exists replaces the existing value.
///
/// Cloning a metric produces a deep copy.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    name: SharedString,
    tags: Vec<Tag>,
    fields: Vec<(String, FieldValue)>,
    timestamp: SystemTime,
    kind: MetricKind,
}

impl Metric {
    /// Creates a `Metric` with the given name and timestamp, and no tags or fields.
    pub fn new<N>(name: N, timestamp: SystemTime) -> Self
    where
        N: Into<SharedString>,
    {
        Metric {
            name: name.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp,
            kind: MetricKind::Untyped,
        }
    }

    /// Creates a `Metric` from its parts.
    pub fn from_parts<N, T, F, K>(
        name: N,
        tags: T,
        fields: F,
        timestamp: SystemTime,
        kind: MetricKind,
    ) -> Self
    where
        N: Into<SharedString>,
        T: IntoTags,
        F: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        let mut metric = Metric::new(name, timestamp).with_kind(kind);
        for tag in tags.into_tags() {
            metric.insert_tag(tag);
        }
        for (key, value) in fields {
            metric.add_field(key, value);
        }
        metric
    }

    /// Sets the kind of this metric.
    #[must_use]
    pub fn with_kind(mut self, kind: MetricKind) -> Self {
        self.kind = kind;
        self
    }

    /// Adds a tag, returning the metric.
    #[must_use]
    pub fn with_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<SharedString>,
        V: Into<SharedString>,
    {
        self.add_tag(key, value);
        self
    }

    /// Adds a field, returning the metric.
    #[must_use]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.add_field(key, value);
        self
    }

    /// Name of this metric.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Renames this metric.
    pub fn set_name<N>(&mut self, name: N)
    where
        N: Into<SharedString>,
    {
        self.name = name.into();
    }

    /// Prepends `prefix` to the name of this metric.
    pub fn add_prefix(&mut self, prefix: &str) {
        self.name = Cow::Owned(format!("{}{}", prefix, self.name));
    }

    /// Appends `suffix` to the name of this metric.
    pub fn add_suffix(&mut self, suffix: &str) {
        self.name.to_mut().push_str(suffix);
    }

    /// Kind of this metric.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Tags of this metric, sorted by key.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Value of the tag with the given key, if it exists.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tag_index(key).ok().map(|i| self.tags[i].value())
    }

    /// Returns `true` if a tag with the given key exists.
    pub fn has_tag(&self, key: &str) -> bool {
        self.tag_index(key).is_ok()
    }

    /// Adds a tag, replacing the value of any existing tag with the same key.
    pub fn add_tag<K, V>(&mut self, key: K, value: V)
    where
        K: Into<SharedString>,
        V: Into<SharedString>,
    {
        self.insert_tag(Tag::new(key, value));
    }

    /// Removes the tag with the given key, returning its value if it existed.
    pub fn remove_tag(&mut self, key: &str) -> Option<SharedString> {
        let idx = self.tag_index(key).ok()?;
        Some(self.tags.remove(idx).1)
    }

    /// Fields of this metric, in insertion order.
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Value of the field with the given key, if it exists.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns `true` if a field with the given key exists.
    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// Adds a field, replacing the value of any existing field with the same key.
    pub fn add_field<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Removes the field with the given key, returning its value if it existed.
    pub fn remove_field(&mut self, key: &str) -> Option<FieldValue> {
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(idx).1)
    }

    /// Timestamp of this metric.
    pub fn time(&self) -> SystemTime {
        self.timestamp
    }

    /// Sets the timestamp of this metric.
    pub fn set_time(&mut self, timestamp: SystemTime) {
        self.timestamp = timestamp;
    }

    fn tag_index(&self, key: &str) -> Result<usize, usize> {
        self.tags.binary_search_by(|t| t.key().cmp(key))
    }

    fn insert_tag(&mut self, tag: Tag) {
        match self.tag_index(tag.key()) {
            Ok(idx) => self.tags[idx] = tag,
            Err(idx) => self.tags.insert(idx, tag),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for tag in &self.tags {
            write!(f, ",{}={}", tag.key(), tag.value())?;
        }
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>();
        write!(f, " {}", fields.join(","))
    }
}
