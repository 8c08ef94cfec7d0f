use crate::record::is_marker_field;

/// One field: driver column name → output field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    /// Name as produced by the driver (`"CREATED_AT"`).
    pub source: String,
    /// Name in the sanitized record (`"created_at"`).
    pub target: String,
}

/// Ordered source → target field mapping.
///
/// Source names are unique: when a source repeats, the first occurrence wins.
/// Pairs targeting a degraded-record marker field are dropped.
/// Immutable once built; the engine shares it across batches and tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    fields: Vec<FieldMap>,
}

impl FieldMapping {
    pub fn new<S, T>(pairs: impl IntoIterator<Item = (S, T)>) -> Self
    where
        S: Into<String>,
        T: Into<String>,
    {
        let mut fields: Vec<FieldMap> = Vec::new();
        for (source, target) in pairs {
            let source = source.into();
            let target = target.into();
            if is_marker_field(&target) || fields.iter().any(|f| f.source == source) {
                continue;
            }
            fields.push(FieldMap { source, target });
        }
        Self { fields }
    }

    /// Mapping where every output name is the lowercased source name.
    pub fn from_names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            names
                .into_iter()
                .map(|n| (n.as_ref().to_string(), n.as_ref().to_lowercase())),
        )
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldMap> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.source == source)
            .map(|f| f.target.as_str())
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.source.as_str())
    }
}

impl<'a> IntoIterator for &'a FieldMapping {
    type Item = &'a FieldMap;
    type IntoIter = std::slice::Iter<'a, FieldMap>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
