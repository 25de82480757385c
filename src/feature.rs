use hashbrown::HashMap;

/// A sparse point: dimension name → weight.
///
/// Entry order carries no meaning. Inserting a name twice keeps the last weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: HashMap<String, f32>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Set the weight of `dim`, returning the previous weight if any.
    pub fn insert(&mut self, dim: impl Into<String>, weight: f32) -> Option<f32> {
        self.entries.insert(dim.into(), weight)
    }

    pub fn get(&self, dim: &str) -> Option<f32> {
        self.entries.get(dim).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Entries sorted by dimension name, so reductions over them are
    /// bit-for-bit reproducible regardless of how the vector was built.
    pub fn sorted_entries(&self) -> Vec<(&str, f32)> {
        let mut entries: Vec<(&str, f32)> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn squared_l2_norm(&self) -> f32 {
        self.sorted_entries().iter().map(|(_, x)| x * x).sum()
    }

    pub fn l2_norm(&self) -> f32 {
        self.squared_l2_norm().sqrt()
    }
}

impl<K: Into<String>> FromIterator<(K, f32)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (K, f32)>>(iter: I) -> Self {
        let mut fv = FeatureVector::new();
        fv.extend(iter);
        fv
    }
}

impl<K: Into<String>> Extend<(K, f32)> for FeatureVector {
    fn extend<I: IntoIterator<Item = (K, f32)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Into<String>, const N: usize> From<[(K, f32); N]> for FeatureVector {
    fn from(entries: [(K, f32); N]) -> Self {
        entries.into_iter().collect()
    }
}
