use serde::{Deserialize, Serialize};

/// Free-form user labels.
///
/// Membership is set-like; display order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }

    /// Add `name` if absent, remove it otherwise.
    /// Returns whether the label is present afterwards.
    pub fn toggle(&mut self, name: &str) -> bool {
        if let Some(pos) = self.labels.iter().position(|l| l == name) {
            self.labels.remove(pos);
            false
        } else {
            self.labels.push(name.to_string());
            true
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

impl FromIterator<String> for LabelSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for label in iter {
            if !set.contains(&label) {
                set.labels.push(label);
            }
        }
        set
    }
}
