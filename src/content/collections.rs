use serde::{Deserialize, Serialize};

/// How a content collection behaves on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection name, also the storage namespace (e.g. `pages`).
    pub name: String,
    /// Documents are addressed by a unique slug derived from their title.
    #[serde(default)]
    pub slugged: bool,
    /// Documents may have a parent in the same collection.
    #[serde(default)]
    pub hierarchical: bool,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>, slugged: bool, hierarchical: bool) -> Self {
        Self {
            name: name.into(),
            slugged,
            hierarchical,
        }
    }
}

/// The collections of a stock site.
pub fn default_collections() -> Vec<CollectionConfig> {
    vec![
        CollectionConfig::new("pages", true, true),
        CollectionConfig::new("blogs", true, false),
        CollectionConfig::new("services", true, true),
        CollectionConfig::new("legal", true, false),
        CollectionConfig::new("contacts", false, false),
    ]
}
