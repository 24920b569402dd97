//! `[targets]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [targets]
//! pages = ["home/v2", "list"]   # Defaults when --page is not given
//! widgets = "nav"               # A single string is accepted too
//! pages_dir = "src/pages"       # Discovered by `bakehouse all`
//! widgets_dir = "src/widget"
//! page_variants = false         # src/pages/<name>/<variant>/ layout
//! ```

use serde::{Deserialize, Deserializer, Serialize};

/// Default target lists and discovery roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub pages: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub widgets: Vec<String>,
    pub pages_dir: String,
    pub widgets_dir: String,
    pub page_variants: bool,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            widgets: Vec::new(),
            pages_dir: "src/pages".into(),
            widgets_dir: "src/widget".into(),
            page_variants: false,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    })
}
