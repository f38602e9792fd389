//! Generic key/value/list tree used as the metadata import source and export sink.
//!
//! The text form is the one volume group metadata is stored in:
//!
//! ```text
//! vg0 {
//!     extent_size = 8192
//!     logical_volumes {
//!         lv0 {
//!             segment_count = 1
//!             segment1 {
//!                 type = "raid5"
//!                 raids = [ "lv0_rmeta_0", "lv0_rimage_0" ]
//!             }
//!         }
//!     }
//! }
//! ```

mod parse;
mod writer;

pub use parse::parse;
pub use writer::Formatter;

/// A scalar or list value on the right-hand side of `key = value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigValue {
    Int(i64),
    Str(String),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeBody {
    Value(ConfigValue),
    Section(Vec<ConfigNode>),
}

/// A named node: either a `key = value` leaf or a `name { ... }` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigNode {
    key: String,
    body: NodeBody,
}

impl ConfigNode {
    pub fn value(key: impl Into<String>, value: ConfigValue) -> Self {
        Self {
            key: key.into(),
            body: NodeBody::Value(value),
        }
    }

    pub fn section(key: impl Into<String>, children: Vec<Self>) -> Self {
        Self {
            key: key.into(),
            body: NodeBody::Section(children),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub const fn body(&self) -> &NodeBody {
        &self.body
    }

    #[must_use]
    pub const fn as_value(&self) -> Option<&ConfigValue> {
        match &self.body {
            NodeBody::Value(v) => Some(v),
            NodeBody::Section(_) => None,
        }
    }

    #[must_use]
    pub const fn is_section(&self) -> bool {
        matches!(self.body, NodeBody::Section(_))
    }

    /// Children of a section; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.body {
            NodeBody::Section(children) => children,
            NodeBody::Value(_) => &[],
        }
    }

    /// Child sections only, in document order.
    pub fn sections(&self) -> impl Iterator<Item = &Self> {
        self.children().iter().filter(|c| c.is_section())
    }

    /// Appends a child. Leaves are turned into empty sections first.
    pub fn push(&mut self, child: Self) {
        if let NodeBody::Value(_) = self.body {
            self.body = NodeBody::Section(Vec::new());
        }
        if let NodeBody::Section(children) = &mut self.body {
            children.push(child);
        }
    }

    /// Looks a node up by a `/`-separated path relative to this one.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Self> {
        path.split('/')
            .filter(|p| !p.is_empty())
            .try_fold(self, |node, part| {
                node.children().iter().find(|c| c.key == part)
            })
    }

    #[must_use]
    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.find(path)?
            .as_value()?
            .as_int()
            .and_then(|v| u64::try_from(v).ok())
    }

    #[must_use]
    pub fn get_u32(&self, path: &str) -> Option<u32> {
        self.get_u64(path).and_then(|v| u32::try_from(v).ok())
    }

    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.find(path)?.as_value()?.as_str()
    }

    #[must_use]
    pub fn get_list(&self, path: &str) -> Option<&[ConfigValue]> {
        match self.find(path)?.as_value()? {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigNode {
        ConfigNode::section(
            "segment1",
            vec![
                ConfigNode::value("device_count", ConfigValue::Int(3)),
                ConfigNode::value("region_size", ConfigValue::Int(-1)),
                ConfigNode::value("type", ConfigValue::Str("raid5".into())),
                ConfigNode::value(
                    "raids",
                    ConfigValue::List(vec![ConfigValue::Str("m".into())]),
                ),
                ConfigNode::section(
                    "nested",
                    vec![ConfigNode::value("big", ConfigValue::Int(1 << 40))],
                ),
            ],
        )
    }

    #[test]
    fn typed_accessors_reject_wrong_shapes() {
        let node = sample();
        assert_eq!(node.get_u32("device_count"), Some(3));
        assert_eq!(node.get_u32("region_size"), None, "negative is not unsigned");
        assert_eq!(node.get_u32("type"), None);
        assert_eq!(node.get_str("type"), Some("raid5"));
        assert_eq!(node.get_list("raids").map(<[_]>::len), Some(1));
        assert!(node.get_list("type").is_none());
    }

    #[test]
    fn paths_descend_into_sections() {
        let node = sample();
        assert_eq!(node.get_u64("nested/big"), Some(1 << 40));
        assert_eq!(node.get_u32("nested/big"), None, "does not fit in u32");
        assert!(node.find("nested/missing").is_none());
        assert_eq!(node.sections().count(), 1);
    }

    #[test]
    fn push_converts_leaf_to_section() {
        let mut node = ConfigNode::value("x", ConfigValue::Int(1));
        node.push(ConfigNode::value("y", ConfigValue::Int(2)));
        assert!(node.is_section());
        assert_eq!(node.get_u32("y"), Some(2));
    }
}
