//! Template: a named, plugin-typed bundle of groups and tags, instantiable
//! into a concrete Node without re-specifying every group/tag by hand.

use serde::{Deserialize, Serialize};

use crate::tag::{AttributeSet, TagType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateTag {
    pub name: String,
    pub address: String,
    pub tag_type: TagType,
    pub attributes: AttributeSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateGroup {
    pub name: String,
    pub interval_ms: u64,
    pub tags: Vec<TemplateTag>,
}

/// A reusable bundle instantiated into a fresh Node + Groups + Tags by the
/// registry, rather than a live runtime entity itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub plugin_name: String,
    pub groups: Vec<TemplateGroup>,
}

impl Template {
    pub fn tag_count(&self) -> usize {
        self.groups.iter().map(|g| g.tags.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Template {
        Template {
            name: "t-modbus-rtu".into(),
            plugin_name: "modbus-tcp".into(),
            groups: vec![TemplateGroup {
                name: "g1".into(),
                interval_ms: 1000,
                tags: vec![TemplateTag {
                    name: "t1".into(),
                    address: "1!400001".into(),
                    tag_type: TagType::U16,
                    attributes: AttributeSet::read_only(),
                }],
            }],
        }
    }

    #[test]
    fn tag_count_sums_across_groups() {
        assert_eq!(sample().tag_count(), 1);
    }
}
