//! Engagement level → remote category table.
//!
//! The table is explicit and total over [`EngagementLevel`]: every level has
//! exactly one category. Strings that are not a known level map to nothing,
//! which leaves the remote field unset.

use serde::{Deserialize, Serialize};

use crate::contact::EngagementLevel;
use crate::error::{SyncError, SyncResult};
use crate::remote::FieldDefinition;

/// A business category as the remote knows it: a stable option id plus the
/// label shown in the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLabel {
    pub id: String,
    pub label: String,
}

impl CategoryLabel {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTable {
    pub high: CategoryLabel,
    pub medium: CategoryLabel,
    pub low: CategoryLabel,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            high: CategoryLabel::new("engagement-high", "High Engagement"),
            medium: CategoryLabel::new("engagement-medium", "Medium Engagement"),
            low: CategoryLabel::new("engagement-low", "Low Engagement"),
        }
    }
}

impl CategoryTable {
    #[must_use]
    pub fn category_for(&self, level: EngagementLevel) -> &CategoryLabel {
        match level {
            EngagementLevel::High => &self.high,
            EngagementLevel::Medium => &self.medium,
            EngagementLevel::Low => &self.low,
        }
    }

    /// Map a free-form level string. Unknown strings yield `None`, never a default.
    #[must_use]
    pub fn engagement_to_category(&self, level: &str) -> Option<&CategoryLabel> {
        level.parse::<EngagementLevel>().ok().map(|l| self.category_for(l))
    }

    /// Reverse lookup by remote option id.
    #[must_use]
    pub fn level_for_id(&self, id: &str) -> Option<EngagementLevel> {
        EngagementLevel::ALL
            .into_iter()
            .find(|level| self.category_for(*level).id == id)
    }

    #[must_use]
    pub fn label_for_id(&self, id: &str) -> Option<&str> {
        self.level_for_id(id).map(|level| self.category_for(level).label.as_str())
    }

    pub fn set(&mut self, level: EngagementLevel, id: impl Into<String>) {
        let entry = match level {
            EngagementLevel::High => &mut self.high,
            EngagementLevel::Medium => &mut self.medium,
            EngagementLevel::Low => &mut self.low,
        };
        entry.id = id.into();
    }

    /// Build the table from the options of the remote single-select field.
    ///
    /// An option matches a level when its name equals the configured label or
    /// the level name itself, case-insensitively.
    pub fn resolve(&self, field: &FieldDefinition) -> SyncResult<Self> {
        let mut resolved = self.clone();
        for level in EngagementLevel::ALL {
            let wanted = self.category_for(level);
            let option = field.type_config.options.iter().find(|opt| {
                let name = opt.name.trim();
                name.eq_ignore_ascii_case(&wanted.label) || name.eq_ignore_ascii_case(level.as_str())
            });
            match option {
                Some(opt) => {
                    resolved.set(level, opt.id.clone());
                }
                None => {
                    return Err(SyncError::Configuration(format!(
                        "category field '{}' has no option for engagement level '{}' (label '{}')",
                        field.name, level, wanted.label
                    )));
                }
            }
        }
        Ok(resolved)
    }

    pub(crate) fn validate(&self) -> SyncResult<()> {
        for level in EngagementLevel::ALL {
            if self.category_for(level).id.trim().is_empty() {
                return Err(SyncError::Configuration(format!(
                    "no category id configured for engagement level '{level}'"
                )));
            }
        }
        let ids = [&self.high.id, &self.medium.id, &self.low.id];
        if ids[0] == ids[1] || ids[1] == ids[2] || ids[0] == ids[2] {
            return Err(SyncError::Configuration(
                "engagement levels must map to distinct category ids".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{FieldOption, FieldTypeConfig};

    #[test]
    fn test_mapping_is_total_over_levels() {
        let table = CategoryTable::default();
        for level in ["high", "medium", "low"] {
            let cat = table.engagement_to_category(level).expect("defined level must map");
            assert!(!cat.id.is_empty());
        }
    }

    #[test]
    fn test_unknown_level_maps_to_nothing() {
        let table = CategoryTable::default();
        assert!(table.engagement_to_category("extreme").is_none());
        assert!(table.engagement_to_category("").is_none());
        assert!(table.engagement_to_category("undefined").is_none());
    }

    #[test]
    fn test_reverse_lookup() {
        let table = CategoryTable::default();
        assert_eq!(table.level_for_id("engagement-medium"), Some(EngagementLevel::Medium));
        assert_eq!(table.label_for_id("engagement-low"), Some("Low Engagement"));
        assert_eq!(table.level_for_id("nope"), None);
    }

    #[test]
    fn test_resolve_from_field_options() {
        let field = FieldDefinition {
            id: "cat-field".into(),
            name: "Engagement Category".into(),
            field_type: "drop_down".into(),
            type_config: FieldTypeConfig {
                options: vec![
                    FieldOption { id: "o1".into(), name: "high engagement".into() },
                    FieldOption { id: "o2".into(), name: "Medium".into() },
                    FieldOption { id: "o3".into(), name: "Low Engagement".into() },
                ],
            },
        };
        let table = CategoryTable::default().resolve(&field).unwrap();
        assert_eq!(table.high.id, "o1");
        assert_eq!(table.medium.id, "o2");
        assert_eq!(table.low.id, "o3");
        assert_eq!(table.medium.label, "Medium Engagement");
    }

    #[test]
    fn test_resolve_missing_option_is_configuration_error() {
        let field = FieldDefinition {
            id: "cat-field".into(),
            name: "Engagement Category".into(),
            field_type: "drop_down".into(),
            type_config: FieldTypeConfig {
                options: vec![FieldOption { id: "o1".into(), name: "High".into() }],
            },
        };
        let err = CategoryTable::default().resolve(&field).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut table = CategoryTable::default();
        table.set(EngagementLevel::Low, "engagement-high");
        assert!(table.validate().is_err());
        assert!(CategoryTable::default().validate().is_ok());
    }
}
