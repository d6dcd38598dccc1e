//! Chart column selection - partitions record columns into numeric,
//! categorical and datetime groups.

use crate::inference::TypeInferencer;
use crate::model::{column_names, DataType, Record, SourceProfile, TIMESTAMP_COLUMN};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Column groups, each in order of first appearance in the records
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub datetime: Vec<String>,
}

impl ColumnSelection {
    pub fn is_empty(&self) -> bool {
        self.numeric.is_empty() && self.categorical.is_empty() && self.datetime.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ChartSelector {
    fallback: TypeInferencer,
}

impl ChartSelector {
    /// `display_threshold` is used only for columns without a stored profile.
    pub fn new(display_threshold: f64) -> Self {
        Self {
            fallback: TypeInferencer::new(display_threshold),
        }
    }

    /// Group the columns of `records`. A stored profile decides a column's type
    /// when present; other columns are classified from their live values.
    pub fn select(&self, records: &[Record], profile: &SourceProfile) -> ColumnSelection {
        let mut selection = ColumnSelection::default();

        for name in column_names(records) {
            if name == TIMESTAMP_COLUMN {
                continue;
            }

            let data_type = match profile.get(&name) {
                Some(stored) => stored.data_type(),
                None => {
                    let data_type = self.fallback.classify(records.iter().map(|r| r.get(&name)));
                    debug!("No stored profile for column {}, inferred {}", name, data_type);
                    data_type
                }
            };

            match data_type {
                DataType::Numeric => selection.numeric.push(name),
                DataType::Datetime => selection.datetime.push(name),
                DataType::Text => selection.categorical.push(name),
            }
        }

        selection
    }
}

impl Default for ChartSelector {
    fn default() -> Self {
        Self {
            fallback: TypeInferencer::for_display(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnProfile, ColumnStats};
    use serde_json::{json, Value};

    fn records(rows: &[Value]) -> Vec<Record> {
        rows.iter()
            .map(|r| Record::new("s", r.as_object().unwrap().clone()))
            .collect()
    }

    #[test]
    fn test_live_inference_without_profile() {
        let recs = records(&[
            json!({"Region": "North", "Revenue": "100", "Date": "2024-01-01"}),
            json!({"Region": "South", "Revenue": "200", "Date": "2024-01-02"}),
        ]);

        let selection = ChartSelector::default().select(&recs, &SourceProfile::default());
        assert_eq!(selection.categorical, vec!["Region"]);
        assert_eq!(selection.numeric, vec!["Revenue"]);
        assert_eq!(selection.datetime, vec!["Date"]);
    }

    #[test]
    fn test_stored_profile_wins() {
        let recs = records(&[json!({"Code": "1"}), json!({"Code": "2"})]);
        let profile = SourceProfile::new(
            "s",
            vec![ColumnProfile {
                name: "Code".to_string(),
                total_count: 2,
                non_null_count: 2,
                unique_count: 2,
                stats: ColumnStats::Text { top_values: vec![] },
            }],
        );

        let selection = ChartSelector::default().select(&recs, &profile);
        assert_eq!(selection.categorical, vec!["Code"]);
        assert!(selection.numeric.is_empty());
    }

    #[test]
    fn test_fallback_uses_display_threshold() {
        // three of four values are numeric: 0.75 passes 0.7 but not 0.8
        let recs = records(&[
            json!({"Code": "1"}),
            json!({"Code": "2"}),
            json!({"Code": "3"}),
            json!({"Code": "x"}),
        ]);

        let live = ChartSelector::default().select(&recs, &SourceProfile::default());
        assert_eq!(live.numeric, vec!["Code"]);
        assert!(live.categorical.is_empty());

        let stored = TypeInferencer::for_import().infer("Code", recs.iter().map(|r| r.get("Code")));
        assert_eq!(stored.data_type(), DataType::Text);

        let profile = SourceProfile::new("s", vec![stored]);
        let persisted = ChartSelector::default().select(&recs, &profile);
        assert_eq!(persisted.categorical, vec!["Code"]);
        assert!(persisted.numeric.is_empty());
    }

    #[test]
    fn test_timestamp_column_never_classified() {
        let recs = records(&[json!({"_timestamp": "2024-01-01", "v": 1})]);
        let selection = ChartSelector::default().select(&recs, &SourceProfile::default());
        assert_eq!(selection.numeric, vec!["v"]);
        assert!(selection.datetime.is_empty());
    }

    #[test]
    fn test_no_records() {
        let selection = ChartSelector::default().select(&[], &SourceProfile::default());
        assert!(selection.is_empty());
    }
}
