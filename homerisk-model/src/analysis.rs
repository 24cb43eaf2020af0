use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Finalized risk analysis, present on a report iff it reached `COMPLETED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    /// Aggregate risk score, 0 (safe) to 10 (high risk).
    pub overall_score: f64,
    pub summary: String,
    pub categories: BTreeMap<String, RiskCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_sources: Option<Vec<EvidenceSource>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCategory {
    pub score: f64,
    pub label: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl RiskAnalysis {
    /// Validate the schema contract: every required category present and all
    /// scores inside [0, 10]. Used to reject summarizer output before it is
    /// ever persisted.
    pub fn validate(&self, required_categories: &[&str]) -> Result<(), ModelError> {
        if !self.overall_score.is_finite() || !(0.0..=10.0).contains(&self.overall_score) {
            return Err(ModelError::InvalidAnalysis(format!(
                "overall_score {} outside [0, 10]",
                self.overall_score
            )));
        }
        for name in required_categories {
            let Some(category) = self.categories.get(*name) else {
                return Err(ModelError::InvalidAnalysis(format!(
                    "missing category `{name}`"
                )));
            };
            if !category.score.is_finite() || !(0.0..=10.0).contains(&category.score) {
                return Err(ModelError::InvalidAnalysis(format!(
                    "category `{name}` score {} outside [0, 10]",
                    category.score
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(overall: f64, categories: &[(&str, f64)]) -> RiskAnalysis {
        RiskAnalysis {
            overall_score: overall,
            summary: "test".into(),
            categories: categories
                .iter()
                .map(|(name, score)| {
                    (
                        name.to_string(),
                        RiskCategory {
                            score: *score,
                            label: "Medio".into(),
                            details: String::new(),
                        },
                    )
                })
                .collect(),
            evidence_sources: None,
        }
    }

    #[test]
    fn validate_accepts_complete_in_range_analysis() {
        let a = analysis(4.5, &[("security", 6.0), ("utilities", 3.0)]);
        assert!(a.validate(&["security", "utilities"]).is_ok());
    }

    #[test]
    fn validate_rejects_missing_category() {
        let a = analysis(4.5, &[("security", 6.0)]);
        assert!(a.validate(&["security", "utilities"]).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_scores() {
        assert!(analysis(11.0, &[("security", 6.0)])
            .validate(&["security"])
            .is_err());
        assert!(analysis(5.0, &[("security", -1.0)])
            .validate(&["security"])
            .is_err());
        assert!(analysis(f64::NAN, &[("security", 6.0)])
            .validate(&["security"])
            .is_err());
    }
}
