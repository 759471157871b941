//! Rule-based label confidences for the live simulator.
//!
//! Five independent closed-form rules, one per label. There is no model
//! behind these numbers; they are tuned so that moving a slider across a
//! clinical threshold visibly flips the ranking.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::params::ClinicalParameters;

/// Upper bound on any displayed confidence.
pub const MAX_CONFIDENCE: f64 = 0.98;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "AF")]
    Af,
    #[serde(rename = "PVC")]
    Pvc,
    #[serde(rename = "STE")]
    Ste,
    #[serde(rename = "RBBB")]
    Rbbb,
    Normal,
}

impl Label {
    /// Declaration order; also the tie-break order after sorting.
    pub const ALL: [Label; 5] = [Label::Af, Label::Pvc, Label::Ste, Label::Rbbb, Label::Normal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Af => "AF",
            Label::Pvc => "PVC",
            Label::Ste => "STE",
            Label::Rbbb => "RBBB",
            Label::Normal => "Normal",
        }
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            Label::Af => "Atrial Fibrillation",
            Label::Pvc => "Premature Ventricular Contraction",
            Label::Ste => "ST-segment Elevation",
            Label::Rbbb => "Right Bundle Branch Block",
            Label::Normal => "Sinus Rhythm",
        }
    }

    fn raw_confidence(&self, p: &ClinicalParameters) -> f64 {
        let hr = p.heart_rate;
        let qrs = p.qrs_duration;
        let st = p.st_level.abs();
        match self {
            Label::Af => {
                if hr > 110.0 {
                    0.7 + (hr - 110.0) * 0.002
                } else {
                    0.05 + hr / 500.0
                }
            }
            Label::Pvc => {
                if qrs > 110.0 {
                    0.6 + (qrs - 110.0) * 0.003
                } else {
                    0.08
                }
            }
            Label::Ste => {
                if st > 1.5 {
                    0.8
                } else {
                    st / 5.0
                }
            }
            Label::Rbbb => {
                if qrs > 140.0 {
                    0.75
                } else {
                    0.02
                }
            }
            Label::Normal => {
                if hr > 60.0 && hr < 100.0 && qrs < 110.0 && st < 0.5 {
                    0.92
                } else {
                    0.1
                }
            }
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelScore {
    pub label: Label,
    pub full_name: &'static str,
    pub confidence: f64,
}

impl LabelScore {
    pub fn percent(&self) -> f64 {
        self.confidence * 100.0
    }
}

// Display surfaces read `percent` directly.
impl Serialize for LabelScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("LabelScore", 4)?;
        s.serialize_field("label", &self.label)?;
        s.serialize_field("full_name", self.full_name)?;
        s.serialize_field("confidence", &self.confidence)?;
        s.serialize_field("percent", &self.percent())?;
        s.end()
    }
}

/// Clamp into `[0, MAX_CONFIDENCE]`; non-finite values collapse to zero.
pub fn clamp_confidence(c: f64) -> f64 {
    if c.is_finite() {
        c.clamp(0.0, MAX_CONFIDENCE)
    } else {
        0.0
    }
}

/// Score all five labels, highest confidence first.
pub fn score(params: &ClinicalParameters) -> [LabelScore; 5] {
    let mut out = Label::ALL.map(|label| LabelScore {
        label,
        full_name: label.full_name(),
        confidence: clamp_confidence(label.raw_confidence(params)),
    });
    // stable: equal confidences keep declaration order
    out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    out
}

/// The top-ranked label.
pub fn primary(scores: &[LabelScore; 5]) -> LabelScore {
    scores[0]
}

/// Everything below the primary diagnosis, still ranked.
pub fn spectrum(scores: &[LabelScore; 5]) -> &[LabelScore] {
    &scores[1..]
}
