use serde::{Deserialize, Serialize};

/// Slider-driven inputs to the scorer and the signal synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClinicalParameters {
    /// Beats per minute.
    pub heart_rate: f64,
    /// Milliseconds.
    pub qrs_duration: f64,
    /// Millivolts relative to baseline.
    pub st_level: f64,
    /// Milliseconds. Carried for display, no rule reads it.
    pub pr_interval: f64,
}

impl Default for ClinicalParameters {
    fn default() -> Self {
        Self {
            heart_rate: 72.0,
            qrs_duration: 90.0,
            st_level: 0.0,
            pr_interval: 160.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    HeartRate,
    QrsDuration,
    StLevel,
    PrInterval,
}

impl Param {
    pub fn as_str(&self) -> &'static str {
        match self {
            Param::HeartRate => "heart_rate",
            Param::QrsDuration => "qrs_duration",
            Param::StLevel => "st_level",
            Param::PrInterval => "pr_interval",
        }
    }

    /// Inclusive slider range; `None` for inputs without a widget.
    pub fn range(&self) -> Option<(f64, f64)> {
        match self {
            Param::HeartRate => Some((40.0, 220.0)),
            Param::QrsDuration => Some((60.0, 250.0)),
            Param::StLevel => Some((-3.0, 5.0)),
            Param::PrInterval => None,
        }
    }

    /// Slider granularity; `None` means any finite value.
    pub fn step(&self) -> Option<f64> {
        match self {
            Param::HeartRate | Param::QrsDuration => Some(1.0),
            Param::StLevel => Some(0.1),
            Param::PrInterval => None,
        }
    }

    /// Clamp and snap a raw value the way the widget would. Non-finite input
    /// yields `None`.
    pub fn normalize(&self, raw: f64) -> Option<f64> {
        if !raw.is_finite() {
            return None;
        }
        let mut v = raw;
        if let Some((lo, hi)) = self.range() {
            v = v.clamp(lo, hi);
        }
        if let Some(step) = self.step() {
            // snap in integer step units so 0.1 steps print cleanly
            let units = (v / step).round();
            v = if step < 1.0 { units / (1.0 / step).round() } else { units * step };
        }
        // fold -0.0 into +0.0
        Some(v + 0.0)
    }
}

impl std::str::FromStr for Param {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hr" | "heart_rate" => Ok(Param::HeartRate),
            "qrs" | "qrs_duration" => Ok(Param::QrsDuration),
            "st" | "st_level" => Ok(Param::StLevel),
            "pr" | "pr_interval" => Ok(Param::PrInterval),
            other => Err(format!("unknown parameter '{}'", other)),
        }
    }
}

impl ClinicalParameters {
    pub fn get(&self, param: Param) -> f64 {
        match param {
            Param::HeartRate => self.heart_rate,
            Param::QrsDuration => self.qrs_duration,
            Param::StLevel => self.st_level,
            Param::PrInterval => self.pr_interval,
        }
    }

    /// Apply a raw input. Returns whether the stored value changed.
    pub fn set(&mut self, param: Param, raw: f64) -> bool {
        let Some(v) = param.normalize(raw) else {
            return false;
        };
        let slot = match param {
            Param::HeartRate => &mut self.heart_rate,
            Param::QrsDuration => &mut self.qrs_duration,
            Param::StLevel => &mut self.st_level,
            Param::PrInterval => &mut self.pr_interval,
        };
        if *slot == v {
            return false;
        }
        *slot = v;
        true
    }

    /// Heart rate bounded away from zero for divisions.
    pub fn safe_heart_rate(&self) -> f64 {
        if self.heart_rate.is_finite() {
            self.heart_rate.max(1.0)
        } else {
            ClinicalParameters::default().heart_rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = ClinicalParameters::default();
        assert_eq!(p.heart_rate, 72.0);
        assert_eq!(p.qrs_duration, 90.0);
        assert_eq!(p.st_level, 0.0);
        assert_eq!(p.pr_interval, 160.0);
    }

    #[test]
    fn test_set_clamps_to_slider_range() {
        let mut p = ClinicalParameters::default();
        assert!(p.set(Param::HeartRate, 400.0));
        assert_eq!(p.heart_rate, 220.0);
        assert!(p.set(Param::HeartRate, 0.0));
        assert_eq!(p.heart_rate, 40.0);
        assert!(p.set(Param::QrsDuration, 10.0));
        assert_eq!(p.qrs_duration, 60.0);
        assert!(p.set(Param::StLevel, -9.0));
        assert_eq!(p.st_level, -3.0);
    }

    #[test]
    fn test_st_level_snaps_to_tenths() {
        let mut p = ClinicalParameters::default();
        p.set(Param::StLevel, 1.234);
        assert_eq!(p.st_level, 1.2);
        p.set(Param::StLevel, -0.06);
        assert_eq!(p.st_level, -0.1);
    }

    #[test]
    fn test_snap_to_zero_drops_sign() {
        let mut p = ClinicalParameters::default();
        p.set(Param::StLevel, 1.0);
        p.set(Param::StLevel, -0.04);
        assert_eq!(p.st_level, 0.0);
        assert!(p.st_level.is_sign_positive());
        assert_eq!(
            serde_json::to_string(&p).unwrap(),
            serde_json::to_string(&ClinicalParameters::default()).unwrap()
        );
    }

    #[test]
    fn test_integral_sliders_round() {
        let mut p = ClinicalParameters::default();
        p.set(Param::HeartRate, 99.6);
        assert_eq!(p.heart_rate, 100.0);
    }

    #[test]
    fn test_non_finite_ignored() {
        let mut p = ClinicalParameters::default();
        assert!(!p.set(Param::HeartRate, f64::NAN));
        assert!(!p.set(Param::PrInterval, f64::INFINITY));
        assert_eq!(p, ClinicalParameters::default());
    }

    #[test]
    fn test_pr_interval_unclamped() {
        let mut p = ClinicalParameters::default();
        assert!(p.set(Param::PrInterval, 512.5));
        assert_eq!(p.pr_interval, 512.5);
    }

    #[test]
    fn test_unchanged_value_reports_false() {
        let mut p = ClinicalParameters::default();
        assert!(!p.set(Param::HeartRate, 72.0));
    }

    #[test]
    fn test_param_parse() {
        assert_eq!("hr".parse::<Param>().unwrap(), Param::HeartRate);
        assert_eq!("st_level".parse::<Param>().unwrap(), Param::StLevel);
        assert!("bpm".parse::<Param>().is_err());
    }
}
