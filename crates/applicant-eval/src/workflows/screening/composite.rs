//! Weighted composite of the skill and mindset dimensions.
//!
//! Only the skill share is ever stored; the mindset share is always `1 - skill`, so the
//! pair cannot drift away from summing to one.

use super::domain::AiEvaluation;

const RATIO_SUM_TOLERANCE: f64 = 1e-6;
const SLIDER_STEPS_PER_UNIT: f64 = 20.0;

/// Weight of the skill dimension; the mindset weight is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRatio {
    skill: f64,
}

impl ScoreRatio {
    /// 20% skill / 80% mindset.
    pub const DEFAULT: ScoreRatio = ScoreRatio { skill: 0.2 };

    pub fn new(skill: f64) -> Result<Self, RatioError> {
        if !skill.is_finite() || !(0.0..=1.0).contains(&skill) {
            return Err(RatioError::OutOfRange(skill));
        }
        Ok(Self { skill })
    }

    /// Accepts an explicit pair as long as it already sums to one.
    pub fn from_pair(skill: f64, mindset: f64) -> Result<Self, RatioError> {
        let ratio = Self::new(skill)?;
        if !mindset.is_finite() || (skill + mindset - 1.0).abs() > RATIO_SUM_TOLERANCE {
            return Err(RatioError::Mismatch { skill, mindset });
        }
        Ok(ratio)
    }

    /// Slider position in whole percent.
    pub fn from_percent(percent: u8) -> Result<Self, RatioError> {
        Self::new(f64::from(percent) / 100.0)
    }

    pub fn skill(self) -> f64 {
        self.skill
    }

    pub fn mindset(self) -> f64 {
        1.0 - self.skill
    }

    /// Snaps to the 0.05 grid used by the ratio slider.
    pub fn quantized(self) -> Self {
        let snapped = (self.skill * SLIDER_STEPS_PER_UNIT).round() / SLIDER_STEPS_PER_UNIT;
        Self {
            skill: snapped.clamp(0.0, 1.0),
        }
    }

    pub fn combine(self, skill_score: f64, mindset_score: f64) -> f64 {
        combine(skill_score, mindset_score, self.skill)
    }
}

impl Default for ScoreRatio {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RatioError {
    #[error("skill ratio {0} must be within 0.0..=1.0")]
    OutOfRange(f64),
    #[error("skill ratio {skill} and mindset ratio {mindset} must sum to 1.0")]
    Mismatch { skill: f64, mindset: f64 },
}

/// `skill_score * skill_ratio + mindset_score * (1 - skill_ratio)`.
///
/// Callers are expected to pass a ratio in `0.0..=1.0`; see [`ScoreRatio::new`].
pub fn combine(skill_score: f64, mindset_score: f64, skill_ratio: f64) -> f64 {
    skill_score * skill_ratio + mindset_score * (1.0 - skill_ratio)
}

/// Copy of `evaluation` re-weighted with `ratio`; dimension scores are untouched.
pub fn reweigh(evaluation: &AiEvaluation, ratio: ScoreRatio) -> AiEvaluation {
    AiEvaluation {
        total_score: ratio.combine(evaluation.skill_score, evaluation.mindset_score),
        skill_ratio: ratio.skill(),
        mindset_ratio: ratio.mindset(),
        ..evaluation.clone()
    }
}

/// Tracks a slider-driven ratio that only takes effect on an explicit recompute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioAdjustment {
    applied: ScoreRatio,
    pending: ScoreRatio,
}

impl RatioAdjustment {
    pub fn new(applied: ScoreRatio) -> Self {
        Self {
            applied,
            pending: applied,
        }
    }

    /// Seeds from a stored evaluation, falling back to the default split when the stored
    /// ratio is unusable.
    pub fn from_evaluation(evaluation: Option<&AiEvaluation>) -> Self {
        let applied = evaluation
            .and_then(|evaluation| ScoreRatio::new(evaluation.skill_ratio).ok())
            .unwrap_or_default();
        Self::new(applied)
    }

    pub fn slide_to(&mut self, skill: f64) -> Result<ScoreRatio, RatioError> {
        self.pending = ScoreRatio::new(skill)?.quantized();
        Ok(self.pending)
    }

    pub fn applied(&self) -> ScoreRatio {
        self.applied
    }

    pub fn pending(&self) -> ScoreRatio {
        self.pending
    }

    pub fn has_pending_change(&self) -> bool {
        self.applied != self.pending
    }

    pub fn recompute(&mut self, evaluation: &AiEvaluation) -> AiEvaluation {
        self.applied = self.pending;
        reweigh(evaluation, self.applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(skill_score: f64, mindset_score: f64) -> AiEvaluation {
        AiEvaluation {
            skill_score,
            mindset_score,
            total_score: combine(skill_score, mindset_score, 0.2),
            skill_ratio: 0.2,
            mindset_ratio: 0.8,
            summary: "steady".to_string(),
            strengths: vec!["ownership".to_string()],
            concerns: Vec::new(),
        }
    }

    #[test]
    fn combine_weights_skill_and_mindset() {
        assert!((combine(80.0, 60.0, 0.2) - 64.0).abs() < 1e-9);
        assert_eq!(combine(100.0, 0.0, 1.0), 100.0);
        assert_eq!(combine(100.0, 40.0, 0.0), 40.0);
    }

    #[test]
    fn mindset_share_is_always_derived() {
        for percent in (0..=100).step_by(5) {
            let ratio = ScoreRatio::from_percent(percent).expect("percent in range");
            assert!((ratio.skill() + ratio.mindset() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ratios_outside_unit_interval_are_rejected() {
        assert_eq!(ScoreRatio::new(1.2), Err(RatioError::OutOfRange(1.2)));
        assert!(ScoreRatio::new(-0.01).is_err());
        assert!(ScoreRatio::new(f64::NAN).is_err());
    }

    #[test]
    fn explicit_pairs_must_sum_to_one() {
        assert!(ScoreRatio::from_pair(0.3, 0.7).is_ok());
        assert!(matches!(
            ScoreRatio::from_pair(0.3, 0.6),
            Err(RatioError::Mismatch { .. })
        ));
    }

    #[test]
    fn quantized_snaps_to_slider_grid() {
        let ratio = ScoreRatio::new(0.337).expect("valid").quantized();
        assert_eq!(ratio.skill(), 0.35);
        let ratio = ScoreRatio::new(0.99).expect("valid").quantized();
        assert_eq!(ratio.skill(), 1.0);
    }

    #[test]
    fn sliding_does_not_touch_the_displayed_composite_until_recompute() {
        let stored = evaluation(80.0, 60.0);
        let mut adjustment = RatioAdjustment::from_evaluation(Some(&stored));

        adjustment.slide_to(0.5).expect("valid ratio");
        assert!(adjustment.has_pending_change());
        assert_eq!(adjustment.applied(), ScoreRatio::DEFAULT);

        let updated = adjustment.recompute(&stored);
        assert!(!adjustment.has_pending_change());
        assert!((updated.total_score - 70.0).abs() < 1e-9);
        assert_eq!(updated.skill_ratio, 0.5);
        assert_eq!(updated.mindset_ratio, 0.5);
        assert_eq!(updated.summary, stored.summary);
    }

    #[test]
    fn invalid_slide_keeps_previous_pending_ratio() {
        let mut adjustment = RatioAdjustment::new(ScoreRatio::DEFAULT);
        adjustment.slide_to(0.4).expect("valid ratio");
        assert!(adjustment.slide_to(4.0).is_err());
        assert_eq!(adjustment.pending().skill(), 0.4);
    }
}
