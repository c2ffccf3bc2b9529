//! Weighted component composition
//!
//! Recovery and sleep scores are weighted sums of sub-scores. When a
//! component's input is missing it is excluded and the remaining weights are
//! rescaled proportionally so they still sum to 1. With no components at all
//! the composite is undefined and callers fall back to a neutral score.

use serde::{Deserialize, Serialize};

/// Score returned when no component is available
pub const NEUTRAL_SCORE: u8 = 50;

/// One named input to a composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// Base weight before rebalancing
    pub weight: f64,
    /// Sub-score in [0, 100], `None` when the input was missing
    pub score: Option<f64>,
}

impl Component {
    pub fn new(name: &str, weight: f64, score: Option<f64>) -> Self {
        Component {
            name: name.to_string(),
            weight,
            score: score.map(|s| s.clamp(0.0, 100.0)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.score.is_some() && self.weight > 0.0
    }
}

/// A component after rebalancing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedScore {
    pub name: String,
    pub score: f64,
    /// Rebalanced weight; all effective weights sum to 1
    pub effective_weight: f64,
}

/// Result of composing a set of components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    /// Rounded, clamped score; neutral when nothing was available
    pub score: u8,
    /// Unrounded weighted score, `None` when nothing was available
    pub raw: Option<f64>,
    pub used: Vec<WeightedScore>,
    pub dropped: Vec<String>,
}

impl Composite {
    pub fn is_neutral_fallback(&self) -> bool {
        self.raw.is_none()
    }
}

/// Rescale the weights of available components so they sum to 1
pub fn rebalance_weights(components: &[Component]) -> Vec<WeightedScore> {
    let total: f64 = components
        .iter()
        .filter(|c| c.is_available())
        .map(|c| c.weight)
        .sum();

    if total <= 0.0 {
        return Vec::new();
    }

    components
        .iter()
        .filter_map(|c| {
            c.score.filter(|_| c.weight > 0.0).map(|score| WeightedScore {
                name: c.name.clone(),
                score,
                effective_weight: c.weight / total,
            })
        })
        .collect()
}

/// Weighted composite with proportional rebalancing over missing components
pub fn compose(components: &[Component]) -> Composite {
    let used = rebalance_weights(components);
    let dropped = components
        .iter()
        .filter(|c| !c.is_available())
        .map(|c| c.name.clone())
        .collect();

    if used.is_empty() {
        return Composite {
            score: NEUTRAL_SCORE,
            raw: None,
            used,
            dropped,
        };
    }

    let raw: f64 = used.iter().map(|w| w.score * w.effective_weight).sum();

    Composite {
        score: round_score(raw),
        raw: Some(raw),
        used,
        dropped,
    }
}

/// Round to the nearest integer and clamp to [0, 100]
pub fn round_score(value: f64) -> u8 {
    if !value.is_finite() {
        return NEUTRAL_SCORE;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Piecewise-linear interpolation over `(x, y)` knots sorted by `x`
///
/// Values before the first knot take its `y`; values past the last take the
/// last `y`.
pub fn piecewise_linear(x: f64, knots: &[(f64, f64)]) -> f64 {
    let Some(&(first_x, first_y)) = knots.first() else {
        return 0.0;
    };
    if x <= first_x {
        return first_y;
    }

    for pair in knots.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            if (x1 - x0).abs() < f64::EPSILON {
                return y1;
            }
            return y0 + (x - x0) / (x1 - x0) * (y1 - y0);
        }
    }

    knots.last().map(|&(_, y)| y).unwrap_or(first_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_components_available() {
        let components = vec![
            Component::new("a", 0.5, Some(80.0)),
            Component::new("b", 0.5, Some(60.0)),
        ];
        let composite = compose(&components);
        assert_eq!(composite.score, 70);
        assert!(composite.dropped.is_empty());
    }

    #[test]
    fn test_missing_component_rebalanced() {
        let components = vec![
            Component::new("hrv", 0.3, Some(90.0)),
            Component::new("rhr", 0.2, Some(60.0)),
            Component::new("sleep", 0.3, None),
            Component::new("resp", 0.1, None),
            Component::new("form", 0.1, None),
        ];
        let composite = compose(&components);

        let weights: f64 = composite.used.iter().map(|w| w.effective_weight).sum();
        assert!((weights - 1.0).abs() < 1e-12);
        assert_eq!(composite.dropped, vec!["sleep", "resp", "form"]);
        // 0.6 * 90 + 0.4 * 60
        assert_eq!(composite.score, 78);
    }

    #[test]
    fn test_no_components_is_neutral() {
        let components = vec![Component::new("hrv", 0.3, None)];
        let composite = compose(&components);
        assert_eq!(composite.score, NEUTRAL_SCORE);
        assert!(composite.is_neutral_fallback());
    }

    #[test]
    fn test_subscores_are_clamped() {
        let components = vec![Component::new("x", 1.0, Some(140.0))];
        assert_eq!(compose(&components).score, 100);
    }

    #[test]
    fn test_piecewise_linear() {
        let knots = [(0.0, 100.0), (10.0, 85.0), (20.0, 60.0)];
        assert_eq!(piecewise_linear(-5.0, &knots), 100.0);
        assert_eq!(piecewise_linear(5.0, &knots), 92.5);
        assert_eq!(piecewise_linear(15.0, &knots), 72.5);
        assert_eq!(piecewise_linear(50.0, &knots), 60.0);
    }
}
