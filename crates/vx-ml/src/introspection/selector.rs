//! Threshold-then-fallback selection

use std::cmp::Ordering;

use vx_core::Description;

use super::ScoreMap;

/// Pick the descriptions to separate
///
/// 1. Every description scoring strictly above `threshold`, in scoring order.
/// 2. If none pass and `fallback_k > 0`, the `fallback_k` best scores in
///    descending order; equal scores keep scoring order.
/// 3. Otherwise nothing. An empty result is "nothing detected", not an error.
///
/// `threshold` is used as given, including zero, negative and infinite values.
pub fn select(scores: &ScoreMap, threshold: f32, fallback_k: usize) -> Vec<Description> {
    let above: Vec<Description> = scores
        .iter()
        .filter(|e| e.score > threshold)
        .map(|e| e.description.clone())
        .collect();

    if !above.is_empty() || fallback_k == 0 {
        return above;
    }

    let take = fallback_k.min(scores.len());
    let selected: Vec<Description> = scores
        .ranked()
        .into_iter()
        .take(take)
        .map(|e| e.description.clone())
        .collect();

    if !selected.is_empty() {
        log::warn!(
            "No description scored above {}; falling back to top {}",
            threshold,
            selected.len()
        );
    }

    selected
}

/// Descending comparison for a stable sort; NaN ranks below every number
pub(crate) fn compare_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(selected: &[Description]) -> Vec<&str> {
        selected.iter().map(Description::as_str).collect()
    }

    fn band_scores(guitar: f32, drums: f32, vocals: f32) -> ScoreMap {
        ScoreMap::from_pairs([("guitar", guitar), ("drums", drums), ("vocals", vocals)])
    }

    #[test]
    fn test_threshold_selection() {
        let scores = band_scores(0.05, 0.6, 0.1);
        assert_eq!(names(&select(&scores, 0.2, 5)), vec!["drums"]);
    }

    #[test]
    fn test_threshold_keeps_taxonomy_order() {
        // vocals outscores guitar but guitar comes first in the catalogue
        let scores = band_scores(0.3, 0.1, 0.9);
        assert_eq!(names(&select(&scores, 0.2, 5)), vec!["guitar", "vocals"]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let scores = band_scores(0.2, 0.2, 0.21);
        assert_eq!(names(&select(&scores, 0.2, 0)), vec!["vocals"]);
    }

    #[test]
    fn test_fallback_descending() {
        let scores = band_scores(0.05, 0.15, 0.1);
        assert_eq!(names(&select(&scores, 0.2, 2)), vec!["drums", "vocals"]);
    }

    #[test]
    fn test_fallback_ties_keep_taxonomy_order() {
        let scores = ScoreMap::from_pairs([("a", 0.1), ("b", 0.1), ("c", 0.15), ("d", 0.1)]);
        assert_eq!(names(&select(&scores, 0.5, 3)), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_fallback_k_larger_than_taxonomy() {
        let scores = band_scores(0.01, 0.03, 0.02);
        assert_eq!(names(&select(&scores, 0.2, 10)), vec!["drums", "vocals", "guitar"]);
    }

    #[test]
    fn test_no_fallback_gives_nothing() {
        let scores = band_scores(0.01, 0.03, 0.02);
        assert!(select(&scores, 0.2, 0).is_empty());
    }

    #[test]
    fn test_empty_scores() {
        assert!(select(&ScoreMap::default(), 0.2, 5).is_empty());
    }

    #[test]
    fn test_neg_infinity_selects_everything_in_order() {
        let scores = band_scores(-3.0, 0.6, -100.0);
        assert_eq!(
            names(&select(&scores, f32::NEG_INFINITY, 0)),
            vec!["guitar", "drums", "vocals"]
        );
    }

    #[test]
    fn test_pos_infinity_without_fallback_is_empty() {
        let scores = band_scores(1e30, 0.6, 0.1);
        assert!(select(&scores, f32::INFINITY, 0).is_empty());
    }

    #[test]
    fn test_negative_threshold_is_not_clamped() {
        let scores = band_scores(-0.5, -0.05, -0.2);
        assert_eq!(names(&select(&scores, -0.3, 5)), vec!["drums", "vocals"]);
    }

    #[test]
    fn test_nan_never_selected_first() {
        let scores = band_scores(f32::NAN, 0.1, 0.05);
        assert_eq!(names(&select(&scores, 0.2, 2)), vec!["drums", "vocals"]);
        assert_eq!(names(&select(&scores, f32::NEG_INFINITY, 0)), vec!["drums", "vocals"]);
    }

    #[test]
    fn test_nan_ranks_below_neg_infinity() {
        let scores = ScoreMap::from_pairs([("nan", f32::NAN), ("neginf", f32::NEG_INFINITY)]);
        assert_eq!(names(&select(&scores, 0.2, 1)), vec!["neginf"]);
        assert_eq!(names(&select(&scores, 0.2, 2)), vec!["neginf", "nan"]);

        let reversed = ScoreMap::from_pairs([("neginf", f32::NEG_INFINITY), ("nan", f32::NAN)]);
        assert_eq!(names(&select(&reversed, 0.2, 1)), vec!["neginf"]);
    }

    #[test]
    fn test_compare_desc_orders_nan_last() {
        assert_eq!(compare_desc(f32::NAN, f32::NEG_INFINITY), Ordering::Greater);
        assert_eq!(compare_desc(f32::NEG_INFINITY, f32::NAN), Ordering::Less);
        assert_eq!(compare_desc(f32::NAN, f32::NAN), Ordering::Equal);
        assert_eq!(compare_desc(0.5, 0.1), Ordering::Less);
    }

    #[test]
    fn test_fallback_order_is_descending_for_many_inputs() {
        let values = [0.11, 0.02, 0.19, 0.07, 0.19, 0.0, 0.13, 0.05];
        let scores = ScoreMap::from_pairs(
            values.iter().enumerate().map(|(i, &s)| (format!("label-{i}"), s)),
        );

        let selected = select(&scores, 0.2, values.len());
        let picked: Vec<f32> = selected.iter().map(|d| scores.get(d).unwrap()).collect();
        assert!(picked.windows(2).all(|w| w[0] >= w[1]));
        // tie at 0.19: label-2 precedes label-4
        assert_eq!(selected[0].as_str(), "label-2");
        assert_eq!(selected[1].as_str(), "label-4");
    }
}
