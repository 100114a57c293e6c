//! Target-display selection.

use crate::window::{DisplayInfo, Rect};

/// Pick the display to tile on by majority vote.
///
/// Each terminal key votes for the display containing its window's center
/// point. Ties break toward the display encountered first; with no votes
/// the primary display wins, then the first display.
pub fn select_target_display<'a>(
    keys: &[String],
    displays: &'a [DisplayInfo],
    get_bounds: impl Fn(&str) -> Option<Rect>,
) -> Option<&'a DisplayInfo> {
    if displays.is_empty() {
        return None;
    }

    let mut votes = vec![0usize; displays.len()];
    for key in keys {
        if let Some(bounds) = get_bounds(key) {
            let (cx, cy) = bounds.center();
            if let Some(index) = displays
                .iter()
                .position(|display| display.work_area.contains(cx, cy))
            {
                votes[index] += 1;
            }
        }
    }

    let best = votes
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
        .filter(|(_, votes)| **votes > 0)
        .map(|(index, _)| &displays[index]);
    best.or_else(|| displays.iter().find(|d| d.is_primary))
        .or_else(|| displays.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn displays() -> Vec<DisplayInfo> {
        vec![
            DisplayInfo {
                id: "d1".to_string(),
                work_area: Rect::new(0, 0, 1440, 900),
                is_primary: true,
            },
            DisplayInfo {
                id: "d2".to_string(),
                work_area: Rect::new(1440, 0, 1920, 1080),
                is_primary: false,
            },
        ]
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_majority_vote_wins() {
        let displays = displays();
        let selected = select_target_display(&keys(&["a", "b", "c"]), &displays, |key| {
            match key {
                "a" => Some(Rect::new(1500, 100, 400, 300)), // d2
                "b" => Some(Rect::new(1600, 200, 400, 300)), // d2
                "c" => Some(Rect::new(10, 10, 400, 300)),    // d1
                _ => None,
            }
        })
        .unwrap();
        assert_eq!(selected.id, "d2");
    }

    #[test]
    fn test_no_votes_falls_back_to_primary() {
        let displays = displays();
        let selected =
            select_target_display(&keys(&["a"]), &displays, |_| None).unwrap();
        assert_eq!(selected.id, "d1");
    }

    #[test]
    fn test_no_primary_falls_back_to_first() {
        let mut displays = displays();
        displays[0].is_primary = false;
        let selected =
            select_target_display(&keys(&[]), &displays, |_| None).unwrap();
        assert_eq!(selected.id, "d1");
    }

    #[test]
    fn test_empty_display_list_is_none() {
        assert!(select_target_display(&keys(&["a"]), &[], |_| None).is_none());
    }

    #[test]
    fn test_tie_breaks_toward_first_display() {
        let displays = displays();
        let selected = select_target_display(&keys(&["a", "b"]), &displays, |key| {
            match key {
                "a" => Some(Rect::new(10, 10, 100, 100)),   // d1
                "b" => Some(Rect::new(1500, 10, 100, 100)), // d2
                _ => None,
            }
        })
        .unwrap();
        assert_eq!(selected.id, "d1");
    }
}
