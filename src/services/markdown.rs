//! Light parsing of recommendation text for renderers: `**bold**` spans and
//! inline `1) … 2) …` step lists.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedRecommendation {
    pub segments: Vec<Segment>,
    /// One segment list per step, bold spans parsed like the lead.
    pub steps: Vec<Vec<Segment>>,
}

/// Splits on `**`. An unmatched trailing marker is kept as literal text.
pub fn bold_segments(text: &str) -> Vec<Segment> {
    let parts: Vec<&str> = text.split("**").collect();
    let balanced = parts.len() % 2 == 1;
    let mut segments: Vec<Segment> = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let dangling = !balanced && i == parts.len() - 1;
        let bold = i % 2 == 1 && !dangling;
        let text = if dangling {
            format!("**{part}")
        } else {
            part.to_string()
        };
        if text.is_empty() {
            continue;
        }
        match segments.last_mut() {
            Some(last) if last.bold == bold => last.text.push_str(&text),
            _ => segments.push(Segment { text, bold }),
        }
    }
    segments
}

/// Finds the byte offsets of `N)` markers numbered 1, 2, 3… in order.
fn step_markers(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut markers = Vec::new();
    let mut expected = 1u32;
    let mut i = 0;
    while i < bytes.len() {
        let at_boundary = i == 0 || bytes[i - 1].is_ascii_whitespace();
        if at_boundary && bytes[i].is_ascii_digit() {
            let start = i;
            let mut end = i;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end < bytes.len() && bytes[end] == b')' {
                if text[start..end].parse::<u32>().ok() == Some(expected) {
                    markers.push((start, end + 1));
                    expected += 1;
                }
                i = end + 1;
                continue;
            }
            i = end;
            continue;
        }
        i += 1;
    }
    markers
}

/// Text before the first step becomes the lead segments, the rest the steps.
/// A single `1)` without a `2)` is not a list.
pub fn format_recommendation(text: &str) -> FormattedRecommendation {
    let markers = step_markers(text);
    if markers.len() < 2 {
        return FormattedRecommendation {
            segments: bold_segments(text.trim()),
            steps: Vec::new(),
        };
    }
    let lead = text[..markers[0].0].trim();
    let steps = markers
        .iter()
        .enumerate()
        .map(|(n, &(_, body_start))| {
            let body_end = markers.get(n + 1).map_or(text.len(), |next| next.0);
            text[body_start..body_end].trim()
        })
        .filter(|step| !step.is_empty())
        .map(bold_segments)
        .collect();
    FormattedRecommendation {
        segments: bold_segments(lead),
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, bold: bool) -> Segment {
        Segment {
            text: text.to_string(),
            bold,
        }
    }

    #[test]
    fn bold_spans_alternate() {
        assert_eq!(
            bold_segments("Focus on **Engineering** this month"),
            vec![
                seg("Focus on ", false),
                seg("Engineering", true),
                seg(" this month", false)
            ]
        );
    }

    #[test]
    fn unmatched_marker_stays_literal() {
        assert_eq!(
            bold_segments("Raise **morale"),
            vec![seg("Raise **morale", false)]
        );
    }

    #[test]
    fn inline_steps_are_extracted() {
        let formatted = format_recommendation(
            "**Improve attendance**: 1) review hybrid policy 2) add team days 3) track weekly",
        );
        assert_eq!(
            formatted.segments,
            vec![seg("Improve attendance", true), seg(":", false)]
        );
        assert_eq!(
            formatted.steps,
            vec![
                vec![seg("review hybrid policy", false)],
                vec![seg("add team days", false)],
                vec![seg("track weekly", false)],
            ]
        );
    }

    #[test]
    fn bold_inside_steps_is_parsed() {
        let formatted = format_recommendation(
            "Next: 1) meet **Sales** leads 2) publish **weekly** numbers",
        );
        assert_eq!(formatted.segments, vec![seg("Next:", false)]);
        assert_eq!(
            formatted.steps,
            vec![
                vec![seg("meet ", false), seg("Sales", true), seg(" leads", false)],
                vec![
                    seg("publish ", false),
                    seg("weekly", true),
                    seg(" numbers", false)
                ],
            ]
        );
        assert!(formatted
            .steps
            .iter()
            .flatten()
            .all(|segment| !segment.text.contains("**")));
    }

    #[test]
    fn lone_number_is_not_a_list() {
        let formatted = format_recommendation("Hold 1) retro with the Sales team");
        assert!(formatted.steps.is_empty());
        assert_eq!(formatted.segments.len(), 1);
    }
}
