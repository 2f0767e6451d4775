//! WebVTT cue track formatting.

use crate::caption::CaptionSegment;

/// Header line of every cue track document.
pub const WEBVTT_HEADER: &str = "WEBVTT";

/// Format seconds as a WebVTT timestamp `HH:MM:SS.mmm`.
///
/// Hours are zero-padded to two digits but never truncated. Values are
/// rounded to the nearest millisecond; negative or non-finite input is
/// clamped to zero.
pub fn format_vtt_timestamp(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };

    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, millis)
}

/// Render a cue track from an ordered segment sequence.
///
/// Returns `None` when there are no segments: an empty transcript has no
/// document at all, not a header-only one. Cue indices start at 1 and
/// increase by one per segment; text is trimmed.
pub fn format_vtt(segments: &[CaptionSegment]) -> Option<String> {
    if segments.is_empty() {
        return None;
    }

    let mut vtt = String::with_capacity(16 + segments.len() * 64);
    vtt.push_str(WEBVTT_HEADER);
    vtt.push_str("\n\n");

    for (i, segment) in segments.iter().enumerate() {
        vtt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_vtt_timestamp(segment.start),
            format_vtt_timestamp(segment.end),
            segment.text.trim()
        ));
    }

    Some(vtt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_vtt_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_vtt_timestamp(1.5), "00:00:01.500");
        assert_eq!(format_vtt_timestamp(61.25), "00:01:01.250");
        assert_eq!(format_vtt_timestamp(3723.004), "01:02:03.004");
        assert_eq!(format_vtt_timestamp(0.29), "00:00:00.290");
    }

    #[test]
    fn test_timestamp_hours_are_unbounded() {
        assert_eq!(format_vtt_timestamp(100.0 * 3600.0), "100:00:00.000");
    }

    #[test]
    fn test_timestamp_clamps_invalid_input() {
        assert_eq!(format_vtt_timestamp(-2.0), "00:00:00.000");
        assert_eq!(format_vtt_timestamp(f64::NAN), "00:00:00.000");
    }

    #[test]
    fn test_single_cue() {
        let vtt = format_vtt(&[CaptionSegment::new(0.0, 1.5, " hola ")]).unwrap();
        assert_eq!(vtt, "WEBVTT\n\n1\n00:00:00.000 --> 00:00:01.500\nhola\n\n");
    }

    #[test]
    fn test_cue_indices_increase_from_one() {
        let segments: Vec<_> = (0..5)
            .map(|i| CaptionSegment::new(i as f64, i as f64 + 0.5, format!("line {}", i)))
            .collect();
        let vtt = format_vtt(&segments).unwrap();

        let blocks: Vec<&str> = vtt
            .trim_end()
            .split("\n\n")
            .skip(1)
            .collect();
        assert_eq!(blocks.len(), 5);
        for (i, block) in blocks.iter().enumerate() {
            let index_line = block.lines().next().unwrap();
            assert_eq!(index_line, (i + 1).to_string());
        }
    }

    #[test]
    fn test_empty_segments_produce_no_document() {
        assert!(format_vtt(&[]).is_none());
    }
}
