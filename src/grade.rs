use crate::model::StudentRecord;
use serde::Serialize;

/// Rounded averages at or above this mark are approved.
pub const PASS_THRESHOLD: f64 = 7.0;

/// Renders `x` with exactly one decimal.
///
/// Rounds the exact binary value to the nearest tenth, so `0.15` (stored as
/// 0.1499..) gives `"0.1"`. Only values that sit exactly halfway, like `0.25`,
/// are ties, and those round away from zero.
pub fn format_1_decimal(x: f64) -> String {
    let scaled = x * 10.0;
    // Zero error term means `scaled` is exact.
    let exact = x.mul_add(10.0, -scaled) == 0.0;
    if exact && scaled.fract().abs() == 0.5 {
        return format!("{:.1}", scaled.round() / 10.0);
    }
    format!("{:.1}", x)
}

/// 1-decimal rounding with the same rules as `format_1_decimal`.
pub fn round_1_decimal(x: f64) -> f64 {
    format_1_decimal(x).parse().unwrap_or(x)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Situation {
    Approved,
    Failed,
}

/// Mean of the three scores, rounded to one decimal. The rounded value is
/// also what `situation` compares against the threshold, so a raw mean of
/// 6.95 counts as 7.0.
pub fn average(record: &StudentRecord) -> f64 {
    let raw = (record.score1 + record.score2 + record.score3) / 3.0;
    round_1_decimal(raw)
}

pub fn situation(record: &StudentRecord) -> Situation {
    if average(record) >= PASS_THRESHOLD {
        Situation::Approved
    } else {
        Situation::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub average: f64,
    pub average_text: String,
    pub score_texts: [String; 3],
    pub situation: Situation,
}

pub fn evaluate(record: &StudentRecord) -> Evaluation {
    let avg = average(record);
    Evaluation {
        average: avg,
        average_text: format_1_decimal(avg),
        score_texts: record.scores().map(format_1_decimal),
        situation: situation(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(s1: f64, s2: f64, s3: f64) -> StudentRecord {
        StudentRecord {
            id: 1,
            name: "Test".into(),
            score1: s1,
            score2: s2,
            score3: s3,
        }
    }

    #[test]
    fn round_off_is_half_away_from_zero() {
        assert_eq!(round_1_decimal(0.0), 0.0);
        assert_eq!(round_1_decimal(3.54), 3.5);
        assert_eq!(round_1_decimal(0.25), 0.3);
        assert_eq!(round_1_decimal(6.966_666_666), 7.0);
        assert_eq!(round_1_decimal(-0.25), -0.3);
    }

    #[test]
    fn format_rounds_the_stored_binary_value() {
        // 0.15, 0.35 and 1.45 are all stored slightly below the tie.
        assert_eq!(format_1_decimal(0.15), "0.1");
        assert_eq!(format_1_decimal(0.35), "0.3");
        assert_eq!(format_1_decimal(1.45), "1.4");
        // 6.95 is stored slightly above it.
        assert_eq!(format_1_decimal(6.95), "7.0");
        // Exact ties go up.
        assert_eq!(format_1_decimal(0.25), "0.3");
        assert_eq!(format_1_decimal(9.75), "9.8");
        assert_eq!(format_1_decimal(-0.25), "-0.3");
        assert_eq!(format_1_decimal(8.0), "8.0");
        assert_eq!(format_1_decimal(10.0), "10.0");
    }

    #[test]
    fn average_and_situation_reference_cases() {
        let r = rec(8.0, 6.0, 7.0);
        assert_eq!(average(&r), 7.0);
        assert_eq!(situation(&r), Situation::Approved);

        let r = rec(5.0, 5.0, 5.0);
        assert_eq!(average(&r), 5.0);
        assert_eq!(situation(&r), Situation::Failed);
    }

    #[test]
    fn threshold_is_inclusive() {
        let r = rec(7.0, 7.0, 7.0);
        assert_eq!(average(&r), 7.0);
        assert_eq!(situation(&r), Situation::Approved);
    }

    #[test]
    fn threshold_compares_rounded_average() {
        // Raw mean 6.95 rounds up to 7.0 and passes.
        let r = rec(7.0, 7.0, 6.85);
        assert_eq!(average(&r), 7.0);
        assert_eq!(situation(&r), Situation::Approved);

        // Raw mean 6.933.. rounds to 6.9 and fails.
        let r = rec(7.0, 7.0, 6.8);
        assert_eq!(average(&r), 6.9);
        assert_eq!(situation(&r), Situation::Failed);
    }

    #[test]
    fn evaluate_formats_display_texts() {
        let ev = evaluate(&rec(8.0, 9.25, 10.0));
        assert_eq!(ev.score_texts, ["8.0".to_string(), "9.3".into(), "10.0".into()]);
        assert_eq!(ev.average, 9.1);
        assert_eq!(ev.average_text, "9.1");
        assert_eq!(ev.situation, Situation::Approved);
    }
}
