use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{FocusArea, FocusAreaScore, SelfRating, Student};
use crate::scale::{self, DEFAULT_SCORE};

/// Joins instructor scores and self ratings, one row per focus area.
pub fn combine_scores(
    focus_areas: &[FocusArea],
    scores: &HashMap<Uuid, f64>,
    self_ratings: &[SelfRating],
) -> Vec<FocusAreaScore> {
    let ratings: HashMap<Uuid, i32> = self_ratings
        .iter()
        .map(|rating| (rating.focus_area_id, rating.value))
        .collect();

    focus_areas
        .iter()
        .map(|area| FocusAreaScore {
            focus_area_id: area.id,
            name: area.name.clone(),
            score: scores.get(&area.id).copied().unwrap_or(DEFAULT_SCORE),
            self_rating: ratings.get(&area.id).copied(),
        })
        .collect()
}

fn describe_gap(score: f64, self_rating: i32) -> String {
    let gap = self_rating as f64 - score;
    if gap == 0.0 {
        "aligned".to_string()
    } else if gap > 0.0 {
        format!("self +{}", scale::format_score(gap))
    } else {
        format!("self -{}", scale::format_score(-gap))
    }
}

pub fn build_report(
    student: &Student,
    rows: &[FocusAreaScore],
    last_completed: Option<DateTime<Utc>>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Growth Report");
    let _ = writeln!(output, "Generated for {} ({})", student.full_name, student.email);
    let _ = writeln!(output);

    match last_completed {
        Some(at) => {
            let _ = writeln!(
                output,
                "Self-assessment last completed {}",
                at.format("%B %-d, %Y %H:%M UTC")
            );
        }
        None => {
            let _ = writeln!(output, "Self-assessment not completed yet.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Focus Areas");

    if rows.is_empty() {
        let _ = writeln!(output, "No focus areas apply to this learner.");
        return output;
    }

    for row in rows {
        let score = scale::format_score(row.score);
        match row.self_rating {
            Some(rating) => {
                let _ = writeln!(
                    output,
                    "- {}: instructor {} | self {} ({}) | {}",
                    row.name,
                    score,
                    rating,
                    scale::label(rating).unwrap_or("unrated"),
                    describe_gap(row.score, rating)
                );
            }
            None => {
                let _ = writeln!(output, "- {}: instructor {} | self not rated", row.name, score);
            }
        }
    }

    output
}
