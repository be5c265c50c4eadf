//! Per-user progression through the questionnaire sequence.
//!
//! Questionnaires form a linear path: finished ones before the first
//! unfinished one are `completed`, the first unfinished one is `current`, and
//! everything after it is `locked` even if the user finished it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Completed,
    Current,
    Locked,
}

/// Questionnaire fields the status view needs.
#[derive(Debug, Clone)]
pub struct QuestionnaireRef {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// A finished assessment for one questionnaire.
#[derive(Debug, Clone)]
pub struct CompletedAssessment {
    pub id: i64,
    pub questionnaire_id: i64,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub factor_scores: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressEntry {
    /// Completed assessment id when completed, otherwise the questionnaire id
    pub id: i64,
    pub questionnaire_id: i64,
    #[serde(rename = "stringId")]
    pub string_id: String,
    pub title: String,
    pub description: Option<String>,
    pub path: String,
    pub status: ProgressStatus,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    #[schema(value_type = Vec<Object>)]
    pub competencies: Vec<serde_json::Value>,
}

/// Merge questionnaires (in display order) with the user's completed
/// assessments. When several completions exist for one questionnaire the
/// last one in `completed` wins.
pub fn compute_progression(
    questionnaires: &[QuestionnaireRef],
    completed: Vec<CompletedAssessment>,
) -> Vec<ProgressEntry> {
    let mut by_questionnaire: HashMap<i64, CompletedAssessment> = completed
        .into_iter()
        .map(|a| (a.questionnaire_id, a))
        .collect();

    let mut current_assigned = false;
    let mut entries: Vec<ProgressEntry> = questionnaires
        .iter()
        .map(|q| {
            let done = by_questionnaire.remove(&q.id);
            // Nothing past the current entry counts as completed.
            let (status, done) = match done {
                _ if current_assigned => (ProgressStatus::Locked, None),
                Some(a) => (ProgressStatus::Completed, Some(a)),
                None => {
                    current_assigned = true;
                    (ProgressStatus::Current, None)
                }
            };

            let (id, score, max_score, competencies) = match done {
                Some(a) => (a.id, a.score, a.max_score, a.factor_scores),
                None => (q.id, None, None, Vec::new()),
            };

            ProgressEntry {
                id,
                questionnaire_id: q.id,
                string_id: format!("q-{}", q.id),
                title: q.name.clone(),
                description: q.description.clone(),
                path: format!("/assessment/start/{}", q.id),
                status,
                score,
                max_score,
                competencies,
            }
        })
        .collect();

    if !entries.iter().any(|e| e.status == ProgressStatus::Current) {
        if let Some(first_locked) = entries
            .iter_mut()
            .find(|e| e.status == ProgressStatus::Locked)
        {
            first_locked.status = ProgressStatus::Current;
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questionnaires(ids: &[i64]) -> Vec<QuestionnaireRef> {
        ids.iter()
            .map(|&id| QuestionnaireRef {
                id,
                name: format!("Q{id}"),
                description: None,
            })
            .collect()
    }

    fn completed(questionnaire_id: i64, assessment_id: i64) -> CompletedAssessment {
        CompletedAssessment {
            id: assessment_id,
            questionnaire_id,
            score: Some(7.0),
            max_score: None,
            factor_scores: vec![serde_json::json!({"name": "focus", "score": 3})],
        }
    }

    fn statuses(entries: &[ProgressEntry]) -> Vec<ProgressStatus> {
        entries.iter().map(|e| e.status).collect()
    }

    #[test]
    fn gap_in_completions_makes_first_gap_current() {
        let entries = compute_progression(
            &questionnaires(&[1, 2, 3, 4]),
            vec![completed(1, 10), completed(3, 30)],
        );
        use ProgressStatus::*;
        assert_eq!(statuses(&entries), vec![Completed, Current, Locked, Locked]);
    }

    #[test]
    fn completion_after_current_is_locked_without_its_data() {
        let entries = compute_progression(&questionnaires(&[1, 2, 3]), vec![completed(3, 30)]);
        use ProgressStatus::*;
        assert_eq!(statuses(&entries), vec![Current, Locked, Locked]);
        assert_eq!(entries[2].id, 3);
        assert_eq!(entries[2].score, None);
        assert!(entries[2].competencies.is_empty());
    }

    #[test]
    fn completed_entry_carries_assessment_data() {
        let entries = compute_progression(&questionnaires(&[1, 2]), vec![completed(1, 10)]);
        assert_eq!(entries[0].id, 10);
        assert_eq!(entries[0].questionnaire_id, 1);
        assert_eq!(entries[0].score, Some(7.0));
        assert_eq!(entries[0].competencies.len(), 1);
        assert_eq!(entries[1].id, 2);
        assert_eq!(entries[1].string_id, "q-2");
        assert_eq!(entries[1].path, "/assessment/start/2");
        assert!(entries[1].competencies.is_empty());
    }

    #[test]
    fn exactly_one_current_unless_all_completed() {
        let ids: Vec<i64> = (1..=6).collect();
        // Every subset of six questionnaires.
        for mask in 0u32..(1 << ids.len()) {
            let done: Vec<CompletedAssessment> = ids
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, &id)| completed(id, id * 10))
                .collect();
            let done_count = done.len();
            let entries = compute_progression(&questionnaires(&ids), done);
            let current = entries
                .iter()
                .filter(|e| e.status == ProgressStatus::Current)
                .count();
            let expected = if done_count == ids.len() { 0 } else { 1 };
            assert_eq!(current, expected, "mask {mask:06b}");
        }
    }

    #[test]
    fn empty_questionnaire_list_yields_nothing() {
        assert!(compute_progression(&[], vec![completed(1, 1)]).is_empty());
    }

    #[test]
    fn later_duplicate_completion_wins() {
        let mut newer = completed(1, 11);
        newer.score = Some(9.0);
        let entries = compute_progression(&questionnaires(&[1]), vec![completed(1, 10), newer]);
        assert_eq!(entries[0].id, 11);
        assert_eq!(entries[0].score, Some(9.0));
    }

    #[test]
    fn status_serializes_lowercase() {
        let entries = compute_progression(&questionnaires(&[5]), Vec::new());
        let value = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(value["status"], "current");
        assert_eq!(value["stringId"], "q-5");
    }
}
