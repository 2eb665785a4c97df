use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Code,
    Explanation,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Code => "code",
            InputKind::Explanation => "explanation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code" => Some(InputKind::Code),
            "explanation" => Some(InputKind::Explanation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppRole {
    Admin,
    User,
    Teacher,
    Student,
}

impl AppRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AppRole::Admin => "admin",
            AppRole::User => "user",
            AppRole::Teacher => "teacher",
            AppRole::Student => "student",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(AppRole::Admin),
            "user" => Some(AppRole::User),
            "teacher" => Some(AppRole::Teacher),
            "student" => Some(AppRole::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub user_id: String,
    pub input_type: InputKind,
    pub input_content: String,
    pub programming_language: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub user_id: String,
    pub input_type: InputKind,
    pub input_content: String,
    pub programming_language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub interaction_id: String,
    pub user_id: String,
    pub clarity_score: i32,
    pub clarity_analysis: String,
    pub conceptual_understanding: String,
    pub code_best_practices: Option<String>,
    pub misconceptions: Vec<String>,
    pub adaptive_hint: String,
    pub suggested_next_topic: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub interaction_id: String,
    pub user_id: String,
    pub clarity_score: i32,
    pub clarity_analysis: String,
    pub conceptual_understanding: String,
    pub code_best_practices: Option<String>,
    pub misconceptions: Vec<String>,
    pub adaptive_hint: String,
    pub suggested_next_topic: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub id: String,
    pub user_id: String,
    pub topic: String,
    pub skill_level: i32,
    pub interactions_count: i32,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    pub id: String,
    pub student_id: String,
    pub current_topic: String,
    pub skill_level: i32,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub recommended_topics: Vec<String>,
    pub next_milestone: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LearningPathUpsert {
    pub student_id: String,
    pub topic: String,
    pub skill_level: i32,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub recommended_topics: Vec<String>,
    pub next_milestone: String,
}

/// A past test answer, flattened with its question's topic for prompt context.
#[derive(Debug, Clone, Serialize)]
pub struct RecentSubmission {
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    pub score: Option<i32>,
    pub analysis: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub full_name: Option<String>,
    pub student_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithRole {
    #[serde(flatten)]
    pub profile: Profile,
    pub role: Option<AppRole>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub user_id: String,
    pub full_name: Option<String>,
    pub student_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub teacher_id: String,
    pub title: String,
    pub description: String,
    pub topic: String,
    pub difficulty: String,
    pub programming_language: String,
    pub starter_code: Option<String>,
    pub expected_concepts: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub title: String,
    pub description: String,
    pub topic: String,
    pub difficulty: String,
    #[serde(default)]
    pub programming_language: Option<String>,
    #[serde(default)]
    pub starter_code: Option<String>,
    #[serde(default)]
    pub expected_concepts: Vec<String>,
}

pub const DEFAULT_QUESTION_LANGUAGE: &str = "python";
pub const DEFAULT_QUESTION_POINTS: i32 = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: String,
    pub teacher_id: String,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub question_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestQuestionDetail {
    pub order_index: i32,
    pub points: i32,
    pub question: Question,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAssignment {
    pub id: String,
    pub test_id: String,
    pub student_id: String,
    pub assigned_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentWithTest {
    #[serde(flatten)]
    pub assignment: TestAssignment,
    pub test: TestSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSubmission {
    pub id: String,
    pub test_id: String,
    pub question_id: String,
    pub student_id: String,
    pub code_submission: String,
    pub ai_analysis: Option<serde_json::Value>,
    pub score: Option<i32>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTestSubmission {
    pub test_id: String,
    pub question_id: String,
    pub student_id: String,
    pub code_submission: String,
    pub ai_analysis: serde_json::Value,
    pub score: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSubmissionView {
    #[serde(flatten)]
    pub submission: TestSubmission,
    pub question_title: String,
    pub question_topic: String,
    pub test_title: String,
    pub student_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherFeedback {
    pub id: String,
    pub teacher_id: String,
    pub student_id: String,
    pub submission_id: Option<String>,
    pub feedback_text: String,
    pub rating: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTeacherFeedback {
    pub teacher_id: String,
    pub student_id: String,
    pub submission_id: Option<String>,
    pub feedback_text: String,
    pub rating: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFeedbackView {
    #[serde(flatten)]
    pub feedback: TeacherFeedback,
    pub teacher_name: Option<String>,
    pub question_title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_kind_uses_lowercase_wire_names() {
        let kind: InputKind = serde_json::from_str("\"explanation\"").unwrap();
        assert_eq!(kind, InputKind::Explanation);
        assert_eq!(serde_json::to_string(&InputKind::Code).unwrap(), "\"code\"");
        assert!(serde_json::from_str::<InputKind>("\"essay\"").is_err());
    }

    #[test]
    fn role_parse_rejects_unknown_values() {
        assert_eq!(AppRole::parse("teacher"), Some(AppRole::Teacher));
        assert_eq!(AppRole::parse("TEACHER"), None);
    }
}
