use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::models::{
    AnalysisRecord, AppRole, AssignmentWithTest, Interaction, LearningPath, LearningPathUpsert,
    NewAnalysis, NewInteraction, NewTeacherFeedback, NewTestSubmission, Profile, Question,
    QuestionDraft, RecentSubmission, StudentFeedbackView, StudentProgress, StudentSummary,
    TeacherFeedback, TeacherSubmissionView, Test, TestAssignment, TestDraft, TestQuestionDetail,
    TestSubmission, UserWithRole,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Decode(String),
    #[error("store unavailable")]
    Unavailable,
}

/// Row persistence for every table the service touches.
///
/// Ownership checks that row-level security would otherwise enforce are part of
/// the contract: `update_question`, `delete_question` and `delete_test` only
/// affect rows owned by the given teacher and report `NotFound` otherwise.
/// Writes are single statements except `create_test`; nothing spans a
/// transaction across calls.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_interaction(&self, new: NewInteraction) -> Result<Interaction, StoreError>;

    async fn insert_analysis(&self, new: NewAnalysis) -> Result<AnalysisRecord, StoreError>;

    async fn find_analysis_for_interaction(
        &self,
        interaction_id: &str,
    ) -> Result<Option<AnalysisRecord>, StoreError>;

    /// Newest first.
    async fn recent_interactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Interaction>, StoreError>;

    async fn find_progress(
        &self,
        user_id: &str,
        topic: &str,
    ) -> Result<Option<StudentProgress>, StoreError>;

    /// Highest skill level first.
    async fn list_progress(&self, user_id: &str) -> Result<Vec<StudentProgress>, StoreError>;

    /// Newest first, joined with the question's topic and difficulty.
    async fn recent_test_submissions(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<RecentSubmission>, StoreError>;

    /// Replaces any existing row for (student, topic).
    async fn upsert_learning_path(
        &self,
        upsert: LearningPathUpsert,
    ) -> Result<LearningPath, StoreError>;

    /// Most recently updated first.
    async fn list_learning_paths(&self, student_id: &str) -> Result<Vec<LearningPath>, StoreError>;

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError>;

    async fn find_role(&self, user_id: &str) -> Result<Option<AppRole>, StoreError>;

    /// Drops whatever role the user had and records `role` instead.
    async fn replace_role(&self, user_id: &str, role: AppRole) -> Result<(), StoreError>;

    async fn list_users_with_roles(&self) -> Result<Vec<UserWithRole>, StoreError>;

    async fn list_students(&self) -> Result<Vec<StudentSummary>, StoreError>;

    async fn list_questions(&self) -> Result<Vec<Question>, StoreError>;

    async fn find_question(&self, id: &str) -> Result<Option<Question>, StoreError>;

    async fn create_question(
        &self,
        teacher_id: &str,
        draft: QuestionDraft,
    ) -> Result<Question, StoreError>;

    async fn update_question(
        &self,
        id: &str,
        teacher_id: &str,
        draft: QuestionDraft,
    ) -> Result<Question, StoreError>;

    async fn delete_question(&self, id: &str, teacher_id: &str) -> Result<(), StoreError>;

    async fn list_tests(&self) -> Result<Vec<Test>, StoreError>;

    async fn find_test(&self, id: &str) -> Result<Option<Test>, StoreError>;

    /// Also links `draft.question_ids` in the given order. All or nothing: an
    /// unknown question id yields `Conflict` and no test row is kept.
    async fn create_test(&self, teacher_id: &str, draft: TestDraft) -> Result<Test, StoreError>;

    async fn delete_test(&self, id: &str, teacher_id: &str) -> Result<(), StoreError>;

    async fn assign_test(
        &self,
        test_id: &str,
        student_ids: &[String],
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<TestAssignment>, StoreError>;

    async fn list_assignments(
        &self,
        student_id: &str,
    ) -> Result<Vec<AssignmentWithTest>, StoreError>;

    async fn is_assigned(&self, test_id: &str, student_id: &str) -> Result<bool, StoreError>;

    async fn list_test_questions(
        &self,
        test_id: &str,
    ) -> Result<Vec<TestQuestionDetail>, StoreError>;

    async fn list_student_submissions(
        &self,
        test_id: &str,
        student_id: &str,
    ) -> Result<Vec<TestSubmission>, StoreError>;

    /// Keyed by (test, question, student); a resubmission overwrites.
    async fn upsert_test_submission(
        &self,
        new: NewTestSubmission,
    ) -> Result<TestSubmission, StoreError>;

    async fn find_test_submission(&self, id: &str) -> Result<Option<TestSubmission>, StoreError>;

    /// Submissions to tests owned by `teacher_id`, newest first.
    async fn list_submissions_for_teacher(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TeacherSubmissionView>, StoreError>;

    async fn submission_scores(&self, student_id: &str) -> Result<Vec<Option<i32>>, StoreError>;

    async fn insert_feedback(&self, new: NewTeacherFeedback)
        -> Result<TeacherFeedback, StoreError>;

    /// Newest first.
    async fn list_feedback_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<StudentFeedbackView>, StoreError>;
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// First requested question id absent from `existing`, as a `Conflict`.
pub(crate) fn check_questions_exist<S: AsRef<str>>(
    requested: &[String],
    existing: &[S],
) -> Result<(), StoreError> {
    match requested
        .iter()
        .find(|id| !existing.iter().any(|e| e.as_ref() == id.as_str()))
    {
        Some(missing) => Err(StoreError::Conflict(format!(
            "question {missing} does not exist"
        ))),
        None => Ok(()),
    }
}
