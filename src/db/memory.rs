use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::db::models::{
    AnalysisRecord, AppRole, AssignmentWithTest, Interaction, LearningPath, LearningPathUpsert,
    NewAnalysis, NewInteraction, NewTeacherFeedback, NewTestSubmission, Profile, Question,
    QuestionDraft, RecentSubmission, StudentFeedbackView, StudentProgress, StudentSummary,
    TeacherFeedback, TeacherSubmissionView, Test, TestAssignment, TestDraft, TestQuestionDetail,
    TestSubmission, TestSummary, UserWithRole, DEFAULT_QUESTION_LANGUAGE, DEFAULT_QUESTION_POINTS,
};
use crate::db::store::{check_questions_exist, new_id, Store, StoreError};

#[derive(Debug, Clone)]
struct TestQuestionLink {
    test_id: String,
    question_id: String,
    order_index: i32,
    points: i32,
}

/// Rows are kept in insertion order, so "newest first" is a reverse walk.
#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    roles: Vec<(String, AppRole)>,
    interactions: Vec<Interaction>,
    analyses: Vec<AnalysisRecord>,
    progress: Vec<StudentProgress>,
    learning_paths: Vec<LearningPath>,
    questions: Vec<Question>,
    tests: Vec<Test>,
    test_questions: Vec<TestQuestionLink>,
    assignments: Vec<TestAssignment>,
    submissions: Vec<TestSubmission>,
    feedback: Vec<TeacherFeedback>,
}

impl Tables {
    fn profile_name(&self, user_id: &str) -> Option<String> {
        self.profiles
            .iter()
            .find(|p| p.id == user_id)
            .and_then(|p| p.full_name.clone())
    }

    fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// Process-local `Store` used by tests and by servers started without `DATABASE_URL`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    reject_analyses: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_profile(&self, profile: Profile) {
        let mut tables = self.tables.lock();
        tables.profiles.retain(|p| p.id != profile.id);
        tables.profiles.push(profile);
    }

    pub fn put_progress(&self, user_id: &str, topic: &str, skill_level: i32) {
        let mut tables = self.tables.lock();
        tables
            .progress
            .retain(|p| !(p.user_id == user_id && p.topic == topic));
        let now = Utc::now();
        tables.progress.push(StudentProgress {
            id: new_id(),
            user_id: user_id.to_string(),
            topic: topic.to_string(),
            skill_level,
            interactions_count: 0,
            last_interaction_at: Some(now),
            updated_at: now,
        });
    }

    pub fn interaction_count(&self) -> usize {
        self.tables.lock().interactions.len()
    }

    pub fn learning_path_count(&self) -> usize {
        self.tables.lock().learning_paths.len()
    }

    /// Makes every later `insert_analysis` fail with `Unavailable`.
    pub fn reject_analysis_writes(&self) {
        self.reject_analyses.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_interaction(&self, new: NewInteraction) -> Result<Interaction, StoreError> {
        let interaction = Interaction {
            id: new_id(),
            user_id: new.user_id,
            input_type: new.input_type,
            input_content: new.input_content,
            programming_language: new.programming_language,
            created_at: Utc::now(),
        };
        self.tables.lock().interactions.push(interaction.clone());
        Ok(interaction)
    }

    async fn insert_analysis(&self, new: NewAnalysis) -> Result<AnalysisRecord, StoreError> {
        if self.reject_analyses.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        let mut tables = self.tables.lock();
        if !tables.interactions.iter().any(|i| i.id == new.interaction_id) {
            return Err(StoreError::Conflict(format!(
                "interaction {} does not exist",
                new.interaction_id
            )));
        }

        let record = AnalysisRecord {
            id: new_id(),
            interaction_id: new.interaction_id,
            user_id: new.user_id,
            clarity_score: new.clarity_score,
            clarity_analysis: new.clarity_analysis,
            conceptual_understanding: new.conceptual_understanding,
            code_best_practices: new.code_best_practices,
            misconceptions: new.misconceptions,
            adaptive_hint: new.adaptive_hint,
            suggested_next_topic: new.suggested_next_topic,
            created_at: Utc::now(),
        };
        tables.analyses.push(record.clone());
        Ok(record)
    }

    async fn find_analysis_for_interaction(
        &self,
        interaction_id: &str,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .analyses
            .iter()
            .find(|a| a.interaction_id == interaction_id)
            .cloned())
    }

    async fn recent_interactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Interaction>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .interactions
            .iter()
            .rev()
            .filter(|i| i.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find_progress(
        &self,
        user_id: &str,
        topic: &str,
    ) -> Result<Option<StudentProgress>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .progress
            .iter()
            .find(|p| p.user_id == user_id && p.topic == topic)
            .cloned())
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<StudentProgress>, StoreError> {
        let tables = self.tables.lock();
        let mut rows: Vec<StudentProgress> = tables
            .progress
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.skill_level.cmp(&a.skill_level));
        Ok(rows)
    }

    async fn recent_test_submissions(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<RecentSubmission>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .submissions
            .iter()
            .rev()
            .filter(|s| s.student_id == student_id)
            .take(limit.max(0) as usize)
            .map(|s| {
                let question = tables.question(&s.question_id);
                RecentSubmission {
                    topic: question.map(|q| q.topic.clone()),
                    difficulty: question.map(|q| q.difficulty.clone()),
                    score: s.score,
                    analysis: s.ai_analysis.clone(),
                }
            })
            .collect())
    }

    async fn upsert_learning_path(
        &self,
        upsert: LearningPathUpsert,
    ) -> Result<LearningPath, StoreError> {
        let mut tables = self.tables.lock();
        let existing_id = tables
            .learning_paths
            .iter()
            .position(|p| p.student_id == upsert.student_id && p.current_topic == upsert.topic)
            .map(|index| tables.learning_paths.remove(index).id);

        let path = LearningPath {
            id: existing_id.unwrap_or_else(new_id),
            student_id: upsert.student_id,
            current_topic: upsert.topic,
            skill_level: upsert.skill_level,
            strengths: upsert.strengths,
            areas_for_improvement: upsert.areas_for_improvement,
            recommended_topics: upsert.recommended_topics,
            next_milestone: upsert.next_milestone,
            updated_at: Utc::now(),
        };
        tables.learning_paths.push(path.clone());
        Ok(path)
    }

    async fn list_learning_paths(&self, student_id: &str) -> Result<Vec<LearningPath>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .learning_paths
            .iter()
            .rev()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.profiles.iter().find(|p| p.id == user_id).cloned())
    }

    async fn find_role(&self, user_id: &str) -> Result<Option<AppRole>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .roles
            .iter()
            .find(|(id, _)| id == user_id)
            .map(|(_, role)| *role))
    }

    async fn replace_role(&self, user_id: &str, role: AppRole) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.roles.retain(|(id, _)| id != user_id);
        tables.roles.push((user_id.to_string(), role));
        Ok(())
    }

    async fn list_users_with_roles(&self) -> Result<Vec<UserWithRole>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .profiles
            .iter()
            .rev()
            .map(|profile| UserWithRole {
                profile: profile.clone(),
                role: tables
                    .roles
                    .iter()
                    .find(|(id, _)| *id == profile.id)
                    .map(|(_, role)| *role),
            })
            .collect())
    }

    async fn list_students(&self) -> Result<Vec<StudentSummary>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .roles
            .iter()
            .filter(|(_, role)| *role == AppRole::Student)
            .map(|(user_id, _)| {
                let profile = tables.profiles.iter().find(|p| p.id == *user_id);
                StudentSummary {
                    user_id: user_id.clone(),
                    full_name: profile.and_then(|p| p.full_name.clone()),
                    student_number: profile.and_then(|p| p.student_number.clone()),
                }
            })
            .collect())
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.questions.iter().rev().cloned().collect())
    }

    async fn find_question(&self, id: &str) -> Result<Option<Question>, StoreError> {
        Ok(self.tables.lock().question(id).cloned())
    }

    async fn create_question(
        &self,
        teacher_id: &str,
        draft: QuestionDraft,
    ) -> Result<Question, StoreError> {
        let now = Utc::now();
        let question = Question {
            id: new_id(),
            teacher_id: teacher_id.to_string(),
            title: draft.title,
            description: draft.description,
            topic: draft.topic,
            difficulty: draft.difficulty,
            programming_language: draft
                .programming_language
                .unwrap_or_else(|| DEFAULT_QUESTION_LANGUAGE.to_string()),
            starter_code: draft.starter_code,
            expected_concepts: draft.expected_concepts,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().questions.push(question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        id: &str,
        teacher_id: &str,
        draft: QuestionDraft,
    ) -> Result<Question, StoreError> {
        let mut tables = self.tables.lock();
        let question = tables
            .questions
            .iter_mut()
            .find(|q| q.id == id && q.teacher_id == teacher_id)
            .ok_or(StoreError::NotFound("question"))?;

        question.title = draft.title;
        question.description = draft.description;
        question.topic = draft.topic;
        question.difficulty = draft.difficulty;
        question.programming_language = draft
            .programming_language
            .unwrap_or_else(|| DEFAULT_QUESTION_LANGUAGE.to_string());
        question.starter_code = draft.starter_code;
        question.expected_concepts = draft.expected_concepts;
        question.updated_at = Utc::now();
        Ok(question.clone())
    }

    async fn delete_question(&self, id: &str, teacher_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let before = tables.questions.len();
        tables
            .questions
            .retain(|q| !(q.id == id && q.teacher_id == teacher_id));
        if tables.questions.len() == before {
            return Err(StoreError::NotFound("question"));
        }
        tables.test_questions.retain(|link| link.question_id != id);
        tables.submissions.retain(|s| s.question_id != id);
        Ok(())
    }

    async fn list_tests(&self) -> Result<Vec<Test>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.tests.iter().rev().cloned().collect())
    }

    async fn find_test(&self, id: &str) -> Result<Option<Test>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.tests.iter().find(|t| t.id == id).cloned())
    }

    async fn create_test(&self, teacher_id: &str, draft: TestDraft) -> Result<Test, StoreError> {
        let mut tables = self.tables.lock();
        let known: Vec<&str> = tables.questions.iter().map(|q| q.id.as_str()).collect();
        check_questions_exist(&draft.question_ids, &known)?;

        let test = Test {
            id: new_id(),
            teacher_id: teacher_id.to_string(),
            title: draft.title,
            description: draft.description,
            duration_minutes: draft.duration_minutes,
            is_published: draft.is_published,
            created_at: Utc::now(),
        };

        for (index, question_id) in draft.question_ids.into_iter().enumerate() {
            tables.test_questions.push(TestQuestionLink {
                test_id: test.id.clone(),
                question_id,
                order_index: index as i32,
                points: DEFAULT_QUESTION_POINTS,
            });
        }
        tables.tests.push(test.clone());
        Ok(test)
    }

    async fn delete_test(&self, id: &str, teacher_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let before = tables.tests.len();
        tables
            .tests
            .retain(|t| !(t.id == id && t.teacher_id == teacher_id));
        if tables.tests.len() == before {
            return Err(StoreError::NotFound("test"));
        }
        tables.test_questions.retain(|link| link.test_id != id);
        tables.assignments.retain(|a| a.test_id != id);
        tables.submissions.retain(|s| s.test_id != id);
        Ok(())
    }

    async fn assign_test(
        &self,
        test_id: &str,
        student_ids: &[String],
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<TestAssignment>, StoreError> {
        let mut tables = self.tables.lock();
        if !tables.tests.iter().any(|t| t.id == test_id) {
            return Err(StoreError::NotFound("test"));
        }

        let mut assigned = Vec::with_capacity(student_ids.len());
        for student_id in student_ids {
            let existing = tables
                .assignments
                .iter_mut()
                .find(|a| a.test_id == test_id && a.student_id == *student_id);
            let assignment = match existing {
                Some(assignment) => {
                    assignment.due_date = due_date;
                    assignment.clone()
                }
                None => {
                    let assignment = TestAssignment {
                        id: new_id(),
                        test_id: test_id.to_string(),
                        student_id: student_id.clone(),
                        assigned_at: Utc::now(),
                        due_date,
                    };
                    tables.assignments.push(assignment.clone());
                    assignment
                }
            };
            assigned.push(assignment);
        }
        Ok(assigned)
    }

    async fn list_assignments(
        &self,
        student_id: &str,
    ) -> Result<Vec<AssignmentWithTest>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .assignments
            .iter()
            .rev()
            .filter(|a| a.student_id == student_id)
            .filter_map(|a| {
                let test = tables.tests.iter().find(|t| t.id == a.test_id)?;
                Some(AssignmentWithTest {
                    assignment: a.clone(),
                    test: TestSummary {
                        id: test.id.clone(),
                        title: test.title.clone(),
                        description: test.description.clone(),
                        duration_minutes: test.duration_minutes,
                    },
                })
            })
            .collect())
    }

    async fn is_assigned(&self, test_id: &str, student_id: &str) -> Result<bool, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .assignments
            .iter()
            .any(|a| a.test_id == test_id && a.student_id == student_id))
    }

    async fn list_test_questions(
        &self,
        test_id: &str,
    ) -> Result<Vec<TestQuestionDetail>, StoreError> {
        let tables = self.tables.lock();
        let mut details: Vec<TestQuestionDetail> = tables
            .test_questions
            .iter()
            .filter(|link| link.test_id == test_id)
            .filter_map(|link| {
                Some(TestQuestionDetail {
                    order_index: link.order_index,
                    points: link.points,
                    question: tables.question(&link.question_id)?.clone(),
                })
            })
            .collect();
        details.sort_by_key(|detail| detail.order_index);
        Ok(details)
    }

    async fn list_student_submissions(
        &self,
        test_id: &str,
        student_id: &str,
    ) -> Result<Vec<TestSubmission>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .submissions
            .iter()
            .rev()
            .filter(|s| s.test_id == test_id && s.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn upsert_test_submission(
        &self,
        new: NewTestSubmission,
    ) -> Result<TestSubmission, StoreError> {
        let mut tables = self.tables.lock();
        let existing_id = tables
            .submissions
            .iter()
            .position(|s| {
                s.test_id == new.test_id
                    && s.question_id == new.question_id
                    && s.student_id == new.student_id
            })
            .map(|index| tables.submissions.remove(index).id);

        let submission = TestSubmission {
            id: existing_id.unwrap_or_else(new_id),
            test_id: new.test_id,
            question_id: new.question_id,
            student_id: new.student_id,
            code_submission: new.code_submission,
            ai_analysis: Some(new.ai_analysis),
            score: Some(new.score),
            submitted_at: Utc::now(),
        };
        tables.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn find_test_submission(&self, id: &str) -> Result<Option<TestSubmission>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_submissions_for_teacher(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TeacherSubmissionView>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .submissions
            .iter()
            .rev()
            .filter_map(|s| {
                let test = tables
                    .tests
                    .iter()
                    .find(|t| t.id == s.test_id && t.teacher_id == teacher_id)?;
                let question = tables.question(&s.question_id)?;
                Some(TeacherSubmissionView {
                    submission: s.clone(),
                    question_title: question.title.clone(),
                    question_topic: question.topic.clone(),
                    test_title: test.title.clone(),
                    student_name: tables.profile_name(&s.student_id),
                })
            })
            .collect())
    }

    async fn submission_scores(&self, student_id: &str) -> Result<Vec<Option<i32>>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .submissions
            .iter()
            .filter(|s| s.student_id == student_id)
            .map(|s| s.score)
            .collect())
    }

    async fn insert_feedback(
        &self,
        new: NewTeacherFeedback,
    ) -> Result<TeacherFeedback, StoreError> {
        let feedback = TeacherFeedback {
            id: new_id(),
            teacher_id: new.teacher_id,
            student_id: new.student_id,
            submission_id: new.submission_id,
            feedback_text: new.feedback_text,
            rating: new.rating,
            created_at: Utc::now(),
        };
        self.tables.lock().feedback.push(feedback.clone());
        Ok(feedback)
    }

    async fn list_feedback_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<StudentFeedbackView>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .feedback
            .iter()
            .rev()
            .filter(|f| f.student_id == student_id)
            .map(|f| {
                let question_title = f
                    .submission_id
                    .as_deref()
                    .and_then(|id| tables.submissions.iter().find(|s| s.id == id))
                    .and_then(|s| tables.question(&s.question_id))
                    .map(|q| q.title.clone());
                StudentFeedbackView {
                    feedback: f.clone(),
                    teacher_name: tables.profile_name(&f.teacher_id),
                    question_title,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::InputKind;

    fn upsert(skill_level: i32, milestone: &str) -> LearningPathUpsert {
        LearningPathUpsert {
            student_id: "s1".to_string(),
            topic: "loops".to_string(),
            skill_level,
            strengths: vec!["syntax".to_string()],
            areas_for_improvement: vec![],
            recommended_topics: vec!["functions".to_string()],
            next_milestone: milestone.to_string(),
        }
    }

    #[tokio::test]
    async fn learning_path_upsert_replaces_existing_row() {
        let store = MemoryStore::new();
        let first = store.upsert_learning_path(upsert(40, "first")).await.unwrap();
        let second = store.upsert_learning_path(upsert(65, "second")).await.unwrap();

        assert_eq!(first.id, second.id);
        let paths = store.list_learning_paths("s1").await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].skill_level, 65);
        assert_eq!(paths[0].next_milestone, "second");
    }

    #[tokio::test]
    async fn analysis_requires_existing_interaction() {
        let store = MemoryStore::new();
        let result = store
            .insert_analysis(NewAnalysis {
                interaction_id: "missing".to_string(),
                user_id: "u1".to_string(),
                clarity_score: 50,
                clarity_analysis: String::new(),
                conceptual_understanding: String::new(),
                code_best_practices: None,
                misconceptions: vec![],
                adaptive_hint: String::new(),
                suggested_next_topic: String::new(),
            })
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn recent_interactions_are_newest_first_and_limited() {
        let store = MemoryStore::new();
        for n in 0..3 {
            store
                .insert_interaction(NewInteraction {
                    user_id: "u1".to_string(),
                    input_type: InputKind::Explanation,
                    input_content: format!("answer {n}"),
                    programming_language: None,
                })
                .await
                .unwrap();
        }

        let recent = store.recent_interactions("u1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].input_content, "answer 2");
        assert_eq!(recent[1].input_content, "answer 1");
    }

    #[tokio::test]
    async fn questions_are_only_mutable_by_their_owner() {
        let store = MemoryStore::new();
        let draft = QuestionDraft {
            title: "Sum a list".to_string(),
            description: "Return the sum".to_string(),
            topic: "loops".to_string(),
            difficulty: "easy".to_string(),
            programming_language: None,
            starter_code: None,
            expected_concepts: vec![],
        };
        let question = store.create_question("t1", draft.clone()).await.unwrap();
        assert_eq!(question.programming_language, "python");

        let denied = store.delete_question(&question.id, "t2").await;
        assert!(matches!(denied, Err(StoreError::NotFound("question"))));
        store.delete_question(&question.id, "t1").await.unwrap();
        assert!(store.list_questions().await.unwrap().is_empty());
    }
}
