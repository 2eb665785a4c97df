use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::db::models::{
    AnalysisRecord, AppRole, AssignmentWithTest, InputKind, Interaction, LearningPath,
    LearningPathUpsert, NewAnalysis, NewInteraction, NewTeacherFeedback, NewTestSubmission,
    Profile, Question, QuestionDraft, RecentSubmission, StudentFeedbackView, StudentProgress,
    StudentSummary, TeacherFeedback, TeacherSubmissionView, Test, TestAssignment, TestDraft,
    TestQuestionDetail, TestSubmission, TestSummary, UserWithRole, DEFAULT_QUESTION_LANGUAGE,
    DEFAULT_QUESTION_POINTS,
};
use crate::db::store::{check_questions_exist, new_id, Store, StoreError};
use crate::db::DatabaseProxy;

const QUESTION_COLUMNS: &str = r#"
    q."id", q."teacher_id", q."title", q."description", q."topic", q."difficulty",
    q."programming_language", q."starter_code", q."expected_concepts",
    q."created_at", q."updated_at"
"#;

const SUBMISSION_COLUMNS: &str = r#"
    s."id", s."test_id", s."question_id", s."student_id", s."code_submission",
    s."ai_analysis", s."score", s."submitted_at"
"#;

pub struct PgStore {
    proxy: Arc<DatabaseProxy>,
}

impl PgStore {
    pub fn new(proxy: Arc<DatabaseProxy>) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.proxy.ping().await.map_err(|err| {
            tracing::warn!(error = %err, "database ping failed");
            StoreError::Unavailable
        })
    }

    async fn insert_interaction(&self, new: NewInteraction) -> Result<Interaction, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO "student_interactions"
                ("id", "user_id", "input_type", "input_content", "programming_language")
            VALUES ($1, $2, $3, $4, $5)
            RETURNING "id", "user_id", "input_type", "input_content", "programming_language", "created_at"
            "#,
        )
        .bind(new_id())
        .bind(&new.user_id)
        .bind(new.input_type.as_str())
        .bind(&new.input_content)
        .bind(&new.programming_language)
        .fetch_one(self.proxy.pool())
        .await?;

        map_interaction(&row)
    }

    async fn insert_analysis(&self, new: NewAnalysis) -> Result<AnalysisRecord, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO "analysis_results" (
                "id", "interaction_id", "user_id", "clarity_score", "clarity_analysis",
                "conceptual_understanding", "code_best_practices", "misconceptions",
                "adaptive_hint", "suggested_next_topic"
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&new.interaction_id)
        .bind(&new.user_id)
        .bind(new.clarity_score)
        .bind(&new.clarity_analysis)
        .bind(&new.conceptual_understanding)
        .bind(&new.code_best_practices)
        .bind(&new.misconceptions)
        .bind(&new.adaptive_hint)
        .bind(&new.suggested_next_topic)
        .fetch_one(self.proxy.pool())
        .await?;

        map_analysis(&row)
    }

    async fn find_analysis_for_interaction(
        &self,
        interaction_id: &str,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        let row = sqlx::query(r#"SELECT * FROM "analysis_results" WHERE "interaction_id" = $1"#)
            .bind(interaction_id)
            .fetch_optional(self.proxy.pool())
            .await?;

        row.as_ref().map(map_analysis).transpose()
    }

    async fn recent_interactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Interaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "id", "user_id", "input_type", "input_content", "programming_language", "created_at"
            FROM "student_interactions"
            WHERE "user_id" = $1
            ORDER BY "created_at" DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.proxy.pool())
        .await?;

        rows.iter().map(map_interaction).collect()
    }

    async fn find_progress(
        &self,
        user_id: &str,
        topic: &str,
    ) -> Result<Option<StudentProgress>, StoreError> {
        let row = sqlx::query(
            r#"SELECT * FROM "student_progress" WHERE "user_id" = $1 AND "topic" = $2"#,
        )
        .bind(user_id)
        .bind(topic)
        .fetch_optional(self.proxy.pool())
        .await?;

        row.as_ref().map(map_progress).transpose()
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<StudentProgress>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT * FROM "student_progress" WHERE "user_id" = $1 ORDER BY "skill_level" DESC"#,
        )
        .bind(user_id)
        .fetch_all(self.proxy.pool())
        .await?;

        rows.iter().map(map_progress).collect()
    }

    async fn recent_test_submissions(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<RecentSubmission>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT q."topic", q."difficulty", s."score", s."ai_analysis"
            FROM "test_submissions" s
            LEFT JOIN "questions" q ON q."id" = s."question_id"
            WHERE s."student_id" = $1
            ORDER BY s."submitted_at" DESC
            LIMIT $2
            "#,
        )
        .bind(student_id)
        .bind(limit)
        .fetch_all(self.proxy.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<RecentSubmission, StoreError> {
                Ok(RecentSubmission {
                    topic: row.try_get("topic")?,
                    difficulty: row.try_get("difficulty")?,
                    score: row.try_get("score")?,
                    analysis: row.try_get("ai_analysis")?,
                })
            })
            .collect()
    }

    async fn upsert_learning_path(
        &self,
        upsert: LearningPathUpsert,
    ) -> Result<LearningPath, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO "learning_paths" (
                "id", "student_id", "current_topic", "skill_level", "strengths",
                "areas_for_improvement", "recommended_topics", "next_milestone", "updated_at"
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT ("student_id", "current_topic") DO UPDATE SET
                "skill_level" = EXCLUDED."skill_level",
                "strengths" = EXCLUDED."strengths",
                "areas_for_improvement" = EXCLUDED."areas_for_improvement",
                "recommended_topics" = EXCLUDED."recommended_topics",
                "next_milestone" = EXCLUDED."next_milestone",
                "updated_at" = EXCLUDED."updated_at"
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&upsert.student_id)
        .bind(&upsert.topic)
        .bind(upsert.skill_level)
        .bind(&upsert.strengths)
        .bind(&upsert.areas_for_improvement)
        .bind(&upsert.recommended_topics)
        .bind(&upsert.next_milestone)
        .fetch_one(self.proxy.pool())
        .await?;

        map_learning_path(&row)
    }

    async fn list_learning_paths(&self, student_id: &str) -> Result<Vec<LearningPath>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT * FROM "learning_paths" WHERE "student_id" = $1 ORDER BY "updated_at" DESC"#,
        )
        .bind(student_id)
        .fetch_all(self.proxy.pool())
        .await?;

        rows.iter().map(map_learning_path).collect()
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(r#"SELECT "id", "full_name", "student_id" FROM "profiles" WHERE "id" = $1"#)
            .bind(user_id)
            .fetch_optional(self.proxy.pool())
            .await?;

        row.as_ref().map(map_profile).transpose()
    }

    async fn find_role(&self, user_id: &str) -> Result<Option<AppRole>, StoreError> {
        let role: Option<String> =
            sqlx::query_scalar(r#"SELECT "role" FROM "user_roles" WHERE "user_id" = $1"#)
                .bind(user_id)
                .fetch_optional(self.proxy.pool())
                .await?;

        role.as_deref().map(parse_role).transpose()
    }

    async fn replace_role(&self, user_id: &str, role: AppRole) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM "user_roles" WHERE "user_id" = $1"#)
            .bind(user_id)
            .execute(self.proxy.pool())
            .await?;

        sqlx::query(r#"INSERT INTO "user_roles" ("id", "user_id", "role") VALUES ($1, $2, $3)"#)
            .bind(new_id())
            .bind(user_id)
            .bind(role.as_str())
            .execute(self.proxy.pool())
            .await?;

        Ok(())
    }

    async fn list_users_with_roles(&self) -> Result<Vec<UserWithRole>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p."id", p."full_name", p."student_id", r."role"
            FROM "profiles" p
            LEFT JOIN "user_roles" r ON r."user_id" = p."id"
            ORDER BY p."created_at" DESC
            "#,
        )
        .fetch_all(self.proxy.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<UserWithRole, StoreError> {
                let role: Option<String> = row.try_get("role")?;
                Ok(UserWithRole {
                    profile: map_profile(row)?,
                    role: role.as_deref().map(parse_role).transpose()?,
                })
            })
            .collect()
    }

    async fn list_students(&self) -> Result<Vec<StudentSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT r."user_id", p."full_name", p."student_id"
            FROM "user_roles" r
            LEFT JOIN "profiles" p ON p."id" = r."user_id"
            WHERE r."role" = 'student'
            ORDER BY p."full_name" NULLS LAST
            "#,
        )
        .fetch_all(self.proxy.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<StudentSummary, StoreError> {
                Ok(StudentSummary {
                    user_id: row.try_get("user_id")?,
                    full_name: row.try_get("full_name")?,
                    student_number: row.try_get("student_id")?,
                })
            })
            .collect()
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        let sql = format!(r#"SELECT {QUESTION_COLUMNS} FROM "questions" q ORDER BY q."created_at" DESC"#);
        let rows = sqlx::query(&sql).fetch_all(self.proxy.pool()).await?;
        rows.iter().map(map_question).collect()
    }

    async fn find_question(&self, id: &str) -> Result<Option<Question>, StoreError> {
        let sql = format!(r#"SELECT {QUESTION_COLUMNS} FROM "questions" q WHERE q."id" = $1"#);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.proxy.pool())
            .await?;
        row.as_ref().map(map_question).transpose()
    }

    async fn create_question(
        &self,
        teacher_id: &str,
        draft: QuestionDraft,
    ) -> Result<Question, StoreError> {
        let language = draft
            .programming_language
            .unwrap_or_else(|| DEFAULT_QUESTION_LANGUAGE.to_string());

        let row = sqlx::query(
            r#"
            INSERT INTO "questions" (
                "id", "teacher_id", "title", "description", "topic", "difficulty",
                "programming_language", "starter_code", "expected_concepts"
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(teacher_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.topic)
        .bind(&draft.difficulty)
        .bind(&language)
        .bind(&draft.starter_code)
        .bind(&draft.expected_concepts)
        .fetch_one(self.proxy.pool())
        .await?;

        map_question(&row)
    }

    async fn update_question(
        &self,
        id: &str,
        teacher_id: &str,
        draft: QuestionDraft,
    ) -> Result<Question, StoreError> {
        let language = draft
            .programming_language
            .unwrap_or_else(|| DEFAULT_QUESTION_LANGUAGE.to_string());

        let row = sqlx::query(
            r#"
            UPDATE "questions" SET
                "title" = $3,
                "description" = $4,
                "topic" = $5,
                "difficulty" = $6,
                "programming_language" = $7,
                "starter_code" = $8,
                "expected_concepts" = $9,
                "updated_at" = NOW()
            WHERE "id" = $1 AND "teacher_id" = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(teacher_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.topic)
        .bind(&draft.difficulty)
        .bind(&language)
        .bind(&draft.starter_code)
        .bind(&draft.expected_concepts)
        .fetch_optional(self.proxy.pool())
        .await?;

        match row {
            Some(row) => map_question(&row),
            None => Err(StoreError::NotFound("question")),
        }
    }

    async fn delete_question(&self, id: &str, teacher_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(r#"DELETE FROM "questions" WHERE "id" = $1 AND "teacher_id" = $2"#)
            .bind(id)
            .bind(teacher_id)
            .execute(self.proxy.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("question"));
        }
        Ok(())
    }

    async fn list_tests(&self) -> Result<Vec<Test>, StoreError> {
        let rows = sqlx::query(r#"SELECT * FROM "tests" ORDER BY "created_at" DESC"#)
            .fetch_all(self.proxy.pool())
            .await?;
        rows.iter().map(map_test).collect()
    }

    async fn find_test(&self, id: &str) -> Result<Option<Test>, StoreError> {
        let row = sqlx::query(r#"SELECT * FROM "tests" WHERE "id" = $1"#)
            .bind(id)
            .fetch_optional(self.proxy.pool())
            .await?;
        row.as_ref().map(map_test).transpose()
    }

    async fn create_test(&self, teacher_id: &str, draft: TestDraft) -> Result<Test, StoreError> {
        let mut tx = self.proxy.pool().begin().await?;

        let existing: Vec<String> =
            sqlx::query_scalar(r#"SELECT "id" FROM "questions" WHERE "id" = ANY($1)"#)
                .bind(&draft.question_ids)
                .fetch_all(&mut *tx)
                .await?;
        check_questions_exist(&draft.question_ids, &existing)?;

        let row = sqlx::query(
            r#"
            INSERT INTO "tests" ("id", "teacher_id", "title", "description", "duration_minutes", "is_published")
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(teacher_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.duration_minutes)
        .bind(draft.is_published)
        .fetch_one(&mut *tx)
        .await?;

        let test = map_test(&row)?;

        for (index, question_id) in draft.question_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO "test_questions" ("id", "test_id", "question_id", "order_index", "points")
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(new_id())
            .bind(&test.id)
            .bind(question_id)
            .bind(index as i32)
            .bind(DEFAULT_QUESTION_POINTS)
            .execute(&mut *tx)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    StoreError::Conflict(format!("question {question_id} does not exist"))
                }
                other => StoreError::Database(other),
            })?;
        }

        tx.commit().await?;
        Ok(test)
    }

    async fn delete_test(&self, id: &str, teacher_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(r#"DELETE FROM "tests" WHERE "id" = $1 AND "teacher_id" = $2"#)
            .bind(id)
            .bind(teacher_id)
            .execute(self.proxy.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("test"));
        }
        Ok(())
    }

    async fn assign_test(
        &self,
        test_id: &str,
        student_ids: &[String],
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<TestAssignment>, StoreError> {
        let mut assignments = Vec::with_capacity(student_ids.len());
        for student_id in student_ids {
            let row = sqlx::query(
                r#"
                INSERT INTO "test_assignments" ("id", "test_id", "student_id", "due_date")
                VALUES ($1, $2, $3, $4)
                ON CONFLICT ("test_id", "student_id") DO UPDATE SET "due_date" = EXCLUDED."due_date"
                RETURNING *
                "#,
            )
            .bind(new_id())
            .bind(test_id)
            .bind(student_id)
            .bind(due_date)
            .fetch_one(self.proxy.pool())
            .await?;
            assignments.push(map_assignment(&row)?);
        }
        Ok(assignments)
    }

    async fn list_assignments(
        &self,
        student_id: &str,
    ) -> Result<Vec<AssignmentWithTest>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT a."id", a."test_id", a."student_id", a."assigned_at", a."due_date",
                   t."title", t."description", t."duration_minutes"
            FROM "test_assignments" a
            JOIN "tests" t ON t."id" = a."test_id"
            WHERE a."student_id" = $1
            ORDER BY a."assigned_at" DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(self.proxy.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<AssignmentWithTest, StoreError> {
                let assignment = map_assignment(row)?;
                let test = TestSummary {
                    id: assignment.test_id.clone(),
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                    duration_minutes: row.try_get("duration_minutes")?,
                };
                Ok(AssignmentWithTest { assignment, test })
            })
            .collect()
    }

    async fn is_assigned(&self, test_id: &str, student_id: &str) -> Result<bool, StoreError> {
        let found: Option<i32> = sqlx::query_scalar(
            r#"SELECT 1 FROM "test_assignments" WHERE "test_id" = $1 AND "student_id" = $2"#,
        )
        .bind(test_id)
        .bind(student_id)
        .fetch_optional(self.proxy.pool())
        .await?;
        Ok(found.is_some())
    }

    async fn list_test_questions(
        &self,
        test_id: &str,
    ) -> Result<Vec<TestQuestionDetail>, StoreError> {
        let sql = format!(
            r#"
            SELECT tq."order_index", tq."points", {QUESTION_COLUMNS}
            FROM "test_questions" tq
            JOIN "questions" q ON q."id" = tq."question_id"
            WHERE tq."test_id" = $1
            ORDER BY tq."order_index"
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(test_id)
            .fetch_all(self.proxy.pool())
            .await?;

        rows.iter()
            .map(|row| -> Result<TestQuestionDetail, StoreError> {
                Ok(TestQuestionDetail {
                    order_index: row.try_get("order_index")?,
                    points: row.try_get("points")?,
                    question: map_question(row)?,
                })
            })
            .collect()
    }

    async fn list_student_submissions(
        &self,
        test_id: &str,
        student_id: &str,
    ) -> Result<Vec<TestSubmission>, StoreError> {
        let sql = format!(
            r#"
            SELECT {SUBMISSION_COLUMNS}
            FROM "test_submissions" s
            WHERE s."test_id" = $1 AND s."student_id" = $2
            ORDER BY s."submitted_at" DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(test_id)
            .bind(student_id)
            .fetch_all(self.proxy.pool())
            .await?;
        rows.iter().map(map_submission).collect()
    }

    async fn upsert_test_submission(
        &self,
        new: NewTestSubmission,
    ) -> Result<TestSubmission, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO "test_submissions" (
                "id", "test_id", "question_id", "student_id", "code_submission", "ai_analysis", "score"
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ("test_id", "question_id", "student_id") DO UPDATE SET
                "code_submission" = EXCLUDED."code_submission",
                "ai_analysis" = EXCLUDED."ai_analysis",
                "score" = EXCLUDED."score",
                "submitted_at" = NOW()
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&new.test_id)
        .bind(&new.question_id)
        .bind(&new.student_id)
        .bind(&new.code_submission)
        .bind(&new.ai_analysis)
        .bind(new.score)
        .fetch_one(self.proxy.pool())
        .await?;

        map_submission(&row)
    }

    async fn find_test_submission(&self, id: &str) -> Result<Option<TestSubmission>, StoreError> {
        let sql = format!(r#"SELECT {SUBMISSION_COLUMNS} FROM "test_submissions" s WHERE s."id" = $1"#);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.proxy.pool())
            .await?;
        row.as_ref().map(map_submission).transpose()
    }

    async fn list_submissions_for_teacher(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TeacherSubmissionView>, StoreError> {
        let sql = format!(
            r#"
            SELECT {SUBMISSION_COLUMNS},
                   q."title" AS "question_title", q."topic" AS "question_topic",
                   t."title" AS "test_title", p."full_name" AS "student_name"
            FROM "test_submissions" s
            JOIN "tests" t ON t."id" = s."test_id"
            JOIN "questions" q ON q."id" = s."question_id"
            LEFT JOIN "profiles" p ON p."id" = s."student_id"
            WHERE t."teacher_id" = $1
            ORDER BY s."submitted_at" DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(teacher_id)
            .fetch_all(self.proxy.pool())
            .await?;

        rows.iter()
            .map(|row| -> Result<TeacherSubmissionView, StoreError> {
                Ok(TeacherSubmissionView {
                    submission: map_submission(row)?,
                    question_title: row.try_get("question_title")?,
                    question_topic: row.try_get("question_topic")?,
                    test_title: row.try_get("test_title")?,
                    student_name: row.try_get("student_name")?,
                })
            })
            .collect()
    }

    async fn submission_scores(&self, student_id: &str) -> Result<Vec<Option<i32>>, StoreError> {
        let scores: Vec<Option<i32>> =
            sqlx::query_scalar(r#"SELECT "score" FROM "test_submissions" WHERE "student_id" = $1"#)
                .bind(student_id)
                .fetch_all(self.proxy.pool())
                .await?;
        Ok(scores)
    }

    async fn insert_feedback(
        &self,
        new: NewTeacherFeedback,
    ) -> Result<TeacherFeedback, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO "teacher_feedback"
                ("id", "teacher_id", "student_id", "submission_id", "feedback_text", "rating")
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&new.teacher_id)
        .bind(&new.student_id)
        .bind(&new.submission_id)
        .bind(&new.feedback_text)
        .bind(new.rating)
        .fetch_one(self.proxy.pool())
        .await?;

        map_feedback(&row)
    }

    async fn list_feedback_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<StudentFeedbackView>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT f.*, p."full_name" AS "teacher_name", q."title" AS "question_title"
            FROM "teacher_feedback" f
            LEFT JOIN "profiles" p ON p."id" = f."teacher_id"
            LEFT JOIN "test_submissions" s ON s."id" = f."submission_id"
            LEFT JOIN "questions" q ON q."id" = s."question_id"
            WHERE f."student_id" = $1
            ORDER BY f."created_at" DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(self.proxy.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<StudentFeedbackView, StoreError> {
                Ok(StudentFeedbackView {
                    feedback: map_feedback(row)?,
                    teacher_name: row.try_get("teacher_name")?,
                    question_title: row.try_get("question_title")?,
                })
            })
            .collect()
    }
}

fn parse_role(value: &str) -> Result<AppRole, StoreError> {
    AppRole::parse(value).ok_or_else(|| StoreError::Decode(format!("unknown role {value}")))
}

fn map_interaction(row: &PgRow) -> Result<Interaction, StoreError> {
    let input_type: String = row.try_get("input_type")?;
    let input_type = InputKind::parse(&input_type)
        .ok_or_else(|| StoreError::Decode(format!("unknown input type {input_type}")))?;

    Ok(Interaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        input_type,
        input_content: row.try_get("input_content")?,
        programming_language: row.try_get("programming_language")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_analysis(row: &PgRow) -> Result<AnalysisRecord, StoreError> {
    Ok(AnalysisRecord {
        id: row.try_get("id")?,
        interaction_id: row.try_get("interaction_id")?,
        user_id: row.try_get("user_id")?,
        clarity_score: row.try_get("clarity_score")?,
        clarity_analysis: row.try_get("clarity_analysis")?,
        conceptual_understanding: row.try_get("conceptual_understanding")?,
        code_best_practices: row.try_get("code_best_practices")?,
        misconceptions: row.try_get("misconceptions")?,
        adaptive_hint: row.try_get("adaptive_hint")?,
        suggested_next_topic: row.try_get("suggested_next_topic")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_progress(row: &PgRow) -> Result<StudentProgress, StoreError> {
    Ok(StudentProgress {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        topic: row.try_get("topic")?,
        skill_level: row.try_get("skill_level")?,
        interactions_count: row.try_get("interactions_count")?,
        last_interaction_at: row.try_get("last_interaction_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_learning_path(row: &PgRow) -> Result<LearningPath, StoreError> {
    Ok(LearningPath {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        current_topic: row.try_get("current_topic")?,
        skill_level: row.try_get("skill_level")?,
        strengths: row.try_get("strengths")?,
        areas_for_improvement: row.try_get("areas_for_improvement")?,
        recommended_topics: row.try_get("recommended_topics")?,
        next_milestone: row.try_get("next_milestone")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_profile(row: &PgRow) -> Result<Profile, StoreError> {
    Ok(Profile {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        student_number: row.try_get("student_id")?,
    })
}

fn map_question(row: &PgRow) -> Result<Question, StoreError> {
    Ok(Question {
        id: row.try_get("id")?,
        teacher_id: row.try_get("teacher_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        topic: row.try_get("topic")?,
        difficulty: row.try_get("difficulty")?,
        programming_language: row.try_get("programming_language")?,
        starter_code: row.try_get("starter_code")?,
        expected_concepts: row.try_get("expected_concepts")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_test(row: &PgRow) -> Result<Test, StoreError> {
    Ok(Test {
        id: row.try_get("id")?,
        teacher_id: row.try_get("teacher_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        duration_minutes: row.try_get("duration_minutes")?,
        is_published: row.try_get("is_published")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_assignment(row: &PgRow) -> Result<TestAssignment, StoreError> {
    Ok(TestAssignment {
        id: row.try_get("id")?,
        test_id: row.try_get("test_id")?,
        student_id: row.try_get("student_id")?,
        assigned_at: row.try_get("assigned_at")?,
        due_date: row.try_get("due_date")?,
    })
}

fn map_submission(row: &PgRow) -> Result<TestSubmission, StoreError> {
    Ok(TestSubmission {
        id: row.try_get("id")?,
        test_id: row.try_get("test_id")?,
        question_id: row.try_get("question_id")?,
        student_id: row.try_get("student_id")?,
        code_submission: row.try_get("code_submission")?,
        ai_analysis: row.try_get("ai_analysis")?,
        score: row.try_get("score")?,
        submitted_at: row.try_get("submitted_at")?,
    })
}

fn map_feedback(row: &PgRow) -> Result<TeacherFeedback, StoreError> {
    Ok(TeacherFeedback {
        id: row.try_get("id")?,
        teacher_id: row.try_get("teacher_id")?,
        student_id: row.try_get("student_id")?,
        submission_id: row.try_get("submission_id")?,
        feedback_text: row.try_get("feedback_text")?,
        rating: row.try_get("rating")?,
        created_at: row.try_get("created_at")?,
    })
}
