use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    error::{Error, Result},
    progress::{self, Progress},
    user::{self, User, UserRef},
    utils::completion_rate,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total_questions: i64,
    pub solved_questions: i64,
    pub needs_revision: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_active: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentProgress {
    pub student: User,
    pub progress: Vec<Progress>,
    pub stats: ProgressStats,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    pub total_questions: i64,
    pub solved_questions: i64,
    pub needs_revision: i64,
    /// Percent of tracked questions solved, one decimal place.
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentStats {
    pub student: UserRef,
    pub stats: CompletionStats,
}

pub async fn student_progress(database: &SqlitePool, student_id: i64) -> Result<StudentProgress> {
    let student = user::get_user(database, student_id)
        .await?
        .ok_or_else(|| Error::not_found("Student not found"))?;
    let progress = progress::user_progress(database, student_id).await?;
    let counts = progress::status_counts(database, student_id).await?;
    Ok(StudentProgress {
        stats: ProgressStats {
            total_questions: counts.total,
            solved_questions: counts.solved,
            needs_revision: counts.needs_revision,
            last_active: student.last_active,
        },
        student,
        progress,
    })
}

pub async fn overall_stats(database: &SqlitePool) -> Result<Vec<StudentStats>> {
    let students = user::list_students(database).await?;
    let ids: Vec<i64> = students.iter().map(|s| s.id).collect();
    let counts = progress::status_counts_by_user(database, &ids).await?;
    Ok(students
        .iter()
        .map(|student| {
            let c = counts.get(&student.id).copied().unwrap_or_default();
            StudentStats {
                student: UserRef::from(student),
                stats: CompletionStats {
                    total_questions: c.total,
                    solved_questions: c.solved,
                    needs_revision: c.needs_revision,
                    completion_rate: completion_rate(c.solved, c.total),
                },
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::memory_pool,
        progress::{ProgressStatus, StatusUpdate, update_status},
        question::{create_question, tests::two_sum},
        user::{create_first_admin, register, tests::new_user},
    };

    #[tokio::test]
    async fn stats_per_student() {
        let database = memory_pool().await.unwrap();
        let admin = create_first_admin(&database, &new_user("Root", "root@example.com"))
            .await
            .unwrap();
        let ada = register(&database, &new_user("Ada", "ada@example.com"))
            .await
            .unwrap();
        let bob = register(&database, &new_user("Bob", "bob@example.com"))
            .await
            .unwrap();
        let statuses = [
            ProgressStatus::Solved,
            ProgressStatus::NeedsRevision,
            ProgressStatus::Unsolved,
        ];
        for status in statuses {
            let q = create_question(&database, admin.id, &two_sum()).await.unwrap();
            let update = StatusUpdate {
                question_id: Some(q.id),
                status: Some(status),
                notes: None,
            };
            update_status(&database, ada.id, &update).await.unwrap();
        }

        let stats = overall_stats(&database).await.unwrap();
        assert_eq!(stats.len(), 2);
        let ada_stats = stats.iter().find(|s| s.student.id == ada.id).unwrap();
        assert_eq!(ada_stats.stats.total_questions, 3);
        assert_eq!(ada_stats.stats.solved_questions, 1);
        assert_eq!(ada_stats.stats.needs_revision, 1);
        assert_eq!(ada_stats.stats.completion_rate, 33.3);
        let bob_stats = stats.iter().find(|s| s.student.id == bob.id).unwrap();
        assert_eq!(bob_stats.stats.total_questions, 0);
        assert_eq!(bob_stats.stats.completion_rate, 0.0);

        let detail = student_progress(&database, ada.id).await.unwrap();
        assert_eq!(detail.progress.len(), 3);
        assert_eq!(detail.stats.solved_questions, 1);
        assert_eq!(detail.student.name, "Ada");
        assert_eq!(detail.stats.last_active, ada.last_active);
        assert_eq!(detail.stats.last_active, detail.student.last_active);
    }

    #[tokio::test]
    async fn unknown_student_is_not_found() {
        let database = memory_pool().await.unwrap();
        let err = student_progress(&database, 42).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == "Student not found"));
    }
}
