//! Read access to the student roster.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::student::Student;
use crate::types::{ClassId, StudentId};

const TABLE_NAME: &str = "students";
const SELECT_COLUMNS: &str = "id, class_id, name, roll_number, is_active, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StudentRepositoryTrait: Send + Sync {
    async fn find_by_id(&self, id: StudentId) -> Result<Option<Student>, AppError>;

    /// Every active student across all classes, ordered by roll number.
    async fn list_active(&self) -> Result<Vec<Student>, AppError>;

    /// Active students of one class, ordered by roll number.
    async fn list_by_class(&self, class_id: ClassId) -> Result<Vec<Student>, AppError>;
}

#[derive(Debug, Clone)]
pub struct StudentRepository {
    pool: PgPool,
}

impl StudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentRepositoryTrait for StudentRepository {
    async fn find_by_id(&self, id: StudentId) -> Result<Option<Student>, AppError> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", SELECT_COLUMNS, TABLE_NAME);
        let student = sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(student)
    }

    async fn list_active(&self) -> Result<Vec<Student>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_active ORDER BY roll_number ASC",
            SELECT_COLUMNS, TABLE_NAME
        );
        let students = sqlx::query_as::<_, Student>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(students)
    }

    async fn list_by_class(&self, class_id: ClassId) -> Result<Vec<Student>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE class_id = $1 AND is_active ORDER BY roll_number ASC",
            SELECT_COLUMNS, TABLE_NAME
        );
        let students = sqlx::query_as::<_, Student>(&query)
            .bind(class_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(students)
    }
}
