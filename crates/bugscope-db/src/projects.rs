//! Project repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use bugscope_core::{new_v7, CreateProjectRequest, Error, Project, ProjectRepository, Result};

/// PostgreSQL implementation of ProjectRepository.
#[derive(Clone)]
pub struct PgProjectRepository {
    pool: Pool<Postgres>,
}

impl PgProjectRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_project_row(row: sqlx::postgres::PgRow) -> Result<Project> {
        Ok(Project {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            public_key: row.try_get("public_key")?,
            secret_key: row.try_get("secret_key")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn insert(&self, req: CreateProjectRequest) -> Result<Project> {
        if req.public_key.trim().is_empty() || req.secret_key.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Project keys must not be empty".to_string(),
            ));
        }

        let row = sqlx::query(
            "INSERT INTO project (id, name, public_key, secret_key, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, name, public_key, secret_key, created_at",
        )
        .bind(new_v7())
        .bind(&req.name)
        .bind(&req.public_key)
        .bind(&req.secret_key)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_project_row(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, name, public_key, secret_key, created_at FROM project WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_project_row).transpose()
    }

    async fn get_by_public_key(&self, public_key: &str) -> Result<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, name, public_key, secret_key, created_at
             FROM project WHERE public_key = $1",
        )
        .bind(public_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_project_row).transpose()
    }
}
