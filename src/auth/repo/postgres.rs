//! PostgreSQL implementation of [`RankRepo`]. The tables are described in
//! `db/schema.sql`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::Instrument;

use super::RankRepo;
use crate::auth::error::RepoError;
use crate::auth::model::{
    is_pseudo_rank, CredentialRecord, RankCreation, RankId, RankModification, RankRecord,
    RankSummary, ServerId, ServerPermissions, WEBSITE_SERVER_ID,
};

#[derive(Clone, Debug)]
pub struct PgRankRepo {
    pool: PgPool,
}

impl PgRankRepo {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn conflict_or_database(err: sqlx::Error) -> RepoError {
    if is_unique_violation(&err) {
        RepoError::Conflict
    } else {
        RepoError::Database(err)
    }
}

/// Flatten per-server entries into the parallel arrays bound to `UNNEST`.
fn unnest_columns(permissions: &ServerPermissions) -> (Vec<ServerId>, Vec<String>) {
    permissions
        .iter()
        .flat_map(|(server, entries)| entries.iter().map(move |entry| (*server, entry.clone())))
        .unzip()
}

async fn insert_permissions(
    tx: &mut Transaction<'_, Postgres>,
    id: RankId,
    permissions: &ServerPermissions,
) -> Result<(), RepoError> {
    let (servers, entries) = unnest_columns(permissions);
    if servers.is_empty() {
        return Ok(());
    }

    let query = r"
        INSERT INTO rank_permissions (rank_id, server_id, permission)
        SELECT $1, server_id, permission
        FROM UNNEST($2::smallint[], $3::text[]) AS t (server_id, permission)
        ON CONFLICT DO NOTHING
    ";
    sqlx::query(query)
        .bind(id)
        .bind(&servers)
        .bind(&entries)
        .execute(&mut **tx)
        .instrument(query_span("INSERT", query))
        .await?;
    Ok(())
}

async fn delete_permissions(
    tx: &mut Transaction<'_, Postgres>,
    id: RankId,
    permissions: &ServerPermissions,
) -> Result<(), RepoError> {
    let (servers, entries) = unnest_columns(permissions);
    if servers.is_empty() {
        return Ok(());
    }

    let query = r"
        DELETE FROM rank_permissions AS p
        USING UNNEST($2::smallint[], $3::text[]) AS t (server_id, permission)
        WHERE p.rank_id = $1
          AND p.server_id = t.server_id
          AND p.permission = t.permission
    ";
    sqlx::query(query)
        .bind(id)
        .bind(&servers)
        .bind(&entries)
        .execute(&mut **tx)
        .instrument(query_span("DELETE", query))
        .await?;
    Ok(())
}

#[async_trait]
impl RankRepo for PgRankRepo {
    async fn load_ranks_with_permissions(&self) -> Result<Vec<RankRecord>, RepoError> {
        let query = r"
            SELECT r.id, r.level, r.name, r.display_name, r.chat_format,
                   COALESCE(
                       array_agg(p.permission) FILTER (WHERE p.permission IS NOT NULL),
                       '{}'::text[]
                   ) AS permissions
            FROM ranks r
            LEFT JOIN rank_permissions p ON p.rank_id = r.id AND p.server_id = $1
            GROUP BY r.id
            ORDER BY r.level, r.id
        ";
        let rows = sqlx::query(query)
            .bind(WEBSITE_SERVER_ID)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        rows.into_iter()
            .map(|row| -> Result<RankRecord, sqlx::Error> {
                let permissions: Vec<String> = row.try_get("permissions")?;
                Ok(RankRecord {
                    summary: RankSummary {
                        id: row.try_get("id")?,
                        level: row.try_get("level")?,
                        name: row.try_get("name")?,
                        display_name: row.try_get("display_name")?,
                        chat_format: row.try_get("chat_format")?,
                    },
                    permissions: permissions.into_iter().collect(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(RepoError::from)
    }

    async fn load_permissions(&self, id: RankId) -> Result<ServerPermissions, RepoError> {
        let query = r"
            SELECT server_id, permission
            FROM rank_permissions
            WHERE rank_id = $1
        ";
        let rows = sqlx::query(query)
            .bind(id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        let mut permissions = ServerPermissions::new();
        for row in rows {
            let server: ServerId = row.try_get("server_id")?;
            let entry: String = row.try_get("permission")?;
            permissions.entry(server).or_default().insert(entry);
        }
        Ok(permissions)
    }

    async fn create_rank(&self, rank: &RankCreation) -> Result<RankId, RepoError> {
        let mut tx = self.pool.begin().await?;

        let query = r"
            INSERT INTO ranks (level, name, display_name, chat_format)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let row = sqlx::query(query)
            .bind(rank.level)
            .bind(&rank.name)
            .bind(&rank.display_name)
            .bind(&rank.chat_format)
            .fetch_one(&mut *tx)
            .instrument(query_span("INSERT", query))
            .await
            .map_err(conflict_or_database)?;
        let id: RankId = row.try_get("id")?;

        insert_permissions(&mut tx, id, &rank.permissions).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn remove_rank(&self, id: RankId) -> Result<(), RepoError> {
        if is_pseudo_rank(id) {
            return Err(RepoError::NotFound);
        }

        let query = "DELETE FROM ranks WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn modify_rank(&self, id: RankId, rank: &RankModification) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;

        let query = r"
            UPDATE ranks
            SET level = COALESCE($2, level),
                name = COALESCE($3, name),
                display_name = COALESCE($4, display_name),
                chat_format = COALESCE($5, chat_format)
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(rank.level)
            .bind(rank.name.as_deref())
            .bind(rank.display_name.as_deref())
            .bind(rank.chat_format.as_deref())
            .execute(&mut *tx)
            .instrument(query_span("UPDATE", query))
            .await
            .map_err(conflict_or_database)?;
        if result.rows_affected() == 0 {
            let _ = tx.rollback().await;
            return Err(RepoError::NotFound);
        }

        delete_permissions(&mut tx, id, &rank.removed_permissions).await?;
        insert_permissions(&mut tx, id, &rank.added_permissions).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn load_credential(&self, nick: &str) -> Result<CredentialRecord, RepoError> {
        let query = r"
            SELECT id, pass_hash, rank_id
            FROM players
            WHERE nick = $1
        ";
        let row = sqlx::query(query)
            .bind(nick)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?
            .ok_or(RepoError::NotFound)?;

        Ok(CredentialRecord {
            player_id: row.try_get("id")?,
            password_hash: row.try_get("pass_hash")?,
            rank_id: row.try_get("rank_id")?,
        })
    }
}
