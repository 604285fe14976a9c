//! Member queries

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, Entity},
    models::{CreateMember, Member, PageRequest, UpdateMember},
};

const MEMBER_COLUMNS: &str = "id, name, email, address, debt, created_at, updated_at";

/// Get member by ID
pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Member> {
    sqlx::query_as::<_, Member>(&format!(
        "SELECT {} FROM members WHERE id = $1",
        MEMBER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found(Entity::Member, id))
}

/// Get member by ID, locking the row until the enclosing transaction ends
pub async fn get_for_update(conn: &mut PgConnection, id: Uuid) -> AppResult<Member> {
    sqlx::query_as::<_, Member>(&format!(
        "SELECT {} FROM members WHERE id = $1 FOR UPDATE",
        MEMBER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found(Entity::Member, id))
}

/// List members, oldest first
pub async fn list(conn: &mut PgConnection, page: PageRequest) -> AppResult<(Vec<Member>, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
        .fetch_one(&mut *conn)
        .await?;

    let members = sqlx::query_as::<_, Member>(&format!(
        "SELECT {} FROM members ORDER BY created_at, id LIMIT $1 OFFSET $2",
        MEMBER_COLUMNS
    ))
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await?;

    Ok((members, total))
}

/// Create a new member with no debt
pub async fn create(conn: &mut PgConnection, member: &CreateMember) -> AppResult<Member> {
    let created = sqlx::query_as::<_, Member>(&format!(
        r#"
        INSERT INTO members (id, name, email, address, debt, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 0, $5, $5)
        RETURNING {}
        "#,
        MEMBER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&member.name)
    .bind(&member.email)
    .bind(&member.address)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(created)
}

/// Update the provided fields of a member
pub async fn update(conn: &mut PgConnection, id: Uuid, member: &UpdateMember) -> AppResult<Member> {
    sqlx::query_as::<_, Member>(&format!(
        r#"
        UPDATE members SET
            name = COALESCE($2, name),
            email = COALESCE($3, email),
            address = COALESCE($4, address),
            updated_at = $5
        WHERE id = $1
        RETURNING {}
        "#,
        MEMBER_COLUMNS
    ))
    .bind(id)
    .bind(&member.name)
    .bind(&member.email)
    .bind(&member.address)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found(Entity::Member, id))
}

/// Conditionally add `delta` to the member's debt
pub async fn update_debt(conn: &mut PgConnection, id: Uuid, delta: Decimal) -> AppResult<Decimal> {
    let debt: Option<Decimal> = sqlx::query_scalar(
        r#"
        UPDATE members SET debt = debt + $2, updated_at = $3
        WHERE id = $1 AND debt + $2 >= 0
        RETURNING debt
        "#,
    )
    .bind(id)
    .bind(delta)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    match debt {
        Some(debt) => Ok(debt),
        None => {
            get_by_id(conn, id).await?;
            Err(AppError::Conflict(format!(
                "Debt of member {} cannot change by {}",
                id, delta
            )))
        }
    }
}

/// Delete a member; refused by the foreign key while transactions reference it
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM members WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(Entity::Member, id));
    }
    Ok(())
}
