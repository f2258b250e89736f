//! Table creation from declared model schemas.

use crate::config::ResolvedEntity;
use crate::context::Context;
use crate::error::AppError;
use crate::sql::{identifier, QueryBuf};

/// `CREATE TABLE IF NOT EXISTS` for an entity's schema. None when no schema is declared.
pub fn create_table_sql(entity: &ResolvedEntity) -> Option<QueryBuf> {
    if entity.schema.is_empty() {
        return None;
    }
    let col_defs: Vec<String> = entity
        .schema
        .iter()
        .map(|(col, ty)| format!("{} {}", identifier(col), ty.trim()))
        .collect();
    Some(QueryBuf {
        sql: format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            identifier(&entity.table_name),
            col_defs.join(", ")
        ),
        params: Vec::new(),
    })
}

/// Create one entity's table. Entities without a schema are left alone.
pub async fn create_table(ctx: &mut Context, entity: &ResolvedEntity) -> Result<bool, AppError> {
    let Some(q) = create_table_sql(entity) else {
        tracing::debug!(model = %entity.name, "no schema declared, table not created");
        return Ok(false);
    };
    ctx.execute(&q).await?;
    Ok(true)
}

/// Create every registered table that declares a schema. Idempotent.
pub async fn apply_migrations(ctx: &mut Context) -> Result<usize, AppError> {
    let entities = ctx.registry().entities.clone();
    let mut created = 0;
    for entity in &entities {
        if create_table(ctx, entity).await? {
            created += 1;
        }
    }
    tracing::info!(tables = created, "migrations applied");
    Ok(created)
}
