use sqlx::PgExecutor;

use crate::models::Asset;

use super::StoreError;

pub async fn get<'e, E>(exec: E, asset_id: i64) -> Result<Option<Asset>, StoreError>
where
    E: PgExecutor<'e>,
{
    let asset = sqlx::query_as::<_, Asset>(
        "SELECT asset_id, is_active, current_price FROM assets WHERE asset_id = $1",
    )
    .bind(asset_id)
    .fetch_optional(exec)
    .await?;

    Ok(asset)
}
