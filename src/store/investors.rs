use sqlx::PgExecutor;

use crate::models::Investor;

use super::StoreError;

pub async fn get<'e, E>(exec: E, investor_id: i64) -> Result<Option<Investor>, StoreError>
where
    E: PgExecutor<'e>,
{
    let investor = sqlx::query_as::<_, Investor>(
        "SELECT investor_id, account_status FROM investors WHERE investor_id = $1",
    )
    .bind(investor_id)
    .fetch_optional(exec)
    .await?;

    Ok(investor)
}
