use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use market_core::{overview_from, tile_from, MarketItem, Overview, Tile};

use crate::{ClientResult, TerminalClient};

/// Refresh every row from its last two candles.
///
/// Rows are fetched concurrently and returned in input order; a row whose fetch fails
/// is returned unchanged.
pub async fn hydrate_section(client: &TerminalClient, items: &[MarketItem]) -> Vec<MarketItem> {
    join_all(items.iter().map(|item| async move {
        match client.latest_candles(&item.id, 2).await {
            Ok(latest) => item.apply_latest(&latest),
            Err(e) => {
                tracing::debug!(symbol = %item.id, error = %e, "keeping last known row");
                item.clone()
            }
        }
    }))
    .await
}

impl TerminalClient {
    /// Headline card: latest change plus the closes of `[from, to]` as chart points.
    pub async fn overview(
        &self,
        symbol: &str,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ClientResult<Overview> {
        let (latest, range) = tokio::try_join!(
            self.latest_candles(symbol, 2),
            self.range_candles(symbol, from, to),
        )?;
        Ok(overview_from(symbol, name, &latest, &range))
    }

    pub async fn tile(
        &self,
        symbol: &str,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ClientResult<Tile> {
        let (latest, range) = tokio::try_join!(
            self.latest_candles(symbol, 2),
            self.range_candles(symbol, from, to),
        )?;
        Ok(tile_from(symbol, name, &latest, &range))
    }
}
