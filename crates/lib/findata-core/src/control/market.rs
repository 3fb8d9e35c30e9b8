use std::collections::HashMap;

use chrono::NaiveDate;
use findata_store::StockPrice;
use findata_store::schema::{COL_COMPANY_UID, COL_DATE};
use serde::{Deserialize, Serialize};

use super::{AGGREGATE_ROW_CEILING, FindataControlPlane, OP_GET_STOCK_PRICE_HISTORY};
use crate::access::AccessContext;
use crate::envelope::{Payload, ToolEnvelope};
use crate::error::{CoreError, CoreResult};
use crate::metrics::{
    AGGREGATE_PLACES,
    RETURN_PLACES,
    max_drawdown,
    period_returns,
    round_to,
    total_return,
};
use crate::pagination::PageRequest;
use crate::query::{CompareOp, OrderBy, Predicate};
use crate::services::Session;
use crate::store::RecordStore;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockPriceHistoryRequest {
    pub ticker: String,
    /// Inclusive, `YYYY-MM-DD`.
    pub start_date: String,
    /// Inclusive, `YYYY-MM-DD`.
    pub end_date: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPriceRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Return against the previous bar in the requested range, which may sit
    /// on an earlier page.
    pub daily_return: Option<f64>,
}

/// One page of daily bars. Return and drawdown figures cover the whole
/// `[start_date, end_date]` range, so they do not change with paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPriceHistory {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub prices: Vec<StockPriceRow>,
    pub total_return_pct: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl Payload for StockPriceHistory {
    fn row_count(&self) -> Option<usize> {
        Some(self.prices.len())
    }
}

impl<S: RecordStore> FindataControlPlane<S> {
    /// Daily bars between two dates, oldest first.
    pub async fn get_stock_price_history(
        &self,
        access: &AccessContext,
        request: StockPriceHistoryRequest,
    ) -> ToolEnvelope<StockPriceHistory> {
        self.guard
            .invoke(OP_GET_STOCK_PRICE_HISTORY, access, |session| async move {
                self.stock_price_history_in(&session, request).await
            })
            .await
    }

    async fn stock_price_history_in(
        &self,
        session: &Session<S>,
        request: StockPriceHistoryRequest,
    ) -> CoreResult<StockPriceHistory> {
        let start_date = parse_date(&request.start_date, "start_date")?;
        let end_date = parse_date(&request.end_date, "end_date")?;
        if start_date > end_date {
            return Err(CoreError::validation(format!(
                "start_date {start_date} is after end_date {end_date}"
            )));
        }
        let company = self.resolve_company(session, &request.ticker).await?;

        let filter = Predicate::all([
            Predicate::eq(COL_COMPANY_UID, company.uid.as_str()),
            Predicate::compare(COL_DATE, CompareOp::Ge, start_date),
            Predicate::compare(COL_DATE, CompareOp::Le, end_date),
        ]);
        let page = self
            .executor
            .page::<StockPrice, S>(
                session,
                PageRequest::new(OP_GET_STOCK_PRICE_HISTORY, OrderBy::asc(COL_DATE))
                    .with_filter(filter.clone())
                    .with_cursor(request.cursor)
                    .with_limit(request.limit),
            )
            .await?;
        let series: Vec<StockPrice> = self
            .executor
            .collect(session, filter, OrderBy::asc(COL_DATE), AGGREGATE_ROW_CEILING)
            .await?;

        let closes: Vec<f64> = series.iter().map(|bar| bar.close).collect();
        let returns: HashMap<&str, Option<f64>> = series
            .iter()
            .map(|bar| bar.uid.as_str())
            .zip(period_returns(&closes))
            .collect();
        let prices = page
            .items
            .into_iter()
            .map(|bar| {
                let daily_return = returns.get(bar.uid.as_str()).copied().flatten();
                StockPriceRow {
                    date: bar.date,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                    daily_return: daily_return.map(|value| round_to(value, RETURN_PLACES)),
                }
            })
            .collect();

        Ok(StockPriceHistory {
            ticker: company.ticker,
            start_date,
            end_date,
            prices,
            total_return_pct: total_return(&closes).map(|value| round_to(value, AGGREGATE_PLACES)),
            max_drawdown_pct: max_drawdown(&closes).map(|value| round_to(value, AGGREGATE_PLACES)),
            has_more: page.has_more,
            next_cursor: page.next_cursor,
        })
    }
}

fn parse_date(value: &str, field: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| CoreError::validation(format!("{field} must be YYYY-MM-DD, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::super::testing::plane_with;
    use super::*;
    use crate::error::ErrorCode;
    use crate::fixtures::{company, price};
    use crate::store::memory::MemoryRecordStore;

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    async fn seeded() -> FindataControlPlane<MemoryRecordStore> {
        let (plane, store) = plane_with(&[
            company("c-1", "ALPH", None),
            company("c-2", "PRIV", Some("u-1")),
        ])
        .await;
        let closes = [
            ("2024-01-02", 100.0),
            ("2024-01-03", 120.0),
            ("2024-01-04", 90.0),
            ("2024-01-05", 110.0),
            ("2024-01-08", 115.0),
        ];
        for (index, (day, close)) in closes.into_iter().enumerate() {
            store
                .insert(price(&format!("p-{index}"), "c-1", day, close))
                .await
                .unwrap();
            store
                .insert(price(&format!("q-{index}"), "c-2", day, close))
                .await
                .unwrap();
        }
        plane
    }

    fn history(ticker: &str, start: &str, end: &str, limit: Option<i64>) -> StockPriceHistoryRequest {
        StockPriceHistoryRequest {
            ticker: ticker.to_string(),
            start_date: start.to_string(),
            end_date: end.to_string(),
            limit,
            cursor: None,
        }
    }

    #[tokio::test]
    async fn history_computes_returns_and_drawdown() {
        let plane = seeded().await;
        let envelope = plane
            .get_stock_price_history(
                &AccessContext::anonymous(),
                history("alph", "2024-01-02", "2024-01-05", None),
            )
            .await;
        let data = envelope.data.unwrap();
        assert_eq!(data.prices.len(), 4);
        assert_eq!(data.prices[0].daily_return, None);
        assert!(close(data.prices[1].daily_return.unwrap(), 0.2));
        assert!(close(data.max_drawdown_pct.unwrap(), -0.25));
        assert!(close(data.total_return_pct.unwrap(), 0.1));
        assert!(!data.has_more);
        assert_eq!(envelope.meta.row_count, Some(4));
    }

    #[tokio::test]
    async fn history_pages_by_date() {
        let plane = seeded().await;
        let access = AccessContext::anonymous();
        let first = plane
            .get_stock_price_history(&access, history("ALPH", "2024-01-01", "2024-01-31", Some(3)))
            .await
            .data
            .unwrap();
        assert_eq!(first.prices.len(), 3);
        assert!(first.has_more);

        let mut request = history("ALPH", "2024-01-01", "2024-01-31", None);
        request.cursor = first.next_cursor;
        let second = plane
            .get_stock_price_history(&access, request)
            .await
            .data
            .unwrap();
        let days: Vec<String> = second.prices.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(days, ["2024-01-05", "2024-01-08"]);
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn history_validates_dates() {
        let plane = seeded().await;
        let access = AccessContext::anonymous();

        let malformed = plane
            .get_stock_price_history(&access, history("ALPH", "01/02/2024", "2024-01-05", None))
            .await;
        assert_eq!(malformed.error_code(), Some(ErrorCode::ValidationError));

        let inverted = plane
            .get_stock_price_history(&access, history("ALPH", "2024-02-01", "2024-01-01", None))
            .await;
        assert_eq!(inverted.error_code(), Some(ErrorCode::ValidationError));
    }

    #[tokio::test]
    async fn private_prices_follow_company_visibility() {
        let plane = seeded().await;
        let hidden = plane
            .get_stock_price_history(
                &AccessContext::user("u-2"),
                history("PRIV", "2024-01-01", "2024-01-31", None),
            )
            .await;
        assert_eq!(hidden.error_code(), Some(ErrorCode::NotFound));

        let owned = plane
            .get_stock_price_history(
                &AccessContext::user("u-1"),
                history("PRIV", "2024-01-01", "2024-01-31", None),
            )
            .await;
        assert_eq!(owned.data.unwrap().prices.len(), 5);
    }

    #[tokio::test]
    async fn aggregates_do_not_depend_on_page_size() {
        let plane = seeded().await;
        let access = AccessContext::anonymous();
        let whole = plane
            .get_stock_price_history(&access, history("ALPH", "2024-01-01", "2024-01-31", None))
            .await
            .data
            .unwrap();
        let first = plane
            .get_stock_price_history(&access, history("ALPH", "2024-01-01", "2024-01-31", Some(2)))
            .await
            .data
            .unwrap();
        assert_eq!(first.total_return_pct, whole.total_return_pct);
        assert_eq!(first.max_drawdown_pct, whole.max_drawdown_pct);
        assert!(close(whole.total_return_pct.unwrap(), 0.15));

        let mut request = history("ALPH", "2024-01-01", "2024-01-31", Some(2));
        request.cursor = first.next_cursor;
        let second = plane
            .get_stock_price_history(&access, request)
            .await
            .data
            .unwrap();
        assert_eq!(second.max_drawdown_pct, whole.max_drawdown_pct);
        // 2024-01-04 follows the 120.0 close on the previous page.
        assert_eq!(second.prices[0].date.to_string(), "2024-01-04");
        assert!(close(second.prices[0].daily_return.unwrap(), -0.25));
        assert_eq!(second.prices[0].daily_return, whole.prices[2].daily_return);
    }
}
