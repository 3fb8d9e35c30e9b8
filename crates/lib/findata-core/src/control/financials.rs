use std::collections::BTreeMap;
use std::fmt;

use findata_store::FinancialReport;
use findata_store::schema::{COL_COMPANY_UID, COL_PERIOD_QUARTER, COL_PERIOD_YEAR};
use serde::{Deserialize, Serialize};

use super::{
    AGGREGATE_ROW_CEILING,
    FindataControlPlane,
    OP_COMPARE_COMPANIES,
    OP_GET_FINANCIAL_SUMMARY,
    required_ticker,
};
use crate::access::AccessContext;
use crate::envelope::{Payload, ToolEnvelope};
use crate::error::{CoreError, CoreResult};
use crate::metrics::{AGGREGATE_PLACES, cagr, round_to};
use crate::query::{OrderBy, Predicate};
use crate::services::Session;
use crate::store::RecordStore;

pub const DEFAULT_SUMMARY_YEARS: i64 = 3;
pub const MAX_SUMMARY_YEARS: i64 = 20;
pub const MIN_COMPARE_TICKERS: usize = 2;
pub const MAX_COMPARE_TICKERS: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialSummaryRequest {
    pub ticker: String,
    #[serde(default)]
    pub years: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearFinancials {
    pub year: i64,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub eps: Option<f64>,
}

/// Where the yearly figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryBasis {
    Annual,
    QuarterlyAggregate,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub ticker: String,
    pub years_covered: usize,
    pub basis: SummaryBasis,
    /// Oldest year first.
    pub data: Vec<YearFinancials>,
    pub revenue_cagr: Option<f64>,
    pub net_income_cagr: Option<f64>,
}

impl Payload for FinancialSummary {
    fn row_count(&self) -> Option<usize> {
        Some(self.years_covered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMetric {
    Revenue,
    NetIncome,
    MarketCap,
    OperatingMargin,
    NetMargin,
}

impl CompareMetric {
    pub const ALL: [Self; 5] = [
        Self::Revenue,
        Self::NetIncome,
        Self::MarketCap,
        Self::OperatingMargin,
        Self::NetMargin,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::NetIncome => "net_income",
            Self::MarketCap => "market_cap",
            Self::OperatingMargin => "operating_margin",
            Self::NetMargin => "net_margin",
        }
    }

    const fn pick(self, year: &YearFinancials) -> Option<f64> {
        match self {
            Self::Revenue => year.revenue,
            Self::NetIncome => year.net_income,
            Self::OperatingMargin => year.operating_margin,
            Self::NetMargin => year.net_margin,
            Self::MarketCap => None,
        }
    }
}

impl fmt::Display for CompareMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompareCompaniesRequest {
    pub tickers: Vec<String>,
    pub metric: String,
    /// Fiscal year to compare; the latest available year when unset.
    #[serde(default)]
    pub year: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub ticker: String,
    pub name: String,
    pub metric: CompareMetric,
    pub value: Option<f64>,
    /// Fiscal year the value was taken from; unset for market cap.
    pub year: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub metric: CompareMetric,
    pub comparison: Vec<ComparisonRow>,
    pub winner: Option<String>,
    pub explanation: String,
}

impl Payload for Comparison {
    fn row_count(&self) -> Option<usize> {
        Some(self.comparison.len())
    }
}

impl<S: RecordStore> FindataControlPlane<S> {
    /// Per-year figures for the latest `years` fiscal years plus revenue and
    /// net income CAGR.
    pub async fn get_financial_summary(
        &self,
        access: &AccessContext,
        request: FinancialSummaryRequest,
    ) -> ToolEnvelope<FinancialSummary> {
        self.guard
            .invoke(OP_GET_FINANCIAL_SUMMARY, access, |session| async move {
                self.financial_summary_in(&session, request).await
            })
            .await
    }

    /// Compares companies on one metric and names the highest value.
    pub async fn compare_companies(
        &self,
        access: &AccessContext,
        request: CompareCompaniesRequest,
    ) -> ToolEnvelope<Comparison> {
        self.guard
            .invoke(OP_COMPARE_COMPANIES, access, |session| async move {
                self.compare_companies_in(&session, request).await
            })
            .await
    }

    async fn financial_summary_in(
        &self,
        session: &Session<S>,
        request: FinancialSummaryRequest,
    ) -> CoreResult<FinancialSummary> {
        let requested = request.years.unwrap_or(DEFAULT_SUMMARY_YEARS);
        let years = usize::try_from(requested)
            .ok()
            .filter(|_| (1..=MAX_SUMMARY_YEARS).contains(&requested))
            .ok_or_else(|| {
                CoreError::validation(format!(
                    "years must be between 1 and {MAX_SUMMARY_YEARS}, got {requested}"
                ))
            })?;
        let company = self.resolve_company(session, &request.ticker).await?;
        let (basis, data) = self
            .yearly_financials(session, &company.uid, years, None)
            .await?;

        let (revenue_cagr, net_income_cagr) = match data.as_slice() {
            [first, .., last] => {
                let periods = last.year - first.year;
                (
                    growth(first.revenue, last.revenue, periods),
                    growth(first.net_income, last.net_income, periods),
                )
            }
            _ => (None, None),
        };
        Ok(FinancialSummary {
            ticker: company.ticker,
            years_covered: data.len(),
            basis,
            data,
            revenue_cagr,
            net_income_cagr,
        })
    }

    async fn compare_companies_in(
        &self,
        session: &Session<S>,
        request: CompareCompaniesRequest,
    ) -> CoreResult<Comparison> {
        let metric = parse_metric(&request.metric)?;
        let tickers = distinct_tickers(&request.tickers)?;

        let mut rows = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let company = self.resolve_company(session, &ticker).await?;
            let (value, year) = if metric == CompareMetric::MarketCap {
                (company.market_cap, None)
            } else {
                let (_, data) = self
                    .yearly_financials(session, &company.uid, 1, request.year)
                    .await?;
                data.last()
                    .map_or((None, request.year), |latest| (metric.pick(latest), Some(latest.year)))
            };
            rows.push(ComparisonRow {
                ticker: company.ticker,
                name: company.name,
                metric,
                value,
                year,
            });
        }

        let winner = rows
            .iter()
            .filter_map(|row| row.value.map(|value| (row, value)))
            .fold(None::<(&ComparisonRow, f64)>, |best, (row, value)| match best {
                Some((_, top)) if top >= value => best,
                _ => Some((row, value)),
            })
            .map(|(row, _)| row.ticker.clone());
        let explanation = winner.as_ref().map_or_else(
            || "Insufficient data to determine winner.".to_string(),
            |winner| {
                let names: Vec<&str> = rows.iter().map(|row| row.ticker.as_str()).collect();
                format!("{winner} leads on {metric} among [{}].", names.join(", "))
            },
        );
        Ok(Comparison {
            metric,
            comparison: rows,
            winner,
            explanation,
        })
    }

    /// Latest `years` fiscal years for a company, oldest first. Annual rows
    /// are preferred; without any, quarterly rows are aggregated per year.
    async fn yearly_financials(
        &self,
        session: &Session<S>,
        company_uid: &str,
        years: usize,
        only_year: Option<i64>,
    ) -> CoreResult<(SummaryBasis, Vec<YearFinancials>)> {
        let scope = Predicate::all([
            Predicate::eq(COL_COMPANY_UID, company_uid),
            only_year.map_or(Predicate::Always, |year| Predicate::eq(COL_PERIOD_YEAR, year)),
        ]);
        let newest_first = || OrderBy::desc(COL_PERIOD_YEAR);

        let annual: Vec<FinancialReport> = self
            .executor
            .collect(
                session,
                Predicate::all([scope.clone(), Predicate::IsNull(COL_PERIOD_QUARTER)]),
                newest_first(),
                years,
            )
            .await?;
        if !annual.is_empty() {
            let mut data: Vec<YearFinancials> = annual.iter().map(year_from_annual).collect();
            data.reverse();
            return Ok((SummaryBasis::Annual, data));
        }

        let quarterly: Vec<FinancialReport> = self
            .executor
            .collect(session, scope, newest_first(), AGGREGATE_ROW_CEILING)
            .await?;
        let mut by_year: BTreeMap<i64, Vec<&FinancialReport>> = BTreeMap::new();
        for report in &quarterly {
            by_year.entry(report.period_year).or_default().push(report);
        }
        let mut data: Vec<YearFinancials> = by_year
            .iter()
            .rev()
            .take(years)
            .map(|(year, reports)| aggregate_year(*year, reports))
            .collect();
        data.reverse();
        let basis = if data.is_empty() {
            SummaryBasis::None
        } else {
            SummaryBasis::QuarterlyAggregate
        };
        Ok((basis, data))
    }
}

fn parse_metric(metric: &str) -> CoreResult<CompareMetric> {
    let wanted = metric.trim().to_ascii_lowercase();
    CompareMetric::ALL
        .into_iter()
        .find(|candidate| candidate.as_str() == wanted)
        .ok_or_else(|| {
            let allowed: Vec<&str> = CompareMetric::ALL.iter().map(|m| m.as_str()).collect();
            CoreError::validation(format!("metric must be one of {}", allowed.join(", ")))
        })
}

fn distinct_tickers(tickers: &[String]) -> CoreResult<Vec<String>> {
    let mut distinct: Vec<String> = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let ticker = required_ticker(ticker)?;
        if !distinct.contains(&ticker) {
            distinct.push(ticker);
        }
    }
    if !(MIN_COMPARE_TICKERS..=MAX_COMPARE_TICKERS).contains(&distinct.len()) {
        return Err(CoreError::validation(format!(
            "provide between {MIN_COMPARE_TICKERS} and {MAX_COMPARE_TICKERS} distinct tickers"
        )));
    }
    Ok(distinct)
}

fn growth(first: Option<f64>, last: Option<f64>, periods: i64) -> Option<f64> {
    let (first, last) = (first?, last?);
    cagr(first, last, periods).map(|rate| round_to(rate, AGGREGATE_PLACES))
}

const fn year_from_annual(report: &FinancialReport) -> YearFinancials {
    YearFinancials {
        year: report.period_year,
        revenue: report.revenue,
        net_income: report.net_income,
        operating_margin: report.operating_margin,
        net_margin: report.net_margin,
        eps: report.eps,
    }
}

fn aggregate_year(year: i64, reports: &[&FinancialReport]) -> YearFinancials {
    YearFinancials {
        year,
        revenue: sum(reports.iter().map(|r| r.revenue)),
        net_income: sum(reports.iter().map(|r| r.net_income)),
        operating_margin: mean(reports.iter().map(|r| r.operating_margin)),
        net_margin: mean(reports.iter().map(|r| r.net_margin)),
        eps: mean(reports.iter().map(|r| r.eps)),
    }
}

/// Sum of the present values; `None` when every value is missing.
fn sum(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, value| Some(acc.unwrap_or(0.0) + value))
}

/// Mean of the present values; `None` when every value is missing.
fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (total, count) = values
        .flatten()
        .fold((0.0, 0_u32), |(total, count), value| (total + value, count + 1));
    (count > 0).then(|| total / f64::from(count))
}

#[cfg(test)]
mod tests {
    use super::super::testing::plane_with;
    use super::*;
    use crate::error::ErrorCode;
    use crate::fixtures::{annual, company, quarterly};
    use crate::store::memory::MemoryRecordStore;

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-6
    }

    async fn seeded() -> FindataControlPlane<MemoryRecordStore> {
        let mut big = company("c-1", "ALPH", None);
        big.market_cap = Some(5_000.0);
        let mut small = company("c-2", "BETA", None);
        small.market_cap = Some(9_000.0);
        let (plane, store) = plane_with(&[big, small, company("c-3", "GAMA", None)]).await;

        for (index, (year, revenue)) in [(2020, 100.0), (2021, 110.0), (2022, 121.0), (2019, 90.0)]
            .into_iter()
            .enumerate()
        {
            store
                .insert(annual(&format!("f-a{index}"), "c-1", year, revenue, revenue / 10.0))
                .await
                .unwrap();
        }
        for quarter in 1..=4 {
            store
                .insert(quarterly(&format!("f-b{quarter}"), "c-2", 2022, quarter, 50.0, 5.0))
                .await
                .unwrap();
            store
                .insert(quarterly(&format!("f-c{quarter}"), "c-2", 2021, quarter, 40.0, 2.0))
                .await
                .unwrap();
        }
        plane
    }

    fn compare(tickers: &[&str], metric: &str, year: Option<i64>) -> CompareCompaniesRequest {
        CompareCompaniesRequest {
            tickers: tickers.iter().map(ToString::to_string).collect(),
            metric: metric.to_string(),
            year,
        }
    }

    #[tokio::test]
    async fn summary_prefers_annual_rows_and_computes_cagr() {
        let plane = seeded().await;
        let envelope = plane
            .get_financial_summary(
                &AccessContext::anonymous(),
                FinancialSummaryRequest {
                    ticker: "alph".to_string(),
                    years: None,
                },
            )
            .await;
        let summary = envelope.data.unwrap();
        assert_eq!(summary.basis, SummaryBasis::Annual);
        let years: Vec<_> = summary.data.iter().map(|y| y.year).collect();
        assert_eq!(years, [2020, 2021, 2022]);
        assert!(close(summary.revenue_cagr.unwrap(), 0.10));
        assert!(close(summary.net_income_cagr.unwrap(), 0.10));
        assert_eq!(envelope.meta.row_count, Some(3));
    }

    #[tokio::test]
    async fn summary_falls_back_to_quarterly_aggregates() {
        let plane = seeded().await;
        let summary = plane
            .get_financial_summary(
                &AccessContext::anonymous(),
                FinancialSummaryRequest {
                    ticker: "BETA".to_string(),
                    years: Some(5),
                },
            )
            .await
            .data
            .unwrap();
        assert_eq!(summary.basis, SummaryBasis::QuarterlyAggregate);
        assert_eq!(summary.data.len(), 2);
        assert!(close(summary.data[0].revenue.unwrap(), 160.0));
        assert!(close(summary.data[1].revenue.unwrap(), 200.0));
        assert!(close(summary.revenue_cagr.unwrap(), 0.25));
    }

    #[tokio::test]
    async fn summary_without_reports_is_empty() {
        let plane = seeded().await;
        let summary = plane
            .get_financial_summary(
                &AccessContext::anonymous(),
                FinancialSummaryRequest {
                    ticker: "GAMA".to_string(),
                    years: None,
                },
            )
            .await
            .data
            .unwrap();
        assert_eq!(summary.basis, SummaryBasis::None);
        assert!(summary.data.is_empty());
        assert_eq!(summary.revenue_cagr, None);
    }

    #[tokio::test]
    async fn summary_years_are_bounded() {
        let plane = seeded().await;
        for years in [-3, 0, 21] {
            let envelope = plane
                .get_financial_summary(
                    &AccessContext::anonymous(),
                    FinancialSummaryRequest {
                        ticker: "ALPH".to_string(),
                        years: Some(years),
                    },
                )
                .await;
            assert_eq!(envelope.error_code(), Some(ErrorCode::ValidationError));
        }
    }

    #[tokio::test]
    async fn compare_picks_the_highest_value() {
        let plane = seeded().await;
        let access = AccessContext::anonymous();

        let by_cap = plane
            .compare_companies(&access, compare(&["alph", "beta"], "market_cap", None))
            .await
            .data
            .unwrap();
        assert_eq!(by_cap.winner.as_deref(), Some("BETA"));
        assert_eq!(by_cap.explanation, "BETA leads on market_cap among [ALPH, BETA].");

        let by_revenue = plane
            .compare_companies(&access, compare(&["ALPH", "BETA", "GAMA"], "revenue", None))
            .await
            .data
            .unwrap();
        assert_eq!(by_revenue.winner.as_deref(), Some("BETA"));
        assert_eq!(by_revenue.comparison[2].value, None);

        let in_2021 = plane
            .compare_companies(&access, compare(&["ALPH", "BETA"], "revenue", Some(2021)))
            .await
            .data
            .unwrap();
        assert_eq!(in_2021.winner.as_deref(), Some("BETA"));
        assert_eq!(in_2021.comparison[0].year, Some(2021));
        assert!(close(in_2021.comparison[0].value.unwrap(), 110.0));
    }

    #[tokio::test]
    async fn compare_validates_input() {
        let plane = seeded().await;
        let access = AccessContext::anonymous();

        let single = plane
            .compare_companies(&access, compare(&["ALPH", "alph"], "revenue", None))
            .await;
        assert_eq!(single.error_code(), Some(ErrorCode::ValidationError));

        let metric = plane
            .compare_companies(&access, compare(&["ALPH", "BETA"], "ebitda", None))
            .await;
        assert_eq!(metric.error_code(), Some(ErrorCode::ValidationError));

        let missing = plane
            .compare_companies(&access, compare(&["ALPH", "ZZZZ"], "revenue", None))
            .await;
        assert_eq!(missing.error_code(), Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn compare_without_data_has_no_winner() {
        let (plane, _store) =
            plane_with(&[company("c-1", "AAA", None), company("c-2", "BBB", None)]).await;
        let result = plane
            .compare_companies(
                &AccessContext::anonymous(),
                compare(&["AAA", "BBB"], "net_margin", None),
            )
            .await
            .data
            .unwrap();
        assert_eq!(result.winner, None);
        assert_eq!(result.explanation, "Insufficient data to determine winner.");
    }
}
