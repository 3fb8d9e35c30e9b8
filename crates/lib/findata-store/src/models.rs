use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::{Record, SortKind, SortValue};
use crate::schema::{
    COL_DATE,
    COL_NAME,
    COL_PERIOD_YEAR,
    COL_RATING_DATE,
    COL_TICKER,
    COL_UID,
    COMPANY_CHILD_OWNERSHIP,
    COMPANY_OWNERSHIP,
    Ownership,
    TABLE_ANALYST_RATING,
    TABLE_COMPANY,
    TABLE_FINANCIAL,
    TABLE_STOCK_PRICE,
};

/// A listed company. `owner_id == None` marks a public row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    pub uid: String,
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub industry: String,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub employees: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ceo: Option<String>,
    #[serde(default)]
    pub founded_year: Option<i64>,
    pub country: String,
    pub currency: String,
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// One reported period for a company. `period_quarter == None` marks an
/// annual report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialReport {
    pub uid: String,
    pub company_uid: String,
    pub period_year: i64,
    #[serde(default)]
    pub period_quarter: Option<i64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub gross_profit: Option<f64>,
    #[serde(default)]
    pub operating_income: Option<f64>,
    #[serde(default)]
    pub net_income: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub assets: Option<f64>,
    #[serde(default)]
    pub liabilities: Option<f64>,
    #[serde(default)]
    pub operating_margin: Option<f64>,
    #[serde(default)]
    pub net_margin: Option<f64>,
    #[serde(default)]
    pub gross_margin: Option<f64>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
    #[serde(default)]
    pub free_cash_flow: Option<f64>,
    pub report_date: NaiveDate,
}

/// Daily OHLC bar. Unique per `(company_uid, date)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockPrice {
    pub uid: String,
    pub company_uid: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// A single analyst rating action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalystRating {
    pub uid: String,
    pub company_uid: String,
    pub firm_name: String,
    pub rating: String,
    #[serde(default)]
    pub previous_rating: Option<String>,
    #[serde(default)]
    pub price_target: Option<f64>,
    pub rating_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Record for Company {
    const TABLE: &'static str = TABLE_COMPANY;
    const OWNERSHIP: Ownership = COMPANY_OWNERSHIP;

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            COL_UID => Some(SortValue::from(self.uid.as_str())),
            COL_TICKER => Some(SortValue::from(self.ticker.as_str())),
            COL_NAME => Some(SortValue::from(self.name.as_str())),
            _ => None,
        }
    }

    fn sort_kind(field: &str) -> Option<SortKind> {
        match field {
            COL_UID | COL_TICKER | COL_NAME => Some(SortKind::Text),
            _ => None,
        }
    }

    fn uid(&self) -> &str {
        &self.uid
    }
}

impl Record for FinancialReport {
    const TABLE: &'static str = TABLE_FINANCIAL;
    const OWNERSHIP: Ownership = COMPANY_CHILD_OWNERSHIP;

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            COL_UID => Some(SortValue::from(self.uid.as_str())),
            COL_PERIOD_YEAR => Some(SortValue::Int(self.period_year)),
            _ => None,
        }
    }

    fn sort_kind(field: &str) -> Option<SortKind> {
        match field {
            COL_UID => Some(SortKind::Text),
            COL_PERIOD_YEAR => Some(SortKind::Int),
            _ => None,
        }
    }

    fn uid(&self) -> &str {
        &self.uid
    }
}

impl Record for StockPrice {
    const TABLE: &'static str = TABLE_STOCK_PRICE;
    const OWNERSHIP: Ownership = COMPANY_CHILD_OWNERSHIP;

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            COL_UID => Some(SortValue::from(self.uid.as_str())),
            COL_DATE => Some(SortValue::Date(self.date)),
            _ => None,
        }
    }

    fn sort_kind(field: &str) -> Option<SortKind> {
        match field {
            COL_UID => Some(SortKind::Text),
            COL_DATE => Some(SortKind::Date),
            _ => None,
        }
    }

    fn uid(&self) -> &str {
        &self.uid
    }
}

impl Record for AnalystRating {
    const TABLE: &'static str = TABLE_ANALYST_RATING;
    const OWNERSHIP: Ownership = COMPANY_CHILD_OWNERSHIP;

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            COL_UID => Some(SortValue::from(self.uid.as_str())),
            COL_RATING_DATE => Some(SortValue::Date(self.rating_date)),
            _ => None,
        }
    }

    fn sort_kind(field: &str) -> Option<SortKind> {
        match field {
            COL_UID => Some(SortKind::Text),
            COL_RATING_DATE => Some(SortKind::Date),
            _ => None,
        }
    }

    fn uid(&self) -> &str {
        &self.uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_price_sorts_by_date() {
        let price = StockPrice {
            uid: "p1".to_string(),
            company_uid: "c1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date"),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 100,
        };
        assert_eq!(
            price.sort_value(COL_DATE).map(|value| value.kind()),
            Some(SortKind::Date)
        );
        assert!(price.sort_value("close").is_none());
    }

    #[test]
    fn company_rows_accept_missing_optional_columns() {
        let company: Company = serde_json::from_value(serde_json::json!({
            "uid": "c1",
            "ticker": "ALPH",
            "name": "Alpha Corp",
            "sector": "Technology",
            "industry": "Software",
            "country": "US",
            "currency": "USD"
        }))
        .expect("company should deserialize");
        assert!(company.owner_id.is_none());
        assert!(company.market_cap.is_none());
    }
}
