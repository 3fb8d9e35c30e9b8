//! Row builders shared by unit tests.

use chrono::NaiveDate;
use findata_store::{AnalystRating, Company, FinancialReport, StockPrice};

pub fn company(uid: &str, ticker: &str, owner_id: Option<&str>) -> Company {
    Company {
        uid: uid.to_string(),
        ticker: ticker.to_string(),
        name: format!("{ticker} Holdings"),
        sector: "Technology".to_string(),
        industry: "Software".to_string(),
        market_cap: Some(1_000_000_000.0),
        employees: Some(1_200),
        description: None,
        ceo: None,
        founded_year: Some(1999),
        country: "US".to_string(),
        currency: "USD".to_string(),
        owner_id: owner_id.map(str::to_string),
    }
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
}

pub fn annual(uid: &str, company_uid: &str, year: i64, revenue: f64, net_income: f64) -> FinancialReport {
    FinancialReport {
        uid: uid.to_string(),
        company_uid: company_uid.to_string(),
        period_year: year,
        period_quarter: None,
        revenue: Some(revenue),
        gross_profit: None,
        operating_income: None,
        net_income: Some(net_income),
        eps: Some(net_income / 100.0),
        assets: None,
        liabilities: None,
        operating_margin: Some(0.2),
        net_margin: Some(net_income / revenue),
        gross_margin: None,
        debt_to_equity: None,
        free_cash_flow: None,
        report_date: date(&format!("{}-02-15", year + 1)),
    }
}

pub fn quarterly(
    uid: &str,
    company_uid: &str,
    year: i64,
    quarter: i64,
    revenue: f64,
    net_income: f64,
) -> FinancialReport {
    FinancialReport {
        period_quarter: Some(quarter),
        report_date: date(&format!("{year}-{:02}-20", quarter * 3)),
        ..annual(uid, company_uid, year, revenue, net_income)
    }
}

pub fn price(uid: &str, company_uid: &str, day: &str, close: f64) -> StockPrice {
    StockPrice {
        uid: uid.to_string(),
        company_uid: company_uid.to_string(),
        date: date(day),
        open: close,
        high: close,
        low: close,
        close,
        volume: 10_000,
    }
}

pub fn rating(
    uid: &str,
    company_uid: &str,
    day: &str,
    rating: &str,
    price_target: Option<f64>,
) -> AnalystRating {
    AnalystRating {
        uid: uid.to_string(),
        company_uid: company_uid.to_string(),
        firm_name: format!("Firm {uid}"),
        rating: rating.to_string(),
        previous_rating: None,
        price_target,
        rating_date: date(day),
        notes: None,
    }
}
