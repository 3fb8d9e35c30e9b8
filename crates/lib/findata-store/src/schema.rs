pub const TABLE_COMPANY: &str = "company";
pub const TABLE_FINANCIAL: &str = "financial";
pub const TABLE_STOCK_PRICE: &str = "stock_price";
pub const TABLE_ANALYST_RATING: &str = "analyst_rating";

pub const COL_UID: &str = "uid";
pub const COL_OWNER_ID: &str = "owner_id";
pub const COL_COMPANY_UID: &str = "company_uid";
pub const COL_TICKER: &str = "ticker";
pub const COL_NAME: &str = "name";
pub const COL_PERIOD_YEAR: &str = "period_year";
pub const COL_PERIOD_QUARTER: &str = "period_quarter";
pub const COL_DATE: &str = "date";
pub const COL_RATING_DATE: &str = "rating_date";

/// Describes how row ownership is expressed for a table.
///
/// Visibility predicates are derived from this descriptor, never from ad hoc
/// column checks at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Every row is readable by every caller.
    Public,
    /// Rows carry a nullable owner column; `NULL` marks a public row.
    Owned { column: &'static str },
    /// Rows reference an owned parent; visibility follows the parent row.
    Child {
        foreign_key: &'static str,
        parent_table: &'static str,
        parent_key: &'static str,
        parent: &'static Self,
    },
}

pub const COMPANY_OWNERSHIP: Ownership = Ownership::Owned {
    column: COL_OWNER_ID,
};

pub const COMPANY_CHILD_OWNERSHIP: Ownership = Ownership::Child {
    foreign_key: COL_COMPANY_UID,
    parent_table: TABLE_COMPANY,
    parent_key: COL_UID,
    parent: &COMPANY_OWNERSHIP,
};

/// Normalizes a ticker to the stored upper-case form.
#[must_use]
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}
