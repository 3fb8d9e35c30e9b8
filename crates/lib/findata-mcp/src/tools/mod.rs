//! MCP tool modules.
//!
//! Tools are grouped by domain: company lookup and maintenance, financial
//! reports, market prices, and analyst coverage.

mod analysts;
mod companies;
mod financials;
mod market;
