use std::collections::HashMap;

use chrono::NaiveDate;
use findata_store::AnalystRating;
use findata_store::schema::{COL_COMPANY_UID, COL_RATING_DATE};
use serde::{Deserialize, Serialize};

use super::{
    AGGREGATE_ROW_CEILING,
    FindataControlPlane,
    OP_GET_ANALYST_CONSENSUS,
    OP_LIST_ANALYST_RATINGS,
};
use crate::access::AccessContext;
use crate::envelope::{Payload, ToolEnvelope};
use crate::error::CoreResult;
use crate::metrics::{PRICE_PLACES, round_to};
use crate::pagination::{Page, PageRequest};
use crate::query::{OrderBy, Predicate};
use crate::services::Session;
use crate::store::RecordStore;

/// Number of latest ratings included in a consensus.
pub const RECENT_RATINGS: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAnalystRatingsRequest {
    pub ticker: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingCount {
    pub rating: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystRatingRow {
    pub firm_name: String,
    pub rating: String,
    pub previous_rating: Option<String>,
    pub price_target: Option<f64>,
    pub rating_date: NaiveDate,
    pub notes: Option<String>,
}

impl From<AnalystRating> for AnalystRatingRow {
    fn from(rating: AnalystRating) -> Self {
        Self {
            firm_name: rating.firm_name,
            rating: rating.rating,
            previous_rating: rating.previous_rating,
            price_target: rating.price_target,
            rating_date: rating.rating_date,
            notes: rating.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystConsensus {
    pub ticker: String,
    pub total_ratings: usize,
    /// Most frequent rating first.
    pub rating_counts: Vec<RatingCount>,
    pub average_price_target: Option<f64>,
    /// Newest first.
    pub recent_ratings: Vec<AnalystRatingRow>,
}

impl Payload for AnalystConsensus {
    fn row_count(&self) -> Option<usize> {
        Some(self.total_ratings)
    }
}

impl<S: RecordStore> FindataControlPlane<S> {
    pub async fn get_analyst_consensus(
        &self,
        access: &AccessContext,
        ticker: &str,
    ) -> ToolEnvelope<AnalystConsensus> {
        self.guard
            .invoke(OP_GET_ANALYST_CONSENSUS, access, |session| async move {
                self.analyst_consensus_in(&session, ticker).await
            })
            .await
    }

    /// Ratings for one company, newest first.
    pub async fn list_analyst_ratings(
        &self,
        access: &AccessContext,
        request: ListAnalystRatingsRequest,
    ) -> ToolEnvelope<Page<AnalystRatingRow>> {
        self.guard
            .invoke(OP_LIST_ANALYST_RATINGS, access, |session| async move {
                let company = self.resolve_company(&session, &request.ticker).await?;
                let page = self
                    .executor
                    .page::<AnalystRating, S>(
                        &session,
                        PageRequest::new(OP_LIST_ANALYST_RATINGS, OrderBy::desc(COL_RATING_DATE))
                            .with_filter(Predicate::eq(COL_COMPANY_UID, company.uid.as_str()))
                            .with_cursor(request.cursor)
                            .with_limit(request.limit),
                    )
                    .await?;
                Ok(page.map(AnalystRatingRow::from))
            })
            .await
    }

    async fn analyst_consensus_in(
        &self,
        session: &Session<S>,
        ticker: &str,
    ) -> CoreResult<AnalystConsensus> {
        let company = self.resolve_company(session, ticker).await?;
        let ratings: Vec<AnalystRating> = self
            .executor
            .collect(
                session,
                Predicate::eq(COL_COMPANY_UID, company.uid.as_str()),
                OrderBy::desc(COL_RATING_DATE),
                AGGREGATE_ROW_CEILING,
            )
            .await?;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for rating in &ratings {
            *counts.entry(rating.rating.as_str()).or_default() += 1;
        }
        let mut rating_counts: Vec<RatingCount> = counts
            .into_iter()
            .map(|(rating, count)| RatingCount {
                rating: rating.to_string(),
                count,
            })
            .collect();
        rating_counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.rating.cmp(&b.rating)));

        let targets: Vec<f64> = ratings.iter().filter_map(|r| r.price_target).collect();
        #[allow(clippy::cast_precision_loss)]
        let average_price_target = (!targets.is_empty()).then(|| {
            round_to(targets.iter().sum::<f64>() / targets.len() as f64, PRICE_PLACES)
        });

        let total_ratings = ratings.len();
        let recent_ratings = ratings
            .into_iter()
            .take(RECENT_RATINGS)
            .map(AnalystRatingRow::from)
            .collect();
        Ok(AnalystConsensus {
            ticker: company.ticker,
            total_ratings,
            rating_counts,
            average_price_target,
            recent_ratings,
        })
    }
}
