use std::sync::Arc;

use chrono::NaiveDate;
use findata_core::control::{
    CompanyUpsertRequest,
    ListAnalystRatingsRequest,
    SearchCompaniesRequest,
    StockPriceHistoryRequest,
};
use findata_core::query::Predicate;
use findata_core::store::{RecordStore, SurrealRecordStore};
use findata_core::{AccessContext, ErrorCode, FindataControlPlane, RateLimitConfig, RateLimiter};
use findata_store::{AnalystRating, Company, StockPrice};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn build_store(db_name: &str) -> Arc<SurrealRecordStore<Db>> {
    let db = Surreal::new::<Mem>(())
        .await
        .expect("failed to create in-memory surrealdb instance");
    db.use_ns("findata")
        .use_db(db_name)
        .await
        .expect("failed to select surrealdb namespace/db");
    let store = SurrealRecordStore::new(db);
    store.ensure_schema().await.expect("failed to define indexes");
    Arc::new(store)
}

fn control_plane(store: Arc<SurrealRecordStore<Db>>) -> FindataControlPlane<SurrealRecordStore<Db>> {
    FindataControlPlane::with_store(store, RateLimiter::new(RateLimitConfig::disabled()), 4)
}

fn company(uid: &str, ticker: &str, owner_id: Option<&str>) -> Company {
    Company {
        uid: uid.to_string(),
        ticker: ticker.to_string(),
        name: format!("{ticker} Corp"),
        sector: "Industrials".to_string(),
        industry: "Machinery".to_string(),
        market_cap: Some(2.5e9),
        employees: Some(800),
        description: None,
        ceo: None,
        founded_year: None,
        country: "US".to_string(),
        currency: "USD".to_string(),
        owner_id: owner_id.map(str::to_string),
    }
}

fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
}

fn bar(uid: &str, company_uid: &str, date: &str, close: f64) -> StockPrice {
    StockPrice {
        uid: uid.to_string(),
        company_uid: company_uid.to_string(),
        date: day(date),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000,
    }
}

async fn seed_companies(store: &SurrealRecordStore<Db>) {
    for index in 0..7 {
        store
            .insert(company(&format!("c-{index}"), &format!("CO{index}"), None))
            .await
            .expect("insert public company");
    }
    store
        .insert(company("c-u1", "COU1", Some("u-1")))
        .await
        .expect("insert owned company");
    store
        .insert(company("c-u2", "COU2", Some("u-2")))
        .await
        .expect("insert owned company");
}

async fn walk_search(
    control: &FindataControlPlane<SurrealRecordStore<Db>>,
    access: &AccessContext,
    limit: i64,
) -> Vec<String> {
    let mut tickers = Vec::new();
    let mut cursor = None;
    loop {
        let envelope = control
            .search_companies(
                access,
                SearchCompaniesRequest {
                    query: "co".to_string(),
                    limit: Some(limit),
                    cursor: cursor.take(),
                },
            )
            .await;
        let page = envelope.data.expect("search page");
        tickers.extend(page.items.into_iter().map(|brief| brief.ticker));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    tickers
}

#[tokio::test]
async fn search_walks_every_visible_row_once() {
    let store = build_store("search").await;
    seed_companies(&store).await;
    let control = control_plane(store);

    let anonymous = walk_search(&control, &AccessContext::anonymous(), 3).await;
    assert_eq!(anonymous, ["CO0", "CO1", "CO2", "CO3", "CO4", "CO5", "CO6"]);

    let user = walk_search(&control, &AccessContext::user("u-1"), 4).await;
    assert_eq!(user.len(), 8);
    assert!(user.contains(&"COU1".to_string()));
    assert!(!user.contains(&"COU2".to_string()));

    let admin = walk_search(&control, &AccessContext::admin(None), 2).await;
    assert_eq!(admin.len(), 9);
}

#[tokio::test]
async fn price_history_follows_parent_visibility() {
    let store = build_store("prices").await;
    seed_companies(&store).await;
    for (index, (date, close)) in [("2024-03-01", 10.0), ("2024-03-04", 12.0), ("2024-03-05", 9.0)]
        .into_iter()
        .enumerate()
    {
        store
            .insert(bar(&format!("p-{index}"), "c-u1", date, close))
            .await
            .expect("insert bar");
    }
    let control = control_plane(store.clone());
    let request = || StockPriceHistoryRequest {
        ticker: "cou1".to_string(),
        start_date: "2024-03-02".to_string(),
        end_date: "2024-03-31".to_string(),
        limit: None,
        cursor: None,
    };

    let hidden = control
        .get_stock_price_history(&AccessContext::anonymous(), request())
        .await;
    assert_eq!(hidden.error_code(), Some(ErrorCode::NotFound));

    let owned = control
        .get_stock_price_history(&AccessContext::user("u-1"), request())
        .await
        .data
        .expect("history");
    assert_eq!(owned.prices.len(), 2);
    assert_eq!(owned.prices[1].daily_return, Some(-0.25));

    let anonymous_rows: Vec<StockPrice> = store
        .fetch(findata_core::query::BoundedQuery {
            table: "stock_price",
            predicate: AccessContext::anonymous()
                .visibility(&findata_store::schema::COMPANY_CHILD_OWNERSHIP)
                .into_predicate(),
            order: findata_core::query::OrderBy::asc("date"),
            limit: 10,
        })
        .await
        .expect("fetch bars");
    assert!(anonymous_rows.is_empty());
}

#[tokio::test]
async fn writes_enforce_ownership() {
    let store = build_store("writes").await;
    seed_companies(&store).await;
    store
        .insert(AnalystRating {
            uid: "r-1".to_string(),
            company_uid: "c-u1".to_string(),
            firm_name: "Northwind".to_string(),
            rating: "Buy".to_string(),
            previous_rating: None,
            price_target: Some(42.0),
            rating_date: day("2024-02-01"),
            notes: None,
        })
        .await
        .expect("insert rating");
    let control = control_plane(store.clone());
    let owner = AccessContext::user("u-1");
    let stranger = AccessContext::user("u-2");

    let forbidden = control.delete_company(&owner, "CO1").await;
    assert_eq!(forbidden.error_code(), Some(ErrorCode::Forbidden));
    let invisible = control.delete_company(&stranger, "COU1").await;
    assert_eq!(invisible.error_code(), Some(ErrorCode::NotFound));

    let updated = control
        .upsert_company(
            &owner,
            CompanyUpsertRequest {
                ticker: "COU1".to_string(),
                ceo: Some("Ada Park".to_string()),
                ..CompanyUpsertRequest::default()
            },
        )
        .await
        .data
        .expect("update own company");
    assert_eq!(updated.ceo.as_deref(), Some("Ada Park"));

    let untouched = store
        .update(company("c-0", "CO0", None), Predicate::eq("owner_id", "u-1"))
        .await
        .expect("scoped update");
    assert!(untouched.is_none());

    let deleted = control
        .delete_company(&owner, "COU1")
        .await
        .data
        .expect("delete own company");
    assert!(deleted.deleted);
    assert_eq!(deleted.dependent_rows, 1);

    let ratings = control
        .list_analyst_ratings(
            &AccessContext::admin(None),
            ListAnalystRatingsRequest {
                ticker: "COU1".to_string(),
                ..ListAnalystRatingsRequest::default()
            },
        )
        .await;
    assert_eq!(ratings.error_code(), Some(ErrorCode::NotFound));
}

#[tokio::test]
async fn tampered_cursors_are_rejected() {
    let store = build_store("cursors").await;
    seed_companies(&store).await;
    let control = control_plane(store);
    let access = AccessContext::anonymous();

    let first = control
        .search_companies(
            &access,
            SearchCompaniesRequest {
                query: "co".to_string(),
                limit: Some(2),
                cursor: None,
            },
        )
        .await
        .data
        .expect("first page");
    let mut cursor = first.next_cursor.expect("cursor");
    cursor.push('A');

    let rejected = control
        .search_companies(
            &access,
            SearchCompaniesRequest {
                query: "co".to_string(),
                limit: None,
                cursor: Some(cursor),
            },
        )
        .await;
    assert_eq!(rejected.error_code(), Some(ErrorCode::InvalidCursor));
}
