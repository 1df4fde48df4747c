use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

use super::catalog::Endpoints;
use super::helpers::{
    display_text, first_integer, first_non_empty_str, first_object, format_unix_time, safe_int,
};
use crate::client::{RetryingFetcher, response_code, take_data};
use crate::error::{EnrichError, FetchError};
use crate::models::{CatalogEntry, EnrichedItem};

/// Turns a catalog entry into a full [`EnrichedItem`] with a detail lookup
/// and, when a `cid` is known, a live viewer lookup.
///
/// Each network call holds a permit of the shared semaphore, so at most
/// `max_concurrency` requests are in flight regardless of how many entries
/// are being enriched.
pub struct ItemEnricher {
    fetcher: Arc<RetryingFetcher>,
    endpoints: Endpoints,
    gate: Semaphore,
}

impl ItemEnricher {
    pub fn new(fetcher: Arc<RetryingFetcher>, endpoints: Endpoints, max_concurrency: usize) -> Self {
        Self {
            fetcher,
            endpoints,
            gate: Semaphore::new(max_concurrency.clamp(1, Semaphore::MAX_PERMITS)),
        }
    }

    pub async fn enrich(&self, entry: &CatalogEntry) -> Result<EnrichedItem, EnrichError> {
        let bvid = entry.bvid().ok_or(EnrichError::MissingIdentifier)?;

        let detail = {
            let _permit = self.permit().await?;
            self.fetcher
                .get_json(&self.endpoints.detail, &[("bvid", bvid.to_string())])
                .await
                .map_err(|source| fetch_failed(bvid, source))?
        };
        if response_code(&detail) != Some(0) {
            tracing::debug!(
                "Detail for {} returned code {:?}, using list fields",
                bvid,
                response_code(&detail)
            );
        }
        let detail = take_data(detail);

        let cid = safe_int(detail.get("cid"))
            .or_else(|| safe_int(entry.field("cid")))
            .filter(|cid| *cid > 0);

        let (online_total, online_count) = match cid {
            Some(cid) => self.fetch_online(bvid, cid).await?,
            None => (None, None),
        };

        Ok(compose(bvid, entry, &detail, online_total, online_count))
    }

    /// Live viewer text and count. A delivered non-zero `code` means the
    /// video has no online data, which is not an error.
    async fn fetch_online(
        &self,
        bvid: &str,
        cid: i64,
    ) -> Result<(Option<String>, Option<i64>), EnrichError> {
        let body = {
            let _permit = self.permit().await?;
            self.fetcher
                .get_json(
                    &self.endpoints.online,
                    &[("bvid", bvid.to_string()), ("cid", cid.to_string())],
                )
                .await
                .map_err(|source| fetch_failed(bvid, source))?
        };

        let code = response_code(&body);
        if code != Some(0) {
            tracing::debug!("No online data for {} (code {:?})", bvid, code);
            return Ok((None, None));
        }

        let data = take_data(body);
        Ok((display_text(data.get("total")), safe_int(data.get("count"))))
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, EnrichError> {
        self.gate.acquire().await.map_err(|_| EnrichError::Closed)
    }
}

fn fetch_failed(bvid: &str, source: FetchError) -> EnrichError {
    EnrichError::Fetch {
        bvid: bvid.to_string(),
        source,
    }
}

/// Resolves each field from the detail response first, then the list entry,
/// then a default.
fn compose(
    bvid: &str,
    entry: &CatalogEntry,
    detail: &Map<String, Value>,
    online_total: Option<String>,
    online_count: Option<i64>,
) -> EnrichedItem {
    let title = first_non_empty_str(&[detail.get("title"), entry.field("title")])
        .map(str::to_string)
        .unwrap_or_else(|| format!("(untitled) {bvid}"));

    let pic = first_non_empty_str(&[detail.get("pic"), entry.field("pic")])
        .unwrap_or_default()
        .to_string();

    let owner = first_object(&[detail.get("owner"), entry.field("owner")])
        .map(|owner| Value::Object(owner.clone()));

    let stat = first_object(&[detail.get("stat"), entry.field("stat")]);
    let view = stat.and_then(|s| safe_int(s.get("view")));
    let danmaku = stat.and_then(|s| safe_int(s.get("danmaku")));

    let pubdate = first_integer(&[detail.get("pubdate"), entry.field("pubdate")]).unwrap_or(0);

    EnrichedItem {
        bvid: bvid.to_string(),
        title,
        pic,
        owner,
        online_total,
        online_count,
        view,
        danmaku,
        pubdate: format_unix_time(pubdate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::rate_limit::RateLimiter;
    use crate::testing::{FakeTransport, Reply};
    use serde_json::json;

    const BASE: &str = "https://api.test";

    fn enricher(transport: Arc<FakeTransport>) -> ItemEnricher {
        let fetcher = RetryingFetcher::new(
            transport,
            Arc::new(RateLimiter::unlimited()),
            RetryPolicy::default(),
        );
        ItemEnricher::new(Arc::new(fetcher), Endpoints::from_base(BASE), 2)
    }

    fn entry(value: Value) -> CatalogEntry {
        CatalogEntry::from_value(value).unwrap()
    }

    fn detail_url() -> String {
        format!("{BASE}/x/web-interface/view")
    }

    fn online_url() -> String {
        format!("{BASE}/x/player/online/total")
    }

    #[test]
    fn test_gate_is_capped_at_semaphore_limit() {
        let fetcher = RetryingFetcher::new(
            Arc::new(FakeTransport::new()),
            Arc::new(RateLimiter::unlimited()),
            RetryPolicy::default(),
        );
        let enricher = ItemEnricher::new(Arc::new(fetcher), Endpoints::from_base(BASE), usize::MAX);
        assert_eq!(enricher.gate.available_permits(), Semaphore::MAX_PERMITS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_bvid_makes_no_requests() {
        let transport = Arc::new(FakeTransport::new());
        let err = enricher(transport.clone())
            .enrich(&entry(json!({"title": "orphan"})))
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichError::MissingIdentifier));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_enrichment() {
        let transport = Arc::new(FakeTransport::new());
        transport.route(
            &detail_url(),
            &[("bvid", "BV1")],
            vec![Reply::Json(json!({
                "code": 0,
                "data": {
                    "cid": 1001,
                    "title": "Detail title",
                    "pic": "https://i0.hdslb.com/a.jpg",
                    "owner": {"mid": 9, "name": "up"},
                    "stat": {"view": 12345, "danmaku": "67"},
                    "pubdate": 1770641792
                }
            }))],
        );
        transport.route(
            &online_url(),
            &[("bvid", "BV1"), ("cid", "1001")],
            vec![Reply::Json(json!({
                "code": 0,
                "data": {"total": "1.7万+", "count": "17000"}
            }))],
        );

        let item = enricher(transport)
            .enrich(&entry(json!({"bvid": "BV1", "title": "List title"})))
            .await
            .unwrap();

        assert_eq!(item.bvid, "BV1");
        assert_eq!(item.title, "Detail title");
        assert_eq!(item.pic, "https://i0.hdslb.com/a.jpg");
        assert_eq!(item.owner, Some(json!({"mid": 9, "name": "up"})));
        assert_eq!(item.view, Some(12345));
        assert_eq!(item.danmaku, Some(67));
        assert_eq!(item.online_total.as_deref(), Some("1.7万+"));
        assert_eq!(item.online_count, Some(17000));
        assert_eq!(item.pubdate, "2026-02-09 20:56:32");
    }

    #[tokio::test(start_paused = true)]
    async fn test_online_error_code_leaves_online_fields_null() {
        let transport = Arc::new(FakeTransport::new());
        transport.route(
            &detail_url(),
            &[("bvid", "BV2")],
            vec![Reply::Json(json!({
                "code": 0,
                "data": {"cid": 55, "title": "T", "stat": {"view": 10, "danmaku": 2}}
            }))],
        );
        transport.route(
            &online_url(),
            &[("bvid", "BV2"), ("cid", "55")],
            vec![Reply::Json(json!({"code": -404, "message": "not found"}))],
        );

        let item = enricher(transport.clone())
            .enrich(&entry(json!({"bvid": "BV2"})))
            .await
            .unwrap();

        assert_eq!(item.online_total, None);
        assert_eq!(item.online_count, None);
        assert_eq!(item.view, Some(10));
        assert_eq!(item.danmaku, Some(2));
        assert_eq!(item.title, "T");
        // No retries for a delivered error code
        assert_eq!(transport.calls_to(&online_url()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_list_fields() {
        let transport = Arc::new(FakeTransport::new());
        transport.route(
            &detail_url(),
            &[("bvid", "BV3")],
            vec![Reply::Json(json!({"code": -400, "data": null}))],
        );
        transport.route(
            &online_url(),
            &[("bvid", "BV3"), ("cid", "77")],
            vec![Reply::Json(json!({"code": 0, "data": {"total": 1000, "count": 1000}}))],
        );

        let item = enricher(transport)
            .enrich(&entry(json!({
                "bvid": "BV3",
                "cid": 77,
                "title": "From list",
                "pic": "https://i0.hdslb.com/b.jpg",
                "owner": {"mid": 3},
                "stat": {"view": "900", "danmaku": 4.0},
                "pubdate": 0
            })))
            .await
            .unwrap();

        assert_eq!(item.title, "From list");
        assert_eq!(item.pic, "https://i0.hdslb.com/b.jpg");
        assert_eq!(item.owner, Some(json!({"mid": 3})));
        assert_eq!(item.view, Some(900));
        assert_eq!(item.danmaku, Some(4));
        assert_eq!(item.online_total.as_deref(), Some("1000"));
        assert_eq!(item.online_count, Some(1000));
        assert_eq!(item.pubdate, "1970-01-01 08:00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_defaults_without_cid() {
        let transport = Arc::new(FakeTransport::new());
        transport.route(
            &detail_url(),
            &[("bvid", "BV4")],
            vec![Reply::Json(json!({"code": 0, "data": {"title": ""}}))],
        );

        let item = enricher(transport.clone())
            .enrich(&entry(json!({"bvid": "BV4", "owner": "not an object"})))
            .await
            .unwrap();

        assert_eq!(item.title, "(untitled) BV4");
        assert_eq!(item.pic, "");
        assert_eq!(item.owner, None);
        assert_eq!(item.view, None);
        assert_eq!(item.danmaku, None);
        assert_eq!(item.online_count, None);
        assert_eq!(item.pubdate, "1970-01-01 08:00:00");
        assert_eq!(transport.calls_to(&online_url()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detail_exhaustion_fails_item() {
        let transport = Arc::new(FakeTransport::new());
        transport.route(&detail_url(), &[("bvid", "BV5")], vec![Reply::Status(500)]);

        let err = enricher(transport.clone())
            .enrich(&entry(json!({"bvid": "BV5", "cid": 1, "title": "x"})))
            .await
            .unwrap_err();

        match err {
            EnrichError::Fetch { bvid, source } => {
                assert_eq!(bvid, "BV5");
                assert!(matches!(source, FetchError::Exhausted { attempts: 3, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.calls_to(&detail_url()), 3);
        assert_eq!(transport.calls_to(&online_url()), 0);
    }
}
