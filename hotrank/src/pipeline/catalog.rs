use serde_json::Value;

use crate::client::{RetryingFetcher, response_code, take_data};
use crate::error::FetchError;

/// URLs of the three endpoints a cycle talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub catalog: String,
    pub detail: String,
    pub online: String,
}

impl Endpoints {
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            catalog: format!("{base}/x/web-interface/popular"),
            detail: format!("{base}/x/web-interface/view"),
            online: format!("{base}/x/player/online/total"),
        }
    }
}

/// Fetches the first page of the popular list.
///
/// Any `code` other than 0 fails the fetch. A response without `data.list`
/// yields an empty list.
pub async fn fetch_catalog(
    fetcher: &RetryingFetcher,
    endpoints: &Endpoints,
    max_items: usize,
) -> Result<Vec<Value>, FetchError> {
    let params = [("pn", "1".to_string()), ("ps", max_items.to_string())];
    let mut body = fetcher.get_json(&endpoints.catalog, &params).await?;

    let code = response_code(&body);
    if code != Some(0) {
        let message = body
            .remove("message")
            .and_then(|m| m.as_str().map(str::to_string))
            .unwrap_or_default();
        return Err(FetchError::Api {
            code: code.unwrap_or(-1),
            message,
        });
    }

    let mut data = take_data(body);
    match data.remove("list") {
        Some(Value::Array(list)) => Ok(list),
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(FetchError::Shape("data.list is not a list".to_string())),
    }
}
