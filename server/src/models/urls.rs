use crudgen_sdk::{ApiRequest, ModelDefinition};
use serde_json::json;

/// Placeholder domains reserved by RFC 2606 are not worth fetching.
const RESERVED_HOSTS: &[&str] = &["example.com", "example.net", "example.org"];

fn check_url(req: &ApiRequest) -> Option<String> {
    let raw = req.body.as_ref()?.get("url")?.as_str()?;
    let parsed = match url::Url::parse(raw) {
        Ok(u) => u,
        Err(e) => return Some(format!("url is not valid: {}", e)),
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return Some("url must use http or https".into());
    }
    let host = parsed.host_str().unwrap_or_default();
    RESERVED_HOSTS
        .iter()
        .any(|r| host == *r || host.ends_with(&format!(".{}", r)))
        .then(|| format!("url host '{}' is reserved", host))
}

pub fn definition() -> ModelDefinition {
    ModelDefinition::new(
        "urls",
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "minLength": 1},
                "title": {"type": "string"},
                "created_at": {"type": "string", "format": "date-time", "x-meta": {"writable": false}},
                "updated_at": {"type": "string", "format": "date-time", "x-meta": {"writable": false}}
            },
            "required": ["url"],
            "additionalProperties": false
        }),
    )
    .unique(&["url"])
    .check(check_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_url(u: &str) -> ApiRequest {
        ApiRequest::new().with_body(json!({ "url": u }))
    }

    #[test]
    fn rejects_reserved_and_malformed_urls() {
        assert!(check_url(&with_url("https://x.example?u=1")).is_none());
        assert!(check_url(&with_url("https://www.example.com/a")).is_some());
        assert!(check_url(&with_url("ftp://files.test")).is_some());
        assert!(check_url(&with_url("foobar")).is_some());
        assert!(check_url(&ApiRequest::new()).is_none());
    }
}
