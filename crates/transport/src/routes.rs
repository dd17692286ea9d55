//! Idempotent registration of inbound routing rules.
//!
//! A route maps a recipient pattern (`reply-{ID}@example.com`) to a forward
//! action towards a callback URL. Registration first lists the existing
//! routes and reuses a matching one, creating a new route only when none
//! exists. The remote API has no conditional create, so two processes
//! registering the same pattern at the same time may both create a route.

use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, info};

use crate::{transport::checked_text, MailgunTransport, TransportError, TransportResult};

/// Placeholder replaced by a capturing group in route patterns.
pub const ID_PLACEHOLDER: &str = "{ID}";

/// Maximum number of routes fetched when looking for an existing one.
pub const ROUTES_LIMIT: u32 = 1000;

/// A routing rule as returned by the Mailgun API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RouteRule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expression: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// Reads an explicit JSON `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RouteRule {
    /// Tests whether this rule has exactly `expression` and forwards first
    /// to `action`.
    pub fn matches(&self, expression: &str, action: &str) -> bool {
        self.expression == expression && self.actions.first().map(String::as_str) == Some(action)
    }
}

#[derive(Debug, Deserialize)]
struct RouteList {
    #[serde(default, deserialize_with = "null_as_default")]
    items: Vec<RouteRule>,
}

#[derive(Debug, Deserialize)]
struct CreatedRoute {
    route: Option<RouteRule>,
}

#[derive(Debug, Serialize)]
struct NewRoute<'a> {
    expression: &'a str,
    action: [&'a str; 2],
    description: &'a str,
}

/// Translates a recipient pattern into an anchored regular expression.
///
/// The metacharacters `+`, `-` and `.` are escaped and the first `{ID}`
/// placeholder becomes a `(\w+)` capturing group.
///
/// ```rust
/// assert_eq!(
///     mailgun_transport::pattern_to_regex("reply-{ID}@test.com"),
///     r"^reply\-(\w+)@test\.com$"
/// );
/// ```
pub fn pattern_to_regex(pattern: &str) -> String {
    let escaped = pattern
        .replace('+', "\\+")
        .replace('-', "\\-")
        .replace('.', "\\.")
        .replacen(ID_PLACEHOLDER, "(\\w+)", 1);
    format!("^{escaped}$")
}

/// Builds the `match_recipient(...)` route expression for a pattern.
pub fn pattern_to_expression(pattern: &str) -> String {
    format!("match_recipient(\"{}\")", pattern_to_regex(pattern))
}

/// Builds the `forward(...)` route action for a callback URL.
pub fn forward_action(callback_url: &str) -> String {
    format!("forward(\"{callback_url}\")")
}

/// Returns the id of the first route matching `expression` and `action`.
pub fn find_route<'a>(
    routes: &'a [RouteRule],
    expression: &str,
    action: &str,
) -> Option<&'a str> {
    routes
        .iter()
        .find(|route| route.matches(expression, action))
        .map(|route| route.id.as_str())
}

fn require(value: &str, field: &str) -> TransportResult<()> {
    if value.is_empty() {
        return Err(TransportError::Validation(format!("'{field}' is required")));
    }
    Ok(())
}

impl MailgunTransport {
    /// Ensures a route forwarding recipients matching `pattern` to
    /// `callback_url` exists, returning its id.
    ///
    /// All arguments must be non-empty, the first missing one is reported as
    /// [`TransportError::Validation`] without any request being made. An
    /// existing route with the same expression and first action is reused
    /// (the first one listed wins), otherwise a new route ending with
    /// `stop()` is created.
    pub async fn register_email_pattern(
        &self,
        pattern: &str,
        callback_url: &str,
        description: &str,
    ) -> TransportResult<String> {
        require(pattern, "pattern")?;
        require(callback_url, "callbackUrl")?;
        require(description, "description")?;

        let expression = pattern_to_expression(pattern);
        let action = forward_action(callback_url);
        let url = format!("{}/routes", self.config().api_base());

        let routes = self.list_routes(&url).await?;
        if let Some(id) = find_route(&routes, &expression, &action) {
            debug!(
                id = %id,
                expression = %expression,
                action = %action,
                "Using existing route on the Mailgun server"
            );
            return Ok(id.to_string());
        }

        debug!(
            expression = %expression,
            action = %action,
            "Registering new route on the Mailgun server"
        );
        let body = NewRoute {
            expression: expression.as_str(),
            action: [action.as_str(), "stop()"],
            description,
        };
        let response = self.request(Method::POST, &url).json(&body).send().await;
        let text = checked_text(response).await.inspect_err(|e| {
            error!(url = %url, error = %e, "Failed to create route");
        })?;

        let id = serde_json::from_str::<CreatedRoute>(&text)
            .ok()
            .and_then(|created| created.route)
            .map(|route| route.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TransportError::Response("missing 'route.id'".to_string()))?;

        info!(id = %id, expression = %expression, "Registered route");
        Ok(id)
    }

    async fn list_routes(&self, url: &str) -> TransportResult<Vec<RouteRule>> {
        let response = self
            .request(Method::GET, url)
            .query(&[("limit", ROUTES_LIMIT)])
            .send()
            .await;
        let text = checked_text(response).await.inspect_err(|e| {
            error!(url = %url, error = %e, "Failed to list routes");
        })?;
        let list: RouteList = serde_json::from_str(&text)
            .map_err(|e| TransportError::Response(format!("invalid route list: {e}")))?;
        Ok(list.items)
    }
}

#[cfg(test)]
mod tests {
    use regex::Regex;
    use serde_json::json;
    use wiremock::{
        matchers::{basic_auth, body_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::TransportConfig;

    const URL: &str = "https://app.example.com/inbound";

    fn transport(server: &MockServer) -> MailgunTransport {
        MailgunTransport::new(TransportConfig::new("key").with_base_url(server.uri()))
    }

    fn recipient_regex(pattern: &str) -> Regex {
        Regex::new(&pattern_to_regex(pattern)).unwrap()
    }

    #[test]
    fn test_pattern_to_expression() {
        assert_eq!(
            pattern_to_expression("reply-{ID}@test.com"),
            r#"match_recipient("^reply\-(\w+)@test\.com$")"#
        );
        assert_eq!(forward_action(URL), r#"forward("https://app.example.com/inbound")"#);
    }

    #[test]
    fn test_pattern_regex_matching() {
        let regex = recipient_regex("reply-{ID}@test.com");
        assert!(regex.is_match("reply-42@test.com"));
        assert!(regex.is_match("reply-abc_1@test.com"));
        assert!(!regex.is_match("reply-@test.com"));
        assert!(!regex.is_match("replyXID@test.com"));
        assert!(!regex.is_match("reply-42@testXcom"));
        assert!(!regex.is_match("xreply-42@test.com"));
    }

    #[test]
    fn test_pattern_plus_is_literal() {
        let regex = recipient_regex("bot+{ID}@test.com");
        assert!(regex.is_match("bot+7@test.com"));
        assert!(!regex.is_match("bottt7@test.com"));
    }

    #[test]
    fn test_pattern_only_first_placeholder() {
        assert_eq!(pattern_to_regex("{ID}-{ID}"), r"^(\w+)\-{ID}$");
    }

    #[test]
    fn test_find_route_first_wins() {
        let routes = vec![
            RouteRule {
                id: "a".to_string(),
                expression: "e".to_string(),
                actions: vec!["other".to_string()],
                ..Default::default()
            },
            RouteRule {
                id: "b".to_string(),
                expression: "e".to_string(),
                actions: vec!["f".to_string(), "stop()".to_string()],
                ..Default::default()
            },
            RouteRule {
                id: "c".to_string(),
                expression: "e".to_string(),
                actions: vec!["f".to_string()],
                ..Default::default()
            },
            RouteRule {
                id: "d".to_string(),
                expression: "e".to_string(),
                actions: vec![],
                ..Default::default()
            },
        ];
        assert_eq!(find_route(&routes, "e", "f"), Some("b"));
        assert_eq!(find_route(&routes, "e", "g"), None);
        assert_eq!(find_route(&[], "e", "f"), None);
    }

    #[tokio::test]
    async fn test_register_creates_route() {
        let server = MockServer::start().await;
        let expression = pattern_to_expression("reply-{ID}@test.com");
        let action = forward_action(URL);

        Mock::given(method("GET"))
            .and(path("/routes"))
            .and(query_param("limit", "1000"))
            .and(basic_auth("api", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/routes"))
            .and(basic_auth("api", "key"))
            .and(body_json(json!({
                "expression": expression,
                "action": [action, "stop()"],
                "description": "Replies"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Route has been created",
                "route": {"id": "route-1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = transport(&server)
            .register_email_pattern("reply-{ID}@test.com", URL, "Replies")
            .await
            .unwrap();

        assert_eq!(id, "route-1");
    }

    #[tokio::test]
    async fn test_register_reuses_existing_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/routes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 2,
                "items": [
                    {"id": "other", "expression": "catch_all()", "actions": ["stop()"]},
                    {
                        "id": "route-1",
                        "expression": pattern_to_expression("reply-{ID}@test.com"),
                        "actions": [forward_action(URL), "stop()"],
                        "description": "Replies"
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let id = transport(&server)
            .register_email_pattern("reply-{ID}@test.com", URL, "Replies")
            .await
            .unwrap();

        assert_eq!(id, "route-1");
    }

    #[test]
    fn test_route_rule_null_fields() {
        let rule: RouteRule = serde_json::from_value(json!({
            "id": "route-1",
            "expression": null,
            "actions": null,
            "description": null
        }))
        .unwrap();

        assert_eq!(rule.id, "route-1");
        assert_eq!(rule.expression, "");
        assert!(rule.actions.is_empty());
        assert!(!rule.matches("catch_all()", "stop()"));
    }

    #[tokio::test]
    async fn test_register_skips_routes_with_null_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/routes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "legacy", "expression": "catch_all()", "actions": null, "description": null},
                    {
                        "id": "route-1",
                        "expression": pattern_to_expression("reply-{ID}@test.com"),
                        "actions": [forward_action(URL), "stop()"],
                        "description": null
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let id = transport(&server)
            .register_email_pattern("reply-{ID}@test.com", URL, "Replies")
            .await
            .unwrap();

        assert_eq!(id, "route-1");
    }

    #[tokio::test]
    async fn test_register_validation_skips_requests() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let transport = transport(&server);

        let error = transport.register_email_pattern("", "", "").await.unwrap_err();
        assert_eq!(error.to_string(), "'pattern' is required");

        let error = transport.register_email_pattern("p", "", "d").await.unwrap_err();
        assert_eq!(error.to_string(), "'callbackUrl' is required");

        let error = transport.register_email_pattern("p", URL, "").await.unwrap_err();
        assert!(matches!(error, TransportError::Validation(_)));
        assert_eq!(error.to_string(), "'description' is required");
    }

    #[tokio::test]
    async fn test_register_list_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let error = transport(&server)
            .register_email_pattern("reply-{ID}@test.com", URL, "Replies")
            .await
            .unwrap_err();

        assert_eq!(error.status_code(), Some(401));
        assert_eq!(error.to_string(), "Forbidden");
    }

    #[tokio::test]
    async fn test_register_create_without_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .mount(&server)
            .await;

        let error = transport(&server)
            .register_email_pattern("reply-{ID}@test.com", URL, "Replies")
            .await
            .unwrap_err();

        assert!(matches!(error, TransportError::Response(_)));
    }
}
