//! HTTP backend for loading tests and submitting results.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use testiki_core::model::TestSummary;
use testiki_core::parser::test_from_value;
use testiki_core::traits::{Ack, ResultSink, Session, Submission, TestSource};
use testiki_core::{Test, TestError};

use crate::config::ClientConfig;
use crate::error::{from_status, from_transport};

/// Client for the testiki REST backend.
///
/// Serves as both [`TestSource`] (`GET /tests`, `GET /tests/{slug}`) and
/// [`ResultSink`] (`POST /test-result`).
pub struct ApiClient {
    base_url: reqwest::Url,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

        let base_url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| anyhow::anyhow!("invalid base_url {}: {e}", config.base_url))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "invalid base_url {}: cannot carry a path",
            config.base_url
        );

        Ok(Self {
            base_url,
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL extended with `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json(&self, url: reqwest::Url, subject: &str) -> Result<Value, TestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| from_transport(&e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(from_status(status, &body, subject));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TestError::Malformed(format!("undecodable response: {e}")))
    }
}

#[derive(Deserialize)]
struct ListEntry {
    #[serde(default)]
    slug: Option<String>,
    #[serde(default, alias = "ID")]
    id: Option<Value>,
    #[serde(default, alias = "name")]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    questions: Option<Vec<Value>>,
}

impl ListEntry {
    fn into_summary(self) -> Option<TestSummary> {
        let id = self.slug.filter(|s| !s.is_empty()).or_else(|| match self.id? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })?;
        Some(TestSummary {
            id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            category: self.category,
            question_count: self.questions.map(|q| q.len()),
        })
    }
}

#[async_trait]
impl TestSource for ApiClient {
    fn name(&self) -> &str {
        "api"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn load(&self, id: &str) -> Result<Test, TestError> {
        let mut body = self.get_json(self.endpoint(&["tests", id]), id).await?;
        let test = match body.get_mut("test").map(Value::take) {
            None | Some(Value::Null) => return Err(TestError::NotFound(id.to_string())),
            Some(test) => test,
        };
        let test = test_from_value(test)?;
        tracing::debug!(test = %test.id, questions = test.questions.len(), "test loaded");
        Ok(test)
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn list(&self) -> Result<Vec<TestSummary>, TestError> {
        let mut body = self.get_json(self.endpoint(&["tests"]), "tests").await?;
        let entries: Vec<ListEntry> = match body.get_mut("tests").map(Value::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(list) => serde_json::from_value(list)
                .map_err(|e| TestError::Malformed(format!("invalid test list: {e}")))?,
        };

        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.into_summary() {
                Some(summary) => summaries.push(summary),
                None => tracing::warn!("skipping test list entry without slug or id"),
            }
        }
        Ok(summaries)
    }
}

#[async_trait]
impl ResultSink for ApiClient {
    fn name(&self) -> &str {
        "api"
    }

    #[instrument(skip(self, session, submission), fields(test = %submission.test_slug, score = submission.score))]
    async fn submit(&self, session: &Session, submission: &Submission) -> Result<Ack, TestError> {
        let Some(token) = session.token() else {
            return Err(TestError::Unauthorized("not signed in".into()));
        };

        let response = self
            .client
            .post(self.endpoint(&["test-result"]))
            .bearer_auth(token)
            .json(submission)
            .send()
            .await
            .map_err(|e| from_transport(&e, self.timeout_secs))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(from_status(status, &body, &submission.test_slug));
        }

        // Acknowledgement bodies vary between backend versions.
        let ack = serde_json::from_str::<Value>(&body)
            .map(|value| parse_ack(&value))
            .unwrap_or_default();
        tracing::info!(result_id = ?ack.result_id, "result submitted");
        Ok(ack)
    }
}

fn parse_ack(value: &Value) -> Ack {
    let result_id = ["result_id", "id"]
        .iter()
        .find_map(|key| value.get(*key))
        .or_else(|| value.get("result").and_then(|r| r.get("id")))
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ack { result_id, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testiki_core::model::Answers;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: String) -> ApiClient {
        let config = ClientConfig {
            base_url: uri,
            timeout_secs: 2,
            ..Default::default()
        };
        ApiClient::new(&config).unwrap()
    }

    fn test_body() -> Value {
        serde_json::json!({
            "test": {
                "id": 7,
                "slug": "logic",
                "name": "Logic",
                "description": "Short logic quiz",
                "questions": [
                    {"id": 1, "question": "2 + 2?", "options": ["3", "4"], "correct": 1},
                    {"id": 2, "question": "Odd one out?", "options": ["1", "2", "3"], "correct": 1}
                ],
                "scoring_method": {"type": "correct_answer"},
                "scoring_rules": "{\"scoring\":{\"ranges\":[{\"min\":0,\"max\":49,\"text\":\"Keep going\"},{\"min\":50,\"max\":100,\"text\":\"Sharp\"}]}}"
            }
        })
    }

    fn submission() -> Submission {
        let mut answers = Answers::new();
        answers.insert("1".into(), 1);
        Submission {
            test_slug: "logic".into(),
            test_name: "Logic".into(),
            score: 100,
            result_text: "Sharp".into(),
            answers,
        }
    }

    #[tokio::test]
    async fn load_test_by_slug() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tests/logic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_body()))
            .mount(&server)
            .await;

        let test = client(server.uri()).load("logic").await.unwrap();
        assert_eq!(test.id, "logic");
        assert_eq!(test.title, "Logic");
        assert_eq!(test.questions.len(), 2);
        assert_eq!(test.questions[0].id, "1");
        assert_eq!(test.scoring_rules.ranges.len(), 2);
    }

    #[tokio::test]
    async fn missing_test_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tests/nope"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "Test not found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tests/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"test": null})))
            .mount(&server)
            .await;

        let api = client(server.uri());
        assert!(matches!(api.load("nope").await, Err(TestError::NotFound(id)) if id == "nope"));
        assert!(matches!(api.load("empty").await, Err(TestError::NotFound(_))));
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tests/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tests/norules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "test": {"slug": "norules", "name": "x", "questions": [{"id": 1, "question": "?", "options": ["a"]}]}
            })))
            .mount(&server)
            .await;

        let api = client(server.uri());
        assert!(matches!(api.load("broken").await, Err(TestError::Malformed(_))));
        assert!(matches!(api.load("norules").await, Err(TestError::Malformed(_))));
    }

    #[tokio::test]
    async fn server_error_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tests/logic"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let err = client(server.uri()).load("logic").await.unwrap_err();
        assert!(matches!(err, TestError::Unreachable(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn connection_refused_is_unreachable() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let err = client(format!("http://127.0.0.1:{port}"))
            .load("logic")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tests/logic"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(test_body())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = ClientConfig {
            base_url: server.uri(),
            timeout_secs: 1,
            ..Default::default()
        };
        let err = ApiClient::new(&config)
            .unwrap()
            .load("logic")
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Unreachable(ref m) if m.contains("timed out after 1s")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn slug_is_a_single_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tests/logic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_body()))
            .mount(&server)
            .await;

        let api = client(server.uri());
        for id in ["logic?draft=1", "logic#frag", "logic/../logic", "other/../logic"] {
            assert!(
                matches!(api.load(id).await, Err(TestError::NotFound(ref got)) if got == id),
                "{id} resolved to another test"
            );
        }
        assert_eq!(api.load("logic").await.unwrap().id, "logic");
    }

    #[test]
    fn base_url_path_is_kept() {
        let config = ClientConfig {
            base_url: "http://localhost:8080/api/".into(),
            ..Default::default()
        };
        let api = ApiClient::new(&config).unwrap();
        assert_eq!(
            api.endpoint(&["tests", "a b"]).as_str(),
            "http://localhost:8080/api/tests/a%20b"
        );

        let bad = ClientConfig {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(ApiClient::new(&bad).is_err());
    }

    #[tokio::test]
    async fn list_tests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tests": [
                    {"slug": "logic", "name": "Logic", "description": "Quiz", "category": "iq"},
                    {"ID": 3, "name": "Untitled"},
                    {"name": "No id at all"}
                ]
            })))
            .mount(&server)
            .await;

        let tests = client(server.uri()).list().await.unwrap();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].id, "logic");
        assert_eq!(tests[0].category.as_deref(), Some("iq"));
        assert_eq!(tests[1].id, "3");
    }

    #[tokio::test]
    async fn submit_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-result"))
            .and(header("Authorization", "Bearer tok-123"))
            .and(body_json(serde_json::to_value(submission()).unwrap()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Result saved",
                "result": {"id": 42}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ack = client(server.uri())
            .submit(&Session::with_token("tok-123"), &submission())
            .await
            .unwrap();
        assert_eq!(ack.result_id.as_deref(), Some("42"));
        assert_eq!(ack.message.as_deref(), Some("Result saved"));
    }

    #[tokio::test]
    async fn submit_without_token_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-result"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(server.uri())
            .submit(&Session::anonymous(), &submission())
            .await
            .unwrap_err();
        assert!(err.requires_reauth());
    }

    #[tokio::test]
    async fn rejected_token_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-result"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({"error": "Invalid token"})),
            )
            .mount(&server)
            .await;

        let err = client(server.uri())
            .submit(&Session::with_token("stale"), &submission())
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Unauthorized(m) if m == "Invalid token"));
    }

    #[tokio::test]
    async fn empty_ack_body_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-result"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let ack = client(server.uri())
            .submit(&Session::with_token("t"), &submission())
            .await
            .unwrap();
        assert_eq!(ack, Ack::default());
    }
}
