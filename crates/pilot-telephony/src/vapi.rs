//! Vapi-style assistant call backend.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pilot_core::config::TelephonyConfig;
use pilot_core::types::CallKind;

use crate::{Provider, ProviderReceipt, TelephonyError};

const MAX_CALL_SECONDS: u32 = 3600;
/// Ids longer than this are assistant ids; shorter ones are phone number ids.
const ASSISTANT_ID_MIN_LEN: usize = 21;

#[derive(Debug, Clone)]
pub struct VapiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallRequest<'a> {
    max_duration_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    assistant_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number_id: Option<&'a str>,
    customer: Customer<'a>,
}

#[derive(Debug, Serialize)]
struct Customer<'a> {
    number: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FallbackCallRequest<'a> {
    assistant_id: &'a str,
    phone_number: FallbackPhoneNumber<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FallbackPhoneNumber<'a> {
    customer_number: &'a str,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    id: Option<String>,
    transcript: Option<String>,
}

impl VapiBackend {
    /// Build the backend, or `None` if no API key is configured.
    pub fn from_config(config: &TelephonyConfig, client: reqwest::Client) -> Option<Self> {
        Some(Self {
            client,
            base_url: config.vapi_base_url.trim_end_matches('/').to_string(),
            api_key: config.vapi_api_key.clone()?,
        })
    }

    /// Start an assistant call to `to`.
    ///
    /// `target_id` is an assistant id or a phone number id. If the provider
    /// rejects the first request shape, the call is retried once with the
    /// older shape before the error is returned.
    pub async fn place_assistant_call(
        &self,
        to: &str,
        target_id: &str,
    ) -> Result<ProviderReceipt, TelephonyError> {
        let is_assistant = target_id.len() >= ASSISTANT_ID_MIN_LEN;
        let primary = CallRequest {
            max_duration_seconds: MAX_CALL_SECONDS,
            assistant_id: is_assistant.then_some(target_id),
            phone_number_id: (!is_assistant).then_some(target_id),
            customer: Customer { number: to },
        };

        match self.start_call(&primary).await {
            Err(TelephonyError::Provider { status, message, .. }) => {
                warn!(status, %message, "Assistant call rejected; retrying with fallback shape");
                let fallback = FallbackCallRequest {
                    assistant_id: target_id,
                    phone_number: FallbackPhoneNumber {
                        customer_number: to,
                    },
                };
                self.start_call(&fallback).await
            }
            other => other,
        }
    }

    /// Transcript of a finished call; `None` while it is still processing.
    pub async fn fetch_transcript(&self, call_id: &str) -> Result<Option<String>, TelephonyError> {
        let response = self
            .client
            .get(self.call_url(call_id)?)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelephonyError::Provider {
                provider: Provider::Vapi,
                status: status.as_u16(),
                message: "Unable to fetch transcript".to_string(),
            });
        }

        let body: CallResponse = response.json().await.map_err(|e| TelephonyError::Decode {
            provider: Provider::Vapi,
            message: e.to_string(),
        })?;
        Ok(body.transcript.filter(|t| !t.is_empty()))
    }

    /// `{base}/call/{id}` with the id escaped as a single path segment.
    fn call_url(&self, call_id: &str) -> Result<reqwest::Url, TelephonyError> {
        let invalid = |message: String| TelephonyError::InvalidUrl {
            provider: Provider::Vapi,
            message,
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("call")
            .push(call_id);
        Ok(url)
    }

    async fn start_call<T: Serialize>(&self, payload: &T) -> Result<ProviderReceipt, TelephonyError> {
        let response = self
            .client
            .post(format!("{}/call/phone", self.base_url))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TelephonyError::Provider {
                provider: Provider::Vapi,
                status: status.as_u16(),
                message,
            });
        }

        let body: CallResponse = response.json().await.map_err(|e| TelephonyError::Decode {
            provider: Provider::Vapi,
            message: e.to_string(),
        })?;
        let sid = body.id.ok_or_else(|| TelephonyError::Decode {
            provider: Provider::Vapi,
            message: "missing call id".to_string(),
        })?;
        info!(call_id = %sid, "Assistant call started");
        Ok(ProviderReceipt {
            provider: Provider::Vapi,
            kind: CallKind::Call,
            sid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const ASSISTANT_ID: &str = "asst_0123456789abcdefghij";

    fn backend_for(server: &mockito::Server) -> VapiBackend {
        let config = TelephonyConfig {
            vapi_api_key: Some("vk-test".to_string()),
            vapi_base_url: server.url(),
            ..TelephonyConfig::default()
        };
        VapiBackend::from_config(&config, reqwest::Client::new()).unwrap()
    }

    #[test]
    fn test_primary_payload_shape() {
        let assistant = CallRequest {
            max_duration_seconds: MAX_CALL_SECONDS,
            assistant_id: Some(ASSISTANT_ID),
            phone_number_id: None,
            customer: Customer {
                number: "+15551230000",
            },
        };
        assert_eq!(
            serde_json::to_value(&assistant).unwrap(),
            json!({
                "maxDurationSeconds": 3600,
                "assistantId": ASSISTANT_ID,
                "customer": { "number": "+15551230000" }
            })
        );

        let fallback = FallbackCallRequest {
            assistant_id: "pn_1",
            phone_number: FallbackPhoneNumber {
                customer_number: "+15551230000",
            },
        };
        assert_eq!(
            serde_json::to_value(&fallback).unwrap(),
            json!({
                "assistantId": "pn_1",
                "phoneNumber": { "customerNumber": "+15551230000" }
            })
        );
    }

    #[tokio::test]
    async fn test_short_id_is_phone_number_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/call/phone")
            .match_header("authorization", "Bearer vk-test")
            .match_body(Matcher::PartialJson(json!({
                "phoneNumberId": "pn_short",
                "customer": { "number": "+15551230000" }
            })))
            .with_status(201)
            .with_body(r#"{"id": "call-1"}"#)
            .create_async()
            .await;

        let receipt = backend_for(&server)
            .place_assistant_call("+15551230000", "pn_short")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(receipt.sid, "call-1");
    }

    #[tokio::test]
    async fn test_fallback_after_rejected_primary() {
        let mut server = mockito::Server::new_async().await;
        let primary = server
            .mock("POST", "/call/phone")
            .match_body(Matcher::PartialJson(json!({ "maxDurationSeconds": 3600 })))
            .with_status(400)
            .with_body("customer.number is invalid")
            .create_async()
            .await;
        let fallback = server
            .mock("POST", "/call/phone")
            .match_body(Matcher::PartialJson(json!({
                "assistantId": ASSISTANT_ID,
                "phoneNumber": { "customerNumber": "+15551230000" }
            })))
            .with_status(201)
            .with_body(r#"{"id": "call-2"}"#)
            .create_async()
            .await;

        let receipt = backend_for(&server)
            .place_assistant_call("+15551230000", ASSISTANT_ID)
            .await
            .unwrap();

        primary.assert_async().await;
        fallback.assert_async().await;
        assert_eq!(receipt.sid, "call-2");
    }

    #[tokio::test]
    async fn test_both_shapes_rejected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/call/phone")
            .with_status(401)
            .with_body("bad key")
            .expect(2)
            .create_async()
            .await;

        let err = backend_for(&server)
            .place_assistant_call("+15551230000", ASSISTANT_ID)
            .await
            .unwrap_err();
        mock.assert_async().await;
        assert!(matches!(err, TelephonyError::Provider { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_fetch_transcript() {
        let mut server = mockito::Server::new_async().await;
        let _done = server
            .mock("GET", "/call/call-1")
            .with_status(200)
            .with_body(r#"{"id": "call-1", "transcript": "Agent: Hello\nLead: Hi"}"#)
            .create_async()
            .await;
        let _processing = server
            .mock("GET", "/call/call-2")
            .with_status(200)
            .with_body(r#"{"id": "call-2"}"#)
            .create_async()
            .await;

        let backend = backend_for(&server);
        assert_eq!(
            backend.fetch_transcript("call-1").await.unwrap().as_deref(),
            Some("Agent: Hello\nLead: Hi")
        );
        assert!(backend.fetch_transcript("call-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_call_id_stays_one_path_segment() {
        let mut server = mockito::Server::new_async().await;
        let escaped = server
            .mock("GET", "/call/a%2F..%2Fphone%3Fx=1")
            .with_status(200)
            .with_body(r#"{"id": "a/../phone?x=1", "transcript": "ok"}"#)
            .expect(1)
            .create_async()
            .await;

        let backend = backend_for(&server);
        let transcript = backend.fetch_transcript("a/../phone?x=1").await.unwrap();
        escaped.assert_async().await;
        assert_eq!(transcript.as_deref(), Some("ok"));
    }

    #[test]
    fn test_call_url_keeps_base_path() {
        let config = TelephonyConfig {
            vapi_api_key: Some("vk-test".to_string()),
            vapi_base_url: "https://vapi.example.com/v1/".to_string(),
            ..TelephonyConfig::default()
        };
        let backend = VapiBackend::from_config(&config, reqwest::Client::new()).unwrap();
        assert_eq!(
            backend.call_url("c 1").unwrap().as_str(),
            "https://vapi.example.com/v1/call/c%201"
        );
    }
}
