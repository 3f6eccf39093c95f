//! Négociation de session auprès du service
//!
//! Avant d'ouvrir la connexion vocale, le client demande au service une URL
//! de transport via un appel HTTP. C'est la seule étape soumise à un timeout
//! appliqué par l'appelant. Le quota peut être refusé dès cette étape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};

/// Résultat d'une négociation réussie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationResult {
    /// URL WebSocket à laquelle ouvrir la session vocale
    pub transport_url: String,

    /// Langue de la session (celle demandée, confirmée par le service)
    pub language: String,
}

/// Collaborateur de négociation
///
/// L'authentification et la comptabilité de quota vivent derrière ce trait,
/// côté service. Le client ne voit que le résultat.
#[async_trait]
pub trait Negotiator: Send + Sync {
    async fn negotiate(&self, language: &str) -> NetworkResult<NegotiationResult>;
}

/// Corps de la réponse HTTP de négociation
#[derive(Debug, Deserialize)]
struct NegotiationResponse {
    status: String,
    #[serde(default)]
    websocket_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Négociateur HTTP réel
///
/// Poste la clé API et l'identifiant d'assistant au service, qui répond
/// avec un champ `status` et l'URL WebSocket à utiliser.
pub struct HttpNegotiator {
    endpoint: String,
    api_key: String,
    assistant_id: String,
    client: reqwest::Client,
}

impl HttpNegotiator {
    pub fn new(endpoint: String, api_key: String, assistant_id: String) -> Self {
        Self {
            endpoint,
            api_key,
            assistant_id,
            client: reqwest::Client::new(),
        }
    }

    /// Interprète la réponse du service (séparé pour être testable sans HTTP)
    fn parse_response(
        http_status: u16,
        body: NegotiationResponse,
        language: &str,
    ) -> NetworkResult<NegotiationResult> {
        // Le quota peut être signalé par le statut HTTP ou par le corps
        if http_status == 402 || http_status == 429 || body.status == "quota_exceeded" {
            return Err(NetworkError::QuotaExceeded {
                message: body
                    .message
                    .unwrap_or_else(|| "Quota de conversation épuisé".to_string()),
            });
        }

        if body.status != "ok" {
            return Err(NetworkError::ConnectionError(format!(
                "Négociation refusée: {}",
                body.message.unwrap_or(body.status)
            )));
        }

        let transport_url = body.websocket_url.ok_or_else(|| {
            NetworkError::ConnectionError("Réponse de négociation sans URL WebSocket".to_string())
        })?;

        Ok(NegotiationResult {
            transport_url,
            language: language.to_string(),
        })
    }
}

#[async_trait]
impl Negotiator for HttpNegotiator {
    async fn negotiate(&self, language: &str) -> NetworkResult<NegotiationResult> {
        println!("🤝 Négociation de session auprès de {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "api_key": self.api_key,
                "assistant_id": self.assistant_id,
                "language": language,
            }))
            .send()
            .await?;

        let http_status = response.status().as_u16();
        let body: NegotiationResponse = response.json().await?;

        Self::parse_response(http_status, body, language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(status: &str, url: Option<&str>, message: Option<&str>) -> NegotiationResponse {
        NegotiationResponse {
            status: status.to_string(),
            websocket_url: url.map(str::to_string),
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn test_successful_negotiation() {
        let result =
            HttpNegotiator::parse_response(200, body("ok", Some("wss://srv/voice"), None), "fr")
                .unwrap();
        assert_eq!(result.transport_url, "wss://srv/voice");
        assert_eq!(result.language, "fr");
    }

    #[test]
    fn test_quota_refused_at_negotiation() {
        // Par le corps de réponse
        let result = HttpNegotiator::parse_response(
            200,
            body("quota_exceeded", None, Some("quota mensuel atteint")),
            "auto",
        );
        assert!(matches!(
            result,
            Err(NetworkError::QuotaExceeded { message }) if message == "quota mensuel atteint"
        ));

        // Par le statut HTTP
        let result = HttpNegotiator::parse_response(429, body("error", None, None), "auto");
        assert!(matches!(result, Err(NetworkError::QuotaExceeded { .. })));
    }

    #[test]
    fn test_refused_negotiation() {
        let result = HttpNegotiator::parse_response(
            200,
            body("error", None, Some("clé API invalide")),
            "auto",
        );
        assert!(matches!(result, Err(NetworkError::ConnectionError(_))));
    }

    #[test]
    fn test_missing_url_is_an_error() {
        let result = HttpNegotiator::parse_response(200, body("ok", None, None), "auto");
        assert!(matches!(result, Err(NetworkError::ConnectionError(_))));
    }
}
