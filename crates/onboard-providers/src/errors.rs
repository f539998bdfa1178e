use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuración inválida: {0}")]
    Config(String),
    #[error("Error HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Firma de webhook inválida: {0}")]
    Signature(String),
    #[error("Payload de webhook inválido: {0}")]
    Payload(String),
    #[error("JSON inválido: {0}")]
    Json(#[from] serde_json::Error),
}
