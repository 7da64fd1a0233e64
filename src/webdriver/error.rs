//! Tipos de erro para o cliente WebDriver.
//!
//! Define [`WebDriverError`] com variantes para erros de comando, de rede e
//! de protocolo, e a conversão para [`SessionError`], que é o que o fluxo de
//! provisionamento enxerga.

use thiserror::Error;

use crate::session::SessionError;

/// Erros que podem ocorrer ao conversar com o servidor WebDriver.
#[derive(Debug, Error)]
pub enum WebDriverError {
    /// O driver respondeu com um erro W3C (`{"value": {"error", "message"}}`).
    #[error("WebDriver error (status {status}) {error}: {message}")]
    Command {
        status: u16,
        error: String,
        message: String,
    },

    /// Falha de rede ao falar com o driver (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Resposta fora do formato esperado.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<WebDriverError> for SessionError {
    fn from(err: WebDriverError) -> Self {
        match err {
            WebDriverError::Command { error, message, .. } => {
                if message.contains("ERR_ADDRESS_UNREACHABLE") {
                    SessionError::AddressUnreachable(message)
                } else if error == "timeout" || error == "script timeout" {
                    SessionError::Timeout(message)
                } else if error == "no such element" {
                    SessionError::NoSuchElement(message)
                } else {
                    SessionError::Command {
                        code: error,
                        message,
                    }
                }
            }
            WebDriverError::Network(e) if e.is_timeout() => SessionError::Timeout(e.to_string()),
            WebDriverError::Network(e) => SessionError::Backend(e.to_string()),
            WebDriverError::Protocol(message) => SessionError::Backend(message),
        }
    }
}
