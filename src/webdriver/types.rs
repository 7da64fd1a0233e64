//! Tipos de dados do protocolo W3C WebDriver.
//!
//! Toda resposta do driver vem embrulhada em `{"value": ...}`; as structs
//! abaixo descrevem apenas os campos que o provisionador usa.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Chave W3C que identifica uma referência de elemento.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Envelope de toda resposta do driver.
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub value: Value,
}

/// Corpo de erro W3C dentro de `value`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// `value` de `POST /session`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub session_id: String,
}

/// Estratégia de localização de elementos.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Locator {
    pub using: &'static str,
    pub value: String,
}

impl Locator {
    /// Seletores que começam com `//` ou `(` são XPath; o resto é CSS.
    pub fn parse(selector: &str) -> Self {
        let using = if selector.starts_with("//") || selector.starts_with('(') {
            "xpath"
        } else {
            "css selector"
        };
        Self {
            using,
            value: selector.to_string(),
        }
    }

    /// XPath de um elemento com papel acessível `role` e nome `name`.
    pub fn role(role: &str, name: &str) -> Self {
        let name = crate::workflow::widgets::xpath_literal(name);
        let value = if role == "button" {
            format!(
                "(//button[normalize-space(.)={name}] | //*[@role='button'][normalize-space(.)={name}] \
                 | //input[@type='button' or @type='submit'][@value={name}])"
            )
        } else {
            format!("//*[@role='{role}'][normalize-space(.)={name}]")
        };
        Self {
            using: "xpath",
            value,
        }
    }
}

/// Capacidades pedidas ao abrir a sessão.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 1280,
        }
    }
}

impl BrowserOptions {
    pub fn capabilities(&self) -> Value {
        let mut args = vec![format!(
            "--window-size={},{}",
            self.window_width, self.window_height
        )];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "normal",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

/// Extrai o id de uma referência de elemento W3C.
pub fn element_id(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY)?.as_str().map(str::to_string)
}

/// Referência de elemento para passar como argumento de script.
pub fn element_arg(id: &str) -> Value {
    json!({ ELEMENT_KEY: id })
}
