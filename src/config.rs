//! Configuração do provisionador carregada a partir de `provisioner.toml`.
//!
//! A struct [`ProvisionerConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! Variáveis de ambiente (`MAIN_PASSWORD`, `ALTERNATIVE_PASSWORDS`, ...) têm
//! precedência sobre o arquivo.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::request::Credentials;

/// Formato da saída de log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Configuração de nível superior carregada de `provisioner.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionerConfig {
    /// Senha de administrador aplicada ao roteador.
    #[serde(default)]
    pub main_password: String,

    /// Senhas antigas tentadas, em ordem, se a principal for rejeitada.
    #[serde(default)]
    pub alternative_passwords: Vec<String>,

    /// Prefixo adicionado a todo hostname recebido.
    #[serde(default)]
    pub hostname_prefix: String,

    /// Porta do servidor HTTP.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Endereço fixo da interface web do roteador.
    #[serde(default = "default_router_url")]
    pub router_url: String,

    /// Endpoint do WebDriver (chromedriver).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Executa o navegador sem janela.
    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub timings: Timings,
}

/// Tempos e limites do fluxo, em milissegundos.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Timings {
    /// Timeout de cada tentativa de navegação.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Espera entre tentativas de conexão.
    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,

    /// Máximo de tentativas de conexão.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Intervalo entre verificações do overlay de carregamento.
    #[serde(default = "default_overlay_poll_ms")]
    pub overlay_poll_ms: u64,

    /// Verificações consecutivas sem overlay para considerá-lo encerrado.
    #[serde(default = "default_overlay_clear_checks")]
    pub overlay_clear_checks: u32,

    /// Quanto esperar o overlay aparecer antes de seguir adiante.
    #[serde(default = "default_overlay_appear_ms")]
    pub overlay_appear_ms: u64,

    /// Prazo total da espera pelo overlay.
    #[serde(default = "default_overlay_deadline_ms")]
    pub overlay_deadline_ms: u64,

    /// Prazo para um elemento ficar disponível antes de clicar/preencher.
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,
}

fn default_port() -> u16 {
    7201
}

fn default_router_url() -> String {
    "http://192.168.88.1".to_string()
}

// chromedriver escuta em 9515 por padrão.
fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_navigation_timeout_ms() -> u64 {
    3000
}

fn default_connect_backoff_ms() -> u64 {
    500
}

fn default_connect_attempts() -> u32 {
    10
}

fn default_overlay_poll_ms() -> u64 {
    50
}

fn default_overlay_clear_checks() -> u32 {
    10
}

fn default_overlay_appear_ms() -> u64 {
    3000
}

fn default_overlay_deadline_ms() -> u64 {
    60_000
}

fn default_action_timeout_ms() -> u64 {
    30_000
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            connect_backoff_ms: default_connect_backoff_ms(),
            connect_attempts: default_connect_attempts(),
            overlay_poll_ms: default_overlay_poll_ms(),
            overlay_clear_checks: default_overlay_clear_checks(),
            overlay_appear_ms: default_overlay_appear_ms(),
            overlay_deadline_ms: default_overlay_deadline_ms(),
            action_timeout_ms: default_action_timeout_ms(),
        }
    }
}

impl Timings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    pub fn overlay_poll(&self) -> Duration {
        Duration::from_millis(self.overlay_poll_ms)
    }

    pub fn overlay_appear(&self) -> Duration {
        Duration::from_millis(self.overlay_appear_ms)
    }

    pub fn overlay_deadline(&self) -> Duration {
        Duration::from_millis(self.overlay_deadline_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            main_password: String::new(),
            alternative_passwords: Vec::new(),
            hostname_prefix: String::new(),
            port: default_port(),
            router_url: default_router_url(),
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            log_format: LogFormat::default(),
            timings: Timings::default(),
        }
    }
}

impl ProvisionerConfig {
    /// Carrega a configuração de `path` (ou `provisioner.toml` no diretório
    /// atual) e aplica as variáveis de ambiente.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or(Path::new("provisioner.toml"));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<ProvisionerConfig>(&contents)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Aplica sobrescritas vindas do ambiente. `lookup` abstrai `std::env::var`
    /// para os testes.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let set = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(password) = set("MAIN_PASSWORD") {
            self.main_password = password;
        }
        if let Some(raw) = set("ALTERNATIVE_PASSWORDS") {
            self.alternative_passwords = serde_json::from_str(&raw)
                .context("ALTERNATIVE_PASSWORDS must be a JSON array of strings")?;
        }
        if let Some(prefix) = lookup("HOSTNAME_PREFIX") {
            self.hostname_prefix = prefix;
        }
        // PORT_TPLINK é o nome antigo da variável.
        if let Some(port) = set("PORT").or_else(|| set("PORT_TPLINK")) {
            self.port = port.parse().context("PORT must be a port number")?;
        }
        if let Some(url) = set("ROUTER_URL") {
            self.router_url = url;
        }
        if let Some(url) = set("WEBDRIVER_URL") {
            self.webdriver_url = url;
        }
        // Qualquer valor em DEBUG abre o navegador com janela.
        if set("DEBUG").is_some() {
            self.headless = false;
        }
        Ok(())
    }

    /// Verifica os campos obrigatórios antes de iniciar.
    pub fn validate(&self) -> Result<()> {
        if self.main_password.is_empty() {
            bail!("Please set MAIN_PASSWORD");
        }
        if self.timings.connect_attempts == 0 {
            bail!("timings.connect_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.main_password.clone(),
            self.alternative_passwords.clone(),
        )
    }
}
