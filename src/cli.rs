//! Interface de linha de comando do provisionador baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (serve, provision,
//! reset) e flags globais (--config, --verbose, --webdriver-url, --headed).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Provisionador de roteadores: configura o roteador pela interface web.
#[derive(Debug, Parser)]
#[command(name = "provisioner", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: `provisioner.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Endpoint do WebDriver, sobrescreve a configuração.
    #[arg(long, global = true)]
    pub webdriver_url: Option<String>,

    /// Mostra a janela do navegador.
    #[arg(long, global = true, default_value_t = false)]
    pub headed: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sobe o servidor HTTP que recebe pedidos de provisionamento.
    Serve {
        /// Porta HTTP, sobrescreve a configuração.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Provisiona um roteador em primeiro plano, com barra de progresso.
    Provision {
        /// Hostname do roteador (o prefixo configurado é adicionado).
        #[arg(long)]
        hostname: String,

        /// Nome da rede Wi-Fi.
        #[arg(long)]
        ssid: String,

        /// Senha da rede Wi-Fi (mínimo de 8 caracteres).
        #[arg(long)]
        psk: String,

        /// URL que recebe cada evento de status via POST.
        #[arg(long)]
        notify: Option<String>,
    },

    /// Restaura o roteador para as configurações de fábrica.
    Reset {
        /// Confirma a operação destrutiva.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}
