//! Interface de terminal do provisionador: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente os
//! [`StatusEvent`]s de um job no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{JobOutcome, JobReport};
use crate::status::StatusEvent;

/// Indicador visual de progresso para a execução de um job no terminal.
///
/// Mostra a porcentagem e o rótulo do passo atual, e mensagens coloridas
/// para sucesso (verde), falha (vermelho) e cancelamento (amarelo).
pub struct JobProgress {
    // Barra de progresso do indicatif, de 0 a 100.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia a barra com a descrição do job e retorna a instância de progresso.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
                .expect("invalid template")
                .progress_chars("=> "),
        );
        pb.set_message(description.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a barra com um evento de status.
    pub fn handle(&self, event: &StatusEvent) {
        match event {
            StatusEvent::Progress { label, percent } => {
                self.pb.set_position(u64::from(*percent));
                self.pb.set_message(label.clone());
            }
            StatusEvent::Error {
                message,
                diagnostic_image,
                ..
            } => {
                self.pb.set_message(message.clone());
                if let Some(image) = diagnostic_image {
                    self.pb.println(format!(
                        "  {} diagnostic screenshot captured ({} bytes)",
                        self.yellow.apply_to("!"),
                        image.0.len()
                    ));
                }
            }
            StatusEvent::Success => self.pb.set_position(100),
        }
    }

    /// Avisa que o cancelamento foi pedido.
    pub fn cancelling(&self) {
        self.pb.println(format!(
            "  {} Cancelling at the next step...",
            self.yellow.apply_to("↻")
        ));
    }

    /// Finaliza a barra e exibe o resultado final do job.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X.
    pub fn complete(&self, report: &JobReport) {
        self.pb.finish_and_clear();
        match report.outcome {
            JobOutcome::Success => {
                println!("  {} Router provisioned", self.green.apply_to("✓"));
            }
            JobOutcome::Failed(kind) => {
                let error = report.error.as_deref().unwrap_or("unknown error");
                println!("  {} Job failed ({kind}): {error}", self.red.apply_to("✗"));
            }
            JobOutcome::Cancelled => {
                println!("  {} Job cancelled", self.yellow.apply_to("↻"));
            }
        }
    }

    /// Imprime o relatório do job formatado em JSON com estilo colorido.
    pub fn print_report(&self, report: &JobReport) {
        let style = match report.outcome {
            JobOutcome::Success => &self.green,
            JobOutcome::Failed(_) => &self.red,
            JobOutcome::Cancelled => &self.yellow,
        };
        println!();
        println!("{}", style.apply_to("─── Job Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}
