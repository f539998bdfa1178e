use chrono::Duration;

/// Backoff exponencial para fallos transitorios de entrega.
///
/// El número de reintentos no tiene tope; lo que se acota es el intervalo.
/// `record_attempts` es cuantas veces se intenta en el mismo proceso registrar
/// un evento obligatorio antes de escalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub record_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { min_backoff: Duration::seconds(60),
               max_backoff: Duration::hours(6),
               record_attempts: 3 }
    }
}

impl RetryPolicy {
    /// Espera antes del reintento número `attempt` (1 = primer fallo):
    /// `min_backoff * 2^(attempt-1)`, acotado a `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let factor = 1i64 << exp;
        let ms = self.min_backoff.num_milliseconds().saturating_mul(factor);
        let capped = ms.min(self.max_backoff.num_milliseconds());
        Duration::milliseconds(capped.max(0))
    }
}
