use crate::errors::WorkflowError;
use crate::retry::RetryPolicy;
use chrono::Duration;

// Tope para duraciones leídas del entorno (10 años).
const MAX_CONFIG_SECS: u64 = 10 * 365 * 24 * 3600;

/// Configuración del worker de secuencias.
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    /// Intervalo entre ticks del poller.
    pub poll_interval: std::time::Duration,
    /// Máximo de runs vencidos que se avanzan por tick.
    pub due_batch: usize,
    pub retry: RetryPolicy,
    /// Tiempo durante el cual un run reclamado queda fuera de la lista de
    /// vencidos; si el proceso muere, otro worker lo retoma al expirar.
    pub claim_lease: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig { poll_interval: std::time::Duration::from_secs(60),
                         due_batch: 100,
                         retry: RetryPolicy::default(),
                         claim_lease: Duration::minutes(5) }
    }
}

impl WorkflowConfig {
    /// Lee la configuración del entorno (cargando `.env` si existe).
    pub fn from_env() -> Result<Self, WorkflowError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Igual que `from_env` pero con una función de busqueda arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkflowError>
        where F: Fn(&str) -> Option<String>
    {
        let defaults = WorkflowConfig::default();
        let number = |key: &str, default: u64| -> Result<u64, WorkflowError> {
            match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                None => Ok(default),
                Some(raw) => raw.parse::<u64>()
                                .map_err(|_| WorkflowError::Config(format!("{} no es un entero válido: '{}'", key, raw))),
            }
        };
        let poll_secs = number("ONBOARD_POLL_INTERVAL_SECS", defaults.poll_interval.as_secs())?;
        let due_batch = number("ONBOARD_DUE_BATCH", defaults.due_batch as u64)?;
        let min_secs = number("ONBOARD_RETRY_MIN_SECS", defaults.retry.min_backoff.num_seconds() as u64)?;
        let max_secs = number("ONBOARD_RETRY_MAX_SECS", defaults.retry.max_backoff.num_seconds() as u64)?;
        let record_attempts = number("ONBOARD_RECORD_ATTEMPTS", u64::from(defaults.retry.record_attempts))?;
        let lease_secs = number("ONBOARD_CLAIM_LEASE_SECS", defaults.claim_lease.num_seconds() as u64)?;

        if poll_secs == 0 {
            return Err(WorkflowError::Config("ONBOARD_POLL_INTERVAL_SECS debe ser > 0".into()));
        }
        if due_batch == 0 {
            return Err(WorkflowError::Config("ONBOARD_DUE_BATCH debe ser > 0".into()));
        }
        if min_secs == 0 || min_secs > max_secs {
            return Err(WorkflowError::Config(format!("backoff inválido: min={}s max={}s", min_secs, max_secs)));
        }
        if record_attempts == 0 || record_attempts > u64::from(u32::MAX) {
            return Err(WorkflowError::Config("ONBOARD_RECORD_ATTEMPTS fuera de rango".into()));
        }
        let to_secs = |secs: u64| Duration::seconds(secs.min(MAX_CONFIG_SECS) as i64);

        Ok(WorkflowConfig { poll_interval: std::time::Duration::from_secs(poll_secs),
                            due_batch: due_batch as usize,
                            retry: RetryPolicy { min_backoff: to_secs(min_secs),
                                                 max_backoff: to_secs(max_secs),
                                                 record_attempts: record_attempts as u32 },
                            claim_lease: to_secs(lease_secs) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = WorkflowConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.poll_interval, std::time::Duration::from_secs(60));
        assert_eq!(cfg.due_batch, 100);
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert_eq!(cfg.claim_lease, Duration::minutes(5));
    }

    #[test]
    fn values_are_read_and_validated() {
        let cfg = WorkflowConfig::from_lookup(lookup(&[("ONBOARD_POLL_INTERVAL_SECS", "5"),
                                                        ("ONBOARD_RETRY_MIN_SECS", "10"),
                                                        ("ONBOARD_RETRY_MAX_SECS", "40"),
                                                        ("ONBOARD_RECORD_ATTEMPTS", "1")])).unwrap();
        assert_eq!(cfg.poll_interval.as_secs(), 5);
        assert_eq!(cfg.retry.backoff(5), Duration::seconds(40));
        assert_eq!(cfg.retry.record_attempts, 1);

        assert!(matches!(WorkflowConfig::from_lookup(lookup(&[("ONBOARD_DUE_BATCH", "many")])),
                         Err(WorkflowError::Config(_))));
        assert!(matches!(WorkflowConfig::from_lookup(lookup(&[("ONBOARD_RETRY_MIN_SECS", "100"),
                                                              ("ONBOARD_RETRY_MAX_SECS", "50")])),
                         Err(WorkflowError::Config(_))));
        assert!(WorkflowConfig::from_lookup(lookup(&[("ONBOARD_POLL_INTERVAL_SECS", "0")])).is_err());
    }
}
