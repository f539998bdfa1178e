use crate::content_repository::{ContentRepository, InMemoryContentRepository};
use crate::{DeliveryAdapter, DeliveryError, DeliveryReceipt, DomainError, SequenceDefinition, Step};
use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Plantilla de cinco días que se usa para sembrar contenido nuevo.
static DEFAULT_TEMPLATE: Lazy<Vec<(u32, &'static str, &'static str)>> = Lazy::new(|| {
    vec![(1,
          "Welcome to the Community!",
          "Welcome aboard! We are excited to have you join our community. Here is everything you need to get \
           started..."),
         (2,
          "Getting Started Guide",
          "Day 2 is all about setting you up for success. Check out our getting started guide..."),
         (3,
          "Pro Tips & Tricks",
          "Ready to level up? Here are some pro tips to help you get the most out of your membership..."),
         (4,
          "Community Resources",
          "Did you know about all the resources available to you? Let us show you around..."),
         (5,
          "Your First Week Complete!",
          "Congratulations on completing your first week! Here is what is next on your journey...")]
});

pub struct DomainStubs;

impl DomainStubs {
    /// Secuencia de onboarding por defecto (días 1 a 5).
    pub fn default_sequence() -> Result<SequenceDefinition, DomainError> {
        let steps = DEFAULT_TEMPLATE.iter()
                                    .map(|(day, subject, body)| Step::new(*day, subject, body))
                                    .collect::<Result<Vec<_>, _>>()?;
        SequenceDefinition::new(steps)
    }

    /// Repositorio en memoria con la secuencia por defecto asignada a `user_id`.
    pub fn sample_repo(user_id: &str) -> InMemoryContentRepository {
        let repo = InMemoryContentRepository::new();
        if let Ok(definition) = Self::default_sequence() {
            let _ = repo.save_sequence(user_id, &definition);
        }
        repo
    }
}

/// Mensaje aceptado por `ScriptedDeliveryAdapter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub address: String,
    pub subject: String,
    pub body: String,
    pub delivery_id: String,
}

/// Adaptador de entrega en memoria: acepta todo salvo los fallos programados
/// por asunto, y guarda lo enviado para inspección.
#[derive(Default)]
pub struct ScriptedDeliveryAdapter {
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<HashMap<String, VecDeque<DeliveryError>>>,
    attempts: Mutex<u64>,
}

impl ScriptedDeliveryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Los próximos `times` envíos con este asunto fallan con `error`.
    pub fn fail_subject(&self, subject: &str, error: DeliveryError, times: usize) {
        if let Ok(mut failures) = self.failures.lock() {
            let queue = failures.entry(subject.to_string()).or_default();
            for _ in 0..times {
                queue.push_back(error.clone());
            }
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Llamadas a `send`, incluidas las fallidas.
    pub fn attempts(&self) -> u64 {
        self.attempts.lock().map(|a| *a).unwrap_or(0)
    }
}

impl DeliveryAdapter for ScriptedDeliveryAdapter {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<DeliveryReceipt, DeliveryError> {
        let mut attempts = self.attempts.lock().map_err(|_| DeliveryError::Transient("mutex poisoned".into()))?;
        *attempts += 1;
        let scripted = self.failures
                           .lock()
                           .map_err(|_| DeliveryError::Transient("mutex poisoned".into()))?
                           .get_mut(subject)
                           .and_then(|q| q.pop_front());
        if let Some(err) = scripted {
            return Err(err);
        }
        let mut sent = self.sent.lock().map_err(|_| DeliveryError::Transient("mutex poisoned".into()))?;
        let delivery_id = format!("msg-{}", *attempts);
        sent.push(SentMessage { address: address.to_string(),
                                subject: subject.to_string(),
                                body: body.to_string(),
                                delivery_id: delivery_id.clone() });
        Ok(DeliveryReceipt { delivery_id })
    }
}
