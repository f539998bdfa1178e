use crate::errors::WorkflowError;
use crate::runner::{RunHandle, SequenceRunner};
use log::{error, info, warn};
use onboard_domain::{ContentRepository, EnrollmentEvent, MembershipEndedEvent, TriggerSource};
use std::sync::Arc;
use uuid::Uuid;

/// Resultado de procesar una inscripción.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    Started(RunHandle),
    /// El usuario no tiene secuencia activa (o está vacía).
    NothingToDo,
    /// Ya había un run en curso; la inscripción se ignora.
    Duplicate { run_id: Option<Uuid> },
}

/// Traduce eventos de membresía en llamadas al runner.
pub struct EnrollmentHandler {
    runner: Arc<SequenceRunner>,
    content: Arc<dyn ContentRepository>,
}

impl EnrollmentHandler {
    pub fn new(runner: Arc<SequenceRunner>, content: Arc<dyn ContentRepository>) -> Self {
        Self { runner, content }
    }

    /// Una inscripción produce exactamente una llamada a `start`.
    pub fn handle_enrollment(&self, event: &EnrollmentEvent) -> Result<EnrollmentOutcome, WorkflowError> {
        let definition = self.content.get_active_sequence(&event.user_id)?;
        match self.runner.start(&event.user_id, &event.contact_address, definition.as_ref()) {
            Ok(handle) => Ok(EnrollmentOutcome::Started(handle)),
            Err(WorkflowError::EmptySequence(user)) => {
                info!("Sin secuencia activa para {}; nada que hacer", user);
                Ok(EnrollmentOutcome::NothingToDo)
            }
            Err(WorkflowError::AlreadyEnrolled { user_id, run_id }) => {
                warn!("Inscripción duplicada ignorada para {}", user_id);
                Ok(EnrollmentOutcome::Duplicate { run_id })
            }
            Err(e) => Err(e),
        }
    }

    pub fn handle_membership_ended(&self, event: &MembershipEndedEvent) -> Result<Option<Uuid>, WorkflowError> {
        self.runner.abort(&event.user_id)
    }

    /// Registra los callbacks del handler en `source`. Los errores se
    /// registran en el log: el origen de eventos no los recibe.
    pub fn attach(self: &Arc<Self>, source: &dyn TriggerSource) {
        let handler = Arc::clone(self);
        source.on_enrollment(Box::new(move |event: &EnrollmentEvent| {
                                 if let Err(e) = handler.handle_enrollment(event) {
                                     error!("Inscripción de {} fallida: {}", event.user_id, e);
                                 }
                             }));
        let handler = Arc::clone(self);
        source.on_membership_ended(Box::new(move |event: &MembershipEndedEvent| {
                                       if let Err(e) = handler.handle_membership_ended(event) {
                                           error!("Cancelación de {} fallida: {}", event.user_id, e);
                                       }
                                   }));
    }
}
