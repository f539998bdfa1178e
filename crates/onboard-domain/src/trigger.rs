use std::sync::Mutex;

/// Un miembro pasó a ser elegible para la secuencia de onboarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentEvent {
    pub user_id: String,
    pub contact_address: String,
}

/// La membresía terminó: el run activo, si existe, debe abortarse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEndedEvent {
    pub user_id: String,
}

pub type EnrollmentCallback = Box<dyn Fn(&EnrollmentEvent) + Send + Sync>;
pub type MembershipEndedCallback = Box<dyn Fn(&MembershipEndedEvent) + Send + Sync>;

/// Origen de eventos de membresía (webhooks, colas, etc.).
pub trait TriggerSource: Send + Sync {
    fn on_enrollment(&self, callback: EnrollmentCallback);
    fn on_membership_ended(&self, callback: MembershipEndedCallback);
}

/// Despacha eventos emitidos a mano a los callbacks registrados.
#[derive(Default)]
pub struct InMemoryTriggerSource {
    enrollment: Mutex<Vec<EnrollmentCallback>>,
    ended: Mutex<Vec<MembershipEndedCallback>>,
}

impl InMemoryTriggerSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entrega el evento a cada callback; devuelve cuántos lo recibieron.
    pub fn emit_enrollment(&self, event: &EnrollmentEvent) -> usize {
        match self.enrollment.lock() {
            Ok(callbacks) => {
                for cb in callbacks.iter() {
                    cb(event);
                }
                callbacks.len()
            }
            Err(_) => 0,
        }
    }

    pub fn emit_membership_ended(&self, event: &MembershipEndedEvent) -> usize {
        match self.ended.lock() {
            Ok(callbacks) => {
                for cb in callbacks.iter() {
                    cb(event);
                }
                callbacks.len()
            }
            Err(_) => 0,
        }
    }
}

impl TriggerSource for InMemoryTriggerSource {
    fn on_enrollment(&self, callback: EnrollmentCallback) {
        if let Ok(mut callbacks) = self.enrollment.lock() {
            callbacks.push(callback);
        }
    }

    fn on_membership_ended(&self, callback: MembershipEndedCallback) {
        if let Ok(mut callbacks) = self.ended.lock() {
            callbacks.push(callback);
        }
    }
}
