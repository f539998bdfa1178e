//! onboard-workflow: ejecución durable de secuencias de onboarding
//!
//! Contiene el `SequenceRunner` (máquina de estados por run con checkpoint
//! por paso), el reloj de pasos, la política de reintentos, el poller de runs
//! vencidos, el manejo de triggers de membresía, métricas de entrega y el
//! bucle asíncrono del worker. Todas las dependencias externas se inyectan
//! como `Arc<dyn Trait>`.

pub mod clock;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod retry;
pub mod runner;
pub mod scheduler;
pub mod trigger;
pub mod worker;

pub use clock::{Clock, ManualClock, StepClock, SystemClock};
pub use config::WorkflowConfig;
pub use errors::WorkflowError;
pub use metrics::{DayStats, DeliverySummary};
pub use retry::RetryPolicy;
pub use runner::{AdvanceOutcome, RunHandle, SequenceRunner};
pub use scheduler::{DuePoller, TickReport};
pub use trigger::{EnrollmentHandler, EnrollmentOutcome};
pub use worker::run_worker;
