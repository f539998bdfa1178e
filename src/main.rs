use onboard_domain::{ContentRepository, DeliveryAdapter, DomainStubs, EnrollmentEvent, InMemoryTriggerSource,
                     MembershipEndedEvent, SequenceDefinition};
use onboard_ledger::{EventRecorder, RunStore};
use onboard_providers::{dispatch, LoggingDeliveryAdapter, ResendDeliveryAdapter, WebhookVerifier};
use onboard_workflow::{run_worker, Clock, DeliverySummary, DuePoller, EnrollmentHandler, SequenceRunner, SystemClock,
                       WorkflowConfig};
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Binario del motor de onboarding.
///
/// Sin argumentos abre un menú interactivo para administrar secuencias y
/// miembros. Con `--worker` ejecuta el poller de runs vencidos hasta Ctrl-C.
fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let worker_mode = std::env::args().skip(1).any(|a| a == "--worker");

    // Inicializar repos (aplica migraciones embebidas si procede)
    let db = onboard_persistence::new_from_env()?;
    let config = WorkflowConfig::from_env()?;
    let ledger = Arc::new(db.ledger());
    let content = Arc::new(db.content());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let runner = Arc::new(SequenceRunner::new(ledger.clone(),
                                              ledger.clone(),
                                              delivery_from_env(),
                                              content.clone(),
                                              clock.clone()).with_retry_policy(config.retry.clone())
                                                            .with_claim_lease(config.claim_lease));
    let poller = Arc::new(DuePoller::new(runner.clone(), ledger.clone(), config.due_batch));

    if worker_mode {
        return run_worker_mode(poller, clock, config.poll_interval);
    }

    let handler = Arc::new(EnrollmentHandler::new(runner.clone(), content.clone()));
    let source = InMemoryTriggerSource::new();
    handler.attach(&source);
    let verifier = WebhookVerifier::from_env();
    if !verifier.is_enabled() {
        warn!("WHOP_WEBHOOK_SECRET no definida: los webhooks no se verifican");
    }

    loop {
        println!("\n== Onboarding CLI menu ==");
        println!("1) Guardar secuencia por defecto (5 días) para un usuario");
        println!("2) Guardar secuencia desde archivo JSON");
        println!("3) Inscribir miembro");
        println!("4) Cancelar membresía");
        println!("5) Ejecutar un tick del poller");
        println!("6) Ver eventos de un usuario");
        println!("7) Ver resumen de entregas");
        println!("8) Procesar webhook desde archivo");
        println!("9) Ver run activo de un usuario");
        println!("0) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        io::stdin().read_line(&mut choice)?;
        match choice.trim() {
            "1" => {
                let user = prompt("User id: ")?;
                let saved = DomainStubs::default_sequence().and_then(|d| content.save_sequence(user.trim(), &d));
                match saved {
                    Ok(()) => println!("Secuencia por defecto guardada para {}", user.trim()),
                    Err(e) => eprintln!("Error guardando secuencia: {}", e),
                }
            }
            "2" => {
                let user = prompt("User id: ")?;
                let path = prompt("Ruta del JSON ([{day, subject, body}, ...]): ")?;
                let raw = match std::fs::read_to_string(path.trim()) {
                    Ok(raw) => raw,
                    Err(e) => {
                        eprintln!("No se pudo leer {}: {}", path.trim(), e);
                        continue;
                    }
                };
                match SequenceDefinition::from_json(&raw).and_then(|d| content.save_sequence(user.trim(), &d)) {
                    Ok(()) => println!("Secuencia guardada para {}", user.trim()),
                    Err(e) => eprintln!("Secuencia inválida: {}", e),
                }
            }
            "3" => {
                let user = prompt("User id: ")?;
                let email = prompt("Email: ")?;
                let event = EnrollmentEvent { user_id: user.trim().to_string(),
                                              contact_address: email.trim().to_string() };
                match handler.handle_enrollment(&event) {
                    Ok(outcome) => println!("Resultado: {:?}", outcome),
                    Err(e) => eprintln!("Error inscribiendo: {}", e),
                }
            }
            "4" => {
                let user = prompt("User id: ")?;
                let event = MembershipEndedEvent { user_id: user.trim().to_string() };
                match handler.handle_membership_ended(&event) {
                    Ok(Some(run_id)) => println!("Run abortado: {}", run_id),
                    Ok(None) => println!("El usuario no tenía run activo"),
                    Err(e) => eprintln!("Error cancelando: {}", e),
                }
            }
            "5" => match poller.tick(clock.now()) {
                Ok(report) => println!("{:?}", report),
                Err(e) => eprintln!("Error en tick: {}", e),
            },
            "6" => {
                let user = prompt("User id: ")?;
                match ledger.read_events(user.trim()) {
                    Ok(events) => {
                        println!("\nFECHA                     | TIPO               | PAYLOAD");
                        println!("-----------------------------------------------------------------------------------");
                        for e in events {
                            println!("{} | {:<18} | {}", e.created_at.to_rfc3339(), e.event_type.as_str(), e.payload);
                        }
                    }
                    Err(e) => eprintln!("Error leyendo eventos: {}", e),
                }
            }
            "7" => match DeliverySummary::collect(ledger.as_ref(), 10_000) {
                Ok(summary) => {
                    println!("Iniciadas: {}  Completadas: {} ({}%)",
                             summary.sequences_started, summary.sequences_completed, summary.completion_rate_pct);
                    println!("Enviados: {}  Fallidos: {} (permanentes: {})",
                             summary.emails_sent, summary.emails_failed, summary.permanent_failures);
                    if let Some(avg) = summary.avg_latency_ms {
                        println!("Latencia media: {} ms", avg);
                    }
                    for (day, stats) in &summary.per_day {
                        println!("  Día {}: {} enviados, {} fallidos", day, stats.sent, stats.failed);
                    }
                }
                Err(e) => eprintln!("Error calculando resumen: {}", e),
            },
            "8" => {
                let path = prompt("Ruta del cuerpo del webhook: ")?;
                let signature = prompt("Firma x-whop-signature (enter para ninguna): ")?;
                let body = match std::fs::read(path.trim()) {
                    Ok(body) => body,
                    Err(e) => {
                        eprintln!("No se pudo leer {}: {}", path.trim(), e);
                        continue;
                    }
                };
                let signature = Some(signature.trim()).filter(|s| !s.is_empty());
                match verifier.parse(&body, signature) {
                    Ok(event) => {
                        let delivered = dispatch(&source, &event);
                        println!("Webhook procesado: {:?} ({} handlers)", event, delivered);
                    }
                    Err(e) => eprintln!("Webhook rechazado: {}", e),
                }
            }
            "9" => {
                let user = prompt("User id: ")?;
                match ledger.find_active_run(user.trim()) {
                    Ok(Some(run)) => {
                        println!("Run {} | paso {}/{} | último día completado {} | reanuda {} | intento {}",
                                 run.run_id,
                                 run.next_step_index,
                                 run.total_steps,
                                 run.last_completed_day,
                                 run.resume_not_before.to_rfc3339(),
                                 run.attempt);
                    }
                    Ok(None) => println!("Sin run activo"),
                    Err(e) => eprintln!("Error consultando run: {}", e),
                }
                match content.member_status(user.trim()) {
                    Ok(Some(status)) => println!("Estado del miembro: {}", status),
                    Ok(None) => {}
                    Err(e) => eprintln!("Error leyendo estado: {}", e),
                }
            }
            "0" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Resend si hay `RESEND_API_KEY`; si no, modo dry-run que sólo registra.
fn delivery_from_env() -> Arc<dyn DeliveryAdapter> {
    match ResendDeliveryAdapter::from_env() {
        Ok(adapter) => Arc::new(adapter),
        Err(e) => {
            warn!("Resend no configurado ({}); los correos sólo se registran en el log", e);
            Arc::new(LoggingDeliveryAdapter::new())
        }
    }
}

fn run_worker_mode(poller: Arc<DuePoller>,
                   clock: Arc<dyn Clock>,
                   interval: std::time::Duration)
                   -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    // `poller` se suelta fuera del runtime: el cliente HTTP bloqueante no
    // puede destruirse dentro de un contexto async.
    let worker_poller = poller.clone();
    let ticks = runtime.block_on(async move {
                           let (tx, rx) = watch::channel(false);
                           tokio::spawn(async move {
                               if tokio::signal::ctrl_c().await.is_ok() {
                                   info!("Ctrl-C recibido; deteniendo worker");
                               }
                               let _ = tx.send(true);
                           });
                           run_worker(worker_poller, clock, interval, rx).await
                       })?;
    drop(runtime);
    drop(poller);
    info!(ticks, "Worker finalizado");
    Ok(())
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
