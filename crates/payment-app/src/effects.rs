// Executes the flow's effects. This part is async/IO full-fat.
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use payment_model::{Effect, Event, NotificationRequest, SheetRequest};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::config_file;
use crate::ntfy::Notifier;
use crate::sheets::SheetsClient;

#[derive(Clone)]
pub struct Effects {
    sheets: Arc<SheetsClient>,
    notifier: Arc<Notifier>,
    print_report: bool,
}

impl Effects {
    pub fn new(http_timeout: Duration, print_report: bool) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            sheets: Arc::new(SheetsClient::new(http.clone())),
            notifier: Arc::new(Notifier::new(http)),
            print_report,
        })
    }

    pub fn spawn(&self, effect: Effect, evt_tx: UnboundedSender<Event>) {
        match effect {
            Effect::LoadConfig {
                discovery,
                path,
                tag,
            } => {
                tokio::spawn(async move {
                    let event = match config_file::load(discovery, path).await {
                        Ok((path, contents)) => Event::ConfigLoaded {
                            tag,
                            path,
                            contents,
                        },
                        Err(err) => Event::ConfigLoadFailed {
                            tag,
                            error: err.to_string(),
                        },
                    };
                    let _ = evt_tx.send(event);
                });
            }
            Effect::ReadEnvVar { name, tag } => {
                let value = std::env::var(&name).ok();
                let _ = evt_tx.send(Event::EnvVarLoaded { tag, name, value });
            }
            Effect::ReadClock { tag } => {
                let _ = evt_tx.send(Event::ClockRead {
                    tag,
                    now: Utc::now(),
                });
            }
            Effect::FetchSheet(request) => {
                let sheets = Arc::clone(&self.sheets);
                tokio::spawn(async move {
                    let _ = evt_tx.send(fetch_sheet(&sheets, request).await);
                });
            }
            Effect::SendNotification(request) => {
                if self.print_report {
                    println!("{}\n{}", request.title, request.message);
                }
                let notifier = Arc::clone(&self.notifier);
                tokio::spawn(async move {
                    let _ = evt_tx.send(send_notification(&notifier, request).await);
                });
            }
            Effect::StartTimer { fire_at, tag } => {
                let wait = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                debug!(?wait, "sleeping until next run");
                tokio::spawn(async move {
                    tokio::time::sleep(wait).await;
                    let _ = evt_tx.send(Event::TimerFired { tag });
                });
            }
        }
    }
}

async fn fetch_sheet(sheets: &SheetsClient, request: SheetRequest) -> Event {
    let SheetRequest {
        sheet,
        credentials,
        tag,
    } = request;
    info!(sheet = %sheet.label(), "fetching sheet");
    match sheets
        .fetch_rows(&credentials, &sheet.spreadsheet_id, &sheet.sheet_name)
        .await
    {
        Ok(rows) => Event::SheetFetched { tag, rows },
        Err(err) => Event::SheetFetchFailed {
            tag,
            error: err.to_string(),
        },
    }
}

async fn send_notification(notifier: &Notifier, request: NotificationRequest) -> Event {
    let NotificationRequest {
        server,
        topic,
        title,
        message,
        tags,
        tag,
    } = request;
    match notifier
        .send(&server, &topic, &title, &message, &tags)
        .await
    {
        Ok(()) => Event::NotificationSent { tag },
        Err(err) => Event::NotificationFailed {
            tag,
            error: err.to_string(),
        },
    }
}
