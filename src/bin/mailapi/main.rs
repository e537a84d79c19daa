#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Sends a single message through the mail API

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use mailapi::{
    domain::mail::{Attachment, Body, Message, SubmissionResult, Transport},
    infrastructure::{
        config::{MailApiConfig, TransportMode},
        http::ReqwestDeliveryClient,
        queue::{InMemoryQueue, Worker},
    },
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
#[command(name = "mailapi", version, about)]
pub struct Args {
    /// The mail API configuration
    #[clap(flatten)]
    pub config: MailApiConfig,

    /// Sender, as `address` or `Name <address>`
    #[arg(long)]
    pub from: Option<String>,

    /// Primary recipient; repeatable
    #[arg(long, required = true)]
    pub to: Vec<String>,

    /// Carbon copy recipient; repeatable
    #[arg(long)]
    pub cc: Vec<String>,

    /// Blind carbon copy recipient; repeatable
    #[arg(long)]
    pub bcc: Vec<String>,

    /// Subject line
    #[arg(long)]
    pub subject: Option<String>,

    /// HTML body
    #[arg(long, conflicts_with = "text")]
    pub html: Option<String>,

    /// Plain text body
    #[arg(long)]
    pub text: Option<String>,

    /// File to attach; repeatable
    #[arg(long = "attach")]
    pub attachments: Vec<PathBuf>,

    /// Jobs the in-process worker runs at once
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
}

impl Args {
    fn message(&self) -> Message {
        let body = match (&self.html, &self.text) {
            (Some(html), _) => Body::Html(html.clone()),
            (None, Some(text)) => Body::Text(text.clone()),
            (None, None) => Body::default(),
        };

        let mut builder = Message::builder().body(body);

        if let Some(from) = &self.from {
            builder = builder.from(from);
        }

        if let Some(subject) = &self.subject {
            builder = builder.subject(subject);
        }

        for to in &self.to {
            builder = builder.to(to);
        }

        for cc in &self.cc {
            builder = builder.cc(cc);
        }

        for bcc in &self.bcc {
            builder = builder.bcc(bcc);
        }

        for path in &self.attachments {
            builder = builder.attach(Attachment::from_path(path, content_type(path)));
        }

        builder.build()
    }
}

fn content_type(path: &std::path::Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    args.config.validate()?;

    let message = args.message();
    let client = Arc::new(ReqwestDeliveryClient::new()?);

    let result = match args.config.mode {
        TransportMode::Direct => {
            args.config
                .direct_transport(client)?
                .send(&message)
                .await?
        }
        TransportMode::Queued => send_queued(&args, &message, client).await?,
    };

    println!("Submitted to {} recipient(s)", result.recipients);

    for (name, value) in &result.headers {
        println!("{name}: {value}");
    }

    Ok(())
}

#[mutants::skip]
async fn send_queued(
    args: &Args,
    message: &Message,
    client: Arc<ReqwestDeliveryClient>,
) -> Result<SubmissionResult> {
    let (queue, receiver) = InMemoryQueue::new();

    let worker = tokio::spawn(
        Worker::new(queue.clone(), receiver, client)
            .with_concurrency(args.workers)
            .run(),
    );

    let result = args
        .config
        .delivery_transport(Arc::new(queue.clone()))?
        .send(message)
        .await?;

    info!("waiting for delivery");

    tokio::select! {
        _ = queue.wait_idle() => {},
        _ = signal::ctrl_c() => {
            warn!(outstanding = queue.outstanding(), "interrupted before delivery finished");
        },
    }

    worker.abort();

    for dead in queue.dead_jobs().await {
        error!(
            job = %dead.job.id(),
            attempts = dead.job.attempts(),
            reason = %dead.reason,
            failed_at = %dead.failed_at,
            "message was not delivered"
        );
    }

    Ok(result)
}
