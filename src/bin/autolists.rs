use anyhow::Result;
use autolists::{
    config::Config,
    feed::{FeedPoller, HttpTimelineSource},
    lists::{HttpListService, ListMode, SharedListService, create_list},
    metrics::create_metrics_publisher,
    notify::{SharedNotificationSink, TracingNotificationSink},
    processor::EventProcessor,
    rules::{RuleFile, RuleStore},
    tasks::{
        Reconciler, SharedReconciliationDispatcher, TaskDispatcher, spawn_cancellable_task,
    },
};
use std::{env, sync::Arc};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "autolists=info".into()),
    );

    let fmt_layer = if std::env::var("JSON_LOGS").is_ok() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let version = autolists::config::version()?;
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|arg| arg == "--version") {
        println!("{version}");
        return Ok(());
    }

    let config = Config::new()?;
    init_tracing();

    let notifier: SharedNotificationSink = Arc::new(TracingNotificationSink::new());

    let http_client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(*config.http_client_timeout.as_ref())
        .build()?;
    let api_token = config
        .list_api_token
        .as_ref()
        .map(|token| token.as_str().to_string());

    let lists: SharedListService = Arc::new(HttpListService::new(
        http_client.clone(),
        config.list_api_base.as_str(),
        config.list_owner.clone(),
        api_token.clone(),
    ));

    if args.first().map(String::as_str) == Some("create-list") {
        let name = args.get(1).map(String::as_str).unwrap_or_default();
        let mode = match args.get(2) {
            Some(mode) => mode.parse::<ListMode>()?,
            None => ListMode::default(),
        };
        create_list(lists.as_ref(), notifier.as_ref(), name, mode).await?;
        return Ok(());
    }

    tracing::info!(version = %version, owner = %config.list_owner, "Starting autolists");

    let metrics = create_metrics_publisher(
        &config.metrics.adapter,
        config.metrics.statsd_host.as_deref(),
        &config.metrics.prefix,
        config.metrics.tags.as_deref(),
    )?;

    let rule_store =
        Arc::new(RuleStore::open(RuleFile::new(&config.rules_path), notifier.clone()).await?);

    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    // Setup signal handler
    {
        let signal_tracker = tracker.clone();
        let signal_token = token.clone();

        tracing::info!("Starting signal handler task");
        tokio::spawn(async move {
            let ctrl_c = async {
                signal::ctrl_c()
                    .await
                    .expect("failed to install Ctrl+C handler");
            };

            #[cfg(unix)]
            let terminate = async {
                signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("failed to install signal handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                () = signal_token.cancelled() => {
                    tracing::info!("Signal handler task shutting down gracefully");
                },
                _ = terminate => {
                    tracing::info!("Received SIGTERM signal, initiating shutdown");
                },
                _ = ctrl_c => {
                    tracing::info!("Received Ctrl+C signal, initiating shutdown");
                },
            }

            signal_tracker.close();
            signal_token.cancel();
            tracing::info!("Signal handler task completed");
        });
    }

    {
        let rule_store = rule_store.clone();
        let interval = config.rules_reload_seconds.to_duration();
        spawn_cancellable_task(&tracker, token.clone(), "rule-reload", move |cancel_token| {
            rule_store.run_reload(interval, cancel_token)
        });
    }

    let reconciler = Arc::new(Reconciler::new(
        lists.clone(),
        notifier.clone(),
        metrics.clone(),
        config.reconcile.retry_policy(),
    ));
    let dispatcher: SharedReconciliationDispatcher =
        Arc::new(TaskDispatcher::new(reconciler, tracker.clone()));

    let (feed_sender, feed_receiver) = mpsc::channel(config.feed.queue_size);

    // Without a poller the processor idles until shutdown instead of seeing a closed channel.
    let idle_sender = if config.feed.enabled {
        let source = Arc::new(HttpTimelineSource::new(
            http_client,
            config.list_api_base.as_str(),
            api_token,
            config.feed.batch_size,
        ));
        let poller = FeedPoller::new(source, feed_sender, config.feed.poll_seconds.to_duration());
        spawn_cancellable_task(&tracker, token.clone(), "feed-poller", move |cancel_token| {
            poller.run(cancel_token)
        });
        None
    } else {
        tracing::warn!("Feed poller disabled, no statuses will be processed");
        Some(feed_sender)
    };

    let mut processor = EventProcessor::new(rule_store.subscribe(), dispatcher, metrics);
    spawn_cancellable_task(&tracker, token.clone(), "event-processor", move |cancel_token| {
        async move {
            let _idle_sender = idle_sender;
            processor.start_processing(feed_receiver, cancel_token).await
        }
    });

    tracing::info!("Waiting for all tasks to complete...");
    tracker.wait().await;

    tracing::info!("All tasks completed, application shutting down");
    Ok(())
}
