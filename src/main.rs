use clap::{Parser, Subcommand};
use order_pipeline::codec::{RecordCodec, Schema};
use order_pipeline::dispatcher::DispatcherConfig;
use order_pipeline::kafka::{KafkaEnqueuer, KafkaPublisher, KafkaSource, TopicManager};
use order_pipeline::processor::{PriceThresholdProcessor, DEFAULT_PRICE_THRESHOLD};
use order_pipeline::producer::BackoffPolicy;
use order_pipeline::{Config, Dispatcher, OrderConsumer, OrderProducer, Result};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "order-pipeline")]
#[command(about = "Order event producer and retrying consumer for Kafka", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, global = true, help = "Verbose logging")]
    verbose: bool,

    #[arg(long, global = true, help = "Create the main and dead-letter topics if missing")]
    create_topics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish random orders to the main topic
    Produce {
        #[arg(long, help = "Stop after this many orders")]
        max_orders: Option<u64>,
    },
    /// Consume orders, requeueing failures and dead-lettering exhausted ones
    Consume {
        #[arg(long, help = "Stop after this many messages")]
        max_messages: Option<u64>,

        #[arg(long, default_value_t = DEFAULT_PRICE_THRESHOLD, help = "Orders priced above this fail processing")]
        price_threshold: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Loading configuration from {:?}", args.config);
    let config = match Config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    info!(
        brokers = %config.bootstrap_servers(),
        topic = %config.kafka.topic,
        dlq_topic = %config.kafka.dlq_topic,
        group_id = %config.consumer.group_id,
        max_retries = config.consumer.max_retries,
        schema = ?config.schema_path,
        "Configuration summary"
    );

    let codec = RecordCodec::new(Schema::from_file(&config.schema_path)?);

    if args.create_topics {
        TopicManager::new(&config.bootstrap_servers(), 1, 1)?
            .ensure_topics(&[config.kafka.topic.as_str(), config.kafka.dlq_topic.as_str()])
            .await?;
    }

    let shutdown = shutdown_signal();

    match args.command {
        Command::Produce { max_orders } => produce(&config, codec, max_orders, shutdown).await,
        Command::Consume {
            max_messages,
            price_threshold,
        } => consume(&config, codec, max_messages, price_threshold, shutdown).await,
    }
}

async fn produce(
    config: &Config,
    codec: RecordCodec,
    max_orders: Option<u64>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let enqueuer = KafkaEnqueuer::new(&config.bootstrap_servers(), &config.kafka)?;
    let policy = BackoffPolicy {
        max_attempts: config.producer.max_attempts,
        initial_backoff: config.producer.initial_backoff(),
    };
    let producer = OrderProducer::new(enqueuer, codec, config.kafka.topic.clone(), policy);

    info!("Starting producer. Press Ctrl+C to stop.");
    producer
        .run(
            config.producer.produce_interval(),
            config.producer.flush_timeout(),
            max_orders,
            shutdown,
        )
        .await;
    Ok(())
}

async fn consume(
    config: &Config,
    codec: RecordCodec,
    max_messages: Option<u64>,
    price_threshold: f64,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let brokers = config.bootstrap_servers();
    let source = KafkaSource::subscribe(&brokers, &config.consumer.group_id, &config.kafka.topic)?;
    let publisher = KafkaPublisher::new(&brokers, &config.kafka)?;

    let dispatcher = Dispatcher::new(
        codec,
        PriceThresholdProcessor {
            threshold: price_threshold,
        },
        DispatcherConfig {
            topic: config.kafka.topic.clone(),
            dlq_topic: config.kafka.dlq_topic.clone(),
            max_retries: config.consumer.max_retries,
        },
    );

    let mut consumer = OrderConsumer::new(dispatcher, source, publisher, config.consumer.poll_timeout())
        .with_max_messages(max_messages);
    let result = consumer.run(shutdown).await;

    if let Err(e) = consumer.publisher().flush(config.producer.flush_timeout()) {
        warn!(error = %e, "Publisher flush did not complete");
    }
    consumer.source().close();

    result.map(|_| ())
}

/// Flips to `true` on Ctrl+C.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping after the current message");
                let _ = tx.send(true);
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
        // keep the sender alive so receivers don't see a closed channel
        std::future::pending::<()>().await;
    });
    rx
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("order_pipeline=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("order_pipeline=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
