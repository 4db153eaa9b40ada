use std::{path::PathBuf, sync::Arc, time::Duration};

use insightcast_core::{
    ApiConfig, AudioResourceManager, DownloadController, GenerationController, PlaybackController,
    PodcastApi, PodcastSession,
    download::{DirectorySaver, SystemOpener},
    events::{BusConfig, EventBus, EventBusBuilder},
    workers::Worker,
};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::{
    headless::HeadlessElement,
    workers::{
        cli_updates_sink::{CliUpdate, CliUpdatesSinkWorker},
        generate_podcast::GeneratePodcastWorker,
        media_clock::run_media_clock,
        podcast_session::{BusDispatcher, PodcastSessionWorker},
    },
};

pub struct PipelineOptions {
    pub api: ApiConfig,
    pub download_dir: PathBuf,
    /// Tick period of the headless clock. `None` when nothing will be played.
    pub clock_period: Option<Duration>,
}

pub struct PipelineHandle {
    pub bus: Arc<EventBus>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub updates: mpsc::UnboundedReceiver<CliUpdate>,
    pub manager: Arc<AudioResourceManager>,
}

pub async fn start_pipeline(
    bus_config: BusConfig,
    options: PipelineOptions,
) -> Result<PipelineHandle, anyhow::Error> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let (updates_tx, updates) = mpsc::unbounded_channel::<CliUpdate>();

    let builder = EventBusBuilder::new(bus_config)
        .subscribe(GeneratePodcastWorker::subscription())
        .subscribe(PodcastSessionWorker::subscription())
        .subscribe(CliUpdatesSinkWorker::subscription());

    let (bus, mut wiring, tasks) = builder.build()?;
    let arc_bus = Arc::new(bus);
    debug!(session_id = %arc_bus.session_id(), "event bus ready");

    // isolated drain tasks must run before anything is published
    tasks.spawn_all();

    let api = PodcastApi::new(options.api)?;
    let manager = AudioResourceManager::new();
    let downloads = Arc::new(DownloadController::new(
        Arc::new(api.clone()),
        Arc::new(DirectorySaver::new(options.download_dir)),
        Arc::new(SystemOpener),
    ));
    let session = PodcastSession::new(
        GenerationController::new(
            Arc::clone(&manager),
            Arc::new(BusDispatcher::new(arc_bus.clone())),
        ),
        PlaybackController::new(HeadlessElement::new(Arc::clone(&manager))),
        downloads,
    );

    let generate_worker = GeneratePodcastWorker::new(api);
    let session_worker = PodcastSessionWorker::new(session);
    let updates_sink_worker = CliUpdatesSinkWorker::new(updates_tx);

    tokio::spawn(generate_worker.run(
        wiring.claim(GeneratePodcastWorker::SUBSCRIBER_ID)?,
        arc_bus.clone(),
        shutdown_rx.resubscribe(),
    ));
    tokio::spawn(session_worker.run(
        wiring.claim(PodcastSessionWorker::SUBSCRIBER_ID)?,
        arc_bus.clone(),
        shutdown_rx.resubscribe(),
    ));
    tokio::spawn(updates_sink_worker.run(
        wiring.claim(CliUpdatesSinkWorker::SUBSCRIBER_ID)?,
        arc_bus.clone(),
        shutdown_rx.resubscribe(),
    ));

    if let Some(period) = options.clock_period {
        tokio::spawn(run_media_clock(arc_bus.clone(), period, shutdown_rx));
    }
    debug!("workers started");

    Ok(PipelineHandle {
        bus: arc_bus,
        shutdown_tx,
        updates,
        manager,
    })
}
