use crate::combine::{CombinePipeline, ToolRunner};
use crate::config::Config;
use crate::media::MediaRouter;
use crate::ports::PortAllocator;
use crate::recording::{ProcessSpawner, RecordingSupervisor};
use crate::session::SessionRegistry;
use crate::signaling::Dispatcher;
use std::sync::Arc;

/// Shared application state for HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Wire the registry, port pool, supervisor and combiner around `router`
    pub fn build(
        config: &Config,
        router: Arc<dyn MediaRouter>,
        spawner: Arc<dyn ProcessSpawner>,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        let ports = Arc::new(PortAllocator::new(config.ports.min, config.ports.max));
        let supervisor = Arc::new(RecordingSupervisor::new(
            Arc::clone(&router),
            ports,
            spawner,
            config.recorder.clone(),
        ));
        let combiner = Arc::new(CombinePipeline::new(config.combine.clone(), runner));

        let dispatcher = Dispatcher::new(
            Arc::new(SessionRegistry::new()),
            router,
            supervisor,
            combiner,
            config.media.max_incoming_bitrate,
        );

        Self::new(Arc::new(dispatcher))
    }
}
