// tests/worker_agent.rs

use std::error::Error;
use std::sync::Arc;

use taskmaster::bus::{BoxFuture, MemoryBus, MessageBus, MASTER_CHANNEL};
use taskmaster::worker::{WorkerAgent, WorkerBody, WorkerContext};
use taskmaster_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

struct QuietBody;

impl WorkerBody for QuietBody {
    fn run(self: Box<Self>, _ctx: WorkerContext) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

struct PanickingBody;

impl WorkerBody for PanickingBody {
    fn run(self: Box<Self>, _ctx: WorkerContext) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async { panic!("worker blew up") })
    }
}

struct WaitForShutdownBody;

impl WorkerBody for WaitForShutdownBody {
    fn run(self: Box<Self>, mut ctx: WorkerContext) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async move {
            while !*ctx.shutdown.borrow() {
                ctx.shutdown.changed().await?;
            }
            Ok(())
        })
    }
}

#[tokio::test]
async fn connecting_announces_launched() -> TestResult {
    with_timeout(async {
        init_tracing();

        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let mut master = bus.subscribe(MASTER_CHANNEL).await?;

        let agent = WorkerAgent::connect("logger", bus).await?;
        assert_eq!(agent.name(), "LOGGER");
        assert_eq!(master.recv().await.as_deref(), Some("launched LOGGER"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn status_queries_are_answered_with_launched() -> TestResult {
    with_timeout(async {
        init_tracing();

        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let mut master = bus.subscribe(MASTER_CHANNEL).await?;

        let _agent = WorkerAgent::connect("db", bus.clone()).await?;
        assert_eq!(master.recv().await.as_deref(), Some("launched DB"));

        bus.publish("DB", "get status").await?;
        assert_eq!(master.recv().await.as_deref(), Some("launched DB"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn service_requests_go_to_the_master() -> TestResult {
    with_timeout(async {
        init_tracing();

        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let mut master = bus.subscribe(MASTER_CHANNEL).await?;

        let agent = WorkerAgent::connect("ops", bus).await?;
        assert_eq!(master.recv().await.as_deref(), Some("launched OPS"));

        agent.start_service("db").await?;
        assert_eq!(master.recv().await.as_deref(), Some("start DB"));

        agent.stop_service("worker1").await?;
        assert_eq!(master.recv().await.as_deref(), Some("stop WORKER1"));

        agent.regular_stop().await?;
        assert_eq!(master.recv().await.as_deref(), Some("stopped OPS"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn a_finished_body_confirms_the_stop() -> TestResult {
    with_timeout(async {
        init_tracing();

        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let mut master = bus.subscribe(MASTER_CHANNEL).await?;

        let agent = WorkerAgent::connect("calm", bus).await?;
        assert_eq!(master.recv().await.as_deref(), Some("launched CALM"));

        agent.run_body(Box::new(QuietBody)).await?;
        assert_eq!(master.recv().await.as_deref(), Some("stopped CALM"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn a_panicking_body_still_confirms_the_stop() -> TestResult {
    with_timeout(async {
        init_tracing();

        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let mut master = bus.subscribe(MASTER_CHANNEL).await?;

        let agent = WorkerAgent::connect("flaky", bus).await?;
        assert_eq!(master.recv().await.as_deref(), Some("launched FLAKY"));

        agent.run_body(Box::new(PanickingBody)).await?;
        assert_eq!(master.recv().await.as_deref(), Some("stopped FLAKY"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn the_shutdown_signal_reaches_the_body() -> TestResult {
    with_timeout(async {
        init_tracing();

        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let mut master = bus.subscribe(MASTER_CHANNEL).await?;

        let agent = WorkerAgent::connect("steady", bus).await?;
        assert_eq!(master.recv().await.as_deref(), Some("launched STEADY"));

        let runner = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.run_body(Box::new(WaitForShutdownBody)).await })
        };

        agent.request_shutdown();
        runner.await??;
        assert_eq!(master.recv().await.as_deref(), Some("stopped STEADY"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn connect_rejects_a_blank_name() {
    init_tracing();

    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    assert!(WorkerAgent::connect("   ", bus).await.is_err());
}
