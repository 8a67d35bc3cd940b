use tracing::{debug, info};

use crate::config::Config;
use crate::engine::{Phase, RunSummary, WorkerEngine};
use crate::error::Result;
use crate::message::Envelope;
use crate::router::MessageRouter;

/// Runs one worker to completion on `router`.
///
/// Every worker of the run must call this with the same configuration. Each
/// round sends, then waits at the barrier, then reads what the barrier
/// delivered; nothing sent in a round is read before that round's barrier.
/// Result rows are written to the router once the run terminates.
pub fn run_worker<R>(config: Config, router: &mut R) -> Result<RunSummary>
where
    R: MessageRouter + ?Sized,
{
    let mut engine = WorkerEngine::new(config, router.topology().clone())?;
    info!(
        "{}: starting ({} workers)",
        engine.identity(),
        engine.topology().num_workers()
    );

    let out = engine.init(std::iter::from_fn(|| router.next_record()));
    send_all(router, out)?;
    router.sync()?;

    loop {
        if engine.phase() == Phase::Assign {
            let out = engine.assign()?;
            send_all(router, out)?;
            router.sync()?;
        }
        engine.collect(router.drain())?;

        let out = engine.update()?;
        send_all(router, out)?;
        router.sync()?;

        let verdict = engine.converge_check(router.drain())?;
        debug!("{} round {}: {:?}", engine.identity(), engine.round(), verdict);
        if verdict.is_final() {
            break;
        }
    }

    let rows = engine.terminate();
    for (identity, point) in &rows {
        router.write_output(identity, point)?;
    }
    let summary = engine.summary();
    info!(
        "{}: finished after {} rounds, wrote {} points",
        summary.identity,
        summary.rounds,
        rows.len()
    );
    Ok(summary)
}

fn send_all<R>(router: &mut R, out: Vec<Envelope>) -> Result<()>
where
    R: MessageRouter + ?Sized,
{
    for env in out {
        router.send(&env.target, env.message)?;
    }
    Ok(())
}
