use anyhow::bail;
use futures_executor::block_on;
use log::info;
use rdispatch::{completion, Dispatcher, Outcome};
use std::sync::mpsc;

fn answer() -> i32 {
    42
}

fn load_report(name: &'static str) -> anyhow::Result<u64> {
    bail!("report `{}` not found", name)
}

fn store(id: i32, key: &'static str) {
    info!("store - id: {}, key: {}", id, key);
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let dispatcher = Dispatcher::builder().name("demo").pool_size(4).build()?;

    info!("call_value: {}", block_on(dispatcher.call_value(answer, ())));

    let outcome = block_on(dispatcher.call_outcome(load_report, ("weekly",)));
    info!(
        "call_outcome: value {}, failure {:?}",
        outcome.value(),
        outcome.failure().map(|e| e.to_string())
    );

    // failure is swallowed on this path
    info!(
        "call_value on failure: {}",
        block_on(dispatcher.call_value(load_report, ("weekly",)))
    );

    let (tx, rx) = mpsc::channel();
    dispatcher.act(
        store,
        (3, "x"),
        completion(move |d: &Dispatcher, outcome: Outcome<()>| {
            info!("act: `{}` finished, success: {}", d.name(), outcome.is_success());
            let _ = tx.send(());
        }),
    );
    rx.recv()?;

    block_on(dispatcher.call_await(
        |a: u32, b: u32| a * b,
        (6, 7),
        completion(|_: &Dispatcher, outcome: Outcome<u32>| {
            info!("call_await callback: {}", outcome.value());
        }),
    ));
    info!("call_await resolved");

    Ok(())
}
