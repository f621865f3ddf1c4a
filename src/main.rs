use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use plotlib::{
    page::Page,
    repr::Plot,
    style::{PointMarker, PointStyle},
    view::ContinuousView,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use grid_mdp::gridworld::{print_policy, print_values};
use grid_mdp::{Engine, EngineConfig, Sweep};

const TICK: Duration = Duration::from_millis(100);

const LAYOUT: [&str; 3] = ["111+", "101-", "1111"];

fn print_convergence(deltas: &[(f64, f64)], steps: u32) {
    let s1 = Plot::new(deltas.to_vec()).point_style(PointStyle::new().marker(PointMarker::Circle));
    let v = ContinuousView::new()
        .add(s1)
        .x_range(0.0, steps as f64 + 1.0)
        .x_label("Step")
        .y_label("Max delta");
    match Page::single(&v).dimensions(80, 30).to_text() {
        Ok(text) => println!("{}", text),
        Err(e) => warn!("failed to render convergence plot: {}", e),
    }
}

fn run(seed: Option<u64>, tick: Duration) -> grid_mdp::Result<u32> {
    let mut engine = Engine::configure(&LAYOUT, EngineConfig::default())?;

    let deltas = Rc::new(RefCell::new(Vec::new()));
    let sink = deltas.clone();
    engine.observe(move |sweep: &Sweep<'_>| {
        sink.borrow_mut()
            .push((sweep.step_count as f64, sweep.max_delta));
    });

    engine.reset(seed);
    print_values(engine.grid());

    loop {
        thread::sleep(tick);
        let result = engine.step();
        println!("Step: {}", result.step_count);
        print_values(engine.grid());
        if result.is_terminal() {
            info!(state = ?result.state, steps = result.step_count, "done");
            break;
        }
    }

    if let Some(policy) = engine.policy() {
        print_policy(engine.grid(), policy);
    }
    print_convergence(&deltas.borrow(), engine.step_count());
    Ok(engine.step_count())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let seed = match std::env::args().nth(1).map(|arg| arg.parse::<u64>()) {
        None => None,
        Some(Ok(seed)) => Some(seed),
        Some(Err(e)) => {
            error!("seed must be an unsigned integer: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(seed, TICK) {
        error!("{}", e);
        std::process::exit(1);
    }
}
