// Single-actor command loop
//
// The loop task is the only owner of the controller (and through it the
// serial link). Commands arrive over zenoh as JSON, are applied one at a
// time to completion, and every controller event is republished so a UI
// never reads controller state directly.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// local imports
use crate::config::Config;
use crate::events::Event;
use crate::history::CommandLog;
use crate::messages::{Command, Direction};
use crate::motor::{FirmataBus, MotorDriver, SerialChannel, SimulatedBus};
use crate::MotionController;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Open the board (or the simulated one) and build the controller.
/// A board that cannot be reached is fatal.
pub async fn connect(
    config: &Config,
) -> Result<MotionController<Box<dyn SerialChannel + Send>>, BoxError> {
    let bus: Box<dyn SerialChannel + Send> = if config.simulate {
        info!("Simulation mode: no serial port will be opened");
        Box::new(SimulatedBus::new())
    } else {
        let bus = FirmataBus::open_with_timeout(&config.port, config.baud, config.write_timeout())?;
        // Arduino resets when the port opens
        let settle = config.settle_delay();
        if !settle.is_zero() {
            debug!("Waiting {:?} for board reset", settle);
            tokio::time::sleep(settle).await;
        }
        Box::new(bus)
    };

    let mut driver = MotorDriver::with_pins(bus, config.left_pin, config.right_pin);
    driver.initialize()?;
    driver.stop()?;

    let log = CommandLog::with_capacity_limit(config.log_capacity);
    Ok(MotionController::new(driver, log))
}

pub async fn run(config: Config) -> Result<(), BoxError> {
    let controller = connect(&config).await?;
    serve(controller, &config).await
}

/// Drive an already-built controller from zenoh until Ctrl-C
pub async fn serve<S: SerialChannel>(
    mut controller: MotionController<S>,
    config: &Config,
) -> Result<(), BoxError> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    controller.subscribe(move |event| {
        // Receiver only goes away at shutdown
        let _ = event_tx.send(event.clone());
    });

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(config.topic_cmd.as_str()).await?;
    let pub_events = session.declare_publisher(config.topic_events.as_str()).await?;
    let pub_state = session.declare_publisher(config.topic_state.as_str()).await?;

    info!("Subscribed to: {}", config.topic_cmd);
    info!("Publishing to: {}, {}", config.topic_events, config.topic_state);

    pub_state.put(serde_json::to_string(&controller.state())?).await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down, stopping motors");
                if let Err(e) = controller.issue(Direction::Stop) {
                    error!("Failed to stop motors: {}", e);
                }
                break;
            }
            sample = subscriber.recv_async() => {
                let sample = sample?;
                let payload = sample.payload().to_bytes();
                match serde_json::from_slice::<Command>(&payload) {
                    Ok(cmd) => {
                        // Failures are already reported as TransitionFailed events
                        if let Err(e) = controller.apply(cmd) {
                            warn!("Command {:?} rejected: {}", cmd, e);
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse command: {}", e);
                    }
                }
            }
        }

        // Forward everything the last operation emitted
        while let Ok(event) = event_rx.try_recv() {
            if let Event::LogAppended { entry } = &event {
                info!("{}", entry);
            }
            pub_events.put(serde_json::to_string(&event)?).await?;
        }
        pub_state.put(serde_json::to_string(&controller.state())?).await?;
    }

    while let Ok(event) = event_rx.try_recv() {
        pub_events.put(serde_json::to_string(&event)?).await?;
    }
    Ok(())
}
