// Keyboard teleop: WASD/arrows move, space stops, R/F speed, C clears log, Q quit
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::info;

use arduino_car_runtime::config::TOPIC_CMD;
use arduino_car_runtime::messages::Command;

const SPEED_STEP: i32 = 32;
const MAX_SPEED: i32 = 255;

#[derive(Parser)]
#[command(about = "Keyboard teleop for the car runtime")]
struct Opts {
    /// Key expression the runtime listens on
    #[arg(long, default_value = TOPIC_CMD)]
    topic: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let opts = Opts::parse();
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(opts.topic.as_str()).await?;

    info!("Controls: WASD/arrows=move, space=stop, R/F=speed, C=clear log, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Local copy of the speed so R/F can step it
    let mut speed: i32 = 0;

    loop {
        if !event::poll(Duration::from_millis(20))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let cmd = match code {
            KeyCode::Char('w') | KeyCode::Up => Command::Forward,
            KeyCode::Char('s') | KeyCode::Down => Command::Backward,
            KeyCode::Char('a') | KeyCode::Left => Command::Left,
            KeyCode::Char('d') | KeyCode::Right => Command::Right,
            KeyCode::Char(' ') => Command::Stop,

            KeyCode::Char('r') => {
                speed = (speed + SPEED_STEP).min(MAX_SPEED);
                Command::SetSpeed { value: speed }
            }
            KeyCode::Char('f') => {
                speed = (speed - SPEED_STEP).max(0);
                Command::SetSpeed { value: speed }
            }

            KeyCode::Char('c') => Command::ClearLog,
            KeyCode::Char('q') | KeyCode::Esc => {
                publisher.put(serde_json::to_string(&Command::Stop)?).await?;
                break;
            }
            _ => continue,
        };

        info!("Sending {:?}", cmd);
        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}
